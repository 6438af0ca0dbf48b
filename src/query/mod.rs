mod order;
mod types;

pub use order::OrderChecker;
pub use order::OrderSource;
pub use order::OrderToken;
pub use types::Durability;
pub use types::Read;
pub use types::ReadMode;
pub use types::ReadResponse;
pub use types::Write;
pub use types::WriteResponse;
