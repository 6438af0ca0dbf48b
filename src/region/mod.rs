mod key;
mod region;

pub use key::Key;
pub use key::HASH_SPACE;
pub use region::HashRange;
pub use region::KeyRange;
pub use region::Region;
