mod api;
mod in_memory;

pub use api::BackfillChunk;
pub use api::ReadToken;
pub use api::Store;
pub use api::StoreError;
pub use api::WriteToken;
pub use in_memory::InMemoryStore;
