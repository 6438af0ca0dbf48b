mod directory;

pub use directory::wait_for_bcard;
pub use directory::wait_for_bcard_gone;
pub use directory::BcardKey;
pub use directory::Bcards;
pub use directory::Directory;
pub use directory::InMemoryDirectory;
pub use directory::PrimaryBcard;
pub use directory::Publication;
