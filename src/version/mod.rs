mod branch;
mod branch_history;
mod timestamp;
mod version_map;

pub use branch::BranchId;
pub use branch::Version;
pub use branch_history::BranchBirthCertificate;
pub use branch_history::BranchHistory;
pub use branch_history::BranchHistoryError;
pub use branch_history::BranchHistoryStore;
pub use branch_history::VolatileBranchHistoryStore;
pub use timestamp::Timestamp;
pub use version_map::VersionMap;
