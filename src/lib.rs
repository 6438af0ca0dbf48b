mod actor;
mod api;
mod contract;
mod directory;
mod dispatcher;
mod execution;
mod query;
mod reactor;
mod region;
mod replicator;
mod server;
mod store;
mod throttler;
mod version;
mod grpc {
    include!("../generated/replication.rs");
}

pub use api::try_create_replication_server;
pub use api::BackfillStatus;
pub use api::CannotPerformQueryReason;
pub use api::QueryError;
pub use api::ReplicationOptions;
pub use api::ReplicationServer;
pub use api::ReplicationServerConfig;
pub use api::ReplicationServerCreationError;
pub use api::RpcConfig;
pub use contract::create_ack_channel;
pub use contract::AckConfig;
pub use contract::AckMode;
pub use contract::ChannelAckSink;
pub use contract::Contract;
pub use contract::ContractAck;
pub use contract::ContractAckSink;
pub use contract::ContractAckState;
pub use contract::ContractAckStream;
pub use contract::ContractId;
pub use contract::PrimaryAssignment;
pub use contract::ServerId;
pub use directory::Bcards;
pub use directory::Directory;
pub use directory::InMemoryDirectory;
pub use directory::PrimaryBcard;
pub use dispatcher::DispatcheeError;
pub use query::Durability;
pub use query::Read;
pub use query::ReadMode;
pub use query::ReadResponse;
pub use query::Write;
pub use query::WriteResponse;
pub use reactor::Blueprint;
pub use reactor::Role;
pub use region::HashRange;
pub use region::Key;
pub use region::KeyRange;
pub use region::Region;
pub use region::HASH_SPACE;
pub use store::InMemoryStore;
pub use store::Store;
pub use store::StoreError;
pub use version::BranchBirthCertificate;
pub use version::BranchHistory;
pub use version::BranchHistoryStore;
pub use version::BranchId;
pub use version::Timestamp;
pub use version::Version;
pub use version::VersionMap;
pub use version::VolatileBranchHistoryStore;

// Root mods hold no code, only `mod` and `pub use` statements. No `mod` is `pub` anywhere;
// types leave a mod through individual `pub use` statements.
