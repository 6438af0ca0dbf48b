//! The client-facing API: creating a replication server and querying through it.
mod client;
mod options;
mod wiring;

pub use client::BackfillStatus;
pub use client::CannotPerformQueryReason;
pub use client::QueryError;
pub use client::ReplicationServer;
pub use options::ReplicationOptions;
pub use wiring::try_create_replication_server;
pub use wiring::ReplicationServerConfig;
pub use wiring::ReplicationServerCreationError;
pub use wiring::RpcConfig;
