mod endpoint;
mod enforcer;
mod listener;
mod local;
mod remote_client;
mod remote_server;
mod transport;

pub use endpoint::BackfillChunkInput;
pub use endpoint::EndpointError;
pub use endpoint::RegisterInput;
pub use endpoint::RegisterOutput;
pub use endpoint::ReplicatorEndpoint;
pub use listener::ListenerReplica;
pub use local::LocalReplicator;
pub use remote_client::RemoteReplicatorClient;
pub use remote_server::RemoteReplicatorServer;
pub use remote_server::REMOTE_DISPATCHEE_PRIORITY;
pub use transport::Exposure;
pub use transport::InProcessTransport;
pub use transport::ReplicatorAddress;
pub use transport::ReplicatorTransport;
