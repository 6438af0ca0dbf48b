mod convert;
mod proxies;
mod registry;
mod rpc_server;
mod shutdown;
mod transport;

pub use shutdown::shutdown_signal;
pub use shutdown::RpcServerShutdownHandle;
pub use shutdown::RpcServerShutdownSignal;
pub use transport::GrpcTransport;
