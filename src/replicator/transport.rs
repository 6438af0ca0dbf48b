use crate::replicator::endpoint::{EndpointError, ReplicatorEndpoint};
use crate::replicator::remote_server::RemoteReplicatorServer;
use crate::version::BranchId;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Where secondaries find a primary's replicator.
#[derive(Clone)]
pub enum ReplicatorAddress {
    /// Same process. The endpoint is called directly.
    InProcess(Arc<dyn ReplicatorEndpoint>),
    /// A `GrpcReplicator` service, e.g. "http://10.0.0.1:7000".
    Grpc { url: String },
}

impl fmt::Debug for ReplicatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicatorAddress::InProcess(_) => write!(f, "InProcess"),
            ReplicatorAddress::Grpc { url } => write!(f, "Grpc({})", url),
        }
    }
}

/// Exposure keeps a replicator reachable at `address` until dropped.
pub struct Exposure {
    pub address: ReplicatorAddress,
    _guard: Option<Box<dyn Any + Send + Sync>>,
}

impl Exposure {
    pub fn new(address: ReplicatorAddress, guard: Option<Box<dyn Any + Send + Sync>>) -> Self {
        Exposure { address, _guard: guard }
    }
}

/// ReplicatorTransport connects primaries and secondaries. Primaries expose their replicator
/// through it, secondaries resolve the addresses they find in the directory.
pub trait ReplicatorTransport: Send + Sync {
    fn expose(&self, server: Arc<RemoteReplicatorServer>, branch: BranchId) -> Exposure;

    fn resolve(
        &self,
        address: &ReplicatorAddress,
        branch: BranchId,
    ) -> Result<Arc<dyn ReplicatorEndpoint>, EndpointError>;
}

/// InProcessTransport only reaches replicators living in this process.
pub struct InProcessTransport;

impl ReplicatorTransport for InProcessTransport {
    fn expose(&self, server: Arc<RemoteReplicatorServer>, _branch: BranchId) -> Exposure {
        Exposure::new(ReplicatorAddress::InProcess(server), None)
    }

    fn resolve(
        &self,
        address: &ReplicatorAddress,
        _branch: BranchId,
    ) -> Result<Arc<dyn ReplicatorEndpoint>, EndpointError> {
        match address {
            ReplicatorAddress::InProcess(endpoint) => Ok(endpoint.clone()),
            ReplicatorAddress::Grpc { url } => Err(EndpointError::LostContact(format!(
                "Can't reach {} without an rpc transport",
                url
            ))),
        }
    }
}
