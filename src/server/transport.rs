use crate::replicator::{
    EndpointError, Exposure, RemoteReplicatorServer, ReplicatorAddress, ReplicatorEndpoint, ReplicatorTransport,
};
use crate::server::proxies::GrpcReplicatorEndpoint;
use crate::server::registry::{ReplicaRouter, ReplicatorRegistry};
use crate::server::rpc_server::RpcServer;
use crate::version::BranchId;
use std::sync::Arc;

/// GrpcTransport exposes this server's primaries through its `RpcServer` and reaches other
/// servers' primaries over gRPC.
pub struct GrpcTransport {
    logger: slog::Logger,
    advertise_url: String,
    registry: Arc<ReplicatorRegistry>,
    router: Arc<ReplicaRouter>,
}

impl GrpcTransport {
    /// `advertise_url` is where other servers reach this server's `RpcServer`.
    pub fn new(logger: slog::Logger, advertise_url: String) -> Self {
        GrpcTransport {
            logger,
            advertise_url,
            registry: Arc::new(ReplicatorRegistry::new()),
            router: Arc::new(ReplicaRouter::new()),
        }
    }

    pub fn rpc_server(&self) -> RpcServer {
        RpcServer::new(self.logger.clone(), self.registry.clone(), self.router.clone())
    }
}

impl ReplicatorTransport for GrpcTransport {
    fn expose(&self, server: Arc<RemoteReplicatorServer>, branch: BranchId) -> Exposure {
        let entry = self.registry.insert(branch, server);
        slog::debug!(self.logger, "Exposing replicator for {:?} at {}", branch, self.advertise_url);

        Exposure::new(
            ReplicatorAddress::Grpc {
                url: self.advertise_url.clone(),
            },
            Some(Box::new(entry)),
        )
    }

    fn resolve(
        &self,
        address: &ReplicatorAddress,
        branch: BranchId,
    ) -> Result<Arc<dyn ReplicatorEndpoint>, EndpointError> {
        match address {
            ReplicatorAddress::InProcess(endpoint) => Ok(endpoint.clone()),
            ReplicatorAddress::Grpc { url } => Ok(Arc::new(GrpcReplicatorEndpoint::new(
                self.logger.new(slog::o!("Primary" => url.clone())),
                url.clone(),
                branch,
                self.advertise_url.clone(),
                self.router.clone(),
            ))),
        }
    }
}
