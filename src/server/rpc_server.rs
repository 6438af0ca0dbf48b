use crate::contract::ServerId;
use crate::dispatcher::{DispatcheeError, RegistrationId};
use crate::grpc::grpc_replica_server::{GrpcReplica, GrpcReplicaServer};
use crate::grpc::grpc_replicator_server::{GrpcReplicator, GrpcReplicatorServer};
use crate::grpc::{
    proto_backfill_chunk_result, proto_do_read_result, proto_do_write_result, proto_register_result,
    proto_registration_result, ProtoBackfillChunkReq, ProtoBackfillChunkResult, ProtoDoReadReq, ProtoDoReadResult,
    ProtoDoWriteReq, ProtoDoWriteResult, ProtoEmpty, ProtoRegisterReq, ProtoRegisterResult, ProtoRegisterSuccess,
    ProtoRegistrationReq, ProtoRegistrationResult,
};
use crate::query::{Durability, OrderToken};
use crate::replicator::{
    BackfillChunkInput, EndpointError, RegisterInput, RemoteReplicatorServer, ReplicatorEndpoint,
};
use crate::server::convert;
use crate::server::proxies::GrpcReplicaProxy;
use crate::server::registry::{ReplicaRouter, ReplicatorRegistry};
use crate::server::RpcServerShutdownSignal;
use crate::version::{BranchId, Timestamp};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// RpcServer serves both sides of replication: `GrpcReplicator` for the primaries living on this
/// server and `GrpcReplica` for its secondaries' listeners.
#[derive(Clone)]
pub struct RpcServer {
    logger: slog::Logger,
    registry: Arc<ReplicatorRegistry>,
    router: Arc<ReplicaRouter>,
}

impl RpcServer {
    pub(crate) fn new(logger: slog::Logger, registry: Arc<ReplicatorRegistry>, router: Arc<ReplicaRouter>) -> Self {
        RpcServer {
            logger,
            registry,
            router,
        }
    }

    pub async fn run(self, socket_addr: SocketAddr, shutdown_signal: RpcServerShutdownSignal) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", socket_addr);

        // TODO:2 if server port is unavailable, signal back to caller.
        // tonic 0.4 routes by plain path prefix and tries the last added service first, so
        // `GrpcReplicator` must come last or `/replication.GrpcReplica` swallows its calls.
        let result = Server::builder()
            .add_service(GrpcReplicaServer::new(self.clone()))
            .add_service(GrpcReplicatorServer::new(self))
            .serve_with_shutdown(socket_addr, shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    fn replicator(&self, branch: &BranchId) -> Result<Arc<RemoteReplicatorServer>, EndpointError> {
        self.registry
            .get(branch)
            .ok_or_else(|| EndpointError::LostContact(format!("No primary serves branch {:?} here", branch)))
    }

    async fn handle_register(&self, rpc_request: ProtoRegisterReq) -> Result<ProtoRegisterResult, Status> {
        let branch = convert::branch_from_proto(rpc_request.branch)?;
        let server_id = ServerId::new(&rpc_request.server_id);
        let listener = GrpcReplicaProxy::new(
            self.logger.new(slog::o!("Replica" => rpc_request.server_id.clone())),
            rpc_request.replica_url,
            rpc_request.route_id,
        );

        let app_result = match self.replicator(&branch) {
            Ok(replicator) => {
                replicator
                    .register(RegisterInput {
                        server_id,
                        listener: Arc::new(listener),
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        let result = match app_result {
            Ok(output) => proto_register_result::Result::Ok(ProtoRegisterSuccess {
                registration_id: output.registration_id.as_u64(),
                initial_timestamp: output.initial_timestamp.as_u64(),
            }),
            Err(e) => proto_register_result::Result::Err(convert::endpoint_error_to_proto(e)),
        };

        Ok(ProtoRegisterResult { result: Some(result) })
    }

    async fn handle_registration(
        &self,
        rpc_request: ProtoRegistrationReq,
        call: RegistrationCall,
    ) -> Result<ProtoRegistrationResult, Status> {
        let branch = convert::branch_from_proto(rpc_request.branch)?;
        let registration_id = RegistrationId(rpc_request.registration_id);

        let app_result = match self.replicator(&branch) {
            Ok(replicator) => match call {
                RegistrationCall::MarkReady => replicator.mark_ready(registration_id).await,
                RegistrationCall::Deregister => replicator.deregister(registration_id).await,
                RegistrationCall::Check => replicator.check_registration(registration_id).await,
            },
            Err(e) => Err(e),
        };

        Ok(Self::convert_registration_result(app_result))
    }

    fn convert_registration_result(app_result: Result<(), EndpointError>) -> ProtoRegistrationResult {
        let result = match app_result {
            Ok(()) => proto_registration_result::Result::Ok(ProtoEmpty {}),
            Err(e) => proto_registration_result::Result::Err(convert::endpoint_error_to_proto(e)),
        };

        ProtoRegistrationResult { result: Some(result) }
    }

    async fn handle_backfill_chunk(
        &self,
        rpc_request: ProtoBackfillChunkReq,
    ) -> Result<ProtoBackfillChunkResult, Status> {
        let branch = convert::branch_from_proto(rpc_request.branch)?;
        let app_input = BackfillChunkInput {
            region: convert::region_from_proto(rpc_request.region)?,
            after: convert::optional_key_from_proto(rpc_request.after, rpc_request.has_after),
            min_timestamp: Timestamp::new(rpc_request.min_timestamp),
            limit: rpc_request.limit as usize,
        };
        if app_input.limit == 0 {
            return Err(Status::invalid_argument("Backfill chunk limit must be positive"));
        }

        let app_result = match self.replicator(&branch) {
            Ok(replicator) => replicator.backfill_chunk(app_input).await,
            Err(e) => Err(e),
        };

        let result = match app_result {
            Ok(chunk) => proto_backfill_chunk_result::Result::Ok(convert::chunk_to_proto(chunk)),
            Err(e) => proto_backfill_chunk_result::Result::Err(convert::endpoint_error_to_proto(e)),
        };

        Ok(ProtoBackfillChunkResult { result: Some(result) })
    }

    async fn handle_do_read(&self, rpc_request: ProtoDoReadReq) -> Result<ProtoDoReadResult, Status> {
        let read = convert::read_from_proto(rpc_request.read)?;
        let min_timestamp = Timestamp::new(rpc_request.min_timestamp);

        // Never fires. The read is abandoned with this future when the caller goes away.
        let cancel = CancellationToken::new();

        let app_result = match self.router.get(rpc_request.route_id) {
            Some(listener) => listener.do_read(&read, min_timestamp, &cancel).await,
            None => Err(Self::unknown_route(rpc_request.route_id)),
        };

        let result = match app_result {
            Ok(response) => proto_do_read_result::Result::Ok(convert::read_response_to_proto(response)),
            Err(e) => proto_do_read_result::Result::Err(convert::dispatchee_error_to_proto(e)),
        };

        Ok(ProtoDoReadResult { result: Some(result) })
    }

    async fn handle_do_write(&self, rpc_request: ProtoDoWriteReq) -> Result<ProtoDoWriteResult, Status> {
        let write = convert::write_from_proto(rpc_request.write)?;
        let timestamp = Timestamp::new(rpc_request.timestamp);
        let order_token = OrderToken {
            source: rpc_request.order_source,
            seq: rpc_request.order_seq,
        };

        let app_result = match self.router.get(rpc_request.route_id) {
            Some(listener) if rpc_request.sync => {
                let durability = if rpc_request.hard {
                    Durability::Hard
                } else {
                    Durability::Soft
                };
                listener
                    .do_write_sync(&write, timestamp, order_token, durability)
                    .await
                    .map(Some)
            }
            Some(listener) => listener
                .do_write_async(&write, timestamp, order_token)
                .await
                .map(|_| None),
            None => Err(Self::unknown_route(rpc_request.route_id)),
        };

        let result = match app_result {
            Ok(response) => proto_do_write_result::Result::Ok(convert::write_response_to_proto(response)),
            Err(e) => proto_do_write_result::Result::Err(convert::dispatchee_error_to_proto(e)),
        };

        Ok(ProtoDoWriteResult { result: Some(result) })
    }

    fn unknown_route(route_id: u64) -> DispatcheeError {
        DispatcheeError::LostContact(format!("Replica route {} is gone", route_id))
    }
}

enum RegistrationCall {
    MarkReady,
    Deregister,
    Check,
}

#[tonic::async_trait]
impl GrpcReplicator for RpcServer {
    async fn register(&self, request: Request<ProtoRegisterReq>) -> Result<Response<ProtoRegisterResult>, Status> {
        slog::debug!(self.logger, "ServerWire - {:?}", request);
        let reply = self.handle_register(request.into_inner()).await?;
        Ok(Response::new(reply))
    }

    async fn mark_ready(
        &self,
        request: Request<ProtoRegistrationReq>,
    ) -> Result<Response<ProtoRegistrationResult>, Status> {
        slog::debug!(self.logger, "ServerWire - {:?}", request);
        let reply = self
            .handle_registration(request.into_inner(), RegistrationCall::MarkReady)
            .await?;
        Ok(Response::new(reply))
    }

    async fn deregister(
        &self,
        request: Request<ProtoRegistrationReq>,
    ) -> Result<Response<ProtoRegistrationResult>, Status> {
        slog::debug!(self.logger, "ServerWire - {:?}", request);
        let reply = self
            .handle_registration(request.into_inner(), RegistrationCall::Deregister)
            .await?;
        Ok(Response::new(reply))
    }

    async fn check_registration(
        &self,
        request: Request<ProtoRegistrationReq>,
    ) -> Result<Response<ProtoRegistrationResult>, Status> {
        let reply = self
            .handle_registration(request.into_inner(), RegistrationCall::Check)
            .await?;
        Ok(Response::new(reply))
    }

    async fn backfill_chunk(
        &self,
        request: Request<ProtoBackfillChunkReq>,
    ) -> Result<Response<ProtoBackfillChunkResult>, Status> {
        slog::debug!(self.logger, "ServerWire - {:?}", request);
        let reply = self.handle_backfill_chunk(request.into_inner()).await?;
        Ok(Response::new(reply))
    }
}

#[tonic::async_trait]
impl GrpcReplica for RpcServer {
    async fn do_read(&self, request: Request<ProtoDoReadReq>) -> Result<Response<ProtoDoReadResult>, Status> {
        let reply = self.handle_do_read(request.into_inner()).await?;
        Ok(Response::new(reply))
    }

    async fn do_write(&self, request: Request<ProtoDoWriteReq>) -> Result<Response<ProtoDoWriteResult>, Status> {
        let reply = self.handle_do_write(request.into_inner()).await?;
        Ok(Response::new(reply))
    }
}
