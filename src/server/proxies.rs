use crate::dispatcher::{Dispatchee, DispatcheeError, RegistrationId};
use crate::grpc::grpc_replica_client::GrpcReplicaClient;
use crate::grpc::grpc_replicator_client::GrpcReplicatorClient;
use crate::grpc::{
    proto_backfill_chunk_result, proto_do_read_result, proto_do_write_result, proto_register_result,
    proto_registration_result, ProtoBackfillChunkReq, ProtoDoReadReq, ProtoDoWriteReq, ProtoRegisterReq,
    ProtoRegistrationReq, ProtoRegistrationResult,
};
use crate::query::{Durability, OrderToken, Read, ReadResponse, Write, WriteResponse};
use crate::replicator::{BackfillChunkInput, EndpointError, RegisterInput, RegisterOutput, ReplicatorEndpoint};
use crate::server::convert;
use crate::server::registry::ReplicaRouter;
use crate::store::BackfillChunk;
use crate::version::{BranchId, Timestamp};
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tonic::codegen::http::uri;
use tonic::transport::{Channel, Endpoint};

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid url")]
    InvalidUri(#[from] uri::InvalidUri),
    #[error("Connection failed: {0}")]
    ConnectFailure(Box<dyn Error + Send + Sync>),
}

impl From<tonic::transport::Error> for ConnectError {
    fn from(e: tonic::transport::Error) -> Self {
        ConnectError::ConnectFailure(e.into())
    }
}

async fn connect(url: &str) -> Result<Channel, ConnectError> {
    let endpoint = Endpoint::from_shared(url.to_string())?;
    Ok(endpoint.connect().await?)
}

/// GrpcReplicaProxy stands in for a secondary's listener on the primary's dispatcher. It
/// connects on first use.
pub(crate) struct GrpcReplicaProxy {
    logger: slog::Logger,
    url: String,
    route_id: u64,
    client: tokio::sync::Mutex<Option<GrpcReplicaClient<Channel>>>,
}

impl GrpcReplicaProxy {
    pub fn new(logger: slog::Logger, url: String, route_id: u64) -> Self {
        GrpcReplicaProxy {
            logger,
            url,
            route_id,
            client: tokio::sync::Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<GrpcReplicaClient<Channel>, DispatcheeError> {
        let mut client = self.client.lock().await;
        if let Some(client) = client.as_ref() {
            return Ok(client.clone());
        }

        let channel = connect(&self.url)
            .await
            .map_err(|e| DispatcheeError::LostContact(format!("{}: {}", self.url, e)))?;
        slog::debug!(self.logger, "Connected to replica at {}", self.url);

        let connected = GrpcReplicaClient::new(channel);
        *client = Some(connected.clone());
        Ok(connected)
    }

    async fn write(
        &self,
        write: &Write,
        timestamp: Timestamp,
        order_token: OrderToken,
        durability: Option<Durability>,
    ) -> Result<Option<WriteResponse>, DispatcheeError> {
        let mut client = self.client().await?;
        let request = ProtoDoWriteReq {
            route_id: self.route_id,
            write: Some(convert::write_to_proto(write)),
            timestamp: timestamp.as_u64(),
            order_source: order_token.source,
            order_seq: order_token.seq,
            sync: durability.is_some(),
            hard: durability == Some(Durability::Hard),
        };

        let result = client
            .do_write(request)
            .await
            .map_err(|status| DispatcheeError::LostContact(status.message().to_string()))?
            .into_inner();

        match result.result {
            Some(proto_do_write_result::Result::Ok(response)) => convert::write_response_from_proto(response),
            Some(proto_do_write_result::Result::Err(e)) => Err(convert::dispatchee_error_from_proto(e)),
            None => Err(DispatcheeError::LostContact("Replica sent an empty result".to_string())),
        }
    }
}

#[async_trait::async_trait]
impl Dispatchee for GrpcReplicaProxy {
    async fn do_read(
        &self,
        read: &Read,
        min_timestamp: Timestamp,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, DispatcheeError> {
        let mut client = self.client().await?;
        let request = ProtoDoReadReq {
            route_id: self.route_id,
            read: Some(convert::read_to_proto(read)),
            min_timestamp: min_timestamp.as_u64(),
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(DispatcheeError::Interrupted),
            result = client.do_read(request) => result,
        };
        let result = result
            .map_err(|status| DispatcheeError::LostContact(status.message().to_string()))?
            .into_inner();

        match result.result {
            Some(proto_do_read_result::Result::Ok(response)) => convert::read_response_from_proto(response),
            Some(proto_do_read_result::Result::Err(e)) => Err(convert::dispatchee_error_from_proto(e)),
            None => Err(DispatcheeError::LostContact("Replica sent an empty result".to_string())),
        }
    }

    async fn do_write_sync(
        &self,
        write: &Write,
        timestamp: Timestamp,
        order_token: OrderToken,
        durability: Durability,
    ) -> Result<WriteResponse, DispatcheeError> {
        self.write(write, timestamp, order_token, Some(durability))
            .await?
            .ok_or_else(|| DispatcheeError::LostContact("Replica answered a sync write without a response".to_string()))
    }

    async fn do_write_async(
        &self,
        write: &Write,
        timestamp: Timestamp,
        order_token: OrderToken,
    ) -> Result<(), DispatcheeError> {
        self.write(write, timestamp, order_token, None).await.map(|_| ())
    }
}

/// GrpcReplicatorEndpoint talks to a primary's `GrpcReplicator` service. Listeners registered
/// through it are served from this server's `GrpcReplica` service under a fresh route.
pub(crate) struct GrpcReplicatorEndpoint {
    logger: slog::Logger,
    url: String,
    branch: BranchId,
    advertise_url: String,
    router: Arc<ReplicaRouter>,
    client: tokio::sync::Mutex<Option<GrpcReplicatorClient<Channel>>>,
    routes: Mutex<HashMap<RegistrationId, u64>>,
}

impl GrpcReplicatorEndpoint {
    pub fn new(
        logger: slog::Logger,
        url: String,
        branch: BranchId,
        advertise_url: String,
        router: Arc<ReplicaRouter>,
    ) -> Self {
        GrpcReplicatorEndpoint {
            logger,
            url,
            branch,
            advertise_url,
            router,
            client: tokio::sync::Mutex::new(None),
            routes: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self) -> Result<GrpcReplicatorClient<Channel>, EndpointError> {
        let mut client = self.client.lock().await;
        if let Some(client) = client.as_ref() {
            return Ok(client.clone());
        }

        let channel = connect(&self.url)
            .await
            .map_err(|e| EndpointError::LostContact(format!("{}: {}", self.url, e)))?;
        slog::debug!(self.logger, "Connected to replicator at {}", self.url);

        let connected = GrpcReplicatorClient::new(channel);
        *client = Some(connected.clone());
        Ok(connected)
    }

    fn registration_request(&self, registration_id: RegistrationId) -> ProtoRegistrationReq {
        ProtoRegistrationReq {
            branch: Some(convert::branch_to_proto(self.branch)),
            registration_id: registration_id.as_u64(),
        }
    }

    fn convert_registration_result(
        result: Result<tonic::Response<ProtoRegistrationResult>, tonic::Status>,
    ) -> Result<(), EndpointError> {
        let result = result
            .map_err(|status| EndpointError::LostContact(status.message().to_string()))?
            .into_inner();

        match result.result {
            Some(proto_registration_result::Result::Ok(_)) => Ok(()),
            Some(proto_registration_result::Result::Err(e)) => Err(convert::endpoint_error_from_proto(Some(e))),
            None => Err(convert::endpoint_error_from_proto(None)),
        }
    }

    fn lock_routes(&self) -> MutexGuard<'_, HashMap<RegistrationId, u64>> {
        self.routes.lock().expect("GrpcReplicatorEndpoint routes mutex guard poison")
    }
}

#[async_trait::async_trait]
impl ReplicatorEndpoint for GrpcReplicatorEndpoint {
    async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, EndpointError> {
        let mut client = self.client().await?;
        let route_id = self.router.insert(input.listener);
        let request = ProtoRegisterReq {
            branch: Some(convert::branch_to_proto(self.branch)),
            server_id: input.server_id.as_str().to_string(),
            replica_url: self.advertise_url.clone(),
            route_id,
        };

        let result = client
            .register(request)
            .await
            .map_err(|status| EndpointError::LostContact(status.message().to_string()))
            .and_then(|response| match response.into_inner().result {
                Some(proto_register_result::Result::Ok(ok)) => Ok(RegisterOutput {
                    registration_id: RegistrationId(ok.registration_id),
                    initial_timestamp: Timestamp::new(ok.initial_timestamp),
                }),
                Some(proto_register_result::Result::Err(e)) => Err(convert::endpoint_error_from_proto(Some(e))),
                None => Err(convert::endpoint_error_from_proto(None)),
            });

        match result {
            Ok(output) => {
                self.lock_routes().insert(output.registration_id, route_id);
                Ok(output)
            }
            Err(e) => {
                self.router.remove(route_id);
                Err(e)
            }
        }
    }

    async fn mark_ready(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
        let mut client = self.client().await?;
        Self::convert_registration_result(client.mark_ready(self.registration_request(registration_id)).await)
    }

    async fn deregister(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
        // Stop taking writes even if the primary can't be told.
        if let Some(route_id) = self.lock_routes().remove(&registration_id) {
            self.router.remove(route_id);
        }

        let mut client = self.client().await?;
        Self::convert_registration_result(client.deregister(self.registration_request(registration_id)).await)
    }

    async fn check_registration(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
        let mut client = self.client().await?;
        Self::convert_registration_result(
            client
                .check_registration(self.registration_request(registration_id))
                .await,
        )
    }

    async fn backfill_chunk(&self, input: BackfillChunkInput) -> Result<BackfillChunk, EndpointError> {
        let mut client = self.client().await?;
        let (after, has_after) = convert::optional_key_to_proto(&input.after);
        let request = ProtoBackfillChunkReq {
            branch: Some(convert::branch_to_proto(self.branch)),
            region: Some(convert::region_to_proto(&input.region)),
            after,
            has_after,
            min_timestamp: input.min_timestamp.as_u64(),
            limit: input.limit as u64,
        };

        let result = client
            .backfill_chunk(request)
            .await
            .map_err(|status| EndpointError::LostContact(status.message().to_string()))?
            .into_inner();

        match result.result {
            Some(proto_backfill_chunk_result::Result::Ok(chunk)) => Ok(convert::chunk_from_proto(chunk)),
            Some(proto_backfill_chunk_result::Result::Err(e)) => Err(convert::endpoint_error_from_proto(Some(e))),
            None => Err(convert::endpoint_error_from_proto(None)),
        }
    }
}

impl Drop for GrpcReplicatorEndpoint {
    fn drop(&mut self) {
        for (_, route_id) in self.lock_routes().drain() {
            self.router.remove(route_id);
        }
    }
}
