use crate::contract::ServerId;
use crate::dispatcher::{DispatcheeError, RegistrationId};
use crate::region::Key;
use crate::replicator::endpoint::{BackfillChunkInput, EndpointError, RegisterInput, ReplicatorEndpoint};
use crate::replicator::listener::ListenerReplica;
use crate::store::{BackfillChunk, StoreError};
use crate::version::Timestamp;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// RemoteReplicatorClient is the secondary side of replication: one registration of a
/// `ListenerReplica` with a primary's endpoint. Dropping it deregisters.
pub struct RemoteReplicatorClient {
    logger: slog::Logger,
    endpoint: Arc<dyn ReplicatorEndpoint>,
    listener: Arc<ListenerReplica>,
    registration_id: RegistrationId,
    initial_timestamp: Timestamp,
}

impl RemoteReplicatorClient {
    pub async fn connect(
        logger: slog::Logger,
        endpoint: Arc<dyn ReplicatorEndpoint>,
        server_id: ServerId,
        listener: Arc<ListenerReplica>,
    ) -> Result<Self, EndpointError> {
        let output = endpoint
            .register(RegisterInput {
                server_id,
                listener: listener.clone(),
            })
            .await?;

        let logger = logger.new(slog::o!("Registration" => output.registration_id.as_u64()));
        slog::info!(logger, "Registered with primary from {:?}", output.initial_timestamp);

        Ok(RemoteReplicatorClient {
            logger,
            endpoint,
            listener,
            registration_id: output.registration_id,
            initial_timestamp: output.initial_timestamp,
        })
    }

    pub fn registration_id(&self) -> RegistrationId {
        self.registration_id
    }

    pub fn initial_timestamp(&self) -> Timestamp {
        self.initial_timestamp
    }

    pub async fn fetch_chunk(&self, after: Option<Key>, limit: usize) -> Result<BackfillChunk, EndpointError> {
        self.endpoint
            .backfill_chunk(BackfillChunkInput {
                region: self.listener.region().clone(),
                after,
                min_timestamp: self.initial_timestamp,
                limit,
            })
            .await
    }

    pub fn apply_chunk(&self, chunk: &BackfillChunk) -> Result<(), StoreError> {
        self.listener.apply_chunk(chunk)
    }

    pub async fn start_streaming(&self, cancel: &CancellationToken) -> Result<(), DispatcheeError> {
        self.listener.finish_backfill(self.initial_timestamp, cancel).await?;
        slog::info!(self.logger, "Backfill complete, streaming");
        Ok(())
    }

    pub async fn mark_ready(&self) -> Result<(), EndpointError> {
        self.endpoint.mark_ready(self.registration_id).await
    }

    pub async fn check_registration(&self) -> Result<(), EndpointError> {
        self.endpoint.check_registration(self.registration_id).await
    }
}

impl Drop for RemoteReplicatorClient {
    fn drop(&mut self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            // Runtime is going away. So is the primary's view of us.
            Err(_) => return,
        };

        let endpoint = self.endpoint.clone();
        let registration_id = self.registration_id;
        let logger = self.logger.clone();
        runtime.spawn(async move {
            if let Err(e) = endpoint.deregister(registration_id).await {
                slog::debug!(logger, "Deregistration not needed: {}", e);
            }
        });
    }
}
