use crate::actor::ReactorClient;
use crate::contract::ServerId;
use crate::dispatcher::DispatcheeError;
use crate::execution::{ExecutionContext, ExecutionError};
use crate::query::{OrderSource, Read, ReadMode, ReadResponse, Write, WriteResponse};
use crate::reactor::{Blueprint, Role, RoutingError};
use crate::region::Region;
use crate::server::RpcServerShutdownHandle;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Cannot perform query: {0}")]
    CannotPerformQuery(CannotPerformQueryReason),
    #[error("Primary is handing over to another server, retry against the new primary")]
    HandOverInProgress,
    #[error("Not enough replicas are reachable to make the write safe")]
    QuorumUnavailable,
    #[error("Lost contact with replicas. The write may or may not have been applied")]
    LostContact,
    #[error("Replica failed mid-read")]
    ReplicaFailure(#[source] DispatcheeError),
    #[error("Writes must name a key")]
    KeylessWrite,
    #[error("Interrupted")]
    Interrupted,
}

#[derive(Debug, Eq, PartialEq)]
pub enum CannotPerformQueryReason {
    NoPrimary,
    TooManyPrimaries,
    PrimaryNotReady,
    NoReplicasAvailable,
}

impl std::fmt::Display for CannotPerformQueryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CannotPerformQueryReason::NoPrimary => "this server is not primary for the key",
            CannotPerformQueryReason::TooManyPrimaries => "more than one region claims the key",
            CannotPerformQueryReason::PrimaryNotReady => "primary is not ready yet",
            CannotPerformQueryReason::NoReplicasAvailable => "no readable replica is available",
        };
        write!(f, "{}", reason)
    }
}

impl From<RoutingError> for QueryError {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::NoPrimary => QueryError::CannotPerformQuery(CannotPerformQueryReason::NoPrimary),
            RoutingError::TooManyPrimaries => {
                QueryError::CannotPerformQuery(CannotPerformQueryReason::TooManyPrimaries)
            }
        }
    }
}

impl From<ExecutionError> for QueryError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::PrimaryNotReady => {
                QueryError::CannotPerformQuery(CannotPerformQueryReason::PrimaryNotReady)
            }
            ExecutionError::NoReplicasAvailable => {
                QueryError::CannotPerformQuery(CannotPerformQueryReason::NoReplicasAvailable)
            }
            ExecutionError::HandOverInProgress => QueryError::HandOverInProgress,
            ExecutionError::QuorumUnavailable => QueryError::QuorumUnavailable,
            ExecutionError::LostContact => QueryError::LostContact,
            ExecutionError::CannotPerformQuery(e) => QueryError::ReplicaFailure(e),
            ExecutionError::Interrupted => QueryError::Interrupted,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BackfillStatus {
    pub active: usize,
    pub waiting: usize,
}

/// ReplicationServer is this server's share of the replicated shards. The surrounding runtime
/// feeds it blueprints and routes client queries through it.
pub struct ReplicationServer {
    pub(super) logger: slog::Logger,
    pub(super) context: Arc<ExecutionContext>,
    pub(super) reactor: ReactorClient,
    pub(super) order_source: OrderSource,
    pub(super) reactor_task: JoinHandle<()>,
    pub(super) rpc: Option<(RpcServerShutdownHandle, JoinHandle<()>)>,
}

impl ReplicationServer {
    pub fn server_id(&self) -> &ServerId {
        &self.context.server_id
    }

    pub async fn update_blueprint(&self, blueprint: Blueprint) {
        self.reactor.update_blueprint(blueprint).await
    }

    pub async fn roles(&self) -> Vec<(Region, Role)> {
        self.reactor.roles().await
    }

    pub fn backfill_status(&self) -> BackfillStatus {
        BackfillStatus {
            active: self.context.throttler.active_count(),
            waiting: self.context.throttler.waiting_count(),
        }
    }

    /// Writes through the primary holding the write's key. Returns once the write is safe under
    /// the region's contract.
    pub async fn write(&self, write: Write) -> Result<WriteResponse, QueryError> {
        let key = write.key().ok_or(QueryError::KeylessWrite)?.clone();
        let order_token = self.order_source.next_token();

        let primary = self.reactor.primary_for_key(key).await?;
        Ok(primary.on_write(write, order_token).await?)
    }

    pub async fn read(
        &self,
        read: Read,
        mode: ReadMode,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, QueryError> {
        let order_token = self.order_source.next_token();

        let primary = self.reactor.primary_for_key(read.key().clone()).await?;
        Ok(primary.on_read(read, mode, order_token, cancel).await?)
    }

    /// Stops every execution, then the rpc server. Bcards this server published are withdrawn.
    pub async fn shutdown(self) {
        self.reactor.shutdown().await;
        if let Err(e) = self.reactor_task.await {
            slog::error!(self.logger, "Reactor task failed: {:?}", e);
        }

        if let Some((handle, task)) = self.rpc {
            handle.shutdown();
            if let Err(e) = task.await {
                slog::error!(self.logger, "Rpc server task failed: {:?}", e);
            }
        }

        slog::info!(self.logger, "Replication server shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_errors_map_to_query_errors() {
        assert!(matches!(
            QueryError::from(ExecutionError::PrimaryNotReady),
            QueryError::CannotPerformQuery(CannotPerformQueryReason::PrimaryNotReady)
        ));
        assert!(matches!(
            QueryError::from(ExecutionError::HandOverInProgress),
            QueryError::HandOverInProgress
        ));
        assert!(matches!(
            QueryError::from(RoutingError::TooManyPrimaries),
            QueryError::CannotPerformQuery(CannotPerformQueryReason::TooManyPrimaries)
        ));
    }
}
