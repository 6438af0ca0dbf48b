use crate::contract::{ContractAckSink, ServerId};
use crate::directory::Directory;
use crate::dispatcher::DispatcherOptions;
use crate::replicator::ReplicatorTransport;
use crate::store::Store;
use crate::throttler::BackfillThrottler;
use crate::version::BranchHistoryStore;
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Copy, Clone, Debug)]
pub struct ExecutionOptions {
    pub dispatcher: DispatcherOptions,
    /// How long a secondary waits for its primary before saying so in its acks.
    pub failover_timeout: Duration,
    pub backfill_chunk_size: usize,
    pub sync_retry_interval: Duration,
    pub registration_check_interval: Duration,
}

/// Everything the executions of one server share.
pub struct ExecutionContext {
    pub logger: slog::Logger,
    pub server_id: ServerId,
    pub store: Arc<dyn Store>,
    pub branch_history: Arc<dyn BranchHistoryStore>,
    pub directory: Arc<dyn Directory>,
    pub transport: Arc<dyn ReplicatorTransport>,
    pub throttler: Arc<BackfillThrottler>,
    pub ack_sink: Arc<dyn ContractAckSink>,
    pub options: ExecutionOptions,
    /// Backfill priority before the hand-over and voter bonuses.
    pub backfill_priority: f64,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::contract::{
        AckConfig, Contract, ContractAck, ContractAckState, ContractAckStream, ContractId, PrimaryAssignment,
    };
    use crate::query::Durability;
    use crate::region::Region;
    use crate::replicator::InProcessTransport;
    use crate::version::{BranchId, VolatileBranchHistoryStore};
    use tokio::time::timeout;

    pub fn context(
        server: &str,
        store: Arc<dyn Store>,
        directory: Arc<dyn Directory>,
        ack_sink: Arc<dyn ContractAckSink>,
    ) -> Arc<ExecutionContext> {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let throttler = Arc::new(BackfillThrottler::new(logger, 2));
        context_with_throttler(server, store, directory, ack_sink, throttler)
    }

    /// Like `context`, for servers that share one throttler.
    pub fn context_with_throttler(
        server: &str,
        store: Arc<dyn Store>,
        directory: Arc<dyn Directory>,
        ack_sink: Arc<dyn ContractAckSink>,
        throttler: Arc<BackfillThrottler>,
    ) -> Arc<ExecutionContext> {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        Arc::new(ExecutionContext {
            throttler,
            logger,
            server_id: ServerId::new(server),
            store,
            branch_history: Arc::new(VolatileBranchHistoryStore::new()),
            directory,
            transport: Arc::new(InProcessTransport),
            ack_sink,
            options: ExecutionOptions {
                dispatcher: DispatcherOptions {
                    write_concurrency: 2,
                    queue_capacity: 1000,
                },
                failover_timeout: Duration::from_millis(200),
                backfill_chunk_size: 2,
                sync_retry_interval: Duration::from_millis(20),
                registration_check_interval: Duration::from_millis(50),
            },
            backfill_priority: 0.0,
        })
    }

    pub fn contract(primary: &str, replicas: &[&str], branch: BranchId) -> Contract {
        Contract {
            region: Region::universe(),
            primary: Some(PrimaryAssignment {
                server: ServerId::new(primary),
                hand_over: None,
            }),
            replicas: replicas.iter().map(|r| ServerId::new(r)).collect(),
            temp_voters: None,
            branch,
            ack_config: AckConfig::majority(),
            durability: Durability::Hard,
        }
    }

    /// Skips acks until one for `contract_id` in `state` arrives.
    pub async fn wait_for_ack(
        acks: &mut ContractAckStream,
        contract_id: ContractId,
        state: ContractAckState,
    ) -> ContractAck {
        timeout(Duration::from_secs(5), async {
            loop {
                let (id, ack) = acks.next().await.expect("ack sink dropped");
                if id == contract_id && ack.state == state {
                    return ack;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("No {:?} ack for {:?}", state, contract_id))
    }
}
