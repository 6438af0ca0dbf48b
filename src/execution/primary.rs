use crate::contract::{is_safe, Contract, ContractAck, ContractAckState, ContractId, ServerId};
use crate::directory::{PrimaryBcard, Publication};
use crate::dispatcher::{DispatcheeError, PrimaryDispatcher, ReadError, RegistrationError};
use crate::execution::ack_publisher::AckPublisher;
use crate::execution::context::ExecutionContext;
use crate::execution::quorum_waiter::{QuorumWaiter, WriteError};
use crate::query::{OrderToken, Read, ReadMode, ReadResponse, Write, WriteResponse};
use crate::region::Region;
use crate::replicator::{LocalReplicator, RemoteReplicatorServer};
use crate::store::StoreError;
use crate::version::{BranchHistoryError, BranchId, Version};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Dispatch priority of the primary's own store.
const LOCAL_DISPATCHEE_PRIORITY: f64 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Primary is not ready to serve queries")]
    PrimaryNotReady,
    #[error("Primary is handing over to another server")]
    HandOverInProgress,
    #[error("Not enough replicas to reach a quorum")]
    QuorumUnavailable,
    #[error("Lost contact with replicas before the write was safe")]
    LostContact,
    #[error("No readable replicas available")]
    NoReplicasAvailable,
    #[error("Replica failed mid-read")]
    CannotPerformQuery(#[source] DispatcheeError),
    #[error("Interrupted")]
    Interrupted,
}

impl From<ReadError> for ExecutionError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::NoReplicasAvailable => ExecutionError::NoReplicasAvailable,
            ReadError::CannotPerformQuery(e) => ExecutionError::CannotPerformQuery(e),
            ReadError::Interrupted => ExecutionError::Interrupted,
        }
    }
}

impl From<WriteError> for ExecutionError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::LostContact => ExecutionError::LostContact,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum BranchError {
    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
    #[error("Can't record branch: {0}")]
    BranchHistory(#[from] BranchHistoryError),
    #[error("Local replica registration failed: {0}")]
    Registration(#[from] RegistrationError),
}

enum BranchOutcome {
    Cancelled,
    LocalReplicaEvicted,
}

/// PrimaryExecution runs the primary role for one region: it mints a branch, waits for the
/// contract to name it, then replicates every write to the region's secondaries.
pub struct PrimaryExecution {
    shared: Arc<PrimaryShared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct PrimaryShared {
    ctx: Arc<ExecutionContext>,
    logger: slog::Logger,
    region: Region,
    contract: watch::Sender<(ContractId, Contract)>,
    acks: AckPublisher,
    /// Set while a branch is registered and writes may be served.
    active: watch::Sender<Option<Arc<PrimaryDispatcher>>>,
}

impl PrimaryExecution {
    /// Starts once every execution in `predecessors` has stopped touching the store.
    pub fn spawn(
        ctx: Arc<ExecutionContext>,
        contract_id: ContractId,
        contract: Contract,
        predecessors: Vec<CancellationToken>,
    ) -> Self {
        let logger = ctx
            .logger
            .new(slog::o!("Region" => format!("{:?}", contract.region), "Role" => "primary"));
        let (contract_tx, _) = watch::channel((contract_id, contract.clone()));
        let (active_tx, _) = watch::channel(None);

        let shared = Arc::new(PrimaryShared {
            acks: AckPublisher::new(ctx.ack_sink.clone(), contract_id),
            ctx,
            logger,
            region: contract.region,
            contract: contract_tx,
            active: active_tx,
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::run(shared.clone(), predecessors, cancel.clone()));

        PrimaryExecution {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn region(&self) -> &Region {
        &self.shared.region
    }

    /// The branch writes currently go to, if one is registered.
    pub fn branch_id(&self) -> Option<BranchId> {
        self.shared.active.borrow().as_ref().map(|d| d.branch_id())
    }

    /// Switches to a new contract for the same region. Acks for the previous contract stop
    /// before this returns.
    pub fn update_contract(&self, contract_id: ContractId, contract: Contract) {
        assert_eq!(
            contract.region, self.shared.region,
            "PrimaryExecution can't change region"
        );

        self.shared.acks.set_contract(contract_id);
        self.shared.contract.send_replace((contract_id, contract));
    }

    pub async fn on_write(&self, write: Write, order_token: OrderToken) -> Result<WriteResponse, ExecutionError> {
        let (dispatcher, contract) = self.serving_dispatcher()?;
        if contract.hand_over_target().is_some() {
            return Err(ExecutionError::HandOverInProgress);
        }
        check_quorum(&dispatcher, &contract)?;

        let (waiter, result_rx) = QuorumWaiter::new(contract, None);
        dispatcher.spawn_write(write, order_token, waiter, None);

        match result_rx.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ExecutionError::LostContact),
        }
    }

    pub async fn on_read(
        &self,
        read: Read,
        mode: ReadMode,
        order_token: OrderToken,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, ExecutionError> {
        let (dispatcher, contract) = self.serving_dispatcher()?;
        let response = dispatcher.read(&read, order_token, cancel).await?;

        if mode == ReadMode::Majority {
            // The read only counts if we are still the primary a quorum follows.
            check_quorum(&dispatcher, &contract)?;
            let (waiter, result_rx) = QuorumWaiter::new(contract, None);
            dispatcher.spawn_write(Write::Sync, OrderToken::ignore(), waiter, None);

            tokio::select! {
                _ = cancel.cancelled() => return Err(ExecutionError::Interrupted),
                result = result_rx => match result {
                    Ok(result) => { result?; }
                    Err(_) => return Err(ExecutionError::LostContact),
                },
            }
        }

        Ok(response)
    }

    /// Stops serving and waits for the dispatcher to wind down. The published bcard goes away.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().expect("PrimaryExecution task mutex guard poison").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn serving_dispatcher(&self) -> Result<(Arc<PrimaryDispatcher>, Contract), ExecutionError> {
        let dispatcher = self
            .shared
            .active
            .borrow()
            .clone()
            .ok_or(ExecutionError::PrimaryNotReady)?;
        let contract = self.shared.contract.borrow().1.clone();
        if contract.branch != dispatcher.branch_id() {
            return Err(ExecutionError::PrimaryNotReady);
        }

        Ok((dispatcher, contract))
    }

    async fn run(shared: Arc<PrimaryShared>, predecessors: Vec<CancellationToken>, cancel: CancellationToken) {
        for predecessor in predecessors {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = predecessor.cancelled() => {}
            }
        }

        loop {
            match Self::run_branch(&shared, &cancel).await {
                Ok(BranchOutcome::Cancelled) => break,
                Ok(BranchOutcome::LocalReplicaEvicted) => {
                    slog::warn!(shared.logger, "Local replica fell behind, starting a new branch");
                }
                Err(e) => {
                    slog::error!(shared.logger, "Primary failed: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(shared.ctx.options.sync_retry_interval) => {}
                    }
                }
            }
        }

        slog::info!(shared.logger, "Primary execution stopped");
    }

    async fn run_branch(shared: &Arc<PrimaryShared>, cancel: &CancellationToken) -> Result<BranchOutcome, BranchError> {
        let ctx = &shared.ctx;
        let base = ctx.store.get_metainfo(&shared.region)?;
        let dispatcher = Arc::new(PrimaryDispatcher::new(
            shared.logger.clone(),
            shared.region.clone(),
            base,
            ctx.options.dispatcher,
        ));

        let outcome = match ctx.branch_history.record(dispatcher.branch_birth_certificate().clone()) {
            Ok(()) => Self::serve_branch(shared, &dispatcher, cancel).await,
            Err(e) => Err(e.into()),
        };

        shared.active.send_replace(None);
        dispatcher.shutdown().await;
        outcome
    }

    async fn serve_branch(
        shared: &Arc<PrimaryShared>,
        dispatcher: &Arc<PrimaryDispatcher>,
        cancel: &CancellationToken,
    ) -> Result<BranchOutcome, BranchError> {
        let ctx = &shared.ctx;
        let branch = dispatcher.branch_id();
        let mut contracts = shared.contract.subscribe();

        // Nobody may follow a branch the contract coordinator hasn't heard of.
        loop {
            let (contract_id, contract) = contracts.borrow_and_update().clone();
            if contract.branch == branch {
                break;
            }

            shared.acks.send(
                contract_id,
                ContractAck::new(ContractAckState::PrimaryNeedBranch).with_branch(branch, ctx.branch_history.snapshot()),
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(BranchOutcome::Cancelled),
                _ = contracts.changed() => {}
            }
        }
        slog::info!(shared.logger, "Branch {:?} registered", branch);

        let initial_timestamp = dispatcher.current_timestamp();
        let token = ctx.store.new_write_token();
        ctx.store
            .set_metainfo(token, &shared.region, Version::new(branch, initial_timestamp))?;

        let local = Arc::new(LocalReplicator::new(
            ctx.store.clone(),
            shared.region.clone(),
            branch,
            initial_timestamp,
        ));
        let (local_handle, registered_at) =
            dispatcher.register_dispatchee(local.clone(), ctx.server_id.clone(), LOCAL_DISPATCHEE_PRIORITY);
        assert_eq!(
            registered_at, initial_timestamp,
            "Primary wrote before its local replica registered"
        );
        dispatcher.mark_ready(&local_handle)?;

        let server = Arc::new(RemoteReplicatorServer::new(
            shared.logger.clone(),
            dispatcher,
            local,
            ctx.store.clone(),
        ));
        let exposure = ctx.transport.expose(server.clone(), branch);
        let publication = Publication::new(
            ctx.directory.clone(),
            PrimaryBcard {
                server_id: ctx.server_id.clone(),
                branch_id: branch,
                region: shared.region.clone(),
                branch_history: ctx.branch_history.snapshot(),
                replicator: exposure.address.clone(),
            },
        );
        shared.active.send_replace(Some(dispatcher.clone()));

        let mut resync: Option<CancellationToken> = None;
        let outcome = loop {
            if let Some(previous) = resync.take() {
                previous.cancel();
            }

            let (contract_id, contract) = contracts.borrow_and_update().clone();
            if contract.branch == branch {
                shared
                    .acks
                    .send(contract_id, ContractAck::new(ContractAckState::PrimaryInProgress));
                let token = cancel.child_token();
                tokio::spawn(Self::resync(
                    shared.clone(),
                    dispatcher.clone(),
                    contract_id,
                    contract,
                    token.clone(),
                ));
                resync = Some(token);
            } else {
                slog::warn!(
                    shared.logger,
                    "Contract {:?} names branch {:?} instead of ours",
                    contract_id,
                    contract.branch
                );
                shared.acks.send(
                    contract_id,
                    ContractAck::new(ContractAckState::PrimaryNeedBranch)
                        .with_branch(branch, ctx.branch_history.snapshot()),
                );
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break BranchOutcome::Cancelled,
                _ = local_handle.evicted() => break BranchOutcome::LocalReplicaEvicted,
                _ = contracts.changed() => {}
            }
        };

        if let Some(resync) = resync {
            resync.cancel();
        }
        shared.active.send_replace(None);
        server.close();
        drop(publication);
        drop(exposure);
        drop(local_handle);

        Ok(outcome)
    }

    /// Pushes sync writes until one is safe under `contract`, then acks it as ready.
    async fn resync(
        shared: Arc<PrimaryShared>,
        dispatcher: Arc<PrimaryDispatcher>,
        contract_id: ContractId,
        contract: Contract,
        cancel: CancellationToken,
    ) {
        // A hand-over target has to be caught up before it can take over.
        let required = contract.hand_over_target().cloned();

        loop {
            let (waiter, result_rx) = QuorumWaiter::new(contract.clone(), required.clone());
            dispatcher.spawn_write(Write::Sync, OrderToken::ignore(), waiter, None);

            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = result_rx => result,
            };
            if let Ok(Ok(_)) = result {
                break;
            }

            slog::debug!(shared.logger, "Replicas for {:?} not in sync yet", contract_id);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(shared.ctx.options.sync_retry_interval) => {}
            }
        }

        if shared
            .acks
            .send(contract_id, ContractAck::new(ContractAckState::PrimaryReady))
        {
            slog::info!(shared.logger, "Primary ready for {:?}", contract_id);
        }
    }
}

impl Drop for PrimaryExecution {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn check_quorum(dispatcher: &PrimaryDispatcher, contract: &Contract) -> Result<(), ExecutionError> {
    let readable: HashSet<ServerId> = dispatcher.readable_dispatchees().borrow().iter().cloned().collect();
    if is_safe(contract, &readable) {
        Ok(())
    } else {
        Err(ExecutionError::QuorumUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::create_ack_channel;
    use crate::directory::{Directory, InMemoryDirectory};
    use crate::execution::context::test_support::{context, contract, wait_for_ack};
    use crate::region::Key;
    use crate::replicator::{ListenerReplica, RemoteReplicatorClient, ReplicatorAddress};
    use crate::store::InMemoryStore;
    use bytes::Bytes;

    fn put(key: &'static str) -> Write {
        Write::Put {
            key: Key::from(key),
            value: Bytes::from_static(b"v"),
        }
    }

    #[tokio::test]
    async fn becomes_ready_once_a_replica_registers() {
        // -- setup --
        let directory = Arc::new(InMemoryDirectory::new());
        let (sink, mut acks) = create_ack_channel();
        let store = Arc::new(InMemoryStore::new(Region::universe()));
        let ctx = context("a", store, directory.clone(), Arc::new(sink));
        let initial = contract("a", &["a", "b"], BranchId::nil());
        let primary = PrimaryExecution::spawn(ctx, ContractId::new(1), initial.clone(), Vec::new());

        let need_branch = wait_for_ack(&mut acks, ContractId::new(1), ContractAckState::PrimaryNeedBranch).await;
        let branch = need_branch.branch.unwrap();
        assert!(need_branch.branch_history.get(&branch).is_some());
        assert!(matches!(
            primary.on_write(put("k"), OrderToken::ignore()).await,
            Err(ExecutionError::PrimaryNotReady)
        ));

        primary.update_contract(ContractId::new(2), Contract { branch, ..initial });
        wait_for_ack(&mut acks, ContractId::new(2), ContractAckState::PrimaryInProgress).await;
        assert!(matches!(
            primary.on_write(put("k"), OrderToken::ignore()).await,
            Err(ExecutionError::QuorumUnavailable)
        ));

        // -- execute --
        let bcard = directory.subscribe().borrow().values().next().cloned().unwrap();
        assert_eq!(bcard.branch_id, branch);
        let endpoint = match &bcard.replicator {
            ReplicatorAddress::InProcess(endpoint) => endpoint.clone(),
            other => panic!("Unexpected address {:?}", other),
        };
        let secondary_store = Arc::new(InMemoryStore::new(Region::universe()));
        let listener = Arc::new(ListenerReplica::new(secondary_store.clone(), Region::universe(), branch, 100));
        listener.begin_backfill().unwrap();
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let client = RemoteReplicatorClient::connect(logger, endpoint, ServerId::new("b"), listener.clone())
            .await
            .unwrap();

        // A registered replica that is still backfilling does not count.
        assert!(matches!(
            primary.on_write(put("k"), OrderToken::ignore()).await,
            Err(ExecutionError::QuorumUnavailable)
        ));

        let chunk = client.fetch_chunk(None, 100).await.unwrap();
        assert!(chunk.done);
        client.apply_chunk(&chunk).unwrap();
        client.start_streaming(&CancellationToken::new()).await.unwrap();
        client.mark_ready().await.unwrap();

        // -- verify --
        wait_for_ack(&mut acks, ContractId::new(2), ContractAckState::PrimaryReady).await;
        let response = primary.on_write(put("k"), OrderToken::ignore()).await.unwrap();
        assert_eq!(response, WriteResponse::Stored { replaced: false });
        assert_eq!(secondary_store.get(&Key::from("k")), Some(Bytes::from_static(b"v")));

        primary.shutdown().await;
        assert!(directory.subscribe().borrow().is_empty());
    }

    #[tokio::test]
    async fn acks_follow_the_latest_contract() {
        // -- setup --
        let directory = Arc::new(InMemoryDirectory::new());
        let (sink, mut acks) = create_ack_channel();
        let store = Arc::new(InMemoryStore::new(Region::universe()));
        let ctx = context("a", store, directory, Arc::new(sink));
        let initial = contract("a", &["a"], BranchId::nil());
        let primary = PrimaryExecution::spawn(ctx, ContractId::new(1), initial.clone(), Vec::new());
        let branch = wait_for_ack(&mut acks, ContractId::new(1), ContractAckState::PrimaryNeedBranch)
            .await
            .branch
            .unwrap();

        // -- execute --
        primary.update_contract(ContractId::new(2), Contract { branch, ..initial.clone() });
        primary.update_contract(ContractId::new(3), Contract { branch, ..initial });

        // -- verify --
        let ready = async {
            let mut seen_latest = false;
            loop {
                let (id, ack) = acks.next().await.unwrap();
                seen_latest |= id == ContractId::new(3);
                if seen_latest {
                    assert_eq!(id, ContractId::new(3), "Ack {:?} for a superseded contract", ack.state);
                }
                if id == ContractId::new(3) && ack.state == ContractAckState::PrimaryReady {
                    break;
                }
            }
        };
        tokio::time::timeout(tokio::time::Duration::from_secs(5), ready)
            .await
            .unwrap();
        assert_eq!(primary.branch_id(), Some(branch));

        let response = primary.on_write(put("k"), OrderToken::ignore()).await.unwrap();
        assert_eq!(response, WriteResponse::Stored { replaced: false });
        let read = primary
            .on_read(
                Read::Get { key: Key::from("k") },
                ReadMode::Majority,
                OrderToken::ignore(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            read,
            ReadResponse::Get {
                value: Some(Bytes::from_static(b"v"))
            }
        );

        primary.shutdown().await;
    }
}
