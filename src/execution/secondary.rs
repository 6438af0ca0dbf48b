use crate::contract::{Contract, ContractAck, ContractAckState, ContractId, ServerId};
use crate::directory::{wait_for_bcard, wait_for_bcard_gone, BcardKey, Bcards, PrimaryBcard};
use crate::dispatcher::DispatcheeError;
use crate::execution::ack_publisher::AckPublisher;
use crate::execution::context::ExecutionContext;
use crate::region::Region;
use crate::replicator::{EndpointError, ListenerReplica, RemoteReplicatorClient};
use crate::store::StoreError;
use crate::throttler::ThrottlerError;
use crate::version::{BranchHistoryError, BranchId, VersionMap};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("Directory is gone")]
    DirectoryClosed,
    #[error("Primary left the directory")]
    PrimaryLost,
    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
    #[error("Branch history: {0}")]
    BranchHistory(#[from] BranchHistoryError),
    #[error("Backfill throttler: {0}")]
    Throttler(#[from] ThrottlerError),
    #[error("Primary: {0}")]
    Endpoint(#[from] EndpointError),
    #[error("Listener: {0}")]
    Listener(#[from] DispatcheeError),
}

/// The parts of a contract that decide whom a secondary follows. Anything else changing only
/// needs a fresh ack.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Followed {
    primary: Option<ServerId>,
    branch: BranchId,
}

impl Followed {
    fn of(contract: &Contract) -> Self {
        Followed {
            primary: contract.primary_server().cloned(),
            branch: contract.branch,
        }
    }

    fn bcard_key(&self) -> Option<BcardKey> {
        self.primary.clone().map(|primary| (primary, self.branch))
    }
}

/// SecondaryExecution keeps this server's copy of a region in sync with the region's primary:
/// find the primary, backfill from it, then stream its writes. Starts over whenever the primary
/// goes away.
pub struct SecondaryExecution {
    shared: Arc<SecondaryShared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct SecondaryShared {
    ctx: Arc<ExecutionContext>,
    logger: slog::Logger,
    region: Region,
    contract: watch::Sender<(ContractId, Contract)>,
    acks: AckPublisher,
}

impl SecondaryExecution {
    /// Starts once every execution in `predecessors` has stopped touching the store.
    pub fn spawn(
        ctx: Arc<ExecutionContext>,
        contract_id: ContractId,
        contract: Contract,
        predecessors: Vec<CancellationToken>,
    ) -> Self {
        let logger = ctx
            .logger
            .new(slog::o!("Region" => format!("{:?}", contract.region), "Role" => "secondary"));
        let (contract_tx, _) = watch::channel((contract_id, contract.clone()));

        let shared = Arc::new(SecondaryShared {
            acks: AckPublisher::new(ctx.ack_sink.clone(), contract_id),
            ctx,
            logger,
            region: contract.region,
            contract: contract_tx,
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::run(shared.clone(), predecessors, cancel.clone()));

        SecondaryExecution {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn region(&self) -> &Region {
        &self.shared.region
    }

    pub fn update_contract(&self, contract_id: ContractId, contract: Contract) {
        assert_eq!(
            contract.region, self.shared.region,
            "SecondaryExecution can't change region"
        );

        self.shared.acks.set_contract(contract_id);
        self.shared.contract.send_replace((contract_id, contract));
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().expect("SecondaryExecution task mutex guard poison").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    async fn run(shared: Arc<SecondaryShared>, predecessors: Vec<CancellationToken>, cancel: CancellationToken) {
        for predecessor in predecessors {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = predecessor.cancelled() => {}
            }
        }

        let mut contracts = shared.contract.subscribe();

        'attempts: loop {
            let (_, contract) = contracts.borrow_and_update().clone();
            let followed = Followed::of(&contract);
            let attempt_cancel = cancel.child_token();
            let _attempt_guard = attempt_cancel.clone().drop_guard();

            let attempt = Self::attempt(&shared, &contract, &followed, &attempt_cancel);
            tokio::pin!(attempt);

            let failed = loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'attempts,
                    _ = contracts.changed() => {
                        let (contract_id, contract) = contracts.borrow_and_update().clone();
                        if Followed::of(&contract) != followed {
                            slog::info!(shared.logger, "{:?} follows a different primary, restarting", contract_id);
                            continue 'attempts;
                        }
                        shared.acks.resend();
                    }
                    result = &mut attempt => break result,
                };
            };

            if let Err(e) = failed {
                slog::warn!(shared.logger, "Lost primary: {}", e);
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(shared.ctx.options.sync_retry_interval) => {}
            }
        }

        slog::info!(shared.logger, "Secondary execution stopped");
    }

    /// One go at following the primary `followed` names. Only returns on failure.
    async fn attempt(
        shared: &SecondaryShared,
        contract: &Contract,
        followed: &Followed,
        cancel: &CancellationToken,
    ) -> Result<(), AttemptError> {
        let ctx = &shared.ctx;
        let version = ctx.store.get_metainfo(&shared.region)?;
        shared
            .acks
            .send_current(ContractAck::new(ContractAckState::SecondaryNeedPrimary).with_version(version.clone()));

        let mut bcards = ctx.directory.subscribe();
        let key = followed.bcard_key();
        let bcard = {
            let find = find_primary(&mut bcards, key.as_ref());
            tokio::pin!(find);
            tokio::select! {
                bcard = &mut find => bcard?,
                _ = tokio::time::sleep(ctx.options.failover_timeout) => {
                    slog::warn!(shared.logger, "No sign of primary {:?} after {:?}", followed.primary, ctx.options.failover_timeout);
                    shared.acks.send_current(
                        ContractAck::new(ContractAckState::SecondaryNeedPrimary)
                            .with_version(version.clone())
                            .with_failover_timeout_elapsed(true),
                    );
                    find.await?
                }
            }
        };

        ctx.branch_history.merge(&bcard.branch_history)?;
        if !Self::descends_from_primary(shared, &version, &bcard)? {
            slog::error!(
                shared.logger,
                "Data at {:?} diverged from primary branch {:?}. Waiting for a new contract.",
                version,
                bcard.branch_id
            );
            std::future::pending::<()>().await;
        }

        let key = (bcard.server_id.clone(), bcard.branch_id);
        tokio::select! {
            result = Self::replicate(shared, contract, &bcard, cancel) => result,
            _ = wait_for_bcard_gone(&mut bcards, &key) => Err(AttemptError::PrimaryLost),
        }
    }

    fn descends_from_primary(
        shared: &SecondaryShared,
        version: &VersionMap,
        bcard: &PrimaryBcard,
    ) -> Result<bool, BranchHistoryError> {
        let history = shared.ctx.branch_history.snapshot();
        for (piece, piece_version) in version.iter() {
            if !history.version_is_ancestor(piece_version, bcard.branch_id, piece)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn replicate(
        shared: &SecondaryShared,
        contract: &Contract,
        bcard: &PrimaryBcard,
        cancel: &CancellationToken,
    ) -> Result<(), AttemptError> {
        let ctx = &shared.ctx;
        let priority = backfill_priority(ctx.backfill_priority, contract, &ctx.server_id);
        let mut lock = ctx.throttler.enter(priority, cancel).await?;
        shared
            .acks
            .send_current(ContractAck::new(ContractAckState::SecondaryBackfilling));

        let endpoint = ctx.transport.resolve(&bcard.replicator, bcard.branch_id)?;
        let listener = Arc::new(ListenerReplica::new(
            ctx.store.clone(),
            shared.region.clone(),
            bcard.branch_id,
            ctx.options.dispatcher.queue_capacity,
        ));
        listener.begin_backfill()?;
        let client = RemoteReplicatorClient::connect(
            shared.logger.clone(),
            endpoint,
            ctx.server_id.clone(),
            listener.clone(),
        )
        .await?;

        let mut after = None;
        let mut chunks = 0;
        loop {
            if lock.preemption_requested() {
                slog::info!(shared.logger, "Backfill preempted after {} chunks", chunks);
                drop(lock);
                lock = ctx.throttler.enter(priority, cancel).await?;
            }

            listener.check_queue()?;
            let chunk = client.fetch_chunk(after.take(), ctx.options.backfill_chunk_size).await?;
            client.apply_chunk(&chunk)?;
            chunks += 1;
            if chunk.done {
                break;
            }
            after = chunk.last_key;
        }
        drop(lock);
        slog::info!(
            shared.logger,
            "Backfilled {} chunks, replaying {} queued writes",
            chunks,
            listener.queued_writes()
        );

        client.start_streaming(cancel).await?;
        client.mark_ready().await?;
        let version = ctx.store.get_metainfo(&shared.region)?;
        shared
            .acks
            .send_current(ContractAck::new(ContractAckState::SecondaryStreaming).with_version(version));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AttemptError::Listener(DispatcheeError::Interrupted)),
                _ = tokio::time::sleep(ctx.options.registration_check_interval) => {}
            }
            client.check_registration().await?;
        }
    }
}

impl Drop for SecondaryExecution {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Hand-over targets backfill first, then voters, then everybody else.
fn backfill_priority(base: f64, contract: &Contract, me: &ServerId) -> f64 {
    let mut priority = base;
    if contract.hand_over_target() == Some(me) {
        priority += 2.0;
    }
    if contract.is_voter(me) {
        priority += 1.0;
    }
    priority
}

async fn find_primary(bcards: &mut watch::Receiver<Bcards>, key: Option<&BcardKey>) -> Result<PrimaryBcard, AttemptError> {
    match key {
        Some(key) => wait_for_bcard(bcards, key).await.ok_or(AttemptError::DirectoryClosed),
        // Nobody to follow until a contract names a primary.
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::create_ack_channel;
    use crate::directory::{Directory, InMemoryDirectory, Publication};
    use crate::dispatcher::{DispatcherOptions, PrimaryDispatcher};
    use crate::dispatcher::WriteCallback;
    use crate::execution::context::test_support::{context, context_with_throttler, contract, wait_for_ack};
    use crate::query::{OrderToken, WriteResponse};
    use crate::throttler::BackfillThrottler;
    use crate::region::Key;
    use crate::replicator::{
        BackfillChunkInput, LocalReplicator, RegisterInput, RegisterOutput, RemoteReplicatorServer,
        ReplicatorAddress, ReplicatorEndpoint,
    };
    use crate::dispatcher::{RegistrationHandle, RegistrationId};
    use crate::query::{Durability, Write};
    use crate::store::{BackfillChunk, InMemoryStore, Store};
    use crate::version::{BranchBirthCertificate, BranchHistory, Timestamp, Version};
    use bytes::Bytes;
    use tokio::sync::Semaphore;
    use tokio::time::Duration;

    /// Forwards to a real replicator, holding backfill chunks until the test lets them through.
    struct GatedEndpoint {
        inner: Arc<RemoteReplicatorServer>,
        gate: Semaphore,
    }

    #[async_trait::async_trait]
    impl ReplicatorEndpoint for GatedEndpoint {
        async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, EndpointError> {
            self.inner.register(input).await
        }

        async fn mark_ready(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
            self.inner.mark_ready(registration_id).await
        }

        async fn deregister(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
            self.inner.deregister(registration_id).await
        }

        async fn check_registration(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
            self.inner.check_registration(registration_id).await
        }

        async fn backfill_chunk(&self, input: BackfillChunkInput) -> Result<BackfillChunk, EndpointError> {
            self.gate.acquire().await.map_err(|_| EndpointError::Interrupted)?.forget();
            self.inner.backfill_chunk(input).await
        }
    }

    struct FakePrimary {
        dispatcher: Arc<PrimaryDispatcher>,
        server: Arc<RemoteReplicatorServer>,
        local: Arc<LocalReplicator>,
        store: Arc<InMemoryStore>,
        _local_handle: RegistrationHandle,
    }

    impl FakePrimary {
        /// A fresh replicator for the same branch, as after a restart.
        fn restart_server(&self) -> Arc<RemoteReplicatorServer> {
            Arc::new(RemoteReplicatorServer::new(
                slog::Logger::root(slog::Discard, slog::o!()),
                &self.dispatcher,
                self.local.clone(),
                self.store.clone(),
            ))
        }

        fn write(&self, write: Write) {
            self.dispatcher
                .spawn_write(write, OrderToken::ignore(), Arc::new(IgnoringCallback), None);
        }
    }

    struct IgnoringCallback;

    impl WriteCallback for IgnoringCallback {
        fn default_durability(&self) -> Durability {
            Durability::Soft
        }

        fn on_ack(&self, _server_id: &ServerId, _response: WriteResponse) {}

        fn on_end(&self) {}
    }

    fn contents(store: &InMemoryStore) -> Vec<(Key, Bytes)> {
        store.backfill_chunk(&Region::universe(), None, 1000).unwrap().items
    }

    /// A primary for "a" holding `keys` documents, without the execution around it.
    fn fake_primary(keys: usize) -> (FakePrimary, BranchBirthCertificate) {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let region = Region::universe();
        let store = Arc::new(InMemoryStore::new(region.clone()));
        for i in 0..keys {
            let token = store.new_write_token();
            let write = Write::Put {
                key: Key::from(format!("k{:03}", i)),
                value: Bytes::from_static(b"v"),
            };
            store
                .write(token, &region, &write, Version::zero(), Durability::Soft)
                .unwrap();
        }

        let dispatcher = Arc::new(PrimaryDispatcher::new(
            logger.clone(),
            region.clone(),
            VersionMap::new(region.clone(), Version::zero()),
            DispatcherOptions {
                write_concurrency: 2,
                queue_capacity: 100,
            },
        ));
        let certificate = dispatcher.branch_birth_certificate().clone();
        let local = Arc::new(LocalReplicator::new(
            store.clone(),
            region,
            dispatcher.branch_id(),
            dispatcher.current_timestamp(),
        ));
        let (local_handle, _) = dispatcher.register_dispatchee(local.clone(), ServerId::new("a"), 1.0);
        dispatcher.mark_ready(&local_handle).unwrap();
        let server = Arc::new(RemoteReplicatorServer::new(logger, &dispatcher, local.clone(), store.clone()));

        (
            FakePrimary {
                dispatcher,
                server,
                local,
                store,
                _local_handle: local_handle,
            },
            certificate,
        )
    }

    fn bcard(certificate: &BranchBirthCertificate, endpoint: Arc<dyn ReplicatorEndpoint>) -> PrimaryBcard {
        let mut history = BranchHistory::new();
        history.insert(certificate.clone()).unwrap();

        PrimaryBcard {
            server_id: ServerId::new("a"),
            branch_id: certificate.branch_id,
            region: Region::universe(),
            branch_history: history,
            replicator: ReplicatorAddress::InProcess(endpoint),
        }
    }

    #[tokio::test]
    async fn primary_crash_during_backfill_goes_back_to_need_primary() {
        // -- setup --
        let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new());
        let (sink, mut acks) = create_ack_channel();
        let store = Arc::new(InMemoryStore::new(Region::universe()));
        let ctx = context("b", store.clone(), directory.clone(), Arc::new(sink));
        let (primary, certificate) = fake_primary(10);
        let endpoint = Arc::new(GatedEndpoint {
            inner: primary.server.clone(),
            gate: Semaphore::new(1),
        });
        let publication = Publication::new(directory.clone(), bcard(&certificate, endpoint.clone()));

        let secondary = SecondaryExecution::spawn(
            ctx.clone(),
            ContractId::new(1),
            contract("a", &["a", "b"], certificate.branch_id),
            Vec::new(),
        );
        wait_for_ack(&mut acks, ContractId::new(1), ContractAckState::SecondaryBackfilling).await;

        // -- execute --
        primary.server.close();
        drop(publication);
        endpoint.gate.add_permits(100);

        // -- verify --
        let ack = wait_for_ack(&mut acks, ContractId::new(1), ContractAckState::SecondaryNeedPrimary).await;
        assert!(!ack.failover_timeout_elapsed);
        assert!(store.len() < 10);
        let ack = wait_for_ack(&mut acks, ContractId::new(1), ContractAckState::SecondaryNeedPrimary).await;
        assert!(ack.failover_timeout_elapsed);
        assert_eq!(ctx.throttler.active_count(), 0);

        secondary.shutdown().await;
        primary.dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn secondaries_recover_when_primary_returns_on_same_branch() {
        // -- setup --
        let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new());
        let throttler = Arc::new(BackfillThrottler::new(slog::Logger::root(slog::Discard, slog::o!()), 2));
        let (primary, certificate) = fake_primary(10);
        let endpoint = Arc::new(GatedEndpoint {
            inner: primary.server.clone(),
            gate: Semaphore::new(1),
        });
        let publication = Publication::new(directory.clone(), bcard(&certificate, endpoint.clone()));
        let terms = contract("a", &["a", "b", "c"], certificate.branch_id);

        let mut secondaries = Vec::new();
        for name in ["b", "c"].iter() {
            let (sink, acks) = create_ack_channel();
            let store = Arc::new(InMemoryStore::new(Region::universe()));
            let ctx = context_with_throttler(name, store.clone(), directory.clone(), Arc::new(sink), throttler.clone());
            let execution = SecondaryExecution::spawn(ctx, ContractId::new(1), terms.clone(), Vec::new());
            secondaries.push((execution, store, acks));
        }
        for (_, _, acks) in secondaries.iter_mut() {
            wait_for_ack(acks, ContractId::new(1), ContractAckState::SecondaryBackfilling).await;
        }

        // -- execute --
        // The primary goes away before either backfill got past its first chunk.
        primary.server.close();
        drop(publication);
        endpoint.gate.add_permits(100);
        for (_, store, acks) in secondaries.iter_mut() {
            wait_for_ack(acks, ContractId::new(1), ContractAckState::SecondaryNeedPrimary).await;
            assert!(store.len() < 10);
        }

        primary.write(Write::Put {
            key: Key::from("k100"),
            value: Bytes::from_static(b"while down"),
        });
        primary.write(Write::Delete { key: Key::from("k000") });

        let _publication = Publication::new(directory.clone(), bcard(&certificate, primary.restart_server()));
        for (_, _, acks) in secondaries.iter_mut() {
            wait_for_ack(acks, ContractId::new(1), ContractAckState::SecondaryStreaming).await;
        }
        primary.write(Write::Put {
            key: Key::from("k001"),
            value: Bytes::from_static(b"after"),
        });

        // -- verify --
        let expected_len = 10;
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let expected = contents(&primary.store);
                let converged = expected.len() == expected_len
                    && expected.iter().any(|(_, v)| v == &Bytes::from_static(b"after"))
                    && secondaries.iter().all(|(_, store, _)| contents(store) == expected);
                if converged {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(throttler.active_count(), 0);
        assert_eq!(throttler.waiting_count(), 0);
        assert_eq!(
            *primary.dispatcher.readable_dispatchees().borrow(),
            vec![ServerId::new("a"), ServerId::new("b"), ServerId::new("c")]
                .into_iter()
                .collect()
        );

        for (execution, _, _) in secondaries {
            execution.shutdown().await;
        }
        primary.dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn streams_after_backfill() {
        // -- setup --
        let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new());
        let (sink, mut acks) = create_ack_channel();
        let store = Arc::new(InMemoryStore::new(Region::universe()));
        let ctx = context("b", store.clone(), directory.clone(), Arc::new(sink));
        let (primary, certificate) = fake_primary(5);
        let _publication = Publication::new(directory.clone(), bcard(&certificate, primary.server.clone()));

        // -- execute --
        let secondary = SecondaryExecution::spawn(
            ctx,
            ContractId::new(1),
            contract("a", &["a", "b"], certificate.branch_id),
            Vec::new(),
        );
        let streaming = wait_for_ack(&mut acks, ContractId::new(1), ContractAckState::SecondaryStreaming).await;

        // -- verify --
        assert_eq!(store.len(), 5);
        assert_eq!(
            streaming.version.unwrap().single_version(),
            Some(Version::new(certificate.branch_id, Timestamp::zero()))
        );
        assert!(primary.dispatcher.readable_dispatchees().borrow().contains(&ServerId::new("b")));

        // A contract that only changes durability keeps the secondary streaming.
        let mut updated = contract("a", &["a", "b"], certificate.branch_id);
        updated.durability = Durability::Soft;
        secondary.update_contract(ContractId::new(2), updated);
        wait_for_ack(&mut acks, ContractId::new(2), ContractAckState::SecondaryStreaming).await;

        secondary.shutdown().await;
        primary.dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn diverged_data_blocks_the_secondary() {
        // -- setup --
        let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new());
        let (sink, mut acks) = create_ack_channel();
        let store = Arc::new(InMemoryStore::new(Region::universe()));
        // Written on a branch the primary never descended from.
        store
            .set_metainfo(
                store.new_write_token(),
                &Region::universe(),
                Version::new(BranchId::random(), Timestamp::new(5)),
            )
            .unwrap();
        let ctx = context("b", store.clone(), directory.clone(), Arc::new(sink));
        let (primary, certificate) = fake_primary(3);
        let _publication = Publication::new(directory.clone(), bcard(&certificate, primary.server.clone()));

        // -- execute --
        let secondary = SecondaryExecution::spawn(
            ctx.clone(),
            ContractId::new(1),
            contract("a", &["a", "b"], certificate.branch_id),
            Vec::new(),
        );
        wait_for_ack(&mut acks, ContractId::new(1), ContractAckState::SecondaryNeedPrimary).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        // -- verify --
        while let Some((_, ack)) = acks.try_next() {
            assert_eq!(ack.state, ContractAckState::SecondaryNeedPrimary);
        }
        assert_eq!(store.len(), 0);
        assert_eq!(primary.server.registration_count(), 0);

        secondary.shutdown().await;
        primary.dispatcher.shutdown().await;
    }
}
