use crate::contract::ServerId;
use crate::dispatcher::dispatchee::{Dispatchee, DispatcheeError, IncompleteWrite, WriteCallback};
use crate::dispatcher::registration::{RegistrationHandle, RegistrationId};
use crate::query::{Durability, OrderChecker, OrderToken, Read, ReadResponse, Write, WriteResponse};
use crate::region::Region;
use crate::version::{BranchBirthCertificate, BranchId, Timestamp, VersionMap};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("No readable replicas available")]
    NoReplicasAvailable,
    #[error("Replica failed mid-read")]
    CannotPerformQuery(#[source] DispatcheeError),
    #[error("Interrupted")]
    Interrupted,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Registration {0:?} is gone")]
    NotRegistered(RegistrationId),
}

#[derive(Copy, Clone, Debug)]
pub struct DispatcherOptions {
    /// Writes in flight to one replica at a time.
    pub write_concurrency: usize,
    /// Writes buffered for one replica before it is evicted as too slow.
    pub queue_capacity: usize,
}

/// PrimaryDispatcher owns the replicas registered with one branch of one region. Writes get the
/// next timestamp of the branch and go to every registration, reads go to the freshest readable
/// one.
pub struct PrimaryDispatcher {
    shared: Arc<DispatcherShared>,
}

pub(crate) struct DispatcherShared {
    logger: slog::Logger,
    region: Region,
    branch: BranchBirthCertificate,
    options: DispatcherOptions,
    state: Mutex<DispatcherState>,
    most_recent_acked_write: Arc<AtomicU64>,
    ready_tx: watch::Sender<BTreeSet<ServerId>>,
    readable_tx: watch::Sender<BTreeSet<ServerId>>,
    order_checker: OrderChecker,
    shutdown: CancellationToken,
    tasks: Mutex<JoinSet<()>>,
}

struct DispatcherState {
    current_timestamp: Timestamp,
    next_registration_id: u64,
    registrations: BTreeMap<RegistrationId, Registration>,
}

struct Registration {
    server_id: ServerId,
    priority: f64,
    is_readable: Arc<AtomicBool>,
    latest_acked_write: Arc<AtomicU64>,
    dispatchee: Arc<dyn Dispatchee>,
    queue: mpsc::Sender<Arc<IncompleteWrite>>,
    cancel: CancellationToken,
}

impl PrimaryDispatcher {
    /// Mints a new branch whose origin is `base`.
    pub fn new(logger: slog::Logger, region: Region, base: VersionMap, options: DispatcherOptions) -> Self {
        assert!(options.write_concurrency > 0, "Dispatcher needs at least one worker per replica");
        assert!(options.queue_capacity > 0, "Dispatcher needs a non-empty queue per replica");

        let branch = BranchBirthCertificate {
            branch_id: BranchId::random(),
            initial_timestamp: base.max_timestamp(),
            origin: base,
            region: region.clone(),
        };
        let logger = logger.new(slog::o!("Branch" => format!("{:?}", branch.branch_id)));
        slog::info!(
            logger,
            "Minted branch starting at {:?} for {:?}",
            branch.initial_timestamp,
            region
        );

        let (ready_tx, _) = watch::channel(BTreeSet::new());
        let (readable_tx, _) = watch::channel(BTreeSet::new());

        PrimaryDispatcher {
            shared: Arc::new(DispatcherShared {
                logger,
                region,
                state: Mutex::new(DispatcherState {
                    current_timestamp: branch.initial_timestamp,
                    next_registration_id: 1,
                    registrations: BTreeMap::new(),
                }),
                most_recent_acked_write: Arc::new(AtomicU64::new(branch.initial_timestamp.as_u64())),
                branch,
                options,
                ready_tx,
                readable_tx,
                order_checker: OrderChecker::new(),
                shutdown: CancellationToken::new(),
                tasks: Mutex::new(JoinSet::new()),
            }),
        }
    }

    pub fn region(&self) -> &Region {
        &self.shared.region
    }

    pub fn branch_id(&self) -> BranchId {
        self.shared.branch.branch_id
    }

    pub fn branch_birth_certificate(&self) -> &BranchBirthCertificate {
        &self.shared.branch
    }

    pub fn current_timestamp(&self) -> Timestamp {
        self.shared.lock_state().current_timestamp
    }

    pub fn most_recent_acked_write(&self) -> Timestamp {
        Timestamp::new(self.shared.most_recent_acked_write.load(Ordering::Acquire))
    }

    /// Servers with a live registration.
    pub fn ready_dispatchees(&self) -> watch::Receiver<BTreeSet<ServerId>> {
        self.shared.ready_tx.subscribe()
    }

    /// Servers whose registration was marked ready and may serve reads.
    pub fn readable_dispatchees(&self) -> watch::Receiver<BTreeSet<ServerId>> {
        self.shared.readable_tx.subscribe()
    }

    /// Registers a replica. It will receive every write with a timestamp greater than the
    /// returned one.
    pub fn register_dispatchee(
        &self,
        dispatchee: Arc<dyn Dispatchee>,
        server_id: ServerId,
        priority: f64,
    ) -> (RegistrationHandle, Timestamp) {
        let (queue_tx, queue_rx) = mpsc::channel(self.shared.options.queue_capacity);
        let cancel = self.shared.shutdown.child_token();
        let is_readable = Arc::new(AtomicBool::new(false));

        let (id, timestamp, latest_acked_write) = {
            let mut state = self.shared.lock_state();
            let id = RegistrationId(state.next_registration_id);
            state.next_registration_id += 1;
            let timestamp = state.current_timestamp;
            let latest_acked_write = Arc::new(AtomicU64::new(timestamp.as_u64()));

            state.registrations.insert(
                id,
                Registration {
                    server_id: server_id.clone(),
                    priority,
                    is_readable: is_readable.clone(),
                    latest_acked_write: latest_acked_write.clone(),
                    dispatchee: dispatchee.clone(),
                    queue: queue_tx,
                    cancel: cancel.clone(),
                },
            );
            self.shared.publish_sets(&state);

            (id, timestamp, latest_acked_write)
        };

        slog::info!(
            self.shared.logger,
            "Registered {:?} as {:?} from {:?} with priority {}",
            server_id,
            id,
            timestamp,
            priority
        );

        let worker = DispatchWorker {
            logger: self
                .shared
                .logger
                .new(slog::o!("Dispatchee" => server_id.to_string(), "Registration" => id.as_u64())),
            registration_id: id,
            server_id: server_id.clone(),
            dispatchee,
            is_readable,
            latest_acked_write,
            most_recent_acked_write: self.shared.most_recent_acked_write.clone(),
            cancel: cancel.clone(),
            dispatcher: Arc::downgrade(&self.shared),
        };
        let queue = Arc::new(tokio::sync::Mutex::new(queue_rx));
        {
            let mut tasks = self.shared.lock_tasks();
            while let Some(_) = tasks.try_join_next() {}
            for _ in 0..self.shared.options.write_concurrency {
                tasks.spawn(worker.clone().run(queue.clone()));
            }
        }

        let handle = RegistrationHandle {
            dispatcher: Arc::downgrade(&self.shared),
            id,
            server_id,
            cancel,
        };

        (handle, timestamp)
    }

    /// Lets the registration serve reads. From now on its writes are acked with a response.
    pub fn mark_ready(&self, handle: &RegistrationHandle) -> Result<(), RegistrationError> {
        let state = self.shared.lock_state();
        let registration = state
            .registrations
            .get(&handle.id)
            .ok_or(RegistrationError::NotRegistered(handle.id))?;

        registration.is_readable.store(true, Ordering::Release);
        self.shared.publish_sets(&state);
        slog::info!(self.shared.logger, "{:?} is readable", handle.id);

        Ok(())
    }

    /// Returns `Ok` if the registration is still live.
    pub fn check_registration(&self, id: RegistrationId) -> Result<(), RegistrationError> {
        if self.shared.lock_state().registrations.contains_key(&id) {
            Ok(())
        } else {
            Err(RegistrationError::NotRegistered(id))
        }
    }

    pub async fn read(
        &self,
        read: &Read,
        order_token: OrderToken,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, ReadError> {
        self.shared.order_checker.check(order_token);

        let (dispatchee, registration_cancel, min_timestamp) = {
            let state = self.shared.lock_state();
            let best = state
                .registrations
                .values()
                .filter(|r| r.is_readable.load(Ordering::Acquire))
                .max_by(|a, b| {
                    let a_acked = a.latest_acked_write.load(Ordering::Acquire);
                    let b_acked = b.latest_acked_write.load(Ordering::Acquire);
                    a_acked.cmp(&b_acked).then(a.priority.total_cmp(&b.priority))
                })
                .ok_or(ReadError::NoReplicasAvailable)?;

            (
                best.dispatchee.clone(),
                best.cancel.clone(),
                self.most_recent_acked_write(),
            )
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReadError::Interrupted),
            _ = registration_cancel.cancelled() => Err(ReadError::CannotPerformQuery(
                DispatcheeError::LostContact("replica deregistered mid-read".to_string()),
            )),
            result = dispatchee.do_read(read, min_timestamp, cancel) => match result {
                Ok(response) => Ok(response),
                Err(_) if cancel.is_cancelled() => Err(ReadError::Interrupted),
                Err(e) => Err(ReadError::CannotPerformQuery(e)),
            },
        }
    }

    /// Timestamps `write` and queues it for every registered replica. Returns the timestamp.
    ///
    /// `callback` hears about every ack and, exactly once, about the end of the write.
    pub fn spawn_write(
        &self,
        write: Write,
        order_token: OrderToken,
        callback: Arc<dyn WriteCallback>,
        durability: Option<Durability>,
    ) -> Timestamp {
        self.shared.order_checker.check(order_token);
        let durability = durability.unwrap_or_else(|| callback.default_durability());

        let mut overflowing = Vec::new();
        let (timestamp, incomplete) = {
            let mut state = self.shared.lock_state();
            let timestamp = state.current_timestamp.next();
            state.current_timestamp = timestamp;

            let incomplete = Arc::new(IncompleteWrite {
                write,
                timestamp,
                order_token,
                durability,
                callback,
            });

            for (id, registration) in state.registrations.iter() {
                if registration.queue.try_send(incomplete.clone()).is_err() {
                    overflowing.push(*id);
                }
            }

            (timestamp, incomplete)
        };

        for id in overflowing {
            self.shared.evict(id, "write queue is full");
        }

        // Workers hold their own references. Ours must not outlive this call or `on_end` would
        // wait for the next write.
        drop(incomplete);

        timestamp
    }

    /// Stops every worker and waits for them to exit. Registrations are dropped.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        {
            let mut state = self.shared.lock_state();
            state.registrations.clear();
            self.shared.publish_sets(&state);
        }

        let mut tasks = std::mem::take(&mut *self.shared.lock_tasks());
        while let Some(_) = tasks.join_next().await {}
        slog::info!(self.shared.logger, "Dispatcher shut down");
    }
}

impl Drop for PrimaryDispatcher {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl DispatcherShared {
    fn lock_state(&self) -> MutexGuard<'_, DispatcherState> {
        self.state.lock().expect("PrimaryDispatcher state mutex guard poison")
    }

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().expect("PrimaryDispatcher tasks mutex guard poison")
    }

    fn publish_sets(&self, state: &DispatcherState) {
        let mut ready = BTreeSet::new();
        let mut readable = BTreeSet::new();
        for registration in state.registrations.values() {
            ready.insert(registration.server_id.clone());
            if registration.is_readable.load(Ordering::Acquire) {
                readable.insert(registration.server_id.clone());
            }
        }

        self.ready_tx.send_replace(ready);
        self.readable_tx.send_replace(readable);
    }

    pub(super) fn deregister(&self, id: RegistrationId) {
        let removed = {
            let mut state = self.lock_state();
            let removed = state.registrations.remove(&id);
            if removed.is_some() {
                self.publish_sets(&state);
            }
            removed
        };

        if let Some(registration) = removed {
            registration.cancel.cancel();
            slog::info!(self.logger, "Deregistered {:?} ({:?})", id, registration.server_id);
        }
    }

    fn evict(&self, id: RegistrationId, reason: &str) {
        let removed = {
            let mut state = self.lock_state();
            let removed = state.registrations.remove(&id);
            if removed.is_some() {
                self.publish_sets(&state);
            }
            removed
        };

        if let Some(registration) = removed {
            registration.cancel.cancel();
            slog::warn!(
                self.logger,
                "Evicted {:?} ({:?}): {}",
                id,
                registration.server_id,
                reason
            );
        }
    }
}

#[derive(Clone)]
struct DispatchWorker {
    logger: slog::Logger,
    registration_id: RegistrationId,
    server_id: ServerId,
    dispatchee: Arc<dyn Dispatchee>,
    is_readable: Arc<AtomicBool>,
    latest_acked_write: Arc<AtomicU64>,
    most_recent_acked_write: Arc<AtomicU64>,
    cancel: CancellationToken,
    dispatcher: Weak<DispatcherShared>,
}

impl DispatchWorker {
    async fn run(self, queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Arc<IncompleteWrite>>>>) {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => None,
                next = async { queue.lock().await.recv().await } => next,
            };
            let write = match next {
                None => return,
                Some(write) => write,
            };

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.deliver(&write) => result,
            };

            match result {
                Ok(response) => {
                    let timestamp = write.timestamp.as_u64();
                    self.latest_acked_write.fetch_max(timestamp, Ordering::AcqRel);
                    if let Some(response) = response {
                        self.most_recent_acked_write.fetch_max(timestamp, Ordering::AcqRel);
                        write.callback.on_ack(&self.server_id, response);
                    }
                }
                Err(e) => {
                    slog::warn!(self.logger, "Failed to deliver write {:?}: {}", write.timestamp, e);
                    if let Some(dispatcher) = self.dispatcher.upgrade() {
                        dispatcher.evict(self.registration_id, "write delivery failed");
                    }
                    return;
                }
            }
        }
    }

    async fn deliver(&self, write: &IncompleteWrite) -> Result<Option<WriteResponse>, DispatcheeError> {
        if self.is_readable.load(Ordering::Acquire) {
            self.dispatchee
                .do_write_sync(&write.write, write.timestamp, write.order_token, write.durability)
                .await
                .map(Some)
        } else {
            self.dispatchee
                .do_write_async(&write.write, write.timestamp, write.order_token)
                .await
                .map(|_| None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Key;
    use crate::version::Version;
    use bytes::Bytes;
    use std::collections::HashMap;
    use tokio::sync::Notify;
    use tokio::time::{timeout, Duration};

    struct RecordingDispatchee {
        applied: Mutex<Vec<Timestamp>>,
        fail_writes: bool,
        gate: Option<Arc<Notify>>,
        value: Option<&'static str>,
    }

    impl RecordingDispatchee {
        fn new() -> Arc<Self> {
            Arc::new(RecordingDispatchee {
                applied: Mutex::new(Vec::new()),
                fail_writes: false,
                gate: None,
                value: None,
            })
        }

        fn applied(&self) -> Vec<Timestamp> {
            self.applied.lock().unwrap().clone()
        }

        async fn apply(&self, timestamp: Timestamp) -> Result<(), DispatcheeError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_writes {
                return Err(DispatcheeError::LostContact("test".to_string()));
            }
            self.applied.lock().unwrap().push(timestamp);
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl Dispatchee for RecordingDispatchee {
        async fn do_read(
            &self,
            _read: &Read,
            _min_timestamp: Timestamp,
            _cancel: &CancellationToken,
        ) -> Result<ReadResponse, DispatcheeError> {
            Ok(ReadResponse::Get {
                value: self.value.map(|v| Bytes::from_static(v.as_bytes())),
            })
        }

        async fn do_write_sync(
            &self,
            _write: &Write,
            timestamp: Timestamp,
            _order_token: OrderToken,
            _durability: Durability,
        ) -> Result<WriteResponse, DispatcheeError> {
            self.apply(timestamp).await?;
            Ok(WriteResponse::Synced)
        }

        async fn do_write_async(
            &self,
            _write: &Write,
            timestamp: Timestamp,
            _order_token: OrderToken,
        ) -> Result<(), DispatcheeError> {
            self.apply(timestamp).await
        }
    }

    #[derive(Default)]
    struct CountingCallback {
        acks: Mutex<HashMap<ServerId, WriteResponse>>,
        ends: AtomicU64,
        ended: Notify,
    }

    impl WriteCallback for CountingCallback {
        fn default_durability(&self) -> Durability {
            Durability::Soft
        }

        fn on_ack(&self, server_id: &ServerId, response: WriteResponse) {
            self.acks.lock().unwrap().insert(server_id.clone(), response);
        }

        fn on_end(&self) {
            self.ends.fetch_add(1, Ordering::SeqCst);
            self.ended.notify_one();
        }
    }

    fn dispatcher(write_concurrency: usize, queue_capacity: usize) -> PrimaryDispatcher {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let base = VersionMap::new(Region::universe(), Version::zero());
        PrimaryDispatcher::new(
            logger,
            Region::universe(),
            base,
            DispatcherOptions {
                write_concurrency,
                queue_capacity,
            },
        )
    }

    fn put(key: &'static str) -> Write {
        Write::Put {
            key: Key::from(key),
            value: Bytes::from_static(b"v"),
        }
    }

    fn read_a() -> Read {
        Read::Get { key: Key::from("a") }
    }

    #[tokio::test]
    async fn writes_reach_each_replica_in_timestamp_order() {
        // -- setup --
        let dispatcher = dispatcher(1, 100);
        let r1 = RecordingDispatchee::new();
        let r2 = RecordingDispatchee::new();
        let (h1, t1) = dispatcher.register_dispatchee(r1.clone(), ServerId::new("a"), 1.0);
        let (h2, t2) = dispatcher.register_dispatchee(r2.clone(), ServerId::new("b"), 0.5);
        assert_eq!(t1, Timestamp::zero());
        assert_eq!(t2, Timestamp::zero());
        dispatcher.mark_ready(&h1).unwrap();
        dispatcher.mark_ready(&h2).unwrap();

        // -- execute --
        let mut callbacks = Vec::new();
        let mut timestamps = Vec::new();
        for i in 0..20 {
            let callback = Arc::new(CountingCallback::default());
            let key = if i % 2 == 0 { "a" } else { "b" };
            timestamps.push(dispatcher.spawn_write(put(key), OrderToken::ignore(), callback.clone(), None));
            callbacks.push(callback);
        }
        for callback in callbacks.iter() {
            timeout(Duration::from_secs(1), async {
                while callback.ends.load(Ordering::SeqCst) == 0 {
                    callback.ended.notified().await;
                }
            })
            .await
            .unwrap();
        }

        // -- verify --
        let expected: Vec<Timestamp> = (1..=20).map(Timestamp::new).collect();
        assert_eq!(timestamps, expected);
        assert_eq!(r1.applied(), expected);
        assert_eq!(r2.applied(), expected);
        for callback in callbacks.iter() {
            assert_eq!(callback.ends.load(Ordering::SeqCst), 1);
            assert_eq!(callback.acks.lock().unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn only_readable_replicas_ack() {
        // -- setup --
        let dispatcher = dispatcher(2, 100);
        let readable = RecordingDispatchee::new();
        let backfilling = RecordingDispatchee::new();
        let (h1, _) = dispatcher.register_dispatchee(readable.clone(), ServerId::new("a"), 1.0);
        let (_h2, _) = dispatcher.register_dispatchee(backfilling.clone(), ServerId::new("b"), 0.5);
        dispatcher.mark_ready(&h1).unwrap();

        // -- execute --
        let callback = Arc::new(CountingCallback::default());
        dispatcher.spawn_write(put("a"), OrderToken::ignore(), callback.clone(), None);
        timeout(Duration::from_secs(1), callback.ended.notified()).await.unwrap();

        // -- verify --
        let acks = callback.acks.lock().unwrap();
        assert_eq!(acks.get(&ServerId::new("a")), Some(&WriteResponse::Synced));
        // Delivered, but a backfilling replica may only have queued it.
        assert_eq!(acks.get(&ServerId::new("b")), None);
        assert_eq!(backfilling.applied(), vec![Timestamp::new(1)]);
        assert_eq!(dispatcher.most_recent_acked_write(), Timestamp::new(1));
        assert_eq!(
            *dispatcher.readable_dispatchees().borrow(),
            vec![ServerId::new("a")].into_iter().collect()
        );
        assert_eq!(dispatcher.ready_dispatchees().borrow().len(), 2);
    }

    #[tokio::test]
    async fn write_without_replicas_ends_immediately() {
        let dispatcher = dispatcher(1, 10);
        let callback = Arc::new(CountingCallback::default());

        dispatcher.spawn_write(Write::Sync, OrderToken::ignore(), callback.clone(), None);

        assert_eq!(callback.ends.load(Ordering::SeqCst), 1);
        assert!(callback.acks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_routes_to_freshest_then_highest_priority() {
        // -- setup --
        let dispatcher = dispatcher(1, 100);
        let low = Arc::new(RecordingDispatchee {
            value: Some("low"),
            ..RecordingDispatchee::without_arc()
        });
        let high = Arc::new(RecordingDispatchee {
            value: Some("high"),
            ..RecordingDispatchee::without_arc()
        });
        let cancel = CancellationToken::new();

        // -- verify --
        match dispatcher.read(&read_a(), OrderToken::ignore(), &cancel).await {
            Err(ReadError::NoReplicasAvailable) => (),
            other => panic!("Unexpected read result: {:?}", other),
        }

        let (h_low, _) = dispatcher.register_dispatchee(low.clone(), ServerId::new("low"), 0.5);
        let (h_high, _) = dispatcher.register_dispatchee(high.clone(), ServerId::new("high"), 1.0);
        dispatcher.mark_ready(&h_low).unwrap();
        dispatcher.mark_ready(&h_high).unwrap();

        let response = dispatcher.read(&read_a(), OrderToken::ignore(), &cancel).await.unwrap();
        assert_eq!(
            response,
            ReadResponse::Get {
                value: Some(Bytes::from_static(b"high"))
            }
        );

        drop(h_high);
        let response = dispatcher.read(&read_a(), OrderToken::ignore(), &cancel).await.unwrap();
        assert_eq!(
            response,
            ReadResponse::Get {
                value: Some(Bytes::from_static(b"low"))
            }
        );
    }

    #[tokio::test]
    async fn failing_replica_is_evicted() {
        // -- setup --
        let dispatcher = dispatcher(1, 100);
        let failing = Arc::new(RecordingDispatchee {
            fail_writes: true,
            ..RecordingDispatchee::without_arc()
        });
        let (handle, _) = dispatcher.register_dispatchee(failing, ServerId::new("b"), 0.5);
        let mut ready = dispatcher.ready_dispatchees();
        assert_eq!(ready.borrow().len(), 1);

        // -- execute --
        let callback = Arc::new(CountingCallback::default());
        dispatcher.spawn_write(put("a"), OrderToken::ignore(), callback.clone(), None);

        // -- verify --
        timeout(Duration::from_secs(1), handle.evicted()).await.unwrap();
        ready.changed().await.unwrap();
        assert!(ready.borrow().is_empty());
        assert!(dispatcher.check_registration(handle.id()).is_err());
        assert!(callback.acks.lock().unwrap().is_empty());
        assert_eq!(callback.ends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn full_queue_evicts_slow_replica() {
        // -- setup --
        let dispatcher = dispatcher(1, 2);
        let gate = Arc::new(Notify::new());
        let slow = Arc::new(RecordingDispatchee {
            gate: Some(gate.clone()),
            ..RecordingDispatchee::without_arc()
        });
        let (handle, _) = dispatcher.register_dispatchee(slow, ServerId::new("b"), 0.5);

        // -- execute --
        // One write held by the worker, two in the queue, the fourth overflows.
        for _ in 0..4 {
            dispatcher.spawn_write(put("a"), OrderToken::ignore(), Arc::new(CountingCallback::default()), None);
            tokio::task::yield_now().await;
        }

        // -- verify --
        timeout(Duration::from_secs(1), handle.evicted()).await.unwrap();
        assert!(dispatcher.ready_dispatchees().borrow().is_empty());
    }

    #[tokio::test]
    async fn shutdown_drains_workers() {
        let dispatcher = dispatcher(4, 10);
        let (handle, _) = dispatcher.register_dispatchee(RecordingDispatchee::new(), ServerId::new("a"), 1.0);

        timeout(Duration::from_secs(1), dispatcher.shutdown()).await.unwrap();

        assert!(handle.is_evicted());
        assert!(dispatcher.ready_dispatchees().borrow().is_empty());
    }

    impl RecordingDispatchee {
        fn without_arc() -> Self {
            RecordingDispatchee {
                applied: Mutex::new(Vec::new()),
                fail_writes: false,
                gate: None,
                value: None,
            }
        }
    }
}
