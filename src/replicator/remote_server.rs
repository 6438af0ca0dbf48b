use crate::dispatcher::{PrimaryDispatcher, RegistrationHandle, RegistrationId};
use crate::replicator::endpoint::{
    BackfillChunkInput, EndpointError, RegisterInput, RegisterOutput, ReplicatorEndpoint,
};
use crate::region::Region;
use crate::replicator::local::LocalReplicator;
use crate::store::{BackfillChunk, Store};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio_util::sync::CancellationToken;

/// Dispatch priority of secondaries. The primary's own replica has 1.0, so reads prefer it when
/// both are equally fresh.
pub const REMOTE_DISPATCHEE_PRIORITY: f64 = 0.5;

/// RemoteReplicatorServer is the primary side of replication. It registers secondaries with the
/// dispatcher and serves backfill chunks out of the primary's store.
pub struct RemoteReplicatorServer {
    logger: slog::Logger,
    dispatcher: Weak<PrimaryDispatcher>,
    local: Arc<LocalReplicator>,
    store: Arc<dyn Store>,
    region: Region,
    registrations: Mutex<HashMap<RegistrationId, RegistrationHandle>>,
    closed: CancellationToken,
}

impl RemoteReplicatorServer {
    pub fn new(
        logger: slog::Logger,
        dispatcher: &Arc<PrimaryDispatcher>,
        local: Arc<LocalReplicator>,
        store: Arc<dyn Store>,
    ) -> Self {
        RemoteReplicatorServer {
            logger,
            region: dispatcher.region().clone(),
            dispatcher: Arc::downgrade(dispatcher),
            local,
            store,
            registrations: Mutex::new(HashMap::new()),
            closed: CancellationToken::new(),
        }
    }

    /// Drops every registration. Later calls fail with `LostContact`.
    pub fn close(&self) {
        self.closed.cancel();
        let dropped: Vec<RegistrationHandle> = self.lock_registrations().drain().map(|(_, h)| h).collect();
        slog::info!(self.logger, "Closed replicator, dropping {} registrations", dropped.len());
    }

    pub fn registration_count(&self) -> usize {
        self.lock_registrations().len()
    }

    fn dispatcher(&self) -> Result<Arc<PrimaryDispatcher>, EndpointError> {
        if self.closed.is_cancelled() {
            return Err(EndpointError::LostContact("primary stepped down".to_string()));
        }

        self.dispatcher
            .upgrade()
            .ok_or_else(|| EndpointError::LostContact("primary dispatcher is gone".to_string()))
    }

    fn lock_registrations(&self) -> MutexGuard<'_, HashMap<RegistrationId, RegistrationHandle>> {
        self.registrations
            .lock()
            .expect("RemoteReplicatorServer registrations mutex guard poison")
    }
}

#[async_trait::async_trait]
impl ReplicatorEndpoint for RemoteReplicatorServer {
    async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, EndpointError> {
        let dispatcher = self.dispatcher()?;
        let (handle, initial_timestamp) =
            dispatcher.register_dispatchee(input.listener, input.server_id.clone(), REMOTE_DISPATCHEE_PRIORITY);
        let registration_id = handle.id();

        let mut registrations = self.lock_registrations();
        if self.closed.is_cancelled() {
            // Closed while we registered. `handle` deregisters on drop.
            return Err(EndpointError::LostContact("primary stepped down".to_string()));
        }
        registrations.insert(registration_id, handle);
        drop(registrations);

        slog::info!(
            self.logger,
            "Secondary {:?} registered as {:?} from {:?}",
            input.server_id,
            registration_id,
            initial_timestamp
        );

        Ok(RegisterOutput {
            registration_id,
            initial_timestamp,
        })
    }

    async fn mark_ready(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
        let dispatcher = self.dispatcher()?;
        let registrations = self.lock_registrations();
        let handle = registrations
            .get(&registration_id)
            .ok_or(EndpointError::NotRegistered(registration_id))?;

        dispatcher
            .mark_ready(handle)
            .map_err(|_| EndpointError::NotRegistered(registration_id))
    }

    async fn deregister(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
        let removed = self.lock_registrations().remove(&registration_id);
        match removed {
            Some(_) => Ok(()),
            None => Err(EndpointError::NotRegistered(registration_id)),
        }
    }

    async fn check_registration(&self, registration_id: RegistrationId) -> Result<(), EndpointError> {
        self.dispatcher()?;

        let mut registrations = self.lock_registrations();
        let evicted = match registrations.get(&registration_id) {
            None => return Err(EndpointError::NotRegistered(registration_id)),
            Some(handle) => handle.is_evicted(),
        };

        if evicted {
            registrations.remove(&registration_id);
            Err(EndpointError::NotRegistered(registration_id))
        } else {
            Ok(())
        }
    }

    async fn backfill_chunk(&self, input: BackfillChunkInput) -> Result<BackfillChunk, EndpointError> {
        self.dispatcher()?;
        if !self.region.is_superset_of(&input.region) {
            return Err(EndpointError::WrongRegion(input.region));
        }

        self.local
            .wait_applied(input.min_timestamp, &self.closed)
            .await
            .map_err(|_| EndpointError::LostContact("primary stepped down".to_string()))?;

        Ok(self
            .store
            .backfill_chunk(&input.region, input.after.as_ref(), input.limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ServerId;
    use crate::dispatcher::{DispatcherOptions, WriteCallback};
    use crate::query::{Durability, OrderToken, Write, WriteResponse};
    use crate::region::Key;
    use crate::replicator::{ListenerReplica, RemoteReplicatorClient};
    use crate::store::InMemoryStore;
    use crate::version::{Version, VersionMap};
    use bytes::Bytes;
    use tokio::time::{timeout, Duration};

    struct IgnoringCallback;

    impl WriteCallback for IgnoringCallback {
        fn default_durability(&self) -> Durability {
            Durability::Hard
        }

        fn on_ack(&self, _server_id: &ServerId, _response: WriteResponse) {}

        fn on_end(&self) {}
    }

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn put(key: String) -> Write {
        Write::Put {
            key: Key::from(key),
            value: Bytes::from_static(b"v"),
        }
    }

    #[tokio::test]
    async fn secondary_catches_up_while_primary_writes() {
        // -- setup --
        let region = Region::universe();
        let primary_store = Arc::new(InMemoryStore::new(region.clone()));
        let secondary_store = Arc::new(InMemoryStore::new(region.clone()));
        let dispatcher = Arc::new(PrimaryDispatcher::new(
            logger(),
            region.clone(),
            VersionMap::new(region.clone(), Version::zero()),
            DispatcherOptions {
                write_concurrency: 4,
                queue_capacity: 1000,
            },
        ));
        let branch = dispatcher.branch_id();
        let local = Arc::new(LocalReplicator::new(
            primary_store.clone(),
            region.clone(),
            branch,
            dispatcher.current_timestamp(),
        ));
        let (local_handle, _) = dispatcher.register_dispatchee(local.clone(), ServerId::new("p"), 1.0);
        dispatcher.mark_ready(&local_handle).unwrap();
        let server = Arc::new(RemoteReplicatorServer::new(
            logger(),
            &dispatcher,
            local.clone(),
            primary_store.clone(),
        ));

        for i in 0..50 {
            dispatcher.spawn_write(put(format!("k{:03}", i)), OrderToken::ignore(), Arc::new(IgnoringCallback), None);
        }

        // -- execute --
        let listener = Arc::new(ListenerReplica::new(secondary_store.clone(), region.clone(), branch, 100));
        listener.begin_backfill().unwrap();
        let client = RemoteReplicatorClient::connect(logger(), server.clone(), ServerId::new("s"), listener.clone())
            .await
            .unwrap();
        assert_eq!(client.initial_timestamp().as_u64(), 50);

        let mut after = None;
        loop {
            // Writes keep flowing during the backfill.
            let i = 50 + secondary_store.len();
            dispatcher.spawn_write(put(format!("k{:03}", i)), OrderToken::ignore(), Arc::new(IgnoringCallback), None);

            let chunk = client.fetch_chunk(after.clone(), 7).await.unwrap();
            client.apply_chunk(&chunk).unwrap();
            if chunk.done {
                break;
            }
            after = chunk.last_key.clone();
        }
        let cancel = CancellationToken::new();
        client.start_streaming(&cancel).await.unwrap();
        client.mark_ready().await.unwrap();
        let final_timestamp = dispatcher.spawn_write(Write::Sync, OrderToken::ignore(), Arc::new(IgnoringCallback), None);

        // -- verify --
        timeout(Duration::from_secs(2), async {
            loop {
                let version = secondary_store.get_metainfo(&region).unwrap().single_version();
                if version == Some(Version::new(branch, final_timestamp)) && local.applied_timestamp() == final_timestamp {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(secondary_store.len(), primary_store.len());
        assert!(client.check_registration().await.is_ok());
        assert_eq!(
            *dispatcher.readable_dispatchees().borrow(),
            vec![ServerId::new("p"), ServerId::new("s")].into_iter().collect()
        );

        server.close();
        assert!(client.check_registration().await.is_err());
    }
}
