use crate::dispatcher::{Dispatchee, DispatcheeError};
use crate::query::{Durability, OrderToken, Read, ReadResponse, Write, WriteResponse};
use crate::region::Region;
use crate::replicator::enforcer::TimestampEnforcer;
use crate::replicator::local::BranchWriter;
use crate::store::{BackfillChunk, Store, StoreError};
use crate::version::{BranchId, Timestamp, Version};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// ListenerReplica is the secondary's end of a registration. While the backfill runs it only
/// queues the primary's writes; once streaming it applies them in timestamp order.
///
/// The queue holds at most `queue_capacity` writes. Past that the listener refuses writes, the
/// primary evicts it, and the backfill has to start over.
pub struct ListenerReplica {
    writer: BranchWriter,
    queue_capacity: usize,
    mode: Mutex<ListenerMode>,
}

enum ListenerMode {
    Backfilling { queue: BTreeMap<Timestamp, Write> },
    Overflowed,
    Streaming(Arc<TimestampEnforcer>),
}

impl ListenerReplica {
    pub fn new(store: Arc<dyn Store>, region: Region, branch: BranchId, queue_capacity: usize) -> Self {
        ListenerReplica {
            writer: BranchWriter::new(store, region, branch),
            queue_capacity,
            mode: Mutex::new(ListenerMode::Backfilling { queue: BTreeMap::new() }),
        }
    }

    pub fn region(&self) -> &Region {
        self.writer.region()
    }

    pub fn queued_writes(&self) -> usize {
        match &*self.lock_mode() {
            ListenerMode::Backfilling { queue } => queue.len(),
            ListenerMode::Overflowed | ListenerMode::Streaming(_) => 0,
        }
    }

    /// Fails once the backfill queue overflowed. Nothing this listener backfills can catch up
    /// after that.
    pub fn check_queue(&self) -> Result<(), DispatcheeError> {
        match &*self.lock_mode() {
            ListenerMode::Overflowed => Err(DispatcheeError::BackfillQueueFull(self.queue_capacity)),
            ListenerMode::Backfilling { .. } | ListenerMode::Streaming(_) => Ok(()),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(&*self.lock_mode(), ListenerMode::Streaming(_))
    }

    /// Forgets which version the region was at. The data is about to be overwritten piecemeal.
    pub fn begin_backfill(&self) -> Result<(), StoreError> {
        let store = self.writer.store();
        store.set_metainfo(store.new_write_token(), self.writer.region(), Version::zero())
    }

    pub fn apply_chunk(&self, chunk: &BackfillChunk) -> Result<(), StoreError> {
        let store = self.writer.store();
        store.apply_backfill_chunk(store.new_write_token(), self.writer.region(), chunk)
    }

    /// Called once every chunk is applied. Replays the writes queued since registration and
    /// switches to streaming.
    pub async fn finish_backfill(
        &self,
        initial_timestamp: Timestamp,
        cancel: &CancellationToken,
    ) -> Result<(), DispatcheeError> {
        self.check_queue()?;
        let store = self.writer.store();
        store.set_metainfo(
            store.new_write_token(),
            self.writer.region(),
            Version::new(self.writer.branch(), initial_timestamp),
        )?;

        let enforcer = Arc::new(TimestampEnforcer::new(initial_timestamp));
        let queue = {
            let mut mode = self.lock_mode();
            match std::mem::replace(&mut *mode, ListenerMode::Streaming(enforcer.clone())) {
                ListenerMode::Backfilling { queue } => queue,
                ListenerMode::Overflowed => {
                    *mode = ListenerMode::Overflowed;
                    drop(mode);
                    store.set_metainfo(store.new_write_token(), self.writer.region(), Version::zero())?;
                    return Err(DispatcheeError::BackfillQueueFull(self.queue_capacity));
                }
                ListenerMode::Streaming(_) => panic!("ListenerReplica started streaming twice"),
            }
        };

        // Writes that were in flight when we switched may still arrive through the streaming
        // path, so the replay takes turns with them.
        for (timestamp, write) in queue {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DispatcheeError::Interrupted),
                _ = enforcer.wait_turn(timestamp) => (),
            }
            self.writer.apply(&write, timestamp, Durability::Soft)?;
            enforcer.complete(timestamp);
        }

        Ok(())
    }

    fn lock_mode(&self) -> MutexGuard<'_, ListenerMode> {
        self.mode.lock().expect("ListenerReplica mode mutex guard poison")
    }

    fn streaming_enforcer(&self) -> Option<Arc<TimestampEnforcer>> {
        match &*self.lock_mode() {
            ListenerMode::Backfilling { .. } | ListenerMode::Overflowed => None,
            ListenerMode::Streaming(enforcer) => Some(enforcer.clone()),
        }
    }

    async fn apply_in_turn(
        &self,
        enforcer: &TimestampEnforcer,
        write: &Write,
        timestamp: Timestamp,
        durability: Durability,
    ) -> Result<WriteResponse, DispatcheeError> {
        enforcer.wait_turn(timestamp).await;
        let response = self.writer.apply(write, timestamp, durability)?;
        enforcer.complete(timestamp);

        Ok(response)
    }
}

#[async_trait::async_trait]
impl Dispatchee for ListenerReplica {
    async fn do_read(
        &self,
        read: &Read,
        min_timestamp: Timestamp,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, DispatcheeError> {
        let enforcer = self.streaming_enforcer().ok_or(DispatcheeError::NotStreaming)?;
        tokio::select! {
            _ = cancel.cancelled() => return Err(DispatcheeError::Interrupted),
            _ = enforcer.wait_applied(min_timestamp) => (),
        }

        Ok(self.writer.read(read)?)
    }

    async fn do_write_sync(
        &self,
        write: &Write,
        timestamp: Timestamp,
        _order_token: OrderToken,
        durability: Durability,
    ) -> Result<WriteResponse, DispatcheeError> {
        let enforcer = self.streaming_enforcer().ok_or(DispatcheeError::NotStreaming)?;
        self.apply_in_turn(&enforcer, write, timestamp, durability).await
    }

    async fn do_write_async(
        &self,
        write: &Write,
        timestamp: Timestamp,
        _order_token: OrderToken,
    ) -> Result<(), DispatcheeError> {
        let enforcer = {
            let mut mode = self.lock_mode();
            let streaming = match &mut *mode {
                ListenerMode::Backfilling { queue } if queue.len() < self.queue_capacity => {
                    queue.insert(timestamp, write.clone());
                    return Ok(());
                }
                ListenerMode::Backfilling { .. } | ListenerMode::Overflowed => None,
                ListenerMode::Streaming(enforcer) => Some(enforcer.clone()),
            };

            match streaming {
                Some(enforcer) => enforcer,
                None => {
                    *mode = ListenerMode::Overflowed;
                    return Err(DispatcheeError::BackfillQueueFull(self.queue_capacity));
                }
            }
        };

        self.apply_in_turn(&enforcer, write, timestamp, Durability::Soft)
            .await
            .map(|_| ())
    }
}
