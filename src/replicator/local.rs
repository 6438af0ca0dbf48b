use crate::dispatcher::{Dispatchee, DispatcheeError};
use crate::query::{Durability, OrderToken, Read, ReadResponse, Write, WriteResponse};
use crate::region::Region;
use crate::replicator::enforcer::TimestampEnforcer;
use crate::store::{Store, StoreError};
use crate::version::{BranchId, Timestamp, Version};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Applies a branch's writes to one region of a store.
pub(crate) struct BranchWriter {
    store: Arc<dyn Store>,
    region: Region,
    branch: BranchId,
}

impl BranchWriter {
    pub(crate) fn new(store: Arc<dyn Store>, region: Region, branch: BranchId) -> Self {
        BranchWriter { store, region, branch }
    }

    pub(crate) fn apply(
        &self,
        write: &Write,
        timestamp: Timestamp,
        durability: Durability,
    ) -> Result<WriteResponse, StoreError> {
        let token = self.store.new_write_token();
        self.store.write(
            token,
            &self.region,
            write,
            Version::new(self.branch, timestamp),
            durability,
        )
    }

    pub(crate) fn read(&self, read: &Read) -> Result<ReadResponse, StoreError> {
        let token = self.store.new_read_token();
        self.store.read(token, &self.region, read)
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) fn region(&self) -> &Region {
        &self.region
    }

    pub(crate) fn branch(&self) -> BranchId {
        self.branch
    }
}

/// LocalReplicator is the primary's own store, registered with its dispatcher like any other
/// replica.
pub struct LocalReplicator {
    writer: BranchWriter,
    enforcer: TimestampEnforcer,
}

impl LocalReplicator {
    /// `initial_timestamp` must be the dispatcher's timestamp at registration.
    pub fn new(store: Arc<dyn Store>, region: Region, branch: BranchId, initial_timestamp: Timestamp) -> Self {
        LocalReplicator {
            writer: BranchWriter::new(store, region, branch),
            enforcer: TimestampEnforcer::new(initial_timestamp),
        }
    }

    pub fn applied_timestamp(&self) -> Timestamp {
        self.enforcer.applied()
    }

    pub async fn wait_applied(&self, min_timestamp: Timestamp, cancel: &CancellationToken) -> Result<(), DispatcheeError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(DispatcheeError::Interrupted),
            _ = self.enforcer.wait_applied(min_timestamp) => Ok(()),
        }
    }

    async fn apply_in_turn(
        &self,
        write: &Write,
        timestamp: Timestamp,
        durability: Durability,
    ) -> Result<WriteResponse, DispatcheeError> {
        self.enforcer.wait_turn(timestamp).await;
        let response = self.writer.apply(write, timestamp, durability)?;
        self.enforcer.complete(timestamp);

        Ok(response)
    }
}

#[async_trait::async_trait]
impl Dispatchee for LocalReplicator {
    async fn do_read(
        &self,
        read: &Read,
        min_timestamp: Timestamp,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, DispatcheeError> {
        self.wait_applied(min_timestamp, cancel).await?;
        Ok(self.writer.read(read)?)
    }

    async fn do_write_sync(
        &self,
        write: &Write,
        timestamp: Timestamp,
        _order_token: OrderToken,
        durability: Durability,
    ) -> Result<WriteResponse, DispatcheeError> {
        self.apply_in_turn(write, timestamp, durability).await
    }

    async fn do_write_async(
        &self,
        write: &Write,
        timestamp: Timestamp,
        _order_token: OrderToken,
    ) -> Result<(), DispatcheeError> {
        self.apply_in_turn(write, timestamp, Durability::Soft).await.map(|_| ())
    }
}
