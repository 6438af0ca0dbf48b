use crate::contract::ServerId;
use crate::region::Region;
use crate::replicator::ReplicatorAddress;
use crate::version::{BranchHistory, BranchId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// PrimaryBcard advertises a running primary and how to reach its replicator.
#[derive(Clone)]
pub struct PrimaryBcard {
    pub server_id: ServerId,
    pub branch_id: BranchId,
    pub region: Region,
    pub branch_history: BranchHistory,
    pub replicator: ReplicatorAddress,
}

impl fmt::Debug for PrimaryBcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryBcard")
            .field("server_id", &self.server_id)
            .field("branch_id", &self.branch_id)
            .field("region", &self.region)
            .field("replicator", &self.replicator)
            .finish()
    }
}

pub type BcardKey = (ServerId, BranchId);

pub type Bcards = BTreeMap<BcardKey, PrimaryBcard>;

/// Directory is how secondaries find primaries.
pub trait Directory: Send + Sync {
    fn publish(&self, bcard: PrimaryBcard);

    fn unpublish(&self, key: &BcardKey);

    /// Watches every published bcard.
    fn subscribe(&self) -> watch::Receiver<Bcards>;
}

/// InMemoryDirectory is a directory shared by servers in one process.
pub struct InMemoryDirectory {
    bcards: watch::Sender<Bcards>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        let (bcards, _) = watch::channel(BTreeMap::new());
        InMemoryDirectory { bcards }
    }
}

impl Directory for InMemoryDirectory {
    fn publish(&self, bcard: PrimaryBcard) {
        self.bcards.send_modify(|bcards| {
            bcards.insert((bcard.server_id.clone(), bcard.branch_id), bcard);
        });
    }

    fn unpublish(&self, key: &BcardKey) {
        self.bcards.send_if_modified(|bcards| bcards.remove(key).is_some());
    }

    fn subscribe(&self) -> watch::Receiver<Bcards> {
        self.bcards.subscribe()
    }
}

/// Publication keeps a bcard published until dropped.
pub struct Publication {
    directory: Arc<dyn Directory>,
    key: BcardKey,
}

impl Publication {
    pub fn new(directory: Arc<dyn Directory>, bcard: PrimaryBcard) -> Self {
        let key = (bcard.server_id.clone(), bcard.branch_id);
        directory.publish(bcard);

        Publication { directory, key }
    }
}

impl Drop for Publication {
    fn drop(&mut self) {
        self.directory.unpublish(&self.key);
    }
}

/// Waits for the bcard published under `key`.
pub async fn wait_for_bcard(rx: &mut watch::Receiver<Bcards>, key: &BcardKey) -> Option<PrimaryBcard> {
    let bcards = rx.wait_for(|bcards| bcards.contains_key(key)).await.ok()?;
    bcards.get(key).cloned()
}

/// Waits for the bcard under `key` to disappear.
pub async fn wait_for_bcard_gone(rx: &mut watch::Receiver<Bcards>, key: &BcardKey) {
    let _ = rx.wait_for(|bcards| !bcards.contains_key(key)).await;
}
