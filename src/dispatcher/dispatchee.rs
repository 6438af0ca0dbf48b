use crate::contract::ServerId;
use crate::query::{Durability, OrderToken, Read, ReadResponse, Write, WriteResponse};
use crate::store::StoreError;
use crate::version::Timestamp;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum DispatcheeError {
    #[error("Lost contact with replica: {0}")]
    LostContact(String),
    #[error("Interrupted")]
    Interrupted,
    #[error("Replica is still backfilling")]
    NotStreaming,
    #[error("Replica queued {0} writes while backfilling and fell behind")]
    BackfillQueueFull(usize),
    #[error("Replica storage failure")]
    Store(#[from] StoreError),
}

/// Dispatchee is anything a primary dispatcher can send reads and writes to: the primary's own
/// store, or a proxy for a secondary on another server.
///
/// Writes arrive with the timestamp the dispatcher assigned. Implementations must apply them in
/// timestamp order even when several arrive concurrently.
#[async_trait::async_trait]
pub trait Dispatchee: Send + Sync {
    /// Reads once everything up to `min_timestamp` has been applied.
    async fn do_read(
        &self,
        read: &Read,
        min_timestamp: Timestamp,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, DispatcheeError>;

    async fn do_write_sync(
        &self,
        write: &Write,
        timestamp: Timestamp,
        order_token: OrderToken,
        durability: Durability,
    ) -> Result<WriteResponse, DispatcheeError>;

    async fn do_write_async(
        &self,
        write: &Write,
        timestamp: Timestamp,
        order_token: OrderToken,
    ) -> Result<(), DispatcheeError>;
}

/// WriteCallback follows one write through the dispatcher.
pub trait WriteCallback: Send + Sync {
    fn default_durability(&self) -> Durability;

    /// Called once for every readable replica that applied the write. Replicas that are not
    /// readable yet may only have queued it, so they never ack.
    fn on_ack(&self, server_id: &ServerId, response: WriteResponse);

    /// Called exactly once, when no replica will ack the write anymore.
    fn on_end(&self);
}

/// IncompleteWrite is one write on its way to every registered replica. It is shared by the
/// per-replica workers and fires `on_end` when the last of them lets go.
pub struct IncompleteWrite {
    pub write: Write,
    pub timestamp: Timestamp,
    pub order_token: OrderToken,
    pub durability: Durability,
    pub(super) callback: Arc<dyn WriteCallback>,
}

impl Drop for IncompleteWrite {
    fn drop(&mut self) {
        self.callback.on_end();
    }
}

impl fmt::Debug for IncompleteWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncompleteWrite")
            .field("write", &self.write)
            .field("timestamp", &self.timestamp)
            .field("durability", &self.durability)
            .finish()
    }
}
