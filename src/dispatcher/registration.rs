use crate::contract::ServerId;
use crate::dispatcher::dispatcher::DispatcherShared;
use std::fmt;
use std::sync::Weak;
use tokio_util::sync::CancellationToken;

#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RegistrationId(pub(crate) u64);

impl RegistrationId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// RegistrationHandle keeps a dispatchee registered. Dropping it deregisters. It doesn't keep the
/// dispatcher alive.
pub struct RegistrationHandle {
    pub(super) dispatcher: Weak<DispatcherShared>,
    pub(super) id: RegistrationId,
    pub(super) server_id: ServerId,
    pub(super) cancel: CancellationToken,
}

impl RegistrationHandle {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// True once the dispatcher dropped this registration, or shut down.
    pub fn is_evicted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn evicted(&self) {
        self.cancel.cancelled().await
    }
}

impl Drop for RegistrationHandle {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.deregister(self.id);
        }
        self.cancel.cancel();
    }
}
