use tokio::sync::watch;

/// PreemptSignal is raised by the throttler when a higher-priority backfill is waiting. It only
/// asks; the backfill decides when to yield.
pub(super) struct PreemptSignal {
    requested: watch::Sender<bool>,
}

impl PreemptSignal {
    pub(super) fn new() -> Self {
        let (requested, _) = watch::channel(false);
        PreemptSignal { requested }
    }

    pub(super) fn request(&self) {
        self.requested.send_if_modified(|requested| {
            let changed = !*requested;
            *requested = true;
            changed
        });
    }

    pub(super) fn is_requested(&self) -> bool {
        *self.requested.borrow()
    }

    pub(super) async fn wait(&self) {
        let mut rx = self.requested.subscribe();
        // Sender lives in `self`, so the channel can't close while we wait.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}
