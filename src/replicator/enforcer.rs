use crate::version::Timestamp;
use tokio::sync::watch;

/// TimestampEnforcer makes writes that arrive concurrently apply one at a time, in timestamp
/// order.
pub(crate) struct TimestampEnforcer {
    applied: watch::Sender<Timestamp>,
}

impl TimestampEnforcer {
    pub(crate) fn new(initial: Timestamp) -> Self {
        let (applied, _) = watch::channel(initial);
        TimestampEnforcer { applied }
    }

    pub(crate) fn applied(&self) -> Timestamp {
        *self.applied.borrow()
    }

    /// Waits until every write before `timestamp` was completed.
    pub(crate) async fn wait_turn(&self, timestamp: Timestamp) {
        let mut rx = self.applied.subscribe();
        let _ = rx.wait_for(|applied| applied.next() >= timestamp).await;

        let applied = self.applied();
        assert!(
            applied.next() == timestamp,
            "Write {:?} delivered again after {:?} was applied",
            timestamp,
            applied
        );
    }

    pub(crate) fn complete(&self, timestamp: Timestamp) {
        self.applied.send_modify(|applied| {
            assert!(
                applied.next() == timestamp,
                "Completed {:?} out of turn, last applied is {:?}",
                timestamp,
                applied
            );
            *applied = timestamp;
        });
    }

    pub(crate) async fn wait_applied(&self, min_timestamp: Timestamp) {
        let mut rx = self.applied.subscribe();
        let _ = rx.wait_for(|applied| *applied >= min_timestamp).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn turns_are_taken_in_order() {
        // -- setup --
        let enforcer = Arc::new(TimestampEnforcer::new(Timestamp::new(10)));
        let order = Arc::new(Mutex::new(Vec::new()));

        // -- execute --
        let mut handles = Vec::new();
        for ts in (11..=15).rev() {
            let enforcer = enforcer.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let timestamp = Timestamp::new(ts);
                enforcer.wait_turn(timestamp).await;
                order.lock().unwrap().push(ts);
                enforcer.complete(timestamp);
            }));
        }
        enforcer.wait_applied(Timestamp::new(15)).await;
        for handle in handles {
            handle.await.unwrap();
        }

        // -- verify --
        assert_eq!(*order.lock().unwrap(), vec![11, 12, 13, 14, 15]);
        assert_eq!(enforcer.applied(), Timestamp::new(15));
    }
}
