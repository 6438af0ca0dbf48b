use crate::throttler::preempt_signal::PreemptSignal;
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_ACTIVE_BACKFILLS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ThrottlerError {
    #[error("Interrupted while waiting for a backfill slot")]
    Interrupted,
}

/// BackfillThrottler bounds how many backfills run at once. Backfills that don't fit wait in
/// priority order, and their presence asks lower-priority active backfills to yield.
pub struct BackfillThrottler {
    logger: slog::Logger,
    state: Arc<Mutex<ThrottlerState>>,
}

impl BackfillThrottler {
    pub fn new(logger: slog::Logger, max_active: usize) -> Self {
        assert!(max_active > 0, "BackfillThrottler needs at least one slot");

        BackfillThrottler {
            logger,
            state: Arc::new(Mutex::new(ThrottlerState {
                max_active,
                next_seq: 0,
                active: BTreeMap::new(),
                waiting: BTreeMap::new(),
            })),
        }
    }

    /// Waits for a backfill slot. The slot is held until the returned lock is dropped.
    pub async fn enter(&self, priority: f64, cancel: &CancellationToken) -> Result<BackfillLock, ThrottlerError> {
        let (key, wake_rx, preempt) = {
            let mut state = lock_state(&self.state);
            let key = state.next_key(priority);
            let preempt = Arc::new(PreemptSignal::new());

            if state.active.len() < state.max_active {
                state.active.insert(key, preempt.clone());
                return Ok(BackfillLock::new(self.state.clone(), key, preempt));
            }

            let (wake_tx, wake_rx) = oneshot::channel();
            state.waiting.insert(
                key,
                Waiter {
                    wake: wake_tx,
                    preempt: preempt.clone(),
                },
            );
            let preempted = state.request_preemptions();
            slog::debug!(
                self.logger,
                "Backfill with priority {} is waiting. Asked {} active backfills to yield.",
                priority,
                preempted
            );

            (key, wake_rx, preempt)
        };

        let mut guard = WaitGuard {
            state: self.state.clone(),
            key,
            armed: true,
        };

        tokio::select! {
            woken = wake_rx => match woken {
                Ok(()) => {
                    guard.armed = false;
                    Ok(BackfillLock::new(self.state.clone(), key, preempt))
                }
                Err(_) => Err(ThrottlerError::Interrupted),
            },
            _ = cancel.cancelled() => Err(ThrottlerError::Interrupted),
        }
    }

    pub fn active_count(&self) -> usize {
        lock_state(&self.state).active.len()
    }

    pub fn waiting_count(&self) -> usize {
        lock_state(&self.state).waiting.len()
    }
}

/// BackfillLock is an admitted backfill. Dropping it frees the slot for the best waiter.
pub struct BackfillLock {
    state: Arc<Mutex<ThrottlerState>>,
    key: LockKey,
    preempt: Arc<PreemptSignal>,
}

impl BackfillLock {
    fn new(state: Arc<Mutex<ThrottlerState>>, key: LockKey, preempt: Arc<PreemptSignal>) -> Self {
        BackfillLock { state, key, preempt }
    }

    pub fn priority(&self) -> f64 {
        self.key.priority.0
    }

    /// True once a higher-priority backfill asked this one to yield.
    pub fn preemption_requested(&self) -> bool {
        self.preempt.is_requested()
    }

    pub async fn preempted(&self) {
        self.preempt.wait().await
    }
}

impl Drop for BackfillLock {
    fn drop(&mut self) {
        lock_state(&self.state).exit(&self.key);
    }
}

// Cleans up after a waiter whose `enter` future ended without being admitted.
struct WaitGuard {
    state: Arc<Mutex<ThrottlerState>>,
    key: LockKey,
    armed: bool,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut state = lock_state(&self.state);
        if state.waiting.remove(&self.key).is_none() {
            // Promoted while being cancelled. Hand the slot on.
            state.exit(&self.key);
        }
    }
}

struct Waiter {
    wake: oneshot::Sender<()>,
    preempt: Arc<PreemptSignal>,
}

struct ThrottlerState {
    max_active: usize,
    next_seq: u64,
    // Ascending key order: lowest priority first; among equals, latest arrival first.
    active: BTreeMap<LockKey, Arc<PreemptSignal>>,
    waiting: BTreeMap<LockKey, Waiter>,
}

impl ThrottlerState {
    fn next_key(&mut self, priority: f64) -> LockKey {
        let seq = self.next_seq;
        self.next_seq += 1;

        LockKey {
            priority: Priority(priority),
            seq: Reverse(seq),
        }
    }

    fn exit(&mut self, key: &LockKey) {
        if self.active.remove(key).is_some() {
            self.promote_waiters();
        }
    }

    fn promote_waiters(&mut self) {
        while self.active.len() < self.max_active {
            let (key, waiter) = match self.waiting.pop_last() {
                None => return,
                Some(best) => best,
            };

            self.active.insert(key, waiter.preempt);
            if waiter.wake.send(()).is_err() {
                // Waiter went away without cleaning up after itself yet.
                self.active.remove(&key);
            }
        }
    }

    /// Pairs waiters, best first, with active locks, worst first. Every active lock that loses
    /// its pairing is asked to yield.
    fn request_preemptions(&self) -> usize {
        let mut preempted = 0;
        for (waiting, (active, preempt)) in self.waiting.keys().rev().zip(self.active.iter()) {
            if active.priority >= waiting.priority {
                break;
            }
            preempt.request();
            preempted += 1;
        }

        preempted
    }
}

fn lock_state(state: &Mutex<ThrottlerState>) -> MutexGuard<'_, ThrottlerState> {
    state.lock().expect("BackfillThrottler mutex guard poison")
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct LockKey {
    priority: Priority,
    seq: Reverse<u64>,
}

#[derive(Copy, Clone, Debug)]
struct Priority(f64);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn throttler(max_active: usize) -> Arc<BackfillThrottler> {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        Arc::new(BackfillThrottler::new(logger, max_active))
    }

    #[tokio::test]
    async fn lowest_priorities_wait_and_best_waiter_is_promoted() {
        // -- setup --
        let throttler = throttler(DEFAULT_MAX_ACTIVE_BACKFILLS);
        let cancel = CancellationToken::new();

        // -- execute --
        let mut active = Vec::new();
        for priority in 3..=10 {
            active.push(throttler.enter(priority as f64, &cancel).await.unwrap());
        }

        let mut waiters = Vec::new();
        for priority in 1..=2 {
            let throttler = throttler.clone();
            let cancel = cancel.clone();
            waiters.push(tokio::spawn(async move { throttler.enter(priority as f64, &cancel).await.unwrap() }));
        }
        while throttler.waiting_count() < 2 {
            tokio::task::yield_now().await;
        }

        // -- verify --
        assert_eq!(throttler.active_count(), 8);
        // Waiters have lower priority than everyone active; nobody is asked to yield.
        assert!(active.iter().all(|lock| !lock.preemption_requested()));

        drop(active.pop());
        let promoted = timeout(Duration::from_secs(1), waiters.pop().unwrap()).await.unwrap().unwrap();
        assert_eq!(promoted.priority(), 2.0);
        assert_eq!(throttler.waiting_count(), 1);
        assert!(throttler.active_count() <= DEFAULT_MAX_ACTIVE_BACKFILLS);
    }

    #[tokio::test]
    async fn late_high_priorities_preempt_the_lowest_active() {
        // -- setup --
        let throttler = throttler(DEFAULT_MAX_ACTIVE_BACKFILLS);
        let cancel = CancellationToken::new();

        // -- execute --
        let mut active = Vec::new();
        let mut waiters = Vec::new();
        for priority in 1..=10 {
            if priority <= DEFAULT_MAX_ACTIVE_BACKFILLS {
                active.push(throttler.enter(priority as f64, &cancel).await.unwrap());
            } else {
                let throttler = throttler.clone();
                let cancel = cancel.clone();
                waiters.push(tokio::spawn(async move { throttler.enter(priority as f64, &cancel).await.unwrap() }));
            }
        }
        while throttler.waiting_count() < 2 {
            tokio::task::yield_now().await;
        }

        // -- verify --
        assert_eq!(throttler.active_count(), 8);
        let preempted: Vec<f64> = active
            .iter()
            .filter(|lock| lock.preemption_requested())
            .map(|lock| lock.priority())
            .collect();
        assert_eq!(preempted, vec![1.0, 2.0]);

        // Yielding hands the slots to 10, then 9.
        let lowest = active.remove(0);
        drop(lowest);
        let first = timeout(Duration::from_secs(1), waiters.pop().unwrap()).await.unwrap().unwrap();
        assert_eq!(first.priority(), 10.0);
        let next_lowest = active.remove(0);
        drop(next_lowest);
        let second = timeout(Duration::from_secs(1), waiters.pop().unwrap()).await.unwrap().unwrap();
        assert_eq!(second.priority(), 9.0);
        assert_eq!(throttler.waiting_count(), 0);
    }

    #[tokio::test]
    async fn higher_priority_waiter_preempts_lower_active() {
        // -- setup --
        let throttler = throttler(2);
        let cancel = CancellationToken::new();
        let low = throttler.enter(1.0, &cancel).await.unwrap();
        let high = throttler.enter(5.0, &cancel).await.unwrap();

        // -- execute --
        let waiter = {
            let throttler = throttler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { throttler.enter(3.0, &cancel).await.map(|l| l.priority()) })
        };
        timeout(Duration::from_secs(1), low.preempted()).await.unwrap();

        // -- verify --
        assert!(low.preemption_requested());
        assert!(!high.preemption_requested());

        drop(low);
        let admitted = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap().unwrap();
        assert_eq!(admitted, 3.0);
    }

    #[tokio::test]
    async fn cancelled_waiter_leaves_queue() {
        // -- setup --
        let throttler = throttler(1);
        let cancel = CancellationToken::new();
        let held = throttler.enter(1.0, &cancel).await.unwrap();

        let waiter_cancel = CancellationToken::new();
        let waiter = {
            let throttler = throttler.clone();
            let waiter_cancel = waiter_cancel.clone();
            tokio::spawn(async move { throttler.enter(2.0, &waiter_cancel).await.map(|_| ()) })
        };
        while throttler.waiting_count() < 1 {
            tokio::task::yield_now().await;
        }

        // -- execute --
        waiter_cancel.cancel();
        let result = waiter.await.unwrap();

        // -- verify --
        assert!(matches!(result, Err(ThrottlerError::Interrupted)));
        assert_eq!(throttler.waiting_count(), 0);
        drop(held);
        assert_eq!(throttler.active_count(), 0);
    }

    #[tokio::test]
    async fn equal_priorities_are_fifo() {
        let throttler = throttler(1);
        let cancel = CancellationToken::new();
        let held = throttler.enter(1.0, &cancel).await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut handles = Vec::new();
        for i in 0..3u32 {
            let waiter = throttler.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let lock = waiter.enter(1.0, &cancel).await.unwrap();
                tx.send(i).unwrap();
                drop(lock);
            }));
            while throttler.waiting_count() < (i + 1) as usize {
                tokio::task::yield_now().await;
            }
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }
        let mut order = Vec::new();
        while let Ok(i) = rx.try_recv() {
            order.push(i);
        }
        assert_eq!(order, vec![0, 1, 2]);
    }
}
