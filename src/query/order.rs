use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// OrderToken records where a query came from and in which order the source issued it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OrderToken {
    pub source: u64,
    pub seq: u64,
}

impl OrderToken {
    /// Token for internally generated queries that are not ordered against anything.
    pub fn ignore() -> Self {
        OrderToken { source: 0, seq: 0 }
    }

    pub fn is_ignored(&self) -> bool {
        self.source == 0
    }
}

/// OrderSource hands out increasing tokens for one client connection.
pub struct OrderSource {
    source: u64,
    next_seq: AtomicU64,
}

impl OrderSource {
    pub fn new() -> Self {
        loop {
            let source = rand::random::<u64>();
            if source != 0 {
                return OrderSource {
                    source,
                    next_seq: AtomicU64::new(1),
                };
            }
        }
    }

    pub fn next_token(&self) -> OrderToken {
        OrderToken {
            source: self.source,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// OrderChecker catches queries from one source arriving out of order. Only active in debug
/// builds.
#[derive(Default)]
pub struct OrderChecker {
    last_seen: Mutex<HashMap<u64, u64>>,
}

impl OrderChecker {
    pub fn new() -> Self {
        OrderChecker::default()
    }

    pub fn check(&self, token: OrderToken) {
        if !cfg!(debug_assertions) || token.is_ignored() {
            return;
        }

        let mut last_seen = self
            .last_seen
            .lock()
            .expect("OrderChecker.check() mutex guard poison");
        let last = last_seen.entry(token.source).or_insert(0);
        assert!(
            token.seq > *last,
            "Query from source {} reordered: seq {} after seq {}",
            token.source,
            token.seq,
            *last
        );
        *last = token.seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_increase() {
        let source = OrderSource::new();
        let checker = OrderChecker::new();
        let t1 = source.next_token();
        let t2 = source.next_token();
        assert!(t2.seq > t1.seq);

        checker.check(t1);
        checker.check(OrderToken::ignore());
        checker.check(t2);
    }

    #[test]
    #[should_panic(expected = "reordered")]
    #[cfg(debug_assertions)]
    fn reordering_panics() {
        let source = OrderSource::new();
        let checker = OrderChecker::new();
        let t1 = source.next_token();
        let t2 = source.next_token();

        checker.check(t2);
        checker.check(t1);
    }
}
