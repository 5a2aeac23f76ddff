//! Readiness barrier
//!
//! Counts one readiness arrival per dispatched session before any run
//! starts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Latch satisfied after a fixed number of arrivals
pub struct ReadyLatch {
    remaining: AtomicUsize,
    known_tests: AtomicUsize,
    satisfied: watch::Sender<bool>,
}

impl ReadyLatch {
    pub fn new(count: usize) -> Arc<Self> {
        let (satisfied, _) = watch::channel(count == 0);
        Arc::new(Self {
            remaining: AtomicUsize::new(count),
            known_tests: AtomicUsize::new(0),
            satisfied,
        })
    }

    /// One session's handle on the latch
    pub fn token(self: &Arc<Self>) -> ReadyToken {
        ReadyToken {
            latch: Arc::clone(self),
            fired: false,
        }
    }

    /// Total tests reported by sessions that have arrived
    pub fn known_tests(&self) -> usize {
        self.known_tests.load(Ordering::Acquire)
    }

    /// Wait until every session has arrived
    pub async fn wait(&self) {
        let mut rx = self.satisfied.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn arrive(&self, test_count: usize) {
        self.known_tests.fetch_add(test_count, Ordering::AcqRel);
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.satisfied.send_replace(true);
        }
    }
}

/// Idempotent mark-ready handle: fires at most once no matter how many
/// signals race for it
pub struct ReadyToken {
    latch: Arc<ReadyLatch>,
    fired: bool,
}

impl ReadyToken {
    pub fn mark(&mut self, test_count: usize) {
        if self.fired {
            return;
        }
        self.fired = true;
        self.latch.arrive(test_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_latch_waits_for_every_arrival() {
        let latch = ReadyLatch::new(2);
        let mut first = latch.token();
        let mut second = latch.token();

        first.mark(3);
        let waited = tokio::time::timeout(Duration::from_millis(20), latch.wait()).await;
        assert!(waited.is_err(), "latch satisfied early");

        second.mark(2);
        latch.wait().await;
        assert_eq!(latch.known_tests(), 5);
    }

    #[tokio::test]
    async fn test_token_is_idempotent() {
        let latch = ReadyLatch::new(2);
        let mut token = latch.token();

        // both readiness channels may eventually fire for one session
        token.mark(4);
        token.mark(0);
        token.mark(7);

        let waited = tokio::time::timeout(Duration::from_millis(20), latch.wait()).await;
        assert!(waited.is_err(), "one session must not satisfy a latch of two");
        assert_eq!(latch.known_tests(), 4);

        latch.token().mark(0);
        latch.wait().await;
    }

    #[tokio::test]
    async fn test_empty_latch_is_born_satisfied() {
        let latch = ReadyLatch::new(0);
        latch.wait().await;
        assert_eq!(latch.known_tests(), 0);
    }

    #[tokio::test]
    async fn test_wait_after_satisfaction_returns_immediately() {
        let latch = ReadyLatch::new(1);
        latch.token().mark(1);
        latch.wait().await;
        latch.wait().await;
    }
}
