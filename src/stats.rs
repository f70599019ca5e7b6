//! Process-wide counters updated by event taps; read back as a lock-free
//! value copy.
//!
//! This only tracks counters the coordinator itself can tap from node and
//! agent events. Batch expiry and message discard counts belong to the
//! produce/consume routers' retry and backpressure handling, which this
//! crate doesn't implement, so they have no home here.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically non-decreasing counters, each updated independently from
/// any thread via atomic add/increment.
#[derive(Debug, Default)]
pub struct Statistics {
    successful_sent: AtomicU64,
    requests_sent: AtomicU64,
    responses_received: AtomicU64,
    errors: AtomicU64,
    node_dead: AtomicU64,
    exited: AtomicU64,
    received: AtomicU64,
}

/// A value-copy snapshot of [`Statistics`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub successful_sent: u64,
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub node_dead: u64,
    pub exited: u64,
    pub received: u64,
}

macro_rules! counter_inc {
    ($name:ident) => {
        pub fn $name(&self) {
            self.$name.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl Statistics {
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            successful_sent: self.successful_sent.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            node_dead: self.node_dead.load(Ordering::Relaxed),
            exited: self.exited.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
        }
    }

    counter_inc!(successful_sent);
    counter_inc!(requests_sent);
    counter_inc!(responses_received);
    counter_inc!(errors);
    counter_inc!(node_dead);
    counter_inc!(exited);
    counter_inc!(received);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent_and_monotonic() {
        let stats = Statistics::default();
        stats.errors();
        stats.errors();
        stats.node_dead();

        let snap = stats.snapshot();
        assert_eq!(snap.errors, 2);
        assert_eq!(snap.node_dead, 1);
        assert_eq!(snap.requests_sent, 0);
    }
}
