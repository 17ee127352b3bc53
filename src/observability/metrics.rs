//! Dispatcher outcome counters
//!
//! Atomic counters shared between the dispatcher and whoever wants to report
//! on it. Owned by the lifecycle and handed to the dispatcher, not global.

use crate::bot::dispatcher::ItemOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DispatchMetrics {
    items_received: AtomicU64,
    skipped: AtomicU64,
    no_links: AtomicU64,
    replied: AtomicU64,
    gave_up: AtomicU64,
    permission_denied: AtomicU64,
    item_errors: AtomicU64,
}

/// Point-in-time copy of [`DispatchMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub items_received: u64,
    pub skipped: u64,
    pub no_links: u64,
    pub replied: u64,
    pub gave_up: u64,
    pub permission_denied: u64,
    pub item_errors: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_received(&self) {
        self.items_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Skipped => &self.skipped,
            ItemOutcome::NoLinks => &self.no_links,
            ItemOutcome::Replied(_) => &self.replied,
            ItemOutcome::GaveUp => &self.gave_up,
            ItemOutcome::PermissionDenied => &self.permission_denied,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_error(&self) {
        self.item_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_received: self.items_received.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            no_links: self.no_links.load(Ordering::Relaxed),
            replied: self.replied.load(Ordering::Relaxed),
            gave_up: self.gave_up.load(Ordering::Relaxed),
            permission_denied: self.permission_denied.load(Ordering::Relaxed),
            item_errors: self.item_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::item::Reply;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_outcomes_are_counted() {
        let metrics = DispatchMetrics::new();
        metrics.item_received();
        metrics.item_received();
        metrics.record_outcome(&ItemOutcome::Skipped);
        metrics.record_outcome(&ItemOutcome::Replied(Reply {
            id: "r1".to_string(),
            fullname: "t1_r1".to_string(),
        }));
        metrics.item_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.items_received, 2);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.replied, 1);
        assert_eq!(snapshot.item_errors, 1);
        assert_eq!(snapshot.gave_up, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(DispatchMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.item_received();
                        metrics.record_outcome(&ItemOutcome::NoLinks);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.items_received, 400);
        assert_eq!(snapshot.no_links, 400);
    }
}
