//! Counters exposed by a running distribution service

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    alerts_ingested: AtomicU64,
    subscribers_rejected: AtomicU64,
    subscribers_dropped: AtomicU64,
}

impl Counters {
    pub(crate) fn alert_ingested(&self) {
        self.alerts_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn subscriber_rejected(&self) {
        self.subscribers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn subscribers_dropped(&self, count: usize) {
        self.subscribers_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Snapshot of the distribution service state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    /// Currently registered subscribers
    pub subscribers: usize,

    /// Number of subscriber slots
    pub capacity: usize,

    /// Alerts logged and broadcast since startup
    pub alerts_ingested: u64,

    /// Subscribers turned away because every slot was taken
    pub subscribers_rejected: u64,

    /// Subscribers removed after a failed send or a disconnect
    pub subscribers_dropped: u64,
}

impl ServerStats {
    pub(crate) fn new(counters: &Counters, subscribers: usize, capacity: usize) -> Self {
        Self {
            subscribers,
            capacity,
            alerts_ingested: counters.alerts_ingested.load(Ordering::Relaxed),
            subscribers_rejected: counters.subscribers_rejected.load(Ordering::Relaxed),
            subscribers_dropped: counters.subscribers_dropped.load(Ordering::Relaxed),
        }
    }
}
