//! Emission counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cellroute_routing_table::MessagesToEmit;

/// Counters updated by the watcher as deltas are emitted.
#[derive(Debug, Default)]
pub struct EmitterMetrics {
    /// Hostnames registered by incremental events.
    pub routes_registered: AtomicU64,
    /// Hostnames unregistered by incremental events and syncs.
    pub routes_unregistered: AtomicU64,
    /// Hostnames registered by syncs and full re-emissions.
    pub routes_synced: AtomicU64,
    /// Routes in the table after the last update (gauge).
    pub routes_total: AtomicU64,
    /// Completed syncs.
    pub syncs: AtomicU64,
    /// Duration of the last sync, in milliseconds (gauge).
    pub last_sync_duration_ms: AtomicU64,
}

impl EmitterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a delta produced by an incremental event.
    pub fn record_event_delta(&self, messages: &MessagesToEmit) {
        self.routes_registered
            .fetch_add(messages.route_registration_count(), Ordering::Relaxed);
        self.routes_unregistered
            .fetch_add(messages.route_unregistration_count(), Ordering::Relaxed);
    }

    /// Count a delta produced by a sync or a full re-emission.
    pub fn record_sync_delta(&self, messages: &MessagesToEmit) {
        self.routes_synced
            .fetch_add(messages.route_registration_count(), Ordering::Relaxed);
        self.routes_unregistered
            .fetch_add(messages.route_unregistration_count(), Ordering::Relaxed);
    }

    pub fn record_sync_completed(&self, duration: Duration) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
        self.last_sync_duration_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_routes_total(&self, total: usize) {
        self.routes_total.store(total as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EmitterStats {
        EmitterStats {
            routes_registered: self.routes_registered.load(Ordering::Relaxed),
            routes_unregistered: self.routes_unregistered.load(Ordering::Relaxed),
            routes_synced: self.routes_synced.load(Ordering::Relaxed),
            routes_total: self.routes_total.load(Ordering::Relaxed),
            syncs: self.syncs.load(Ordering::Relaxed),
            last_sync_duration_ms: self.last_sync_duration_ms.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EmitterMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub routes_registered: u64,
    pub routes_unregistered: u64,
    pub routes_synced: u64,
    pub routes_total: u64,
    pub syncs: u64,
    pub last_sync_duration_ms: u64,
}
