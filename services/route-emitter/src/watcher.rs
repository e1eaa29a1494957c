//! Translates LRP events and full syncs into routing table updates.
//!
//! Every table mutation returns a delta; the watcher hands each non-empty
//! delta to the emitter and counts it. Emission errors are logged and never
//! propagated, since the next sync or re-emission repairs the router.
//!
//! While a sync is in flight, events are cached instead of applied. The
//! sync replays them onto the staged table before swapping it in, so
//! changes that land after the listings were fetched survive the swap.

use std::collections::HashSet;
use std::slice;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use cellroute_models::{
    ActualLrpRoutingInfo, DesiredLrpSchedulingInfo, DomainSet, LrpEvent, ModificationTag,
};
use cellroute_routing_table::{
    endpoints_from_actual, routes_by_routing_key_from_scheduling_infos,
    routing_keys_from_scheduling_info, MessagesToEmit, RoutingKey, RoutingTable, TempTable,
};
use tracing::{debug, error, info, warn};

use crate::emitter::MessageEmitter;
use crate::metrics::EmitterMetrics;

#[derive(Debug, Clone, Copy)]
enum DeltaKind {
    Event,
    Sync,
}

#[derive(Debug, Default)]
struct SyncState {
    syncing: bool,
    /// Events received during the sync, latest per record, in arrival order.
    cached: Vec<(String, LrpEvent)>,
}

impl SyncState {
    fn cache(&mut self, event: LrpEvent) {
        let key = event.key();
        self.cached.retain(|(k, _)| *k != key);
        self.cached.push((key, event));
    }
}

/// Applies LRP changes to the shared routing table and emits the results.
pub struct Watcher {
    table: Arc<RoutingTable>,
    emitter: Arc<dyn MessageEmitter>,
    metrics: Arc<EmitterMetrics>,
    sync_state: Mutex<SyncState>,
}

impl Watcher {
    pub fn new(
        table: Arc<RoutingTable>,
        emitter: Arc<dyn MessageEmitter>,
        metrics: Arc<EmitterMetrics>,
    ) -> Self {
        Self {
            table,
            emitter,
            metrics,
            sync_state: Mutex::new(SyncState::default()),
        }
    }

    pub fn table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    pub fn metrics(&self) -> &Arc<EmitterMetrics> {
        &self.metrics
    }

    /// Marks a sync as started. Events handled from now on are cached
    /// until [`Watcher::sync`] or [`Watcher::abort_sync`] runs.
    pub fn begin_sync(&self) {
        self.lock_sync_state().syncing = true;
    }

    pub fn is_syncing(&self) -> bool {
        self.lock_sync_state().syncing
    }

    /// Number of events cached by the in-flight sync.
    pub fn cached_event_count(&self) -> usize {
        self.lock_sync_state().cached.len()
    }

    /// Applies one event and emits the resulting delta, which is also
    /// returned. During a sync the event is cached and the delta is empty.
    pub async fn handle_event(&self, event: LrpEvent) -> MessagesToEmit {
        log_event(&event);

        let messages = {
            let mut sync_state = self.lock_sync_state();
            if sync_state.syncing {
                info!(
                    event_type = event.event_type(),
                    key = %event.key(),
                    "Caching event during sync"
                );
                sync_state.cache(event);
                return MessagesToEmit::new();
            }
            apply_event(&self.table, &event)
        };

        self.emit(&messages, DeltaKind::Event).await;
        messages
    }

    /// Ends a failed sync: cached events are applied to the live table and
    /// their combined delta is emitted.
    pub async fn abort_sync(&self) -> MessagesToEmit {
        let messages = {
            let mut sync_state = self.lock_sync_state();
            sync_state.syncing = false;

            let mut messages = MessagesToEmit::new();
            for (_, event) in sync_state.cached.drain(..) {
                messages.merge(apply_event(&self.table, &event));
            }
            messages
        };

        self.emit(&messages, DeltaKind::Event).await;
        messages
    }

    /// Rebuilds the table from full listings and emits the difference.
    ///
    /// Events cached since [`Watcher::begin_sync`] are applied to the new
    /// table before it replaces the live one. Only endpoints in `fresh`
    /// domains can be torn down by a sync.
    pub async fn sync(
        &self,
        desired: Vec<DesiredLrpSchedulingInfo>,
        actuals: Vec<ActualLrpRoutingInfo>,
        fresh: &DomainSet,
    ) -> MessagesToEmit {
        let started = Instant::now();

        let (snapshot, errors) = TempTable::from_state(&desired, &actuals);
        for err in &errors {
            warn!(error = %err, "Skipping actual lrp during sync");
        }

        let (messages, replayed) = {
            let mut sync_state = self.lock_sync_state();
            let staging = RoutingTable::from_snapshot(snapshot);
            let replayed = sync_state.cached.len();
            for (_, event) in sync_state.cached.drain(..) {
                apply_event(&staging, &event);
            }
            sync_state.syncing = false;
            (self.table.swap(staging, Some(fresh)), replayed)
        };
        self.emit(&messages, DeltaKind::Sync).await;

        let elapsed = started.elapsed();
        self.metrics.record_sync_completed(elapsed);
        info!(
            desired_count = desired.len(),
            actual_count = actuals.len(),
            fresh_domains = fresh.len(),
            cached_events = replayed,
            registrations = messages.route_registration_count(),
            unregistrations = messages.route_unregistration_count(),
            duration_ms = elapsed.as_millis() as u64,
            "Sync complete"
        );

        messages
    }

    /// Re-emits registrations for everything in the table.
    pub async fn emit_all(&self) -> MessagesToEmit {
        let messages = self.table.messages_to_emit();
        debug!(
            registrations = messages.route_registration_count(),
            "Re-emitting routing table"
        );
        self.emit(&messages, DeltaKind::Sync).await;
        messages
    }

    // Sync state is only ever mutated in whole steps.
    fn lock_sync_state(&self) -> MutexGuard<'_, SyncState> {
        self.sync_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, messages: &MessagesToEmit, kind: DeltaKind) {
        match kind {
            DeltaKind::Event => self.metrics.record_event_delta(messages),
            DeltaKind::Sync => self.metrics.record_sync_delta(messages),
        }
        self.metrics.set_routes_total(self.table.route_count());

        if messages.is_empty() {
            return;
        }

        if let Err(e) = self.emitter.emit(messages).await {
            error!(
                error = %e,
                registrations = messages.route_registration_count(),
                unregistrations = messages.route_unregistration_count(),
                "Failed to emit registry messages"
            );
        }
    }
}

fn log_event(event: &LrpEvent) {
    let event_type = event.event_type();
    match event {
        LrpEvent::DesiredCreated(desired) | LrpEvent::DesiredRemoved(desired) => {
            info!(
                event_type,
                process_guid = %desired.process_guid,
                instances = desired.instances,
                "Handling desired lrp"
            );
        }
        LrpEvent::DesiredChanged { before, after } => {
            info!(
                event_type,
                process_guid = %after.process_guid,
                before_instances = before.instances,
                after_instances = after.instances,
                "Handling desired lrp"
            );
        }
        LrpEvent::ActualCreated(info)
        | LrpEvent::ActualChanged { after: info, .. }
        | LrpEvent::ActualRemoved(info) => {
            let actual = &info.actual_lrp;
            info!(
                event_type,
                process_guid = %actual.process_guid,
                index = actual.index,
                instance_guid = %actual.instance_guid,
                cell_id = %actual.cell_id,
                state = %actual.state,
                evacuating = info.evacuating,
                "Handling actual lrp"
            );
        }
    }
}

/// Translates one event into mutations of `table`.
fn apply_event(table: &RoutingTable, event: &LrpEvent) -> MessagesToEmit {
    match event {
        LrpEvent::DesiredCreated(desired) => set_desired_routes(table, desired),
        LrpEvent::DesiredChanged { before, after } => change_desired(table, before, after),
        LrpEvent::DesiredRemoved(desired) => {
            remove_desired_routes(table, desired, desired.modification_tag.as_ref())
        }
        LrpEvent::ActualCreated(info) => {
            if info.actual_lrp.is_running() {
                add_endpoints(table, info)
            } else {
                MessagesToEmit::new()
            }
        }
        LrpEvent::ActualChanged { before, after } => {
            if after.actual_lrp.is_running() {
                add_endpoints(table, after)
            } else if before.actual_lrp.is_running() {
                remove_endpoints(table, before)
            } else {
                MessagesToEmit::new()
            }
        }
        LrpEvent::ActualRemoved(info) => {
            if info.actual_lrp.is_running() {
                remove_endpoints(table, info)
            } else {
                MessagesToEmit::new()
            }
        }
    }
}

fn set_desired_routes(table: &RoutingTable, desired: &DesiredLrpSchedulingInfo) -> MessagesToEmit {
    let mut routes = routes_by_routing_key_from_scheduling_infos(slice::from_ref(desired));
    let mut messages = MessagesToEmit::new();

    for key in routing_keys_from_scheduling_info(desired) {
        let routes = routes.remove(&key).unwrap_or_default();
        messages.merge(table.set_routes(&key, routes, desired.modification_tag.clone()));
    }

    messages
}

fn remove_desired_routes(
    table: &RoutingTable,
    desired: &DesiredLrpSchedulingInfo,
    tag: Option<&ModificationTag>,
) -> MessagesToEmit {
    let mut messages = MessagesToEmit::new();
    for key in routing_keys_from_scheduling_info(desired) {
        messages.merge(table.remove_routes(&key, tag));
    }
    messages
}

fn change_desired(
    table: &RoutingTable,
    before: &DesiredLrpSchedulingInfo,
    after: &DesiredLrpSchedulingInfo,
) -> MessagesToEmit {
    let mut messages = set_desired_routes(table, after);

    let after_keys: HashSet<RoutingKey> =
        routing_keys_from_scheduling_info(after).into_iter().collect();
    let before_keys = routing_keys_from_scheduling_info(before);

    for key in before_keys.iter().filter(|k| !after_keys.contains(*k)) {
        messages.merge(table.remove_routes(key, after.modification_tag.as_ref()));
    }

    // Scale down: drop endpoints of instances that are no longer desired.
    for key in &before_keys {
        for index in after.instances..before.instances {
            for endpoint in table.endpoints_for_index(key, index) {
                messages.merge(table.remove_endpoint(key, &endpoint));
            }
        }
    }

    messages
}

fn add_endpoints(table: &RoutingTable, info: &ActualLrpRoutingInfo) -> MessagesToEmit {
    let mut messages = MessagesToEmit::new();
    match endpoints_from_actual(info) {
        Ok(endpoints) => {
            for endpoint in endpoints {
                let key = RoutingKey::new(
                    info.actual_lrp.process_guid.clone(),
                    endpoint.container_port,
                );
                messages.merge(table.add_endpoint(&key, endpoint));
            }
        }
        Err(err) => warn!(error = %err, "Cannot route actual lrp"),
    }
    messages
}

fn remove_endpoints(table: &RoutingTable, info: &ActualLrpRoutingInfo) -> MessagesToEmit {
    let mut messages = MessagesToEmit::new();
    match endpoints_from_actual(info) {
        Ok(endpoints) => {
            for endpoint in endpoints {
                let key = RoutingKey::new(
                    info.actual_lrp.process_guid.clone(),
                    endpoint.container_port,
                );
                messages.merge(table.remove_endpoint(&key, &endpoint));
            }
        }
        Err(err) => warn!(error = %err, "Cannot unroute actual lrp"),
    }
    messages
}
