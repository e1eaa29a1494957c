//! The shared routing table.
//!
//! One mutex guards the entries and the address index together. Every
//! public operation holds it for its whole duration and returns the
//! message delta the router needs to see. Computing the delta is pure
//! in-memory work; emitting it is left to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use cellroute_models::{DomainSet, ModificationTag};
use tracing::{debug, info};

use crate::endpoint::{Address, Endpoint, EndpointKey, Route, RoutingKey};
use crate::entry::RoutableEndpoints;
use crate::message::MessagesToEmit;
use crate::message_builder::{
    merged_registrations, registrations_for, unfresh_registrations, unregistrations_for,
};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A fully built table that can be swapped into a [`RoutingTable`].
///
/// Sealed: implemented by [`TempTable`](crate::TempTable) and by a
/// [`RoutingTable`] used as a staging table.
pub trait TableSnapshot: sealed::Sealed {
    /// Consumes the snapshot, yielding its entries.
    fn into_entries(self) -> HashMap<RoutingKey, RoutableEndpoints>;
}

#[derive(Debug, Default)]
struct TableState {
    entries: HashMap<RoutingKey, RoutableEndpoints>,
    /// Last endpoint seen at each address, for collision detection.
    address_entries: HashMap<Address, EndpointKey>,
}

/// Statistics for a routing table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTableStats {
    pub entries: usize,
    pub routes: usize,
    pub endpoints: usize,
    pub address_collisions: u64,
}

/// Routing key to routable endpoints, safe to share between the event
/// loop and the sync loop.
#[derive(Debug, Default)]
pub struct RoutingTable {
    state: Mutex<TableState>,
    address_collisions: AtomicU64,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table seeded from `snapshot` without computing any messages.
    ///
    /// Used to stage a snapshot and apply further mutations to it before
    /// swapping it into the live table.
    pub fn from_snapshot(snapshot: impl TableSnapshot) -> Self {
        let entries = snapshot.into_entries();
        let mut address_entries = HashMap::new();
        for entry in entries.values() {
            index_addresses(entry, &mut address_entries);
        }

        Self {
            state: Mutex::new(TableState {
                entries,
                address_entries,
            }),
            address_collisions: AtomicU64::new(0),
        }
    }

    // Table state is consistent between every statement that can panic, so
    // a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the routes of `key` if `tag` is newer than the stored tag.
    pub fn set_routes(
        &self,
        key: &RoutingKey,
        routes: Vec<Route>,
        tag: Option<ModificationTag>,
    ) -> MessagesToEmit {
        let mut state = self.lock();

        let current = state.entries.get(key).cloned().unwrap_or_default();
        if !ModificationTag::succeeded_by(current.modification_tag.as_ref(), tag.as_ref()) {
            debug!(routing_key = %key, "Ignoring stale route update");
            return MessagesToEmit::new();
        }

        let mut updated = current.clone();
        updated.routes = routes;
        updated.modification_tag = tag;
        state.entries.insert(key.clone(), updated.clone());

        delta(&current, &updated)
    }

    /// Clears the routes of `key`, keeping its endpoints.
    ///
    /// Accepts a tag equal to the stored one so retried removals are
    /// idempotent.
    pub fn remove_routes(&self, key: &RoutingKey, tag: Option<&ModificationTag>) -> MessagesToEmit {
        let mut state = self.lock();

        let current = state.entries.get(key).cloned().unwrap_or_default();
        if !ModificationTag::equal_or_succeeded_by(current.modification_tag.as_ref(), tag) {
            debug!(routing_key = %key, "Ignoring stale route removal");
            return MessagesToEmit::new();
        }

        let updated = RoutableEndpoints {
            endpoints: current.endpoints.clone(),
            ..Default::default()
        };
        state.entries.insert(key.clone(), updated.clone());

        delta(&current, &updated)
    }

    /// Inserts or replaces an endpoint of `key`.
    ///
    /// If another instance was last seen at the same address the collision
    /// is counted and logged; the write happens regardless.
    pub fn add_endpoint(&self, key: &RoutingKey, endpoint: Endpoint) -> MessagesToEmit {
        let mut state = self.lock();

        let current = state.entries.get(key).cloned().unwrap_or_default();
        let mut updated = current.clone();
        let endpoint_key = endpoint.key();
        let address = endpoint.address();
        updated.endpoints.insert(endpoint_key.clone(), endpoint);
        state.entries.insert(key.clone(), updated.clone());

        if let Some(existing) = state.address_entries.get(&address) {
            if existing.instance_guid != endpoint_key.instance_guid {
                self.address_collisions.fetch_add(1, Ordering::Relaxed);
                info!(
                    instance_guid_a = %existing.instance_guid,
                    instance_guid_b = %endpoint_key.instance_guid,
                    address = %address,
                    "collision detected with endpoint"
                );
            }
        }
        state.address_entries.insert(address, endpoint_key);

        delta(&current, &updated)
    }

    /// Removes an endpoint of `key` unless the stored copy is newer.
    pub fn remove_endpoint(&self, key: &RoutingKey, endpoint: &Endpoint) -> MessagesToEmit {
        let mut state = self.lock();

        let current = state.entries.get(key).cloned().unwrap_or_default();
        let endpoint_key = endpoint.key();
        let Some(stored) = current.endpoints.get(&endpoint_key) else {
            return MessagesToEmit::new();
        };

        if !ModificationTag::equal_or_succeeded_by(
            stored.modification_tag.as_ref(),
            endpoint.modification_tag.as_ref(),
        ) {
            debug!(
                routing_key = %key,
                instance_guid = %endpoint.instance_guid,
                "Ignoring stale endpoint removal"
            );
            return MessagesToEmit::new();
        }

        let mut updated = current.clone();
        updated.endpoints.remove(&endpoint_key);
        state.entries.insert(key.clone(), updated.clone());
        state.address_entries.remove(&endpoint.address());

        delta(&current, &updated)
    }

    /// Every endpoint of `key` with the given instance index, evacuating
    /// copies included.
    pub fn endpoints_for_index(&self, key: &RoutingKey, index: i32) -> Vec<Endpoint> {
        let state = self.lock();
        state
            .entries
            .get(key)
            .map(|entry| entry.endpoints_for_index(index))
            .unwrap_or_default()
    }

    /// Total number of routes across all keys.
    pub fn route_count(&self) -> usize {
        let state = self.lock();
        state.entries.values().map(|e| e.routes.len()).sum()
    }

    /// A copy of the entry for `key`, if present.
    pub fn entry(&self, key: &RoutingKey) -> Option<RoutableEndpoints> {
        self.lock().entries.get(key).cloned()
    }

    /// Number of times an endpoint was added at an address owned by a
    /// different instance.
    pub fn address_collisions(&self) -> u64 {
        self.address_collisions.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> RoutingTableStats {
        let state = self.lock();
        RoutingTableStats {
            entries: state.entries.len(),
            routes: state.entries.values().map(|e| e.routes.len()).sum(),
            endpoints: state.entries.values().map(|e| e.endpoints.len()).sum(),
            address_collisions: self.address_collisions(),
        }
    }

    /// Registrations for everything in the table.
    pub fn messages_to_emit(&self) -> MessagesToEmit {
        let state = self.lock();

        let mut messages = MessagesToEmit::new();
        for entry in state.entries.values() {
            messages.merge(registrations_for(None, entry));
        }
        messages
    }

    /// Replaces the whole table with `snapshot`.
    ///
    /// Keys whose endpoints belong to domains outside `fresh` are not torn
    /// down: their old routes are merged into the new entry, or, if the
    /// snapshot dropped the key entirely, the old entry is kept and
    /// re-registered.
    pub fn swap(&self, snapshot: impl TableSnapshot, fresh: Option<&DomainSet>) -> MessagesToEmit {
        let new_entries = snapshot.into_entries();
        let mut messages = MessagesToEmit::new();
        let mut updated_entries = HashMap::with_capacity(new_entries.len());
        let mut updated_addresses = HashMap::new();

        let mut state = self.lock();

        for (key, new_entry) in &new_entries {
            let existing = state.entries.get(key).cloned().unwrap_or_default();
            let (registrations, merged) = merged_registrations(&existing, new_entry, fresh);
            messages.merge(registrations);
            index_addresses(&merged, &mut updated_addresses);
            updated_entries.insert(key.clone(), merged);
        }

        let empty = RoutableEndpoints::new();
        for (key, existing) in &state.entries {
            let new_entry = new_entries.get(key);
            messages.merge(unregistrations_for(
                existing,
                new_entry.unwrap_or(&empty),
                fresh,
            ));

            if new_entry.is_none() {
                let unfresh = unfresh_registrations(existing, fresh);
                if !unfresh.registration_messages.is_empty() {
                    debug!(routing_key = %key, "Keeping entry with unfresh domain");
                    index_addresses(existing, &mut updated_addresses);
                    updated_entries.insert(key.clone(), existing.clone());
                    messages.merge(unfresh);
                }
            }
        }

        state.entries = updated_entries;
        state.address_entries = updated_addresses;

        messages
    }
}

impl sealed::Sealed for RoutingTable {}

impl TableSnapshot for RoutingTable {
    fn into_entries(self) -> HashMap<RoutingKey, RoutableEndpoints> {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
    }
}

fn index_addresses(entry: &RoutableEndpoints, addresses: &mut HashMap<Address, EndpointKey>) {
    for endpoint in entry.endpoints.values() {
        addresses.insert(endpoint.address(), endpoint.key());
    }
}

fn delta(current: &RoutableEndpoints, updated: &RoutableEndpoints) -> MessagesToEmit {
    let mut messages = registrations_for(Some(current), updated);
    messages.merge(unregistrations_for(current, updated, None));
    messages
}
