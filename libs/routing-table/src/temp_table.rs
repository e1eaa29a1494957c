//! Unlocked snapshot tables built from full listings.

use std::collections::HashMap;

use cellroute_models::{ActualLrpRoutingInfo, DesiredLrpSchedulingInfo};

use crate::by_routing_key::{
    endpoints_by_routing_key_from_actuals, routes_by_routing_key_from_scheduling_infos,
    routing_keys_from_scheduling_info, EndpointsByRoutingKey, RoutesByRoutingKey,
};
use crate::endpoint::{Address, EndpointKey, RoutingKey};
use crate::entry::RoutableEndpoints;
use crate::error::RoutingTableError;
use crate::table::{sealed, TableSnapshot};

/// A routing table staged for [`RoutingTable::swap`](crate::RoutingTable::swap).
///
/// Built single-threaded and consumed by the swap, so it has no lock and
/// never computes messages.
#[derive(Debug, Clone, Default)]
pub struct TempTable {
    entries: HashMap<RoutingKey, RoutableEndpoints>,
    address_entries: HashMap<Address, EndpointKey>,
}

impl TempTable {
    pub fn new(routes_by_key: RoutesByRoutingKey, endpoints_by_key: EndpointsByRoutingKey) -> Self {
        let mut entries: HashMap<RoutingKey, RoutableEndpoints> = routes_by_key
            .into_iter()
            .map(|(key, routes)| {
                let entry = RoutableEndpoints {
                    routes,
                    ..Default::default()
                };
                (key, entry)
            })
            .collect();
        let mut address_entries = HashMap::new();

        for (key, endpoints) in endpoints_by_key {
            let entry = entries.entry(key).or_default();
            for endpoint in endpoints {
                address_entries.insert(endpoint.address(), endpoint.key());
                entry.endpoints.insert(endpoint.key(), endpoint);
            }
        }

        Self {
            entries,
            address_entries,
        }
    }

    /// Builds a snapshot from full desired and actual listings.
    ///
    /// Only running actuals are routed. Route entries carry their desired
    /// record's modification tag. Actuals that could not be turned into
    /// endpoints are returned alongside the table.
    pub fn from_state(
        desired: &[DesiredLrpSchedulingInfo],
        actuals: &[ActualLrpRoutingInfo],
    ) -> (Self, Vec<RoutingTableError>) {
        let desired_by_process_guid: HashMap<String, DesiredLrpSchedulingInfo> = desired
            .iter()
            .map(|info| (info.process_guid.clone(), info.clone()))
            .collect();

        let running: Vec<ActualLrpRoutingInfo> = actuals
            .iter()
            .filter(|info| info.actual_lrp.is_running())
            .cloned()
            .collect();

        let routes = routes_by_routing_key_from_scheduling_infos(desired);
        let (endpoints, errors) =
            endpoints_by_routing_key_from_actuals(&running, &desired_by_process_guid);

        let mut table = Self::new(routes, endpoints);
        for info in desired {
            for key in routing_keys_from_scheduling_info(info) {
                if let Some(entry) = table.entries.get_mut(&key) {
                    entry.modification_tag = info.modification_tag.clone();
                }
            }
        }

        (table, errors)
    }

    pub fn entry(&self, key: &RoutingKey) -> Option<&RoutableEndpoints> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn route_count(&self) -> usize {
        self.entries.values().map(|e| e.routes.len()).sum()
    }

    /// Number of distinct addresses claimed by the snapshot's endpoints.
    pub fn address_count(&self) -> usize {
        self.address_entries.len()
    }
}

impl sealed::Sealed for TempTable {}

impl TableSnapshot for TempTable {
    fn into_entries(self) -> HashMap<RoutingKey, RoutableEndpoints> {
        self.entries
    }
}
