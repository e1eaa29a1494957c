//! Grouping desired and actual records by routing key.

use std::collections::HashMap;

use cellroute_models::{ActualLrp, ActualLrpRoutingInfo, DesiredLrpSchedulingInfo};

use crate::endpoint::{Endpoint, Route, RoutingKey};
use crate::error::RoutingTableError;

pub type RoutesByRoutingKey = HashMap<RoutingKey, Vec<Route>>;
pub type EndpointsByRoutingKey = HashMap<RoutingKey, Vec<Endpoint>>;

/// One [`Route`] per hostname, grouped by process and container port.
///
/// Records without routes contribute nothing.
pub fn routes_by_routing_key_from_scheduling_infos(
    desired: &[DesiredLrpSchedulingInfo],
) -> RoutesByRoutingKey {
    let mut routes_by_key = RoutesByRoutingKey::new();

    for info in desired {
        for cf_route in &info.routes {
            let key = RoutingKey::new(info.process_guid.clone(), cf_route.port);
            let routes = routes_by_key.entry(key).or_default();
            routes.extend(cf_route.hostnames.iter().map(|hostname| {
                Route::new(
                    hostname.clone(),
                    info.log_guid.clone(),
                    cf_route.route_service_url.clone(),
                )
            }));
        }
    }

    routes_by_key
}

/// Endpoints of every desired actual LRP, grouped by routing key.
///
/// Actuals with no desired record, or whose index is beyond the desired
/// instance count, are left out. Actuals without port mappings are left
/// out and reported.
pub fn endpoints_by_routing_key_from_actuals(
    actuals: &[ActualLrpRoutingInfo],
    desired_by_process_guid: &HashMap<String, DesiredLrpSchedulingInfo>,
) -> (EndpointsByRoutingKey, Vec<RoutingTableError>) {
    let mut endpoints_by_key = EndpointsByRoutingKey::new();
    let mut errors = Vec::new();

    for info in actuals {
        let actual = &info.actual_lrp;
        let Some(desired) = desired_by_process_guid.get(&actual.process_guid) else {
            continue;
        };
        if actual.index >= desired.instances {
            continue;
        }

        match endpoints_from_actual(info) {
            Ok(endpoints) => {
                for endpoint in endpoints {
                    let key = RoutingKey::new(actual.process_guid.clone(), endpoint.container_port);
                    endpoints_by_key.entry(key).or_default().push(endpoint);
                }
            }
            Err(err) => errors.push(err),
        }
    }

    (endpoints_by_key, errors)
}

/// One endpoint per port mapping of the actual LRP.
pub fn endpoints_from_actual(
    info: &ActualLrpRoutingInfo,
) -> Result<Vec<Endpoint>, RoutingTableError> {
    let actual = &info.actual_lrp;
    if actual.ports.is_empty() {
        return Err(RoutingTableError::NoPortMappings {
            process_guid: actual.process_guid.clone(),
            index: actual.index,
        });
    }

    Ok(actual
        .ports
        .iter()
        .map(|mapping| Endpoint {
            instance_guid: actual.instance_guid.clone(),
            index: actual.index,
            host: actual.address.clone(),
            domain: actual.domain.clone(),
            port: mapping.host_port,
            container_port: mapping.container_port,
            evacuating: info.evacuating,
            modification_tag: Some(actual.modification_tag.clone()),
        })
        .collect())
}

/// Routing keys for each container port the actual LRP exposes.
pub fn routing_keys_from_actual(actual: &ActualLrp) -> Vec<RoutingKey> {
    actual
        .ports
        .iter()
        .map(|mapping| RoutingKey::new(actual.process_guid.clone(), mapping.container_port))
        .collect()
}

/// Routing keys for each distinct container port the desired LRP routes to.
pub fn routing_keys_from_scheduling_info(desired: &DesiredLrpSchedulingInfo) -> Vec<RoutingKey> {
    desired
        .container_ports()
        .into_iter()
        .map(|port| RoutingKey::new(desired.process_guid.clone(), port))
        .collect()
}
