//! Registration and unregistration deltas between two entries.
//!
//! Every function here is pure. A `fresh` argument of `None` disables
//! freshness gating (single event paths); `Some(domains)` restricts
//! destructive changes to endpoints whose domain is in `domains`.

use cellroute_models::DomainSet;

use crate::endpoint::{Endpoint, Route};
use crate::entry::RoutableEndpoints;
use crate::message::{MessagesToEmit, RegistryMessage};

/// Registrations needed to move the router from `existing` to `new`.
///
/// Everything in `new` is registered when there is no `existing` entry or
/// when hostnames or route service URLs changed. Otherwise only endpoints
/// that `existing` does not already have are registered.
pub fn registrations_for(
    existing: Option<&RoutableEndpoints>,
    new: &RoutableEndpoints,
) -> MessagesToEmit {
    let mut messages = MessagesToEmit::new();
    if !new.has_routes() {
        return messages;
    }

    let register_all = match existing {
        None => true,
        Some(existing) => {
            hostnames_have_changed(existing, new) || route_service_url_has_changed(existing, new)
        }
    };

    for endpoint in new.endpoints.values() {
        if register_all || existing.is_some_and(|e| !e.has_endpoint(endpoint)) {
            push_messages(endpoint, &new.routes, &mut messages.registration_messages);
        }
    }

    messages
}

/// Unregistrations needed to move the router from `existing` to `new`.
///
/// Endpoints that disappeared lose all of `existing`'s routes. Endpoints
/// still present lose only the hostnames that disappeared.
pub fn unregistrations_for(
    existing: &RoutableEndpoints,
    new: &RoutableEndpoints,
    fresh: Option<&DomainSet>,
) -> MessagesToEmit {
    let mut messages = MessagesToEmit::new();
    if !existing.has_routes() {
        return messages;
    }

    let mut still_present = Vec::new();
    for endpoint in existing.endpoints.values() {
        if new.has_endpoint(endpoint) {
            still_present.push(endpoint);
        } else if is_fresh(fresh, &endpoint.domain) {
            push_messages(
                endpoint,
                &existing.routes,
                &mut messages.unregistration_messages,
            );
        }
    }

    let disappeared: Vec<Route> = existing
        .routes
        .iter()
        .filter(|r| !new.has_hostname(&r.hostname))
        .cloned()
        .collect();

    if !disappeared.is_empty() {
        for endpoint in still_present {
            if is_fresh(fresh, &endpoint.domain) {
                push_messages(endpoint, &disappeared, &mut messages.unregistration_messages);
            }
        }
    }

    messages
}

/// Re-registers every endpoint of `existing` whose domain is not fresh.
pub fn unfresh_registrations(
    existing: &RoutableEndpoints,
    fresh: Option<&DomainSet>,
) -> MessagesToEmit {
    let mut messages = MessagesToEmit::new();

    for endpoint in existing.endpoints.values() {
        if !is_fresh(fresh, &endpoint.domain) {
            push_messages(endpoint, &existing.routes, &mut messages.registration_messages);
        }
    }

    messages
}

/// Registrations for a bulk snapshot entry, keeping old routes alive for
/// unfresh domains.
///
/// For an endpoint whose domain is not fresh, routes of `existing` that
/// `new` does not carry (by hostname) are added to the route list. The
/// list accumulates across endpoints. Returns the delta together with
/// `new` carrying the merged route list.
pub fn merged_registrations(
    existing: &RoutableEndpoints,
    new: &RoutableEndpoints,
    fresh: Option<&DomainSet>,
) -> (MessagesToEmit, RoutableEndpoints) {
    let mut messages = MessagesToEmit::new();
    let mut routes = new.routes.clone();

    for endpoint in new.endpoints.values() {
        if !is_fresh(fresh, &endpoint.domain) {
            for route in &existing.routes {
                if !routes.iter().any(|r| r.hostname == route.hostname) {
                    routes.push(route.clone());
                }
            }
        }

        if routes.is_empty() {
            continue;
        }

        push_messages(endpoint, &routes, &mut messages.registration_messages);
    }

    let merged = RoutableEndpoints {
        endpoints: new.endpoints.clone(),
        routes,
        modification_tag: new.modification_tag.clone(),
    };

    (messages, merged)
}

fn is_fresh(fresh: Option<&DomainSet>, domain: &str) -> bool {
    fresh.map_or(true, |domains| domains.contains(domain))
}

fn hostnames_have_changed(existing: &RoutableEndpoints, new: &RoutableEndpoints) -> bool {
    existing.routes.len() != new.routes.len()
        || new.routes.iter().any(|r| !existing.has_hostname(&r.hostname))
}

fn route_service_url_has_changed(existing: &RoutableEndpoints, new: &RoutableEndpoints) -> bool {
    existing.routes.len() != new.routes.len()
        || new
            .routes
            .iter()
            .any(|r| !existing.has_route_service_url(&r.route_service_url))
}

fn push_messages(endpoint: &Endpoint, routes: &[Route], out: &mut Vec<RegistryMessage>) {
    out.extend(
        routes
            .iter()
            .map(|route| RegistryMessage::for_endpoint(endpoint, route)),
    );
}
