//! Per routing key state.

use std::collections::BTreeMap;

use cellroute_models::ModificationTag;

use crate::endpoint::{Endpoint, EndpointKey, Route};

/// Routes and endpoints for one routing key.
///
/// Routes and endpoints are updated independently; either may be empty
/// while the other is populated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutableEndpoints {
    pub endpoints: BTreeMap<EndpointKey, Endpoint>,
    pub routes: Vec<Route>,
    pub modification_tag: Option<ModificationTag>,
}

impl RoutableEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an entry from a route list and a set of endpoints. Later
    /// endpoints with the same key replace earlier ones.
    pub fn with_routes_and_endpoints(
        routes: Vec<Route>,
        endpoints: impl IntoIterator<Item = Endpoint>,
    ) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(|e| (e.key(), e)).collect(),
            routes,
            modification_tag: None,
        }
    }

    /// Returns true if the endpoint, or its evacuating counterpart, is present.
    pub fn has_endpoint(&self, endpoint: &Endpoint) -> bool {
        let key = endpoint.key();
        self.endpoints.contains_key(&key) || self.endpoints.contains_key(&key.counterpart())
    }

    pub fn has_hostname(&self, hostname: &str) -> bool {
        self.routes.iter().any(|r| r.hostname == hostname)
    }

    pub fn has_route_service_url(&self, url: &str) -> bool {
        self.routes.iter().any(|r| r.route_service_url == url)
    }

    pub fn has_routes(&self) -> bool {
        !self.routes.is_empty()
    }

    /// Endpoints with the given instance index, evacuating copies included.
    pub fn endpoints_for_index(&self, index: i32) -> Vec<Endpoint> {
        self.endpoints
            .values()
            .filter(|e| e.index == index)
            .cloned()
            .collect()
    }
}
