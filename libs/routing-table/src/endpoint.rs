//! Routing keys, routes and endpoints.
//!
//! These are plain values. Identity rules:
//! - A [`Route`] is identified by its hostname only
//! - An [`Endpoint`] is identified by its [`EndpointKey`] (instance guid plus
//!   evacuating flag), so an instance and its evacuating copy are two slots
//! - An [`Address`] is only used to detect two instances claiming the same
//!   host and port

use std::fmt;

use cellroute_models::ModificationTag;
use serde::{Deserialize, Serialize};

/// One container port of one process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingKey {
    pub process_guid: String,
    pub container_port: u32,
}

impl RoutingKey {
    pub fn new(process_guid: impl Into<String>, container_port: u32) -> Self {
        Self {
            process_guid: process_guid.into(),
            container_port,
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.process_guid, self.container_port)
    }
}

/// An externally reachable hostname for a routing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Route {
    pub hostname: String,
    pub log_guid: String,
    pub route_service_url: String,
}

impl Route {
    pub fn new(
        hostname: impl Into<String>,
        log_guid: impl Into<String>,
        route_service_url: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            log_guid: log_guid.into(),
            route_service_url: route_service_url.into(),
        }
    }
}

/// De-duplication identity of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointKey {
    pub instance_guid: String,
    pub evacuating: bool,
}

impl EndpointKey {
    pub fn new(instance_guid: impl Into<String>, evacuating: bool) -> Self {
        Self {
            instance_guid: instance_guid.into(),
            evacuating,
        }
    }

    /// The key of the same instance with the evacuating flag flipped.
    pub fn counterpart(&self) -> Self {
        Self {
            instance_guid: self.instance_guid.clone(),
            evacuating: !self.evacuating,
        }
    }
}

/// Host and port an endpoint is reachable on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u32,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A running (or evacuating) instance's network location for one
/// container port.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    pub instance_guid: String,
    pub index: i32,
    pub host: String,
    pub domain: String,
    /// Host port the router should send traffic to.
    pub port: u32,
    pub container_port: u32,
    pub evacuating: bool,
    pub modification_tag: Option<ModificationTag>,
}

impl Endpoint {
    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(self.instance_guid.clone(), self.evacuating)
    }

    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }
}
