//! Desired and actual LRP records.
//!
//! Only the fields the route-emitter reads are modelled; unknown fields in
//! the store's JSON are ignored.

use serde::{Deserialize, Serialize};

use crate::tag::ModificationTag;

// =============================================================================
// Desired State
// =============================================================================

/// One HTTP route declaration of a desired LRP.
///
/// All hostnames share the container port and route service binding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CfRoute {
    pub hostnames: Vec<String>,
    pub port: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub route_service_url: String,
}

/// Scheduling view of a desired LRP: identity, scale and routes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DesiredLrpSchedulingInfo {
    pub process_guid: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub log_guid: String,
    #[serde(default)]
    pub instances: i32,
    #[serde(default)]
    pub routes: Vec<CfRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_tag: Option<ModificationTag>,
}

impl DesiredLrpSchedulingInfo {
    /// Distinct container ports referenced by this record's routes, in
    /// declaration order.
    pub fn container_ports(&self) -> Vec<u32> {
        let mut ports = Vec::new();
        for route in &self.routes {
            if !ports.contains(&route.port) {
                ports.push(route.port);
            }
        }
        ports
    }
}

// =============================================================================
// Actual State
// =============================================================================

/// Lifecycle state of an actual LRP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActualLrpState {
    #[default]
    Unclaimed,
    Claimed,
    Running,
    Crashed,
}

impl std::fmt::Display for ActualLrpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActualLrpState::Unclaimed => "UNCLAIMED",
            ActualLrpState::Claimed => "CLAIMED",
            ActualLrpState::Running => "RUNNING",
            ActualLrpState::Crashed => "CRASHED",
        };
        write!(f, "{}", s)
    }
}

/// Host port mapped onto a container port by the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u32,
    pub host_port: u32,
}

impl PortMapping {
    pub fn new(host_port: u32, container_port: u32) -> Self {
        Self {
            container_port,
            host_port,
        }
    }
}

/// One running (or starting, or crashed) instance of a desired LRP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActualLrp {
    pub process_guid: String,
    pub index: i32,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub instance_guid: String,
    #[serde(default)]
    pub cell_id: String,
    /// Host address of the cell running the instance.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub state: ActualLrpState,
    #[serde(default)]
    pub modification_tag: ModificationTag,
}

impl ActualLrp {
    pub fn is_running(&self) -> bool {
        self.state == ActualLrpState::Running
    }
}

/// An actual LRP together with whether it is the evacuating copy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActualLrpRoutingInfo {
    pub actual_lrp: ActualLrp,
    #[serde(default)]
    pub evacuating: bool,
}

impl ActualLrpRoutingInfo {
    pub fn new(actual_lrp: ActualLrp, evacuating: bool) -> Self {
        Self {
            actual_lrp,
            evacuating,
        }
    }
}
