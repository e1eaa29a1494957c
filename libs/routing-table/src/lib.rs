//! # cellroute-routing-table
//!
//! Maps routes to the live instances that should receive their traffic,
//! and computes the registration/unregistration messages that keep a
//! downstream router consistent.
//!
//! ## Invariants
//!
//! - Every table operation is serialized by one lock and returns the delta
//!   to emit; an empty delta is a normal result
//! - Updates carrying a stale [`ModificationTag`](cellroute_models::ModificationTag)
//!   are dropped silently
//! - A bulk [`RoutingTable::swap`] never tears down routes for endpoints
//!   whose domain is not fresh
//! - An instance and its evacuating copy are separate endpoints, but either
//!   one keeps the other's routes registered
//!
//! ## Usage
//!
//! Incremental events call [`RoutingTable::set_routes`],
//! [`RoutingTable::remove_routes`], [`RoutingTable::add_endpoint`] and
//! [`RoutingTable::remove_endpoint`]. A periodic sync builds a [`TempTable`]
//! from full listings and hands it to [`RoutingTable::swap`].

mod by_routing_key;
mod endpoint;
mod entry;
mod error;
mod message;
pub mod message_builder;
mod table;
mod temp_table;

pub use by_routing_key::*;
pub use endpoint::{Address, Endpoint, EndpointKey, Route, RoutingKey};
pub use entry::RoutableEndpoints;
pub use error::RoutingTableError;
pub use message::{MessagesToEmit, RegistryMessage, COMPONENT_TAG};
pub use table::{RoutingTable, RoutingTableStats, TableSnapshot};
pub use temp_table::TempTable;
