//! # cellroute-route-emitter
//!
//! Keeps a router's registration table in sync with where LRP instances
//! actually run.
//!
//! The service:
//! - Periodically fetches full desired/actual state and swaps it into the
//!   shared [`RoutingTable`](cellroute_routing_table::RoutingTable)
//! - Tails the store's event feed and applies each change incrementally
//! - Hands every registration/unregistration delta to a [`MessageEmitter`]
//! - Optionally re-emits the whole table on a fixed interval

pub mod config;
pub mod emitter;
pub mod metrics;
pub mod source;
pub mod sync;
pub mod watcher;

pub use config::Config;
pub use emitter::{EmitError, LogEmitter, MessageEmitter};
pub use metrics::{EmitterMetrics, EmitterStats};
pub use source::{HttpStateSource, StateSource};
pub use watcher::Watcher;
