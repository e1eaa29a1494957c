//! # cellroute-models
//!
//! Records consumed by the route-emitter from the desired/actual state store.
//!
//! ## Design Principles
//!
//! - Records are plain serde values that mirror the store's JSON shapes
//! - Ordering between updates is expressed with [`ModificationTag`]s
//! - Freshness of a bulk listing is expressed with a [`DomainSet`]
//!
//! ## Event Types
//!
//! The store publishes one event stream with six kinds of events:
//! - Desired LRP events (`desired_lrp.*`)
//! - Actual LRP events (`actual_lrp.*`)
//!
//! Events arrive wrapped in an [`EventEnvelope`] carrying a monotonic
//! `event_id` used as the polling cursor.

mod domain;
mod error;
mod events;
mod tag;
mod types;

pub use domain::DomainSet;
pub use error::ModelError;
pub use events::*;
pub use tag::ModificationTag;
pub use types::*;
