//! Errors raised while building a table snapshot.

use thiserror::Error;

/// Errors that can occur when turning store records into endpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingTableError {
    /// The actual LRP has no host port mappings, so there is nothing to route to.
    #[error("actual lrp {process_guid} at index {index} has no port mappings")]
    NoPortMappings { process_guid: String, index: i32 },
}
