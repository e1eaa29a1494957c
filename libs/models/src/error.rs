//! Error types for decoding store records and events.

use thiserror::Error;

/// Errors that can occur when decoding records and events.
#[derive(Debug, Error, Clone)]
pub enum ModelError {
    /// The event type is unknown.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The event carried no payload.
    #[error("event {event_id} ({event_type}) is missing its payload")]
    MissingPayload { event_id: i64, event_type: String },

    /// The event payload is invalid.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
