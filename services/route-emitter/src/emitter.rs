//! Delivery of registry messages to the router.

use async_trait::async_trait;
use cellroute_routing_table::MessagesToEmit;
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by a [`MessageEmitter`].
#[derive(Debug, Error)]
pub enum EmitError {
    /// The messages could not be encoded.
    #[error("failed to encode registry message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport rejected or dropped the messages.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Sends registration and unregistration messages downstream.
#[async_trait]
pub trait MessageEmitter: Send + Sync {
    /// Emit one delta. Empty deltas are never passed in.
    async fn emit(&self, messages: &MessagesToEmit) -> Result<(), EmitError>;
}

/// Emitter that writes every message to the log instead of a router.
#[derive(Debug, Default)]
pub struct LogEmitter;

impl LogEmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageEmitter for LogEmitter {
    async fn emit(&self, messages: &MessagesToEmit) -> Result<(), EmitError> {
        for message in &messages.registration_messages {
            let body = serde_json::to_string(message)?;
            debug!(subject = "router.register", body = %body, "Emitting message");
        }
        for message in &messages.unregistration_messages {
            let body = serde_json::to_string(message)?;
            debug!(subject = "router.unregister", body = %body, "Emitting message");
        }

        info!(
            registrations = messages.route_registration_count(),
            unregistrations = messages.route_unregistration_count(),
            "Emitted registry messages"
        );

        Ok(())
    }
}
