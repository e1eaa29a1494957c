//! LRP change events and the envelope they travel in.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::{ActualLrpRoutingInfo, DesiredLrpSchedulingInfo};

/// All event type names as constants.
pub mod event_types {
    // Desired LRP
    pub const DESIRED_LRP_CREATED: &str = "desired_lrp.created";
    pub const DESIRED_LRP_CHANGED: &str = "desired_lrp.changed";
    pub const DESIRED_LRP_REMOVED: &str = "desired_lrp.removed";

    // Actual LRP
    pub const ACTUAL_LRP_CREATED: &str = "actual_lrp.created";
    pub const ACTUAL_LRP_CHANGED: &str = "actual_lrp.changed";
    pub const ACTUAL_LRP_REMOVED: &str = "actual_lrp.removed";
}

// -----------------------------------------------------------------------------
// Payloads
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLrpCreatedPayload {
    pub desired_lrp: DesiredLrpSchedulingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLrpChangedPayload {
    pub before: DesiredLrpSchedulingInfo,
    pub after: DesiredLrpSchedulingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLrpRemovedPayload {
    pub desired_lrp: DesiredLrpSchedulingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrpCreatedPayload {
    pub actual_lrp: ActualLrpRoutingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrpChangedPayload {
    pub before: ActualLrpRoutingInfo,
    pub after: ActualLrpRoutingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrpRemovedPayload {
    pub actual_lrp: ActualLrpRoutingInfo,
}

// -----------------------------------------------------------------------------
// Events
// -----------------------------------------------------------------------------

/// A decoded LRP change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LrpEvent {
    DesiredCreated(DesiredLrpSchedulingInfo),
    DesiredChanged {
        before: DesiredLrpSchedulingInfo,
        after: DesiredLrpSchedulingInfo,
    },
    DesiredRemoved(DesiredLrpSchedulingInfo),
    ActualCreated(ActualLrpRoutingInfo),
    ActualChanged {
        before: ActualLrpRoutingInfo,
        after: ActualLrpRoutingInfo,
    },
    ActualRemoved(ActualLrpRoutingInfo),
}

impl LrpEvent {
    /// Decodes an event payload given its wire type name.
    pub fn decode(event_type: &str, payload: serde_json::Value) -> Result<Self, ModelError> {
        use event_types::*;

        let event = match event_type {
            DESIRED_LRP_CREATED => {
                let p: DesiredLrpCreatedPayload = from_payload(event_type, payload)?;
                LrpEvent::DesiredCreated(p.desired_lrp)
            }
            DESIRED_LRP_CHANGED => {
                let p: DesiredLrpChangedPayload = from_payload(event_type, payload)?;
                LrpEvent::DesiredChanged {
                    before: p.before,
                    after: p.after,
                }
            }
            DESIRED_LRP_REMOVED => {
                let p: DesiredLrpRemovedPayload = from_payload(event_type, payload)?;
                LrpEvent::DesiredRemoved(p.desired_lrp)
            }
            ACTUAL_LRP_CREATED => {
                let p: ActualLrpCreatedPayload = from_payload(event_type, payload)?;
                LrpEvent::ActualCreated(p.actual_lrp)
            }
            ACTUAL_LRP_CHANGED => {
                let p: ActualLrpChangedPayload = from_payload(event_type, payload)?;
                LrpEvent::ActualChanged {
                    before: p.before,
                    after: p.after,
                }
            }
            ACTUAL_LRP_REMOVED => {
                let p: ActualLrpRemovedPayload = from_payload(event_type, payload)?;
                LrpEvent::ActualRemoved(p.actual_lrp)
            }
            other => return Err(ModelError::UnknownEventType(other.to_string())),
        };

        Ok(event)
    }

    /// Identity of the record this event is about.
    ///
    /// Desired events are keyed by process guid, actual events by instance
    /// guid and evacuation flag; a later event for the same record
    /// supersedes an earlier one.
    pub fn key(&self) -> String {
        match self {
            LrpEvent::DesiredCreated(d) | LrpEvent::DesiredRemoved(d) => {
                format!("desired:{}", d.process_guid)
            }
            LrpEvent::DesiredChanged { before, .. } => format!("desired:{}", before.process_guid),
            LrpEvent::ActualCreated(a) | LrpEvent::ActualRemoved(a) => actual_key(a),
            LrpEvent::ActualChanged { before, .. } => actual_key(before),
        }
    }

    /// The wire type name of this event.
    pub fn event_type(&self) -> &'static str {
        use event_types::*;

        match self {
            LrpEvent::DesiredCreated(_) => DESIRED_LRP_CREATED,
            LrpEvent::DesiredChanged { .. } => DESIRED_LRP_CHANGED,
            LrpEvent::DesiredRemoved(_) => DESIRED_LRP_REMOVED,
            LrpEvent::ActualCreated(_) => ACTUAL_LRP_CREATED,
            LrpEvent::ActualChanged { .. } => ACTUAL_LRP_CHANGED,
            LrpEvent::ActualRemoved(_) => ACTUAL_LRP_REMOVED,
        }
    }
}

fn actual_key(info: &ActualLrpRoutingInfo) -> String {
    format!("actual:{}:{}", info.actual_lrp.instance_guid, info.evacuating)
}

fn from_payload<T: serde::de::DeserializeOwned>(
    event_type: &str,
    payload: serde_json::Value,
) -> Result<T, ModelError> {
    serde_json::from_value(payload)
        .map_err(|e| ModelError::InvalidPayload(format!("{event_type}: {e}")))
}

// -----------------------------------------------------------------------------
// Envelope
// -----------------------------------------------------------------------------

/// An event as it appears on the store's event feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Globally monotonic event identifier, used as the polling cursor.
    pub event_id: i64,

    /// The event type (e.g., "desired_lrp.created").
    pub event_type: String,

    /// Event-specific payload.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl EventEnvelope {
    /// Decodes the payload into an [`LrpEvent`].
    pub fn decode(self) -> Result<LrpEvent, ModelError> {
        let Some(payload) = self.payload else {
            return Err(ModelError::MissingPayload {
                event_id: self.event_id,
                event_type: self.event_type,
            });
        };

        LrpEvent::decode(&self.event_type, payload)
    }
}

/// One page of the event feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPage {
    pub items: Vec<EventEnvelope>,
    pub next_after_event_id: i64,
}
