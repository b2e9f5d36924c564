//! Gateway signal names and wire-format messages.
//!
//! Every frame is a JSON text message of the form `{"t": <signal>, "d": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fanout::PresenceUpdate;
use super::ids::EventId;

// ---------------------------------------------------------------------------
// Close codes (4000-range for application-level)
// ---------------------------------------------------------------------------

pub const CLOSE_UNKNOWN_ERROR: u16 = 4000;
pub const CLOSE_UNKNOWN_SIGNAL: u16 = 4001;
pub const CLOSE_SESSION_TIMEOUT: u16 = 4009;

// ---------------------------------------------------------------------------
// Signal names
// ---------------------------------------------------------------------------

pub struct SignalName;

impl SignalName {
    pub const JOIN_EVENT: &'static str = "join_event";
    pub const LEAVE_EVENT: &'static str = "leave_event";
    pub const UPDATE_ATTENDEES: &'static str = "update_attendees";
}

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayMessage {
    pub t: &'static str,
    pub d: Value,
}

impl GatewayMessage {
    /// Build an `update_attendees` message carrying `{eventId, count}`.
    pub fn update_attendees(update: &PresenceUpdate) -> Self {
        Self {
            t: SignalName::UPDATE_ATTENDEES,
            d: serde_json::json!({
                "eventId": update.event_id,
                "count": update.count,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub t: String,
    #[serde(default)]
    pub d: Value,
}

// ---------------------------------------------------------------------------
// join_event / leave_event payload
// ---------------------------------------------------------------------------

/// Either a bare id (`"evt1"`, `42`) or `{"eventId": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EventRef {
    Bare(EventId),
    Object {
        #[serde(rename = "eventId", alias = "event_id")]
        event_id: EventId,
    },
}

impl EventRef {
    pub fn into_event_id(self) -> EventId {
        match self {
            EventRef::Bare(id) => id,
            EventRef::Object { event_id } => event_id,
        }
    }
}
