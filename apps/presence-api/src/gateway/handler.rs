//! Inbound signal dispatch: join_event, leave_event, and unknown signals.

use crate::error::PresenceError;

use super::events::{ClientMessage, EventRef, SignalName};
use super::lifecycle::ConnectionHandle;

/// Why a client message ended the connection.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown signal `{0}`")]
    UnknownSignal(String),

    #[error(transparent)]
    Presence(#[from] PresenceError),
}

/// Apply one decoded client message to the connection's presence.
///
/// Payloads that do not name an event are dropped without closing the
/// connection; the client simply gets no update.
pub fn handle_client_message(
    handle: &ConnectionHandle,
    msg: ClientMessage,
) -> Result<(), DispatchError> {
    let join = match msg.t.as_str() {
        SignalName::JOIN_EVENT => Some(true),
        SignalName::LEAVE_EVENT => Some(false),
        _ => None,
    };
    let Some(join) = join else {
        return Err(DispatchError::UnknownSignal(msg.t));
    };

    let event_id = match serde_json::from_value::<EventRef>(msg.d) {
        Ok(event_ref) => event_ref.into_event_id(),
        Err(_) => {
            tracing::debug!(connection_id = %handle.id(), signal = %msg.t, "signal without event id ignored");
            return Ok(());
        }
    };
    if event_id.is_empty() {
        tracing::debug!(connection_id = %handle.id(), signal = %msg.t, "blank event id ignored");
        return Ok(());
    }

    let count = if join {
        handle.join(&event_id)?
    } else {
        handle.leave(&event_id)?
    };

    tracing::debug!(
        connection_id = %handle.id(),
        event_id = %event_id,
        signal = %msg.t,
        count,
        "presence updated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateway::ids::EventId;
    use crate::gateway::lifecycle::PresenceTracker;

    fn message(t: &str, d: serde_json::Value) -> ClientMessage {
        ClientMessage { t: t.to_string(), d }
    }

    #[test]
    fn join_and_leave_signals_drive_the_tracker() {
        let tracker = Arc::new(PresenceTracker::new(16));
        let (handle, mut rx) = tracker.connect().unwrap();
        let evt = EventId::from("evt1");

        handle_client_message(&handle, message("join_event", serde_json::json!("evt1"))).unwrap();
        assert_eq!(tracker.count_of(&evt), 1);
        assert_eq!(rx.try_recv().unwrap().count, 1);

        handle_client_message(&handle, message("leave_event", serde_json::json!({ "eventId": "evt1" })))
            .unwrap();
        assert_eq!(tracker.count_of(&evt), 0);
    }

    #[test]
    fn numeric_event_ids_address_the_same_room_as_strings() {
        let tracker = Arc::new(PresenceTracker::new(16));
        let (a, _rx_a) = tracker.connect().unwrap();
        let (b, _rx_b) = tracker.connect().unwrap();

        handle_client_message(&a, message("join_event", serde_json::json!(42))).unwrap();
        handle_client_message(&b, message("join_event", serde_json::json!("42"))).unwrap();
        assert_eq!(tracker.count_of(&EventId::from("42")), 2);
    }

    #[test]
    fn unknown_signal_is_an_error() {
        let tracker = Arc::new(PresenceTracker::new(16));
        let (handle, _rx) = tracker.connect().unwrap();

        let err = handle_client_message(&handle, message("subscribe", serde_json::json!("evt1"))).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownSignal(ref t) if t == "subscribe"));
        assert_eq!(tracker.event_count(), 0);
    }

    #[test]
    fn missing_or_blank_event_id_is_ignored() {
        let tracker = Arc::new(PresenceTracker::new(16));
        let (handle, _rx) = tracker.connect().unwrap();

        handle_client_message(&handle, message("join_event", serde_json::Value::Null)).unwrap();
        handle_client_message(&handle, message("join_event", serde_json::json!(""))).unwrap();
        handle_client_message(&handle, message("join_event", serde_json::json!({ "id": 1 }))).unwrap();
        assert_eq!(tracker.event_count(), 0);
    }
}
