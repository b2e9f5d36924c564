//! Registry of live gateway connections and the events each one has joined.
//!
//! The joined-events set is a reverse index over the room memberships, so a
//! disconnect only has to visit the rooms that connection was actually in.

use std::collections::HashSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::PresenceError;

use super::ids::{ConnectionId, EventId};

/// Per-connection bookkeeping.
pub struct ConnectionEntry {
    pub joined_events: HashSet<EventId>,
}

/// Shared registry of every live connection.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
/// entry so a join or leave can hold the connection steady while it touches
/// the room it targets.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Mutex<ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a freshly accepted connection with no joined events.
    pub fn register(&self, connection_id: ConnectionId) -> Result<(), PresenceError> {
        match self.connections.entry(connection_id) {
            Entry::Occupied(existing) => {
                Err(PresenceError::DuplicateConnection(existing.key().clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(Mutex::new(ConnectionEntry {
                    joined_events: HashSet::new(),
                }));
                Ok(())
            }
        }
    }

    /// Remove a connection and hand back the events it had joined.
    ///
    /// Calling this for an id that is already gone returns an empty set.
    pub fn unregister(&self, connection_id: &ConnectionId) -> HashSet<EventId> {
        self.connections
            .remove(connection_id)
            .map(|(_, entry)| entry.into_inner().joined_events)
            .unwrap_or_default()
    }

    /// Run `f` against the connection's joined-events set while holding its
    /// entry lock. Returns `None` if the connection is not registered.
    ///
    /// `unregister` cannot complete while a transition is running, so anything
    /// `f` does to the rooms is visible to the disconnect that follows it.
    /// `f` must not call back into the registry.
    pub fn transition<R>(
        &self,
        connection_id: &ConnectionId,
        f: impl FnOnce(&mut HashSet<EventId>) -> R,
    ) -> Option<R> {
        let entry = self.connections.get(connection_id)?;
        let mut e = entry.lock();
        Some(f(&mut e.joined_events))
    }

    /// Note that the connection joined `event_id`. Returns `false` for an
    /// unknown connection.
    ///
    /// This only updates the reverse index. The lifecycle handler does not use
    /// it: it goes through [`transition`](Self::transition) so the room change
    /// happens under the same entry lock.
    pub fn record_join(&self, connection_id: &ConnectionId, event_id: EventId) -> bool {
        self.transition(connection_id, |joined| {
            joined.insert(event_id);
        })
        .is_some()
    }

    /// Note that the connection left `event_id`. Returns `false` for an
    /// unknown connection.
    pub fn record_leave(&self, connection_id: &ConnectionId, event_id: &EventId) -> bool {
        self.transition(connection_id, |joined| {
            joined.remove(event_id);
        })
        .is_some()
    }

    /// Snapshot of the events a connection has joined.
    pub fn joined_events(&self, connection_id: &ConnectionId) -> Option<HashSet<EventId>> {
        let entry = self.connections.get(connection_id)?;
        let e = entry.lock();
        Some(e.joined_events.clone())
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(ids: &[&str]) -> HashSet<EventId> {
        ids.iter().map(|s| EventId::from(*s)).collect()
    }

    #[test]
    fn register_starts_with_no_joined_events() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::from("conn_a");

        registry.register(conn.clone()).unwrap();

        assert!(registry.contains(&conn));
        assert_eq!(registry.len(), 1);
        assert!(registry.joined_events(&conn).unwrap().is_empty());
    }

    #[test]
    fn register_twice_is_an_invariant_violation() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::from("conn_a");
        registry.register(conn.clone()).unwrap();
        registry.record_join(&conn, EventId::from("evt1"));

        let err = registry.register(conn.clone()).unwrap_err();
        assert!(matches!(err, PresenceError::DuplicateConnection(ref id) if *id == conn));

        // The original entry is untouched.
        assert_eq!(registry.joined_events(&conn).unwrap(), events(&["evt1"]));
    }

    #[test]
    fn unregister_returns_joined_events_and_removes_connection() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::from("conn_a");
        registry.register(conn.clone()).unwrap();
        registry.record_join(&conn, EventId::from("evt1"));
        registry.record_join(&conn, EventId::from("evt2"));

        assert_eq!(registry.unregister(&conn), events(&["evt1", "evt2"]));
        assert!(!registry.contains(&conn));
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_twice_returns_empty_set() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::from("conn_a");
        registry.register(conn.clone()).unwrap();
        registry.record_join(&conn, EventId::from("evt1"));

        registry.unregister(&conn);
        assert!(registry.unregister(&conn).is_empty());
    }

    #[test]
    fn record_leave_updates_reverse_index() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::from("conn_a");
        registry.register(conn.clone()).unwrap();

        assert!(registry.record_join(&conn, EventId::from("evt1")));
        assert!(registry.record_join(&conn, EventId::from("evt2")));
        assert!(registry.record_leave(&conn, &EventId::from("evt1")));

        assert_eq!(registry.joined_events(&conn).unwrap(), events(&["evt2"]));
    }

    #[test]
    fn record_on_unknown_connection_reports_false() {
        let registry = ConnectionRegistry::new();
        let ghost = ConnectionId::from("conn_ghost");

        assert!(!registry.record_join(&ghost, EventId::from("evt1")));
        assert!(!registry.record_leave(&ghost, &EventId::from("evt1")));
        assert!(registry.transition(&ghost, |_| ()).is_none());
        assert!(registry.is_empty());
    }
}
