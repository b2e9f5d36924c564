//! Per-event room membership and attendee counts.

use std::collections::HashSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::ids::{ConnectionId, EventId};

/// The connections currently present at one event.
#[derive(Debug, Default)]
pub struct EventPresenceSet {
    members: HashSet<ConnectionId>,
}

impl EventPresenceSet {
    /// Attendee count, always the size of the live set.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains(connection_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionId> {
        self.members.iter()
    }
}

/// Authoritative room memberships, keyed by event.
///
/// A mutation holds the event's shard write lock from the set change through
/// the `committed` callback, so whatever the callback observes (and sends) is
/// ordered the same way the mutations were applied. Rooms are dropped as soon
/// as they become empty.
pub struct RoomManager {
    rooms: DashMap<EventId, EventPresenceSet>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add a connection to an event. Joining twice leaves the count unchanged.
    pub fn join(&self, event_id: &EventId, connection_id: &ConnectionId) -> usize {
        self.join_then(event_id, connection_id, |_| ())
    }

    /// Remove a connection from an event. Leaving a room the connection never
    /// joined is a no-op that reports the current count.
    pub fn leave(&self, event_id: &EventId, connection_id: &ConnectionId) -> usize {
        self.leave_then(event_id, connection_id, |_| ())
    }

    /// Like [`join`](Self::join), then runs `committed` with the resulting set
    /// before the room is unlocked.
    pub fn join_then<F>(&self, event_id: &EventId, connection_id: &ConnectionId, committed: F) -> usize
    where
        F: FnOnce(&EventPresenceSet),
    {
        let mut room = self.rooms.entry(event_id.clone()).or_default();
        room.members.insert(connection_id.clone());
        committed(room.value());
        room.count()
    }

    /// Like [`leave`](Self::leave), then runs `committed` with the resulting
    /// set before the room is unlocked. An emptied room is pruned afterwards.
    pub fn leave_then<F>(&self, event_id: &EventId, connection_id: &ConnectionId, committed: F) -> usize
    where
        F: FnOnce(&EventPresenceSet),
    {
        match self.rooms.entry(event_id.clone()) {
            Entry::Occupied(mut room) => {
                room.get_mut().members.remove(connection_id);
                committed(room.get());
                let count = room.get().count();
                if count == 0 {
                    room.remove();
                }
                count
            }
            Entry::Vacant(_) => {
                committed(&EventPresenceSet::default());
                0
            }
        }
    }

    /// Current attendee count. Unknown or pruned events report 0.
    pub fn count_of(&self, event_id: &EventId) -> usize {
        self.rooms.get(event_id).map(|room| room.count()).unwrap_or(0)
    }

    /// Snapshot of the connections present at an event.
    pub fn members(&self, event_id: &EventId) -> Vec<ConnectionId> {
        self.rooms
            .get(event_id)
            .map(|room| room.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of events with at least one connection present.
    pub fn event_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
