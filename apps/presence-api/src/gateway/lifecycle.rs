//! Connection lifecycle: connect, join, leave, disconnect.
//!
//! `PresenceTracker` ties the registry, the rooms and the broadcaster together
//! so each signal updates all three as one operation. Lock order is always
//! connection entry, then room shard, then outbox map.

use std::sync::Arc;

use crate::error::PresenceError;

use super::fanout::{OutboxReceiver, PresenceBroadcaster, PresenceUpdate};
use super::ids::{ConnectionId, EventId};
use super::registry::ConnectionRegistry;
use super::rooms::RoomManager;

pub struct PresenceTracker {
    registry: ConnectionRegistry,
    rooms: RoomManager,
    broadcaster: PresenceBroadcaster,
}

impl PresenceTracker {
    pub fn new(outbox_capacity: usize) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomManager::new(),
            broadcaster: PresenceBroadcaster::new(outbox_capacity),
        }
    }

    /// Register a new connection and open its outbound queue.
    pub fn on_connect(&self, connection_id: ConnectionId) -> Result<OutboxReceiver, PresenceError> {
        self.registry.register(connection_id.clone())?;
        let (outbox, receiver) = self.broadcaster.outbox();
        self.broadcaster.attach(connection_id, outbox);
        Ok(receiver)
    }

    /// Add the connection to an event and publish the new count to the room.
    pub fn on_join(&self, connection_id: &ConnectionId, event_id: &EventId) -> Result<usize, PresenceError> {
        self.registry
            .transition(connection_id, |joined| {
                let count = self.rooms.join_then(event_id, connection_id, |members| {
                    self.broadcaster.publish(event_id, members);
                });
                joined.insert(event_id.clone());
                count
            })
            .ok_or_else(|| PresenceError::UnknownConnection(connection_id.clone()))
    }

    /// Remove the connection from an event and publish the new count to the
    /// members that remain.
    pub fn on_leave(&self, connection_id: &ConnectionId, event_id: &EventId) -> Result<usize, PresenceError> {
        self.registry
            .transition(connection_id, |joined| {
                let count = self.rooms.leave_then(event_id, connection_id, |members| {
                    self.broadcaster.publish(event_id, members);
                });
                joined.remove(event_id);
                count
            })
            .ok_or_else(|| PresenceError::UnknownConnection(connection_id.clone()))
    }

    /// Drop the connection from every event it joined, publishing each
    /// affected count. Safe to call more than once.
    pub fn on_disconnect(&self, connection_id: &ConnectionId) -> Vec<PresenceUpdate> {
        let joined = self.registry.unregister(connection_id);
        self.broadcaster.detach(connection_id);

        joined
            .into_iter()
            .map(|event_id| {
                let count = self.rooms.leave_then(&event_id, connection_id, |members| {
                    self.broadcaster.publish(&event_id, members);
                });
                PresenceUpdate { event_id, count }
            })
            .collect()
    }

    /// Open a connection whose cleanup runs when the returned handle drops.
    pub fn connect(self: &Arc<Self>) -> Result<(ConnectionHandle, OutboxReceiver), PresenceError> {
        let connection_id = ConnectionId::allocate();
        let receiver = self.on_connect(connection_id.clone())?;
        let handle = ConnectionHandle {
            tracker: Arc::clone(self),
            connection_id,
        };
        Ok((handle, receiver))
    }

    pub fn count_of(&self, event_id: &EventId) -> usize {
        self.rooms.count_of(event_id)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn event_count(&self) -> usize {
        self.rooms.event_count()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }
}

/// A registered connection. Dropping it runs disconnect cleanup, so a task
/// that panics or is cancelled still removes its viewer from every room.
pub struct ConnectionHandle {
    tracker: Arc<PresenceTracker>,
    connection_id: ConnectionId,
}

impl ConnectionHandle {
    pub fn id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn join(&self, event_id: &EventId) -> Result<usize, PresenceError> {
        self.tracker.on_join(&self.connection_id, event_id)
    }

    pub fn leave(&self, event_id: &EventId) -> Result<usize, PresenceError> {
        self.tracker.on_leave(&self.connection_id, event_id)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        let updates = self.tracker.on_disconnect(&self.connection_id);
        tracing::debug!(
            connection_id = %self.connection_id,
            left_events = updates.len(),
            "presence cleaned up"
        );
    }
}
