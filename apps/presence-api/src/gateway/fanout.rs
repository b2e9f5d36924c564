//! Room-scoped fanout of attendee count updates.
//!
//! Every connection owns a bounded outbound queue. Publishing enqueues the
//! update onto the queues of the room's members only and never waits: a full
//! or closed queue drops that single update and the next publish carries the
//! current count anyway.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::ids::{ConnectionId, EventId};
use super::rooms::EventPresenceSet;

/// Default capacity of a connection's outbound queue.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Attendee count for one event, as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub event_id: EventId,
    pub count: usize,
}

pub type Outbox = mpsc::Sender<Arc<PresenceUpdate>>;
pub type OutboxReceiver = mpsc::Receiver<Arc<PresenceUpdate>>;

pub struct PresenceBroadcaster {
    outboxes: DashMap<ConnectionId, Outbox>,
    capacity: usize,
}

impl PresenceBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            outboxes: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Create an outbound queue sized for this broadcaster.
    pub fn outbox(&self) -> (Outbox, OutboxReceiver) {
        mpsc::channel(self.capacity)
    }

    /// Start delivering updates for `connection_id` into `outbox`.
    pub fn attach(&self, connection_id: ConnectionId, outbox: Outbox) {
        self.outboxes.insert(connection_id, outbox);
    }

    /// Stop delivering to a connection. Dropping the sender lets the
    /// connection's receiver drain and then observe the close.
    pub fn detach(&self, connection_id: &ConnectionId) {
        self.outboxes.remove(connection_id);
    }

    /// Enqueue the room's current count for each of its members.
    ///
    /// Returns how many members the update was queued for.
    pub fn publish(&self, event_id: &EventId, members: &EventPresenceSet) -> usize {
        let update = Arc::new(PresenceUpdate {
            event_id: event_id.clone(),
            count: members.count(),
        });

        let mut delivered = 0;
        for connection_id in members.iter() {
            let Some(outbox) = self.outboxes.get(connection_id) else {
                continue;
            };
            match outbox.try_send(update.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        event_id = %event_id,
                        count = update.count,
                        "outbox full, dropping attendee update"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        event_id = %event_id,
                        "outbox closed, skipping attendee update"
                    );
                }
            }
        }
        delivered
    }

    /// Number of connections with an attached outbox.
    pub fn attached(&self) -> usize {
        self.outboxes.len()
    }
}

impl Default for PresenceBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}
