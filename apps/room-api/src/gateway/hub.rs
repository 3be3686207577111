//! Connection-level pub/sub fan-out.
//!
//! One logical channel per room id, created lazily on first subscribe and
//! garbage-collected when its subscriber set empties. The hub performs no
//! business validation — admission is the registry integration's job — and
//! raises no errors: delivery is best-effort, fire-and-forget per
//! subscriber.
//!
//! Per-channel ordering: publishes to a channel are serialized on the
//! channel entry, and each subscriber's outbound queue preserves enqueue
//! order, so every subscriber observes events on one channel in publish
//! order.

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::models::room::RoomKind;

use super::events::ServerEvent;

/// Identifies one live gateway connection.
pub type ConnectionId = String;

/// Outbound queue handle for a connection. Sends never block; events are
/// dropped only when the receiving session loop has already gone away.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// The deployment-topology seam: the rest of the service talks to this
/// trait, so a multi-instance deployment can swap the in-process fan-out
/// for a shared pub/sub backbone without touching registry or synchronizer
/// logic.
pub trait BroadcastHub: Send + Sync {
    /// Attach a connection's outbound queue. Must be called before any
    /// subscribe for that connection.
    fn register(&self, conn_id: &str, sender: EventSender);

    /// Subscribe a connection to a channel. A connection holds at most one
    /// channel per room kind; a same-kind re-subscribe implicitly
    /// unsubscribes the previous channel.
    fn subscribe(&self, conn_id: &str, kind: RoomKind, channel_id: &str);

    /// No-op when the connection is not subscribed.
    fn unsubscribe(&self, conn_id: &str, channel_id: &str);

    /// Deliver `event` to every current subscriber except `exclude`.
    /// Publishing to a channel with no subscribers is a silent no-op.
    fn publish(&self, channel_id: &str, event: ServerEvent, exclude: Option<&str>);

    /// Tear the channel down: every subscriber receives an `evicted` event
    /// and is detached. Returns the number of evicted subscribers.
    fn force_evict(&self, channel_id: &str, reason: &str) -> usize;

    /// Detach a closed connection from every channel it was subscribed to.
    /// This is the sole cleanup path for dropped clients.
    fn remove(&self, conn_id: &str);
}

// ---------------------------------------------------------------------------
// In-process implementation
// ---------------------------------------------------------------------------

/// One kind-slot per connection: chat and code subscriptions coexist, two
/// subscriptions of the same kind do not.
fn slot(kind: RoomKind) -> usize {
    match kind {
        RoomKind::Chat => 0,
        RoomKind::Code => 1,
    }
}

struct ConnEntry {
    sender: EventSender,
    slots: [Option<String>; 2],
}

struct ChannelState {
    subscribers: HashMap<ConnectionId, EventSender>,
}

/// Process-local hub: state lives for the process lifetime and resets on
/// restart.
pub struct InProcessHub {
    connections: DashMap<ConnectionId, ConnEntry>,
    channels: DashMap<String, ChannelState>,
}

impl InProcessHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            channels: DashMap::new(),
        }
    }

    pub fn subscriber_count(&self, channel_id: &str) -> usize {
        self.channels
            .get(channel_id)
            .map(|ch| ch.subscribers.len())
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Remove a connection from a channel's subscriber map, collecting the
    /// channel when it empties. Does not touch kind slots.
    fn detach(&self, conn_id: &str, channel_id: &str) {
        let emptied = match self.channels.get_mut(channel_id) {
            Some(mut ch) => {
                ch.subscribers.remove(conn_id);
                ch.subscribers.is_empty()
            }
            None => false,
        };
        if emptied {
            self.channels
                .remove_if(channel_id, |_, ch| ch.subscribers.is_empty());
        }
    }

    fn clear_slot(&self, conn_id: &str, channel_id: &str) {
        if let Some(mut entry) = self.connections.get_mut(conn_id) {
            for s in entry.slots.iter_mut() {
                if s.as_deref() == Some(channel_id) {
                    *s = None;
                }
            }
        }
    }
}

impl Default for InProcessHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub for InProcessHub {
    fn register(&self, conn_id: &str, sender: EventSender) {
        self.connections.insert(
            conn_id.to_string(),
            ConnEntry {
                sender,
                slots: [None, None],
            },
        );
    }

    fn subscribe(&self, conn_id: &str, kind: RoomKind, channel_id: &str) {
        // One map lock at a time: take what we need from the connection
        // entry, then work the channel map.
        let (sender, previous) = match self.connections.get_mut(conn_id) {
            Some(mut entry) => {
                let previous = entry.slots[slot(kind)].replace(channel_id.to_string());
                (entry.sender.clone(), previous)
            }
            None => return, // never registered; nothing to subscribe
        };

        if let Some(previous) = previous {
            if previous != channel_id {
                self.detach(conn_id, &previous);
            }
        }

        self.channels
            .entry(channel_id.to_string())
            .or_insert_with(|| ChannelState {
                subscribers: HashMap::new(),
            })
            .subscribers
            .insert(conn_id.to_string(), sender);
    }

    fn unsubscribe(&self, conn_id: &str, channel_id: &str) {
        self.detach(conn_id, channel_id);
        self.clear_slot(conn_id, channel_id);
    }

    fn publish(&self, channel_id: &str, event: ServerEvent, exclude: Option<&str>) {
        // get_mut serializes publishes on this channel, which is what keeps
        // per-subscriber delivery in publish order.
        let Some(channel) = self.channels.get_mut(channel_id) else {
            return;
        };
        for (conn_id, sender) in &channel.subscribers {
            if exclude == Some(conn_id.as_str()) {
                continue;
            }
            let _ = sender.send(event.clone());
        }
    }

    fn force_evict(&self, channel_id: &str, reason: &str) -> usize {
        let Some((_, channel)) = self.channels.remove(channel_id) else {
            return 0;
        };
        let evicted = channel.subscribers.len();
        for (conn_id, sender) in &channel.subscribers {
            let _ = sender.send(ServerEvent::Evicted {
                room_id: channel_id.to_string(),
                reason: reason.to_string(),
            });
            self.clear_slot(conn_id, channel_id);
        }
        evicted
    }

    fn remove(&self, conn_id: &str) {
        let Some((_, entry)) = self.connections.remove(conn_id) else {
            return;
        };
        for channel_id in entry.slots.into_iter().flatten() {
            self.detach(conn_id, &channel_id);
        }
    }
}
