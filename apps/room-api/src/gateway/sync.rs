//! Shared document synchronizer for code rooms.
//!
//! One mutable text buffer per room, converged last-write-wins: a
//! propagated edit replaces the buffer wholesale, and concurrent edits
//! inside one debounce window overwrite each other — an accepted
//! limitation of this design, not something to merge or reconcile.
//!
//! Propagation is bounded-debounced: the timer arms on the idle→pending
//! transition and is never reset by later edits, so a room fans out at
//! most one `code-updated` per interval no matter how fast people type.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::ApiError;
use crate::store::DocumentStore;

use super::events::ServerEvent;
use super::hub::BroadcastHub;

struct DocState {
    content: String,
    last_editor: String,
    last_conn: String,
    /// True while a propagation timer is armed for this room.
    pending: bool,
}

impl DocState {
    fn seeded(content: String) -> Self {
        Self {
            content,
            last_editor: String::new(),
            last_conn: String::new(),
            pending: false,
        }
    }
}

pub struct DocumentSynchronizer {
    hub: Arc<dyn BroadcastHub>,
    store: Arc<dyn DocumentStore>,
    debounce: Duration,
    rooms: Arc<DashMap<String, Mutex<DocState>>>,
}

impl DocumentSynchronizer {
    pub fn new(
        hub: Arc<dyn BroadcastHub>,
        store: Arc<dyn DocumentStore>,
        debounce: Duration,
    ) -> Self {
        Self {
            hub,
            store,
            debounce,
            rooms: Arc::new(DashMap::new()),
        }
    }

    /// Current buffer for a room, seeding the in-memory state from the
    /// durable copy on first touch.
    pub async fn snapshot(&self, room_id: &str) -> Result<String, ApiError> {
        if let Some(state) = self.rooms.get(room_id) {
            return Ok(state.lock().content.clone());
        }
        let stored = self.store.load(room_id).await?.unwrap_or_default();
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Mutex::new(DocState::seeded(stored.clone())));
        Ok(stored)
    }

    /// Apply an edit from a connected editor. The buffer is replaced
    /// immediately; propagation waits for the debounce timer, which later
    /// edits in the same window do not reset.
    pub fn apply_local_edit(&self, room_id: &str, content: String, editor_id: &str, conn_id: &str) {
        let arm = {
            let state = self
                .rooms
                .entry(room_id.to_string())
                .or_insert_with(|| Mutex::new(DocState::seeded(String::new())));
            let mut doc = state.lock();
            doc.content = content;
            doc.last_editor = editor_id.to_string();
            doc.last_conn = conn_id.to_string();
            if doc.pending {
                false
            } else {
                doc.pending = true;
                true
            }
        };

        if arm {
            let hub = self.hub.clone();
            let store = self.store.clone();
            let rooms = self.rooms.clone();
            let debounce = self.debounce;
            let room_id = room_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(debounce).await;
                propagate(&hub, &store, &rooms, &room_id).await;
            });
        }
    }

    /// Immediate durable write for an explicit save, bypassing the
    /// debounce. Errors surface to this requester only; membership has
    /// been checked by the caller.
    pub async fn save_explicit(
        &self,
        room_id: &str,
        content: String,
        requester_id: &str,
    ) -> Result<(), ApiError> {
        {
            let state = self
                .rooms
                .entry(room_id.to_string())
                .or_insert_with(|| Mutex::new(DocState::seeded(String::new())));
            let mut doc = state.lock();
            doc.content = content.clone();
            doc.last_editor = requester_id.to_string();
        }
        self.store.save(room_id, &content).await
    }

    /// Room-deletion cascade: drop the in-memory buffer and the durable
    /// copy. A timer that fires afterwards finds no state and does nothing.
    pub async fn purge(&self, room_id: &str) -> Result<(), ApiError> {
        self.rooms.remove(room_id);
        self.store.delete(room_id).await
    }
}

/// Timer fire: publish whatever the buffer holds now, then persist.
async fn propagate(
    hub: &Arc<dyn BroadcastHub>,
    store: &Arc<dyn DocumentStore>,
    rooms: &DashMap<String, Mutex<DocState>>,
    room_id: &str,
) {
    // The room may have been purged while the timer ran.
    let Some((content, editor, conn)) = rooms.get(room_id).map(|state| {
        let mut doc = state.lock();
        doc.pending = false;
        (
            doc.content.clone(),
            doc.last_editor.clone(),
            doc.last_conn.clone(),
        )
    }) else {
        return;
    };

    hub.publish(
        room_id,
        ServerEvent::CodeUpdated {
            code: content.clone(),
            user_id: editor,
        },
        Some(&conn),
    );

    if let Err(err) = store.save(room_id, &content).await {
        // The in-memory buffer stays authoritative; the durable copy
        // catches up on the next cycle.
        tracing::warn!(%room_id, ?err, "deferred document save failed");
    }
}
