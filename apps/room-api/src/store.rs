//! External storage collaborators behind trait seams.
//!
//! The durable message/document stores and the participant directory are
//! deployment concerns; the in-memory implementations here back
//! single-process deployments and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::message::Message;

/// Durable, per-room message log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to the room's log. Callers must not broadcast a
    /// message until this has returned Ok (write-then-fanout).
    async fn append(&self, message: &Message) -> Result<(), ApiError>;

    /// The most recent messages for a room, in ascending id order, capped
    /// at `limit`.
    async fn history(&self, room_id: &str, limit: usize) -> Result<Vec<Message>, ApiError>;

    /// Discard the room's entire log (room-deletion cascade).
    async fn purge_room(&self, room_id: &str) -> Result<(), ApiError>;
}

/// Durable copy of each code room's shared buffer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, room_id: &str, content: &str) -> Result<(), ApiError>;
    async fn load(&self, room_id: &str) -> Result<Option<String>, ApiError>;
    async fn delete(&self, room_id: &str) -> Result<(), ApiError>;
}

/// Participant directory: resolves ids to display names.
///
/// Identity is authenticated upstream by the platform; this service only
/// ever reads from the directory.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, ApiError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

pub struct MemoryMessageStore {
    rooms: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, message: &Message) -> Result<(), ApiError> {
        self.rooms
            .lock()
            .unwrap()
            .entry(message.room_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn history(&self, room_id: &str, limit: usize) -> Result<Vec<Message>, ApiError> {
        let rooms = self.rooms.lock().unwrap();
        let Some(log) = rooms.get(room_id) else {
            return Ok(Vec::new());
        };
        // Appends arrive in snowflake order, so the tail is the newest slice.
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }

    async fn purge_room(&self, room_id: &str) -> Result<(), ApiError> {
        self.rooms.lock().unwrap().remove(room_id);
        Ok(())
    }
}

pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save(&self, room_id: &str, content: &str) -> Result<(), ApiError> {
        self.docs
            .lock()
            .unwrap()
            .insert(room_id.to_string(), content.to_string());
        Ok(())
    }

    async fn load(&self, room_id: &str) -> Result<Option<String>, ApiError> {
        Ok(self.docs.lock().unwrap().get(room_id).cloned())
    }

    async fn delete(&self, room_id: &str) -> Result<(), ApiError> {
        self.docs.lock().unwrap().remove(room_id);
        Ok(())
    }
}

pub struct MemoryDirectory {
    names: Mutex<HashMap<String, String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            names: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, user_id: &str, display_name: &str) {
        self.names
            .lock()
            .unwrap()
            .insert(user_id.to_string(), display_name.to_string());
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, ApiError> {
        Ok(self.names.lock().unwrap().get(user_id).cloned())
    }
}
