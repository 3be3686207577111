//! Wire events exchanged with gateway clients.
//!
//! Both directions are closed tagged unions so dispatch is exhaustive and
//! payload shapes are statically checked. Event names are kebab-case in the
//! `type` field; payload fields are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::room::{Language, RoomKind};

/// Client → server events.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(test, derive(Serialize))]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Handshake: declares the authenticated participant for this
    /// connection. Must be the first frame.
    #[serde(rename_all = "camelCase")]
    Hello { user_id: String },

    /// Subscribe to a chat room channel.
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },

    /// Subscribe to a code room channel.
    #[serde(rename_all = "camelCase")]
    JoinCoderoom { room_id: String },

    /// Unsubscribe from a code room channel.
    #[serde(rename_all = "camelCase")]
    LeaveCoderoom { room_id: String },

    /// Local edit announcement. Propagation is debounced server-side; the
    /// `user_id` field is wire-compat only — the session identity is
    /// authoritative.
    #[serde(rename_all = "camelCase")]
    CodeChange {
        room_id: String,
        code: String,
        #[serde(default)]
        user_id: String,
    },

    /// Chat message inside a code room.
    #[serde(rename_all = "camelCase")]
    CoderoomMessage { room_id: String, message: String },
}

/// Server → client events.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Handshake acknowledgement.
    #[serde(rename_all = "camelCase")]
    Ready {
        user_id: String,
        display_name: String,
    },

    /// Chat room subscription acknowledgement.
    #[serde(rename_all = "camelCase")]
    RoomJoined { room_id: String },

    /// Code room subscription acknowledgement, seeding the joiner with the
    /// current shared buffer.
    #[serde(rename_all = "camelCase")]
    CoderoomJoined {
        room_id: String,
        code: String,
        language: Language,
    },

    /// Fan-out of a persisted chat room message.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        room_id: String,
        sender_id: String,
        sender_name: String,
        text: String,
        created_at: DateTime<Utc>,
        system: bool,
    },

    /// Fan-out of a persisted code room message.
    #[serde(rename_all = "camelCase")]
    NewMessage { message: Message },

    /// Propagated shared-buffer replacement.
    #[serde(rename_all = "camelCase")]
    CodeUpdated { code: String, user_id: String },

    /// The room's channel was torn down (room deleted).
    #[serde(rename_all = "camelCase")]
    Evicted { room_id: String, reason: String },

    /// Rejection of a client event, sent to the requesting connection only.
    #[serde(rename_all = "camelCase")]
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Fan-out shape of a persisted message, by room kind: chat rooms use
    /// the flattened `chat-message`, code rooms wrap the full record in
    /// `new-message`.
    pub fn message_event(kind: RoomKind, message: &Message) -> Self {
        match kind {
            RoomKind::Chat => Self::ChatMessage {
                room_id: message.room_id.clone(),
                sender_id: message.sender_id.clone(),
                sender_name: message.sender_name.clone(),
                text: message.body.clone(),
                created_at: message.created_at,
                system: message.system,
            },
            RoomKind::Code => Self::NewMessage {
                message: message.clone(),
            },
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
