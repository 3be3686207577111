use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A persisted room message.
///
/// Ids are snowflakes, so ascending id order is insertion order within a
/// room. Messages are immutable once appended and are always durably
/// written before they are broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    /// Server-generated notice (join/leave/room lifecycle) rather than a
    /// participant message.
    pub system: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A server-generated room notice attributed to the acting participant.
    pub fn notice(
        id: i64,
        room_id: &str,
        sender_id: &str,
        sender_name: &str,
        body: String,
    ) -> Self {
        Self {
            id,
            room_id: room_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            body,
            system: true,
            created_at: Utc::now(),
        }
    }
}
