//! Per-connection gateway session state.

use lyceum_common::id::{prefix, prefixed_ulid};

/// State for a single WebSocket connection, fixed at HELLO time.
pub struct GatewaySession {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub connection_id: String,
    /// Authenticated participant id.
    pub user_id: String,
    /// Display name resolved through the participant directory.
    pub display_name: String,
}

impl GatewaySession {
    pub fn new(user_id: String, display_name: String) -> Self {
        Self {
            connection_id: prefixed_ulid(prefix::CONNECTION),
            user_id,
            display_name,
        }
    }
}
