pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod registry;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use gateway::hub::BroadcastHub;
use gateway::sync::DocumentSynchronizer;
use lyceum_common::SnowflakeGenerator;
use registry::RoomRegistry;
use store::{DirectoryStore, MessageStore};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub hub: Arc<dyn BroadcastHub>,
    pub messages: Arc<dyn MessageStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub sync: Arc<DocumentSynchronizer>,
    pub snowflake: Arc<SnowflakeGenerator>,
}

impl AppState {
    /// Resolve a participant's display name, falling back to the raw id
    /// when the directory doesn't know them.
    pub async fn display_name(&self, user_id: &str) -> String {
        match self.directory.display_name(user_id).await {
            Ok(Some(name)) => name,
            Ok(None) => user_id.to_string(),
            Err(err) => {
                tracing::error!(?err, %user_id, "directory lookup failed");
                user_id.to_string()
            }
        }
    }
}
