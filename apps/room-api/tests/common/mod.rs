use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lyceum_common::SnowflakeGenerator;
use room_api::config::Config;
use room_api::gateway::hub::{BroadcastHub, InProcessHub};
use room_api::gateway::sync::DocumentSynchronizer;
use room_api::registry::RoomRegistry;
use room_api::store::{
    DirectoryStore, DocumentStore, MemoryDirectory, MemoryDocumentStore, MemoryMessageStore,
    MessageStore,
};
use room_api::AppState;

/// Debounce used by tests: short enough to keep tests fast, long enough to
/// batch several edits into one window.
pub const TEST_DEBOUNCE_MS: u64 = 100;

/// Build an AppState on in-memory backends. Returns the directory handle so
/// tests can register display names.
pub fn test_state() -> (AppState, Arc<MemoryDirectory>) {
    let directory = Arc::new(MemoryDirectory::new());
    let messages: Arc<dyn MessageStore> = Arc::new(MemoryMessageStore::new());
    let documents: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    let hub: Arc<dyn BroadcastHub> = Arc::new(InProcessHub::new());
    let sync = Arc::new(DocumentSynchronizer::new(
        hub.clone(),
        documents,
        Duration::from_millis(TEST_DEBOUNCE_MS),
    ));

    let config = Config {
        port: 0,
        sync_debounce_ms: TEST_DEBOUNCE_MS,
        history_limit: 100,
        worker_id: 0,
    };

    let directory_dyn: Arc<dyn DirectoryStore> = directory.clone();
    let state = AppState {
        config: Arc::new(config),
        registry: Arc::new(RoomRegistry::new()),
        hub,
        messages,
        directory: directory_dyn,
        sync,
        snowflake: Arc::new(SnowflakeGenerator::new(0)),
    };
    (state, directory)
}

/// Start an actual TCP server for black-box testing. The server runs in the
/// background for the rest of the test.
pub async fn start_server() -> (SocketAddr, Arc<MemoryDirectory>) {
    let (state, directory) = test_state();
    let app = room_api::routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, directory)
}

pub fn bearer(user_id: &str) -> String {
    format!("Bearer {user_id}")
}
