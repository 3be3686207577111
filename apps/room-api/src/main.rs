use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

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

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // In-memory backends for a single-process deployment. A clustered
    // setup swaps these for the platform's durable stores and directory
    // service, and the hub for a shared pub/sub backbone.
    let messages: Arc<dyn MessageStore> = Arc::new(MemoryMessageStore::new());
    let documents: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    let directory: Arc<dyn DirectoryStore> = Arc::new(MemoryDirectory::new());

    let hub: Arc<dyn BroadcastHub> = Arc::new(InProcessHub::new());
    let sync = Arc::new(DocumentSynchronizer::new(
        hub.clone(),
        documents,
        Duration::from_millis(config.sync_debounce_ms),
    ));

    tracing::info!(
        port,
        debounce_ms = config.sync_debounce_ms,
        "room-api configured"
    );

    let snowflake = Arc::new(SnowflakeGenerator::new(config.worker_id));
    let state = AppState {
        config: Arc::new(config),
        registry: Arc::new(RoomRegistry::new()),
        hub,
        messages,
        directory,
        sync,
        snowflake,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(room_api::routes::router())
        .merge(
            SwaggerUi::new("/docs").url("/api-docs/openapi.json", room_api::routes::ApiDoc::openapi()),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "room-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
