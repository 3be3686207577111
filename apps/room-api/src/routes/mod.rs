pub mod documents;
pub mod health;
pub mod messages;
pub mod rooms;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            rooms::router()
                .merge(messages::router())
                .merge(documents::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Rooms
        rooms::create_room,
        rooms::list_rooms,
        rooms::get_room,
        rooms::join_room,
        rooms::leave_room,
        rooms::delete_room,
        // Messages
        messages::send_message,
        messages::list_messages,
        // Documents
        documents::get_document,
        documents::save_document,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::room::Room,
            crate::models::room::RoomKind,
            crate::models::room::Visibility,
            crate::models::room::Language,
            crate::models::message::Message,
            // Route request/response types
            rooms::CreateRoomRequest,
            rooms::JoinRoomRequest,
            messages::SendMessageRequest,
            documents::SaveDocumentRequest,
            documents::DocumentResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Rooms", description = "Room lifecycle and membership"),
        (name = "Messages", description = "Room message log"),
        (name = "Documents", description = "Code room shared buffers"),
    )
)]
pub struct ApiDoc;
