//! Shared document read/save endpoints (code rooms).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::room::{Language, Room, RoomKind};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/rooms/{room_id}/document",
        get(get_document).put(save_document),
    )
}

fn require_code_room(room: &Room) -> Result<(), ApiError> {
    if room.kind != RoomKind::Code {
        return Err(ApiError::bad_request("Not a code room"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/:room_id/document
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub content: String,
    pub language: Language,
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/document",
    tag = "Documents",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Current shared buffer", body = DocumentResponse),
        (status = 400, description = "Not a code room", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Forbidden", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn get_document(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let room = state.registry.get(&room_id, &user_id)?;
    require_code_room(&room)?;

    let content = state.sync.snapshot(&room_id).await?;
    Ok(Json(DocumentResponse {
        content,
        language: room.language.unwrap_or_default(),
    }))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/rooms/:room_id/document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveDocumentRequest {
    pub content: String,
}

#[utoipa::path(
    put,
    path = "/api/v1/rooms/{room_id}/document",
    tag = "Documents",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    request_body = SaveDocumentRequest,
    responses(
        (status = 204, description = "Buffer saved durably"),
        (status = 400, description = "Not a code room", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Forbidden", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn save_document(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<SaveDocumentRequest>,
) -> Result<StatusCode, ApiError> {
    let room = state.registry.get(&room_id, &user_id)?;
    require_code_room(&room)?;
    if !state.registry.is_member(&room_id, &user_id)? {
        return Err(ApiError::forbidden(
            "Only room members can save the document",
        ));
    }

    // Explicit saves bypass the debounce; storage errors surface to this
    // requester only.
    state
        .sync
        .save_explicit(&room_id, body.content, &user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
