//! Room endpoints fronting the registry.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::gateway::events::ServerEvent;
use crate::models::message::Message;
use crate::models::room::{Language, Room, RoomKind, Visibility};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{room_id}", get(get_room).delete(delete_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    pub kind: RoomKind,
    pub name: String,
    pub visibility: Visibility,
    pub language: Option<Language>,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    tag = "Rooms",
    security(("bearer" = [])),
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = Room),
        (status = 400, description = "Bad request", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn create_room(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let room = state.registry.create_room(
        body.kind,
        &body.name,
        body.visibility,
        &user_id,
        body.language,
    )?;

    let display_name = state.display_name(&user_id).await;
    let notice = Message::notice(
        state.snowflake.generate(),
        &room.id,
        &user_id,
        &display_name,
        format!("{display_name} created the room"),
    );
    state.messages.append(&notice).await?;
    // No subscribers can exist yet, so this fan-out is a designed no-op; it
    // keeps every notice on the same write-then-fanout path.
    state
        .hub
        .publish(&room.id, ServerEvent::message_event(room.kind, &notice), None);

    tracing::info!(room_id = %room.id, kind = ?room.kind, "room created");
    Ok((StatusCode::CREATED, Json(room)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Rooms visible to the caller", body = [Room]),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_rooms(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Room>> {
    Json(state.registry.visible_to(&user_id))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/:room_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room snapshot", body = Room),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Forbidden", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn get_room(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Room>, ApiError> {
    Ok(Json(state.registry.get(&room_id, &user_id)?))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/:room_id/join
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct JoinRoomRequest {
    /// Invite code; required for private rooms unless already a member.
    pub code: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/join",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined (idempotent)", body = Room),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Forbidden", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn join_room(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    body: Option<Json<JoinRoomRequest>>,
) -> Result<Json<Room>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let outcome = state
        .registry
        .join(&room_id, &user_id, body.code.as_deref())?;

    if outcome.newly_joined {
        let display_name = state.display_name(&user_id).await;
        let notice = Message::notice(
            state.snowflake.generate(),
            &room_id,
            &user_id,
            &display_name,
            format!("{display_name} joined the room"),
        );
        // Durable before visible; roll the membership back on failure so a
        // retry is a clean first join again.
        if let Err(err) = state.messages.append(&notice).await {
            let _ = state.registry.leave(&room_id, &user_id);
            return Err(err);
        }
        state.hub.publish(
            &room_id,
            ServerEvent::message_event(outcome.room.kind, &notice),
            None,
        );
    }

    Ok(Json(outcome.room))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/:room_id/leave
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/leave",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 204, description = "Left (idempotent)"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn leave_room(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let outcome = state.registry.leave(&room_id, &user_id)?;

    if outcome.was_member {
        let display_name = state.display_name(&user_id).await;
        let notice = Message::notice(
            state.snowflake.generate(),
            &room_id,
            &user_id,
            &display_name,
            format!("{display_name} left the room"),
        );
        state.messages.append(&notice).await?;
        state.hub.publish(
            &room_id,
            ServerEvent::message_event(outcome.room.kind, &notice),
            None,
        );
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/rooms/:room_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/rooms/{room_id}",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 204, description = "Room deleted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Forbidden", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_room(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(&room_id, &user_id)?;

    // Cascade: purge the log and document, then evict live subscribers.
    // Publishes to this room id are silent no-ops from here on.
    state.messages.purge_room(&room_id).await?;
    state.sync.purge(&room_id).await?;
    let evicted = state.hub.force_evict(&room_id, "room deleted");

    tracing::info!(%room_id, evicted, "room deleted");
    Ok(StatusCode::NO_CONTENT)
}
