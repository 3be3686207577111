//! Message history and send endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::events::ServerEvent;
use crate::models::message::Message;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/rooms/{room_id}/messages",
        post(send_message).get(list_messages),
    )
}

const MAX_MESSAGE_LEN: usize = 4000;

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/:room_id/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub body: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/messages",
    tag = "Messages",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message persisted and broadcast", body = Message),
        (status = 400, description = "Bad request", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Forbidden", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn send_message(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let room = state.registry.get(&room_id, &user_id)?;
    if !state.registry.is_member(&room_id, &user_id)? {
        return Err(ApiError::forbidden("Only room members can post messages"));
    }

    let text = body.body.trim();
    let mut errors = Vec::new();
    if text.is_empty() {
        errors.push(FieldError {
            field: "body".to_string(),
            message: "Message body is required".to_string(),
        });
    } else if text.len() > MAX_MESSAGE_LEN {
        errors.push(FieldError {
            field: "body".to_string(),
            message: "Message body must be 4000 characters or fewer".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let sender_name = state.display_name(&user_id).await;
    let message = Message {
        id: state.snowflake.generate(),
        room_id: room_id.clone(),
        sender_id: user_id,
        sender_name,
        body: text.to_string(),
        system: false,
        created_at: Utc::now(),
    };

    // Durable before visible: the broadcast goes out only once the store
    // has acknowledged the append, so history replay never misses a
    // delivered message.
    state.messages.append(&message).await?;
    state.hub.publish(
        &room_id,
        ServerEvent::message_event(room.kind, &message),
        None,
    );

    Ok((StatusCode::CREATED, Json(message)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/:room_id/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of messages to return (newest tail, ascending order).
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/messages",
    tag = "Messages",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
        HistoryQuery,
    ),
    responses(
        (status = 200, description = "Message history", body = [Message]),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Forbidden", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn list_messages(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    // Same admission as subscribing: private rooms are members-only.
    state.registry.get(&room_id, &user_id)?;

    let limit = query
        .limit
        .unwrap_or(state.config.history_limit)
        .min(state.config.history_limit);
    let history = state.messages.history(&room_id, limit).await?;
    Ok(Json(history))
}
