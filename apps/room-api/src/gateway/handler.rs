//! Client event dispatch for an established gateway session.
//!
//! Every arm returns the events owed to the originating connection only;
//! fan-out to other subscribers goes through the hub inside the arm.
//! Registry admission runs before the hub ever sees a subscribe.

use crate::models::message::Message;
use crate::models::room::RoomKind;
use crate::registry::RegistryError;
use crate::AppState;

use super::events::{ClientEvent, ServerEvent};
use super::session::GatewaySession;

pub async fn handle_event(
    state: &AppState,
    session: &GatewaySession,
    event: ClientEvent,
) -> Vec<ServerEvent> {
    match event {
        ClientEvent::Hello { .. } => {
            vec![ServerEvent::error("protocol", "Already identified")]
        }
        ClientEvent::JoinRoom { room_id } => {
            join_channel(state, session, &room_id, RoomKind::Chat).await
        }
        ClientEvent::JoinCoderoom { room_id } => {
            join_channel(state, session, &room_id, RoomKind::Code).await
        }
        ClientEvent::LeaveCoderoom { room_id } => leave_coderoom(state, session, &room_id).await,
        ClientEvent::CodeChange { room_id, code, .. } => {
            code_change(state, session, &room_id, code)
        }
        ClientEvent::CoderoomMessage { room_id, message } => {
            coderoom_message(state, session, &room_id, message).await
        }
    }
}

/// Admission + subscription for both room kinds. Public rooms are joined
/// on the fly (idempotently); private rooms must have been joined through
/// the invite-code path first.
async fn join_channel(
    state: &AppState,
    session: &GatewaySession,
    room_id: &str,
    kind: RoomKind,
) -> Vec<ServerEvent> {
    // Kind check before any membership mutation; `get` already rejects
    // private rooms for non-members, which is exactly the ws admission rule.
    let room = match state.registry.get(room_id, &session.user_id) {
        Ok(room) => room,
        Err(err) => return vec![registry_error_event(err)],
    };
    if room.kind != kind {
        let expected = match kind {
            RoomKind::Chat => "a chat room",
            RoomKind::Code => "a code room",
        };
        return vec![ServerEvent::error(
            "validation",
            format!("Room {room_id} is not {expected}"),
        )];
    }

    let outcome = match state.registry.join(room_id, &session.user_id, None) {
        Ok(outcome) => outcome,
        Err(err) => return vec![registry_error_event(err)],
    };

    if outcome.newly_joined {
        let notice = Message::notice(
            state.snowflake.generate(),
            room_id,
            &session.user_id,
            &session.display_name,
            format!("{} joined the room", session.display_name),
        );
        // Durable before visible; on failure the membership is rolled back
        // so a retry is a clean first join again.
        if let Err(err) = state.messages.append(&notice).await {
            tracing::error!(%room_id, ?err, "failed to persist join notice");
            let _ = state.registry.leave(room_id, &session.user_id);
            return vec![ServerEvent::error("internal", "Join failed, try again")];
        }
        state
            .hub
            .publish(room_id, ServerEvent::message_event(kind, &notice), None);
    }

    state.hub.subscribe(&session.connection_id, kind, room_id);
    tracing::debug!(
        conn_id = %session.connection_id,
        %room_id,
        "subscribed to room channel"
    );

    match kind {
        RoomKind::Chat => vec![ServerEvent::RoomJoined {
            room_id: room_id.to_string(),
        }],
        RoomKind::Code => {
            let code = match state.sync.snapshot(room_id).await {
                Ok(code) => code,
                Err(err) => {
                    tracing::error!(%room_id, ?err, "failed to load document snapshot");
                    String::new()
                }
            };
            vec![ServerEvent::CoderoomJoined {
                room_id: room_id.to_string(),
                code,
                language: outcome.room.language.unwrap_or_default(),
            }]
        }
    }
}

async fn leave_coderoom(
    state: &AppState,
    session: &GatewaySession,
    room_id: &str,
) -> Vec<ServerEvent> {
    state.hub.unsubscribe(&session.connection_id, room_id);

    // Deleted-while-leaving is indistinguishable from a no-op leave.
    let outcome = match state.registry.leave(room_id, &session.user_id) {
        Ok(outcome) => outcome,
        Err(_) => return Vec::new(),
    };

    if outcome.was_member {
        let notice = Message::notice(
            state.snowflake.generate(),
            room_id,
            &session.user_id,
            &session.display_name,
            format!("{} left the room", session.display_name),
        );
        if let Err(err) = state.messages.append(&notice).await {
            tracing::error!(%room_id, ?err, "failed to persist leave notice");
            return Vec::new();
        }
        state.hub.publish(
            room_id,
            ServerEvent::message_event(RoomKind::Code, &notice),
            None,
        );
    }
    Vec::new()
}

fn code_change(
    state: &AppState,
    session: &GatewaySession,
    room_id: &str,
    code: String,
) -> Vec<ServerEvent> {
    match state.registry.is_member(room_id, &session.user_id) {
        Ok(true) => {}
        Ok(false) => {
            return vec![ServerEvent::error(
                "forbidden",
                "Only room members can edit the document",
            )]
        }
        Err(err) => return vec![registry_error_event(err)],
    }

    state
        .sync
        .apply_local_edit(room_id, code, &session.user_id, &session.connection_id);
    Vec::new()
}

async fn coderoom_message(
    state: &AppState,
    session: &GatewaySession,
    room_id: &str,
    body: String,
) -> Vec<ServerEvent> {
    match state.registry.is_member(room_id, &session.user_id) {
        Ok(true) => {}
        Ok(false) => {
            return vec![ServerEvent::error(
                "forbidden",
                "Only room members can post messages",
            )]
        }
        Err(err) => return vec![registry_error_event(err)],
    }

    let body = body.trim();
    if body.is_empty() {
        return vec![ServerEvent::error("validation", "Message body is required")];
    }

    let message = Message {
        id: state.snowflake.generate(),
        room_id: room_id.to_string(),
        sender_id: session.user_id.clone(),
        sender_name: session.display_name.clone(),
        body: body.to_string(),
        system: false,
        created_at: chrono::Utc::now(),
    };

    if let Err(err) = state.messages.append(&message).await {
        tracing::error!(%room_id, ?err, "failed to persist code room message");
        return vec![ServerEvent::error("internal", "Message not delivered")];
    }
    state.hub.publish(
        room_id,
        ServerEvent::message_event(RoomKind::Code, &message),
        None,
    );
    Vec::new()
}

fn registry_error_event(err: RegistryError) -> ServerEvent {
    match err {
        RegistryError::Validation(message) => ServerEvent::error("validation", message),
        RegistryError::NotFound => ServerEvent::error("not-found", "Room not found"),
        RegistryError::Forbidden(message) => ServerEvent::error("forbidden", message),
    }
}
