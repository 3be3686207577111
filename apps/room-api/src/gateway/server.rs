//! WebSocket upgrade handler and per-connection session loop.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;

use crate::AppState;

use super::events::{ClientEvent, ServerEvent};
use super::handler::handle_event;
use super::session::GatewaySession;

/// Close codes (4000-range for application-level).
const CLOSE_PROTOCOL_ERROR: u16 = 4000;
const CLOSE_NOT_IDENTIFIED: u16 = 4003;
const CLOSE_HANDSHAKE_TIMEOUT: u16 = 4009;

/// Timeout for receiving HELLO after connection (seconds).
const HELLO_TIMEOUT_SECS: u64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: the first frame must be HELLO, within the timeout.
    let hello_result = time::timeout(Duration::from_secs(HELLO_TIMEOUT_SECS), async {
        while let Some(msg) = ws_rx.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(?e, "ws read error during handshake");
                    return Err("read error");
                }
            };

            let text = match msg {
                Message::Text(t) => t,
                Message::Close(_) => return Err("client closed"),
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => continue,
            };

            return match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::Hello { user_id }) => Ok(user_id),
                Ok(_) => Err("Expected hello"),
                Err(_) => Err("Invalid JSON"),
            };
        }
        Err("connection closed before hello")
    })
    .await;

    let user_id = match hello_result {
        Ok(Ok(user_id)) => user_id,
        Ok(Err(reason)) => {
            tracing::debug!(%reason, "handshake failed");
            let _ = send_close(&mut ws_tx, CLOSE_NOT_IDENTIFIED, reason).await;
            return;
        }
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_HANDSHAKE_TIMEOUT, "Handshake timeout").await;
            return;
        }
    };

    // Identity is authenticated upstream by the platform; resolve a display
    // name if the directory knows one.
    let display_name = state.display_name(&user_id).await;
    let session = GatewaySession::new(user_id, display_name);

    // Outbound queue: everything the hub fans out to this connection lands
    // here and is written by this loop.
    let (tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.hub.register(&session.connection_id, tx);

    tracing::info!(
        conn_id = %session.connection_id,
        user_id = %session.user_id,
        "gateway session established"
    );

    let ready = ServerEvent::Ready {
        user_id: session.user_id.clone(),
        display_name: session.display_name.clone(),
    };
    if send_event(&mut ws_tx, &ready).await.is_err() {
        state.hub.remove(&session.connection_id);
        return;
    }

    'session: loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event: ClientEvent = match serde_json::from_str(&text) {
                            Ok(ev) => ev,
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_PROTOCOL_ERROR, "Invalid event").await;
                                break 'session;
                            }
                        };
                        for reply in handle_event(&state, &session, event).await {
                            if send_event(&mut ws_tx, &reply).await.is_err() {
                                break 'session;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break 'session,
                    Some(Err(e)) => {
                        tracing::debug!(?e, conn_id = %session.connection_id, "ws read error");
                        break 'session;
                    }
                    _ => continue,
                }
            }

            // Event fanned out by the hub.
            queued = outbound_rx.recv() => {
                match queued {
                    Some(event) => {
                        if send_event(&mut ws_tx, &event).await.is_err() {
                            break 'session;
                        }
                    }
                    None => break 'session,
                }
            }
        }
    }

    // The transport's own close/error is the sole liveness signal; this is
    // the one cleanup path for dropped clients.
    state.hub.remove(&session.connection_id);

    tracing::info!(
        conn_id = %session.connection_id,
        user_id = %session.user_id,
        "gateway session ended"
    );
}

async fn send_event(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap();
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
