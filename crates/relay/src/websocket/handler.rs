//! WebSocket handler for Axum
//!
//! Authorizes the upgrade, then drives one connection through admission,
//! event relay and teardown.

use assist_shared::{PeerAddress, Role};
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use tokio::sync::mpsc;

use crate::auth::AuthRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::{
    connection::Handshake,
    events::{ClientEvent, ClientFrame, Outbound},
    lifecycle::Admission,
    state::WebSocketState,
};

/// WebSocket handler - upgrades HTTP connection to WebSocket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(mut handshake): Query<Handshake>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    handshake.user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if handshake.token.is_none() {
        handshake.token = bearer_token(&headers);
    }

    authorize(&app_state, &handshake).await?;

    tracing::debug!(
        peer_id = %handshake.peer_id,
        identity = %handshake.identity,
        "WebSocket connection upgrade requested"
    );

    let ws_state = app_state.ws_state.clone();
    Ok(ws
        .max_message_size(app_state.config.max_message_size_bytes())
        .on_upgrade(move |socket| handle_socket(socket, handshake, ws_state)))
}

/// Run the configured authorizer over a handshake.
///
/// Malformed handshakes pass here and are refused after the upgrade so the
/// client sees the close reason.
async fn authorize(app_state: &AppState, handshake: &Handshake) -> ApiResult<()> {
    let (Ok(role), Ok(addr)) = (
        handshake.identity.parse::<Role>(),
        PeerAddress::parse(&handshake.peer_id),
    ) else {
        return Ok(());
    };

    let request = AuthRequest {
        role,
        project_key: &addr.project_key,
        token: handshake.token.as_deref(),
    };
    app_state.authorizer.authorize(request).await.map_err(|e| {
        tracing::warn!(
            peer_id = %handshake.peer_id,
            role = %role,
            error = %e,
            "WebSocket upgrade rejected"
        );
        match handshake.token {
            None => ApiError::Unauthorized,
            Some(_) => ApiError::from(e),
        }
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, handshake: Handshake, ws_state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Event(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break; // Connection closed
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                    }
                },
                Outbound::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %e, "Close frame not delivered");
                    }
                    break;
                }
            }
        }
    });

    let conn = match ws_state.lifecycle.admit(&handshake, tx).await {
        Admission::Joined(conn) => conn,
        Admission::Refused(_) => {
            // Writer exits after flushing the close frame
            if let Err(e) = send_task.await {
                tracing::debug!(error = %e, "WebSocket writer task ended abnormally");
            }
            return;
        }
    };

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => ws_state.relay.handle(&conn, ClientEvent::from(frame)).await,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %conn.id,
                        error = ?e,
                        "Failed to parse client event"
                    );
                }
            },
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %conn.id, "WebSocket close frame received");
                break;
            }
            Ok(_) => {} // Ping/pong handled by axum, binary ignored
            Err(e) => {
                tracing::error!(connection_id = %conn.id, error = %e, "WebSocket transport error");
                break;
            }
        }
    }

    ws_state.lifecycle.disconnect(&conn).await;
    send_task.abort();
}
