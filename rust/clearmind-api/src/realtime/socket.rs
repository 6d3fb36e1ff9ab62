//! The `/ws` endpoint.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use tokio::sync::broadcast::{self, error::RecvError};

use super::presence::{ConnectionId, Envelope, PresenceHub};
use super::protocol::{ClientMessage, CursorPosition, ServerMessage};
use crate::AppState;
use crate::access;
use crate::domain::SharePermission;
use crate::error::ApiError;
use crate::gateway::auth::AuthenticatedUser;

/// Upgrades an authenticated request to a presence socket.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode realtime message");
            true
        }
    }
}

/// Next envelope from the current room, or never when there is none.
async fn recv_room(room: &mut Option<broadcast::Receiver<Envelope>>) -> Result<Envelope, RecvError> {
    match room {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user: AuthenticatedUser) {
    let hub = state.presence.clone();
    let registration = hub.register(user.id, &user.display_name());
    let connection_id = registration.connection_id.clone();
    let mut global = registration.global;
    let kicked = registration.kicked;
    let mut room: Option<broadcast::Receiver<Envelope>> = None;

    tracing::info!(connection_id = %connection_id, user_id = user.id, "Realtime client connected");

    if !send(
        &mut socket,
        &ServerMessage::Connected {
            connection_id: connection_id.clone(),
        },
    )
    .await
    {
        hub.disconnect(&connection_id);
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        hub.touch(&connection_id);
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => {
                                handle_client_message(&state, &hub, &connection_id, &user, message, &mut room).await
                            }
                            Err(e) => Some(ServerMessage::error(format!("Invalid message: {e}"))),
                        };
                        if let Some(reply) = reply
                            && !send(&mut socket, &reply).await
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        hub.touch(&connection_id);
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }

            envelope = global.recv() => {
                match envelope {
                    Ok(envelope) => {
                        if envelope.is_for(&connection_id) && !send(&mut socket, &envelope.message).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(connection_id = %connection_id, skipped, "Global channel lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            envelope = recv_room(&mut room) => {
                match envelope {
                    Ok(envelope) => {
                        if envelope.is_for(&connection_id) && !send(&mut socket, &envelope.message).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(connection_id = %connection_id, skipped, "Room channel lagged");
                    }
                    // The room was dropped; wait for the next page:view.
                    Err(RecvError::Closed) => room = None,
                }
            }

            () = kicked.notified() => {
                tracing::debug!(connection_id = %connection_id, "Idle connection evicted");
                let _ = send(&mut socket, &ServerMessage::error("Connection idle for too long")).await;
                break;
            }
        }
    }

    hub.disconnect(&connection_id);
    let _ = socket.close().await;
    tracing::info!(connection_id = %connection_id, user_id = user.id, "Realtime client disconnected");
}

/// Applies one client message; returns a direct reply if any.
async fn handle_client_message(
    state: &AppState,
    hub: &PresenceHub,
    connection_id: &ConnectionId,
    user: &AuthenticatedUser,
    message: ClientMessage,
    room: &mut Option<broadcast::Receiver<Envelope>>,
) -> Option<ServerMessage> {
    match message {
        ClientMessage::PageView { page_id } => {
            let user_id = user.id;
            let allowed = state
                .store
                .call(move |conn| {
                    access::require_page(conn, user_id, page_id, SharePermission::View).map(|_| ())
                })
                .await;
            match allowed {
                Ok(()) => {
                    *room = hub.view_page(connection_id, page_id);
                    None
                }
                Err(ApiError::NotFound(message) | ApiError::Forbidden(message)) => {
                    Some(ServerMessage::error(message))
                }
                Err(e) => {
                    tracing::warn!(error = %e, page_id, "Page access check failed");
                    Some(ServerMessage::error("Could not open page"))
                }
            }
        }
        ClientMessage::PageLeave => {
            hub.leave_page(connection_id);
            *room = None;
            None
        }
        ClientMessage::TypingStart { page_id } => {
            hub.set_typing(connection_id, page_id, true);
            None
        }
        ClientMessage::TypingStop { page_id } => {
            hub.set_typing(connection_id, page_id, false);
            None
        }
        ClientMessage::CursorMove { page_id, x, y } => {
            hub.move_cursor(connection_id, page_id, CursorPosition { x, y });
            None
        }
        ClientMessage::ContentUpdate { page_id, content } => {
            hub.update_content(connection_id, page_id, content);
            None
        }
        ClientMessage::Ping => Some(ServerMessage::Pong),
    }
}
