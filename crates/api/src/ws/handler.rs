use std::collections::BTreeSet;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use liveclass_core::error::CoreError;
use liveclass_core::realtime::{monitor_room, parse_room, session_room, ClientMessage, ServerMessage};
use liveclass_core::types::DbId;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::{best_effort, OutgoingMessage, VoteRequest};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// HTTP handler that authenticates `?token=` and upgrades the connection.
///
/// A missing or invalid token is rejected with 401 before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> AppResult<impl IntoResponse> {
    let token = params.token.ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized("Missing token query parameter".into()))
    })?;
    let user = AuthUser::from_token(&token, &state.config.jwt)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Serialize a server message into a text frame.
pub(crate) fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode WebSocket message");
            None
        }
    }
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Dispatches inbound messages on the current task, replying with
///      `ack` or `error`.
///   4. On hang-up, marks the student disconnected in every session room
///      the socket had joined.
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = user.user_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone(), user).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let reply = handle_text(&state, &conn_id, &user, text.as_str()).await;
                if let Some(frame) = encode(&reply) {
                    state.ws_manager.send_to(&conn_id, frame).await;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    if let Some(conn) = state.ws_manager.remove(&conn_id).await {
        if user.principal().is_student() {
            let sessions: BTreeSet<DbId> = conn.rooms.iter().filter_map(|r| parse_room(r)).collect();
            for session_id in sessions {
                best_effort(
                    state
                        .attendance
                        .mark_disconnected(session_id, user.user_id)
                        .await,
                    "mark_disconnected",
                );
            }
        }
    }
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id = user.user_id, "WebSocket disconnected");
}

/// Parse and dispatch one inbound text frame.
async fn handle_text(state: &AppState, conn_id: &str, user: &AuthUser, text: &str) -> ServerMessage {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Unparseable WebSocket message");
            return ServerMessage::Error {
                request: None,
                code: "BAD_REQUEST".into(),
                message: format!("Invalid message: {e}"),
            };
        }
    };
    if matches!(message, ClientMessage::Ping) {
        return ServerMessage::Pong;
    }

    let request = message.name();
    match dispatch(state, conn_id, user, message).await {
        Ok(data) => ServerMessage::Ack {
            request: request.to_string(),
            data,
        },
        Err(err) => {
            let (code, message) = err.public_parts();
            tracing::debug!(conn_id, request, code, "WebSocket request failed");
            ServerMessage::Error {
                request: Some(request.to_string()),
                code: code.to_string(),
                message,
            }
        }
    }
}

/// Run a client request against the engines. Each arm mirrors a REST handler.
async fn dispatch(
    state: &AppState,
    conn_id: &str,
    user: &AuthUser,
    message: ClientMessage,
) -> AppResult<Value> {
    let actor = user.principal();
    let data = match message {
        ClientMessage::JoinSession { session_id } => {
            let receipt = state.sessions.join(&actor, session_id).await?;
            state
                .ws_manager
                .join_room(conn_id, &session_room(session_id))
                .await;
            if receipt.session.can_manage(&actor) {
                state
                    .ws_manager
                    .join_room(conn_id, &monitor_room(session_id))
                    .await;
            }
            json!(receipt)
        }
        ClientMessage::LeaveSession { session_id } => {
            let session = state.sessions.leave(&actor, session_id).await?;
            state
                .ws_manager
                .leave_room(conn_id, &session_room(session_id))
                .await;
            state
                .ws_manager
                .leave_room(conn_id, &monitor_room(session_id))
                .await;
            json!({ "session_id": session.id, "present_count": session.present_count() })
        }
        ClientMessage::PollVote {
            poll_id,
            option_index,
            text_response,
            response_time,
        } => {
            let request = VoteRequest {
                option_index,
                text_response,
                response_time,
            };
            json!(state.polls.vote(&actor, poll_id, request).await?)
        }
        ClientMessage::SendMessage {
            session_id,
            content,
            message_type,
            reply_to,
        } => {
            let outgoing = OutgoingMessage {
                content,
                message_type,
                reply_to,
            };
            json!(state.chat.send(&actor, session_id, outgoing).await?)
        }
        ClientMessage::EditMessage {
            message_id,
            content,
        } => json!(state.chat.edit(&actor, message_id, &content).await?),
        ClientMessage::DeleteMessage { message_id } => {
            state.chat.delete(&actor, message_id).await?;
            json!({ "message_id": message_id })
        }
        ClientMessage::AddReaction { message_id, emoji } => {
            json!(state.chat.add_reaction(&actor, message_id, &emoji).await?)
        }
        ClientMessage::RemoveReaction { message_id, emoji } => {
            json!(state.chat.remove_reaction(&actor, message_id, &emoji).await?)
        }
        ClientMessage::MarkRead { message_id } => {
            state.chat.mark_read(&actor, message_id).await?;
            json!({ "message_id": message_id })
        }
        ClientMessage::Activity {
            session_id,
            activity_type,
            details,
        } => json!(
            state
                .attendance
                .record_activity(&actor, session_id, &activity_type, details)
                .await?
        ),
        ClientMessage::LocationUpdate {
            session_id,
            latitude,
            longitude,
            address,
            accuracy,
        } => {
            let record = state
                .attendance
                .update_location(&actor, session_id, latitude, longitude, address, accuracy)
                .await?;
            json!({ "session_id": session_id, "location": record.location })
        }
        ClientMessage::Ping => Value::Null,
    };
    Ok(data)
}
