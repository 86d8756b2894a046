//! WebSocket endpoint for chat and live notifications.
//!
//! Clients connect with `GET /ws/chat?token=JWT`. Sellers, admins and
//! superadmins also join the shared `seller_admin` support room; customers
//! are registered for personal delivery only. Incoming text frames carry a
//! chat message which is persisted, delivered to its receiver's live
//! connections, and echoed into the room for staff senders.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth;
use crate::database::models::{ChatMessage, Role, User};
use crate::services::notify;
use crate::state::AppState;
use crate::ws::SELLER_ADMIN_ROOM;

const CLOSE_TOKEN_INVALID: u16 = 4001;
const CLOSE_ACCOUNT_DISABLED: u16 = 4002;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// Inbound chat frame from a client.
#[derive(Debug, Deserialize)]
struct IncomingChat {
    receiver_id: Uuid,
    content: String,
}

/// GET /ws/chat?token=JWT
///
/// Authenticates via query parameter since browsers cannot set headers on
/// WebSocket upgrades. Auth failures still upgrade, then close immediately
/// with an application close code so clients can distinguish the cause.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let user = match authenticate(&state, &params.token).await {
        Ok(user) => user,
        Err(close_code) => {
            tracing::warn!(close_code, "websocket auth failed");
            return ws.on_upgrade(move |mut socket| async move {
                let frame = CloseFrame {
                    code: close_code,
                    reason: "authentication failed".into(),
                };
                let _ = socket.send(Message::Close(Some(frame))).await;
            });
        }
    };

    tracing::info!(user_id = %user.id, role = %user.role, "websocket authenticated");
    ws.on_upgrade(move |socket| run_connection(socket, state, user))
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, u16> {
    let claims = auth::validate_jwt(token).map_err(|_| CLOSE_TOKEN_INVALID)?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.pool)
        .await
        .map_err(|_| CLOSE_TOKEN_INVALID)?
        .ok_or(CLOSE_TOKEN_INVALID)?;

    let suspended = user
        .suspended_until
        .is_some_and(|until| until > chrono::Utc::now());
    if !user.is_active || suspended {
        return Err(CLOSE_ACCOUNT_DISABLED);
    }
    Ok(user)
}

/// Actor for one authenticated socket: a writer task owns the sink and
/// drains the registry channel, while this task reads incoming frames.
async fn run_connection(socket: WebSocket, state: AppState, user: User) {
    let (ws_sender, mut ws_receiver) = socket.split();

    let role = user.role();
    let room = matches!(role, Role::Seller | Role::Admin | Role::Superadmin)
        .then_some(SELLER_ADMIN_ROOM);
    let (entry, rx) = state.registry.register(room, Some(user.id), Some(role));

    if let Some(room) = room {
        let joined = serde_json::json!({
            "type": "system",
            "event": "user_joined",
            "user": user.summary(),
        });
        state.registry.broadcast_to_room(room, &joined, Some(user.id));
    }

    let writer = tokio::spawn(writer_task(ws_sender, rx));

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Err(err) = handle_chat_frame(&state, &user, &text).await {
                    tracing::warn!(user_id = %user.id, error = %err, "chat frame rejected");
                    let _ = entry.send_json(&serde_json::json!({
                        "type": "error",
                        "message": err,
                    }));
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            // Pings are answered at the protocol level; ignore the rest.
            Ok(_) => {}
        }
    }

    state.registry.remove(&entry);
    writer.abort();
    tracing::info!(user_id = %user.id, "websocket disconnected");
}

async fn writer_task(
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if sink.send(msg).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Parse, persist and fan out one chat message. Returns a client-facing
/// error string on rejection; infrastructure failures are logged and
/// surfaced as a generic error.
async fn handle_chat_frame(state: &AppState, sender: &User, text: &str) -> Result<(), String> {
    let incoming: IncomingChat =
        serde_json::from_str(text).map_err(|_| "malformed message".to_string())?;
    let content = incoming.content.trim();
    if content.is_empty() {
        return Err("message content cannot be empty".into());
    }

    let message = sqlx::query_as::<_, ChatMessage>(
        "INSERT INTO chat_messages (sender_id, receiver_id, content) \
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(sender.id)
    .bind(incoming.receiver_id)
    .bind(content)
    .fetch_one(&state.pool)
    .await
    .map_err(|err| {
        tracing::error!(error = %err, "failed to persist chat message");
        "message could not be saved".to_string()
    })?;

    let payload = serde_json::json!({
        "type": "message",
        "data": message,
        "sender": sender.summary(),
    });

    state.registry.send_to_user(incoming.receiver_id, &payload);
    notify::notify_user(
        state,
        Some(incoming.receiver_id),
        "chat_message",
        "New message",
        &format!("{} sent you a message", sender.username),
        Some(serde_json::json!({ "message_id": message.id })),
    )
    .await
    .ok();

    // Staff messages are visible to the whole support room.
    if sender.is_staff() || sender.is_seller() {
        state
            .registry
            .broadcast_to_room(SELLER_ADMIN_ROOM, &payload, Some(sender.id));
    }

    // Ack to every connection of the sender so other tabs stay in sync.
    let mut ack = payload;
    ack["status"] = serde_json::json!("sent");
    state.registry.send_to_user(sender.id, &ack);
    Ok(())
}
