//! REST side of chat: history, contacts and read state. Live delivery goes
//! through the websocket registry, see `ws::handler`.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api;
use crate::database::models::{ChatMessage, User};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    /// Peer user id; omitted means all of the caller's messages.
    pub with: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub content: String,
}

/// GET /chat/messages — newest-first window, returned chronologically.
/// Fetching a conversation marks the peer's messages as read.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<Value>, ApiError> {
    let (limit, offset) = crate::handlers::Pagination {
        page: query.page,
        limit: query.limit,
    }
    .window();

    let mut messages = sqlx::query_as::<_, ChatMessage>(
        "SELECT * FROM chat_messages \
         WHERE (sender_id = $1 OR receiver_id = $1) \
           AND ($2::uuid IS NULL OR sender_id = $2 OR receiver_id = $2) \
         ORDER BY sent_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(current.0.id)
    .bind(query.with)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    messages.reverse();

    if let Some(peer) = query.with {
        sqlx::query(
            "UPDATE chat_messages SET read = TRUE \
             WHERE sender_id = $1 AND receiver_id = $2 AND read = FALSE",
        )
        .bind(peer)
        .bind(current.0.id)
        .execute(&state.pool)
        .await?;
    }

    let mut expanded = Vec::with_capacity(messages.len());
    for message in &messages {
        expanded.push(expand_message(&state, message).await?);
    }
    Ok(api::success(expanded))
}

/// GET /chat/contacts — superadmins see all sellers, sellers all
/// superadmins, everyone else their distinct conversation partners. Each
/// contact carries an unread count and the latest message.
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let contacts: Vec<User> = if current.0.is_superadmin() {
        sqlx::query_as("SELECT * FROM users WHERE role = 'seller' ORDER BY username")
            .fetch_all(&state.pool)
            .await?
    } else if current.0.is_seller() {
        sqlx::query_as("SELECT * FROM users WHERE role = 'superadmin' ORDER BY username")
            .fetch_all(&state.pool)
            .await?
    } else {
        sqlx::query_as(
            "SELECT * FROM users WHERE id IN ( \
               SELECT DISTINCT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END \
               FROM chat_messages WHERE sender_id = $1 OR receiver_id = $1)",
        )
        .bind(current.0.id)
        .fetch_all(&state.pool)
        .await?
    };

    let mut results = Vec::with_capacity(contacts.len());
    for contact in &contacts {
        let unread = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM chat_messages \
             WHERE sender_id = $1 AND receiver_id = $2 AND read = FALSE",
        )
        .bind(contact.id)
        .bind(current.0.id)
        .fetch_one(&state.pool)
        .await?;

        let last = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY sent_at DESC LIMIT 1",
        )
        .bind(contact.id)
        .bind(current.0.id)
        .fetch_optional(&state.pool)
        .await?;

        results.push(json!({
            "user": contact.summary(),
            "unread_count": unread.0,
            "last_message": last.as_ref().map(|m| m.content.clone()),
            "last_message_at": last.as_ref().map(|m| m.sent_at),
        }));
    }
    Ok(api::success(results))
}

/// POST /chat/send — REST fallback for clients without a socket.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Value>, ApiError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("Message content cannot be empty"));
    }
    let receiver = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(req.receiver_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Receiver not found"))?;

    let message = sqlx::query_as::<_, ChatMessage>(
        "INSERT INTO chat_messages (sender_id, receiver_id, content) \
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(current.0.id)
    .bind(receiver.id)
    .bind(content)
    .fetch_one(&state.pool)
    .await?;

    // Live push to the receiver's sockets, then the stored notification.
    let payload = json!({
        "type": "message",
        "data": message,
        "sender": current.0.summary(),
    });
    state.registry.send_to_user(receiver.id, &payload);
    notify::notify_user(
        &state,
        Some(receiver.id),
        "chat_message",
        "New message",
        &format!("{} sent you a message", current.0.username),
        Some(json!({ "message_id": message.id })),
    )
    .await
    .ok();

    Ok(api::success(message))
}

/// PUT /chat/messages/:id/read — receiver only.
pub async fn mark_message_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let updated = sqlx::query_as::<_, ChatMessage>(
        "UPDATE chat_messages SET read = TRUE WHERE id = $1 AND receiver_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(current.0.id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Message not found"))?;
    Ok(api::success(updated))
}

/// PUT /chat/messages/read-all
pub async fn mark_all_messages_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let result = sqlx::query(
        "UPDATE chat_messages SET read = TRUE WHERE receiver_id = $1 AND read = FALSE",
    )
    .bind(current.0.id)
    .execute(&state.pool)
    .await?;
    Ok(api::success(json!({ "updated": result.rows_affected() })))
}

async fn expand_message(state: &AppState, message: &ChatMessage) -> Result<Value, ApiError> {
    let sender = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(message.sender_id)
        .fetch_optional(&state.pool)
        .await?;
    let receiver = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(message.receiver_id)
        .fetch_optional(&state.pool)
        .await?;

    let mut body = serde_json::to_value(message)?;
    body["sender"] = sender.map(|u| u.summary()).unwrap_or(Value::Null);
    body["receiver"] = receiver.map(|u| u.summary()).unwrap_or(Value::Null);
    Ok(body)
}
