//! Notification creation: persist a row, then push it to live sockets.
//!
//! `user_id = None` addresses the superadmin audience. Delivery to the
//! registry is best-effort; the stored row is the source of truth and is
//! what offline users see when they next list notifications.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::Notification;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn notify_user(
    state: &AppState,
    user_id: Option<Uuid>,
    kind: &str,
    title: &str,
    message: &str,
    data: Option<Value>,
) -> Result<Notification, ApiError> {
    let notification = sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (user_id, kind, title, message, data) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(user_id)
    .bind(kind)
    .bind(title)
    .bind(message)
    .bind(data.unwrap_or_else(|| json!({})))
    .fetch_one(&state.pool)
    .await?;

    let delivered = state.registry.push_notification(&notification);
    tracing::debug!(
        notification_id = %notification.id,
        user_id = ?notification.user_id,
        delivered,
        "notification stored"
    );
    Ok(notification)
}
