//! Stored notification queries and admin-issued announcements. Superadmins
//! also see the untargeted (user_id NULL) stream.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api;
use crate::database::models::Notification;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub unread_only: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: Option<Uuid>,
    pub kind: Option<String>,
    pub title: String,
    pub message: String,
    pub data: Option<Value>,
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>, ApiError> {
    let (limit, offset) = crate::handlers::Pagination {
        page: query.page,
        limit: query.limit,
    }
    .window();

    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications \
         WHERE (user_id = $1 OR ($2 AND user_id IS NULL)) \
           AND (NOT $3 OR read = FALSE) \
         ORDER BY created_at DESC LIMIT $4 OFFSET $5",
    )
    .bind(current.0.id)
    .bind(current.0.is_superadmin())
    .bind(query.unread_only.unwrap_or(false))
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    Ok(api::success(notifications))
}

/// GET /notifications/count — unread count.
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let count = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM notifications \
         WHERE (user_id = $1 OR ($2 AND user_id IS NULL)) AND read = FALSE",
    )
    .bind(current.0.id)
    .bind(current.0.is_superadmin())
    .fetch_one(&state.pool)
    .await?;
    Ok(api::success(json!({ "unread": count.0 })))
}

/// PUT /notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let updated = sqlx::query_as::<_, Notification>(
        "UPDATE notifications SET read = TRUE \
         WHERE id = $1 AND (user_id = $2 OR ($3 AND user_id IS NULL)) RETURNING *",
    )
    .bind(id)
    .bind(current.0.id)
    .bind(current.0.is_superadmin())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(api::success(updated))
}

/// PUT /notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let result = sqlx::query(
        "UPDATE notifications SET read = TRUE \
         WHERE (user_id = $1 OR ($2 AND user_id IS NULL)) AND read = FALSE",
    )
    .bind(current.0.id)
    .bind(current.0.is_superadmin())
    .execute(&state.pool)
    .await?;
    Ok(api::success(json!({ "updated": result.rows_affected() })))
}

/// POST /notifications — admin/superadmin; stored and pushed live.
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_staff()?;
    if req.title.trim().is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::bad_request("Title and message are required"));
    }

    let notification = notify::notify_user(
        &state,
        req.user_id,
        req.kind.as_deref().unwrap_or("announcement"),
        req.title.trim(),
        req.message.trim(),
        req.data,
    )
    .await?;
    Ok(api::success(notification))
}

/// DELETE /notifications/:id
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let result = sqlx::query(
        "DELETE FROM notifications \
         WHERE id = $1 AND (user_id = $2 OR ($3 AND user_id IS NULL))",
    )
    .bind(id)
    .bind(current.0.id)
    .bind(current.0.is_superadmin())
    .execute(&state.pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(api::success_message("Notification deleted"))
}

/// DELETE /notifications — scoped bulk delete.
pub async fn delete_all_notifications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let result = sqlx::query(
        "DELETE FROM notifications WHERE user_id = $1 OR ($2 AND user_id IS NULL)",
    )
    .bind(current.0.id)
    .bind(current.0.is_superadmin())
    .execute(&state.pool)
    .await?;
    Ok(api::success(json!({ "deleted": result.rows_affected() })))
}
