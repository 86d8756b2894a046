//! User moderation, superadmin only: temporary suspensions and seller
//! removal. Suspension is enforced at login, on every authenticated request
//! and at websocket connect; elapsed suspensions clear themselves there.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    pub days: i64,
    pub reason: Option<String>,
}

/// PUT /users/:id/suspend
pub async fn suspend_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SuspendRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    if !(1..=365).contains(&req.days) {
        return Err(ApiError::bad_request("Days must be between 1 and 365"));
    }

    let target = load_user(&state, id).await?;
    if target.is_superadmin() {
        return Err(ApiError::forbidden("Superadmins cannot be suspended"));
    }

    let until = Utc::now() + Duration::days(req.days);
    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET suspended_until = $2, suspension_reason = $3 \
         WHERE id = $1 RETURNING *",
    )
    .bind(target.id)
    .bind(until)
    .bind(&req.reason)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %updated.id, until = %until, "user suspended");
    Ok(api::success(json!({
        "user": updated.summary(),
        "suspended_until": updated.suspended_until,
        "suspension_reason": updated.suspension_reason,
    })))
}

/// PUT /users/:id/unsuspend
pub async fn unsuspend_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    let target = load_user(&state, id).await?;

    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET suspended_until = NULL, suspension_reason = NULL \
         WHERE id = $1 RETURNING *",
    )
    .bind(target.id)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %updated.id, "user unsuspended");
    Ok(api::success(updated.summary()))
}

/// DELETE /users/:id — remove a seller from the platform. The account is
/// anonymized and deactivated rather than hard-deleted so paid orders and
/// payments keep their references; the seller's catalog is deleted.
pub async fn remove_seller(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    let target = load_user(&state, id).await?;
    if !target.is_seller() {
        return Err(ApiError::bad_request("User is not a seller"));
    }

    let anonymized_email = format!("removed-{}@example.invalid", target.id.simple());
    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM products WHERE seller_id = $1")
        .bind(target.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "UPDATE users SET is_active = FALSE, role = 'customer', email = $2, \
         username = 'removed', full_name = NULL, password_hash = '!' WHERE id = $1",
    )
    .bind(target.id)
    .bind(&anonymized_email)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %target.id, "seller removed");
    Ok(api::success_message("Seller removed"))
}

async fn load_user(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}
