//! Account settings: profile, password and account deletion. Deletion
//! anonymizes and deactivates rather than dropping rows, so order history
//! stays intact.

use axum::{extract::State, response::Json, Extension};
use serde::Deserialize;
use serde_json::Value;

use crate::api;
use crate::auth;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

/// GET /settings/profile
pub async fn get_profile(
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    Ok(api::success(current.0))
}

/// PUT /settings/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.map(|e| e.trim().to_lowercase());
    if let Some(email) = &email {
        if !email.contains('@') {
            return Err(ApiError::bad_request("A valid email address is required"));
        }
        let taken = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM users WHERE email = $1 AND id <> $2",
        )
        .bind(email)
        .bind(current.0.id)
        .fetch_one(&state.pool)
        .await?;
        if taken.0 > 0 {
            return Err(ApiError::conflict("Email is already in use"));
        }
    }

    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET \
           username = COALESCE($2, username), \
           full_name = COALESCE($3, full_name), \
           email = COALESCE($4, email) \
         WHERE id = $1 RETURNING *",
    )
    .bind(current.0.id)
    .bind(&req.username)
    .bind(&req.full_name)
    .bind(&email)
    .fetch_one(&state.pool)
    .await?;
    Ok(api::success(updated))
}

/// PUT /settings/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if !auth::verify_password(&req.current_password, &current.0.password_hash) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }
    if req.new_password.len() < 6 {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }

    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(current.0.id)
        .bind(auth::hash_password(&req.new_password))
        .execute(&state.pool)
        .await?;
    tracing::info!(user_id = %current.0.id, "password changed");
    Ok(api::success_message("Password updated"))
}

/// DELETE /settings/account
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<DeleteAccountRequest>,
) -> Result<Json<Value>, ApiError> {
    if !auth::verify_password(&req.password, &current.0.password_hash) {
        return Err(ApiError::unauthorized("Password is incorrect"));
    }

    let anonymized_email = format!("deleted-{}@example.invalid", current.0.id.simple());
    sqlx::query(
        "UPDATE users SET is_active = FALSE, email = $2, username = 'deleted', \
         full_name = NULL, password_hash = '!' WHERE id = $1",
    )
    .bind(current.0.id)
    .bind(&anonymized_email)
    .execute(&state.pool)
    .await?;

    tracing::info!(user_id = %current.0.id, "account deactivated");
    Ok(api::success_message("Account deleted"))
}
