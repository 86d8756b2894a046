//! Public authentication endpoints: registration, login, password reset.

use axum::{extract::State, response::Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api;
use crate::auth::{self, Claims};
use crate::config::config;
use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetCodeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    if req.username.trim().is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }
    if req.password.len() < 6 {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }

    let exists = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;
    if exists.0 > 0 {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, username, full_name, password_hash, role) \
         VALUES ($1, $2, $3, $4, 'customer') RETURNING *",
    )
    .bind(&email)
    .bind(req.username.trim())
    .bind(&req.full_name)
    .bind(auth::hash_password(&req.password))
    .fetch_one(&state.pool)
    .await?;

    let token = auth::generate_jwt(Claims::new(user.id))?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok(api::success(json!({
        "access_token": token,
        "token_type": "bearer",
        "user": user,
    })))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !auth::verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }
    if !user.is_active {
        return Err(ApiError::bad_request("Account is deactivated"));
    }

    if let Some(until) = user.suspended_until {
        if until > Utc::now() {
            return Err(ApiError::forbidden(format!(
                "Account suspended until {}",
                until.to_rfc3339()
            )));
        }
        sqlx::query(
            "UPDATE users SET suspended_until = NULL, suspension_reason = NULL WHERE id = $1",
        )
        .bind(user.id)
        .execute(&state.pool)
        .await?;
    }

    let token = auth::generate_jwt(Claims::new(user.id))?;
    Ok(api::success(json!({
        "access_token": token,
        "token_type": "bearer",
        "expires_in": config().security.token_expiry_minutes * 60,
        "user": user,
    })))
}

/// POST /auth/request-reset-code
///
/// The code is logged rather than emailed; there is no mail transport.
pub async fn request_reset_code(
    State(state): State<AppState>,
    Json(req): Json<ResetCodeRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let exists = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;
    if exists.0 == 0 {
        return Err(ApiError::not_found("No account with that email"));
    }

    let code = auth::generate_reset_code(4);
    let expires_at = Utc::now() + Duration::minutes(config().security.reset_code_expiry_minutes);
    sqlx::query(
        "INSERT INTO password_reset_codes (email, code, expires_at) VALUES ($1, $2, $3) \
         ON CONFLICT (email) DO UPDATE SET code = $2, expires_at = $3",
    )
    .bind(&email)
    .bind(&code)
    .bind(expires_at)
    .execute(&state.pool)
    .await?;

    tracing::info!(email = %email, code = %code, "password reset code issued");
    Ok(api::success_message("Reset code sent"))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.new_password.len() < 6 {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }
    let email = req.email.trim().to_lowercase();

    let row = sqlx::query_as::<_, (String, chrono::DateTime<Utc>)>(
        "SELECT code, expires_at FROM password_reset_codes WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::bad_request("No reset code requested for this email"))?;

    if row.1 < Utc::now() {
        return Err(ApiError::bad_request("Reset code has expired"));
    }
    if row.0 != req.code {
        return Err(ApiError::bad_request("Invalid reset code"));
    }

    sqlx::query("UPDATE users SET password_hash = $1 WHERE email = $2")
        .bind(auth::hash_password(&req.new_password))
        .bind(&email)
        .execute(&state.pool)
        .await?;
    sqlx::query("DELETE FROM password_reset_codes WHERE email = $1")
        .bind(&email)
        .execute(&state.pool)
        .await?;

    tracing::info!(email = %email, "password reset completed");
    Ok(api::success_message("Password updated"))
}
