//! Seller payout requests. Requested amounts are held back from the balance
//! immediately; rejection refunds them.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api;
use crate::database::models::PayoutRequest;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePayoutRequest {
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct ProcessPayoutRequest {
    pub status: String,
}

/// POST /payouts/request — seller only.
pub async fn request_payout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreatePayoutRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_seller()?;
    if req.amount <= 0.0 {
        return Err(ApiError::bad_request("Amount must be positive"));
    }

    let mut tx = state.pool.begin().await?;
    // Hold the balance atomically; the guard in the WHERE clause prevents
    // concurrent requests from overdrawing.
    let debited = sqlx::query(
        "UPDATE users SET balance = balance - $2 WHERE id = $1 AND balance >= $2",
    )
    .bind(current.0.id)
    .bind(req.amount)
    .execute(&mut *tx)
    .await?;
    if debited.rows_affected() == 0 {
        return Err(ApiError::bad_request("Insufficient balance"));
    }

    let payout = sqlx::query_as::<_, PayoutRequest>(
        "INSERT INTO payout_requests (seller_id, amount) VALUES ($1, $2) RETURNING *",
    )
    .bind(current.0.id)
    .bind(req.amount)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    notify::notify_user(
        &state,
        None,
        "payout_request",
        "New payout request",
        &format!("{} requested a payout of {:.2}", current.0.username, req.amount),
        Some(json!({ "payout_id": payout.id })),
    )
    .await
    .ok();

    tracing::info!(payout_id = %payout.id, amount = req.amount, "payout requested");
    Ok(api::success(payout))
}

/// GET /payouts — sellers see own, superadmin all.
pub async fn list_payouts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let payouts = sqlx::query_as::<_, PayoutRequest>(
        "SELECT * FROM payout_requests WHERE $1 OR seller_id = $2 ORDER BY requested_at DESC",
    )
    .bind(current.0.is_superadmin())
    .bind(current.0.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(api::success(payouts))
}

/// PUT /payouts/:id/process — superadmin; completed or rejected.
pub async fn process_payout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProcessPayoutRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    if !matches!(req.status.as_str(), "completed" | "rejected") {
        return Err(ApiError::bad_request(
            "Status must be 'completed' or 'rejected'",
        ));
    }

    let mut tx = state.pool.begin().await?;
    let payout = sqlx::query_as::<_, PayoutRequest>(
        "UPDATE payout_requests SET status = $2, processed_at = now(), processed_by = $3 \
         WHERE id = $1 AND status = 'pending' RETURNING *",
    )
    .bind(id)
    .bind(&req.status)
    .bind(current.0.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Pending payout request not found"))?;

    if payout.status == "rejected" {
        sqlx::query("UPDATE users SET balance = balance + $2 WHERE id = $1")
            .bind(payout.seller_id)
            .bind(payout.amount)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let message = match payout.status.as_str() {
        "completed" => format!("Your payout of {:.2} was completed", payout.amount),
        _ => format!("Your payout of {:.2} was rejected and refunded", payout.amount),
    };
    notify::notify_user(
        &state,
        Some(payout.seller_id),
        "payout_processed",
        "Payout processed",
        &message,
        Some(json!({ "payout_id": payout.id, "status": payout.status })),
    )
    .await
    .ok();

    tracing::info!(payout_id = %payout.id, status = %payout.status, "payout processed");
    Ok(api::success(payout))
}
