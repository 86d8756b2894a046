//! Payment processing against a simulated gateway: every accepted payment
//! completes immediately with a generated transaction id.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use uuid::Uuid;

use crate::api;
use crate::database::models::{Order, Payment};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessPaymentRequest {
    pub order_id: Uuid,
    pub method: String,
    #[serde(default)]
    pub details: Value,
}

/// POST /payments/process
pub async fn process_payment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.method.trim().is_empty() {
        return Err(ApiError::bad_request("Payment method is required"));
    }

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(req.order_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    if order.user_id != current.0.id {
        return Err(ApiError::forbidden("Not your order"));
    }

    let transaction_id = generate_transaction_id();
    let details = if req.details.is_null() {
        json!({})
    } else {
        req.details
    };

    let mut tx = state.pool.begin().await?;
    // The conditional update claims the order; of two concurrent submissions
    // one loses the race here and rolls back.
    let claimed = sqlx::query(
        "UPDATE orders SET payment_status = 'paid', updated_at = now() \
         WHERE id = $1 AND payment_status <> 'paid'",
    )
    .bind(order.id)
    .execute(&mut *tx)
    .await?;
    if claimed.rows_affected() == 0 {
        return Err(ApiError::conflict("Order is already paid"));
    }

    let payment = sqlx::query_as::<_, Payment>(
        "INSERT INTO payments (order_id, user_id, amount, method, details, status, transaction_id) \
         VALUES ($1, $2, $3, $4, $5, 'completed', $6) RETURNING *",
    )
    .bind(order.id)
    .bind(current.0.id)
    .bind(order.total)
    .bind(req.method.trim())
    .bind(details)
    .bind(&transaction_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        payment_id = %payment.id,
        order_id = %order.id,
        transaction_id = %transaction_id,
        "payment completed"
    );

    let sellers = sqlx::query_as::<_, (Uuid,)>(
        "SELECT DISTINCT seller_id FROM order_items WHERE order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&state.pool)
    .await?;
    let sellers: HashSet<Uuid> = sellers.into_iter().map(|(id,)| id).collect();
    for seller_id in sellers {
        notify::notify_user(
            &state,
            Some(seller_id),
            "payment_received",
            "Payment received",
            &format!("Order #{} has been paid", order.short_ref()),
            Some(json!({ "order_id": order.id, "payment_id": payment.id })),
        )
        .await
        .ok();
    }

    Ok(api::success(payment))
}

/// GET /payments — own history, everything for superadmin.
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE $1 OR user_id = $2 ORDER BY created_at DESC",
    )
    .bind(current.0.is_superadmin())
    .bind(current.0.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(api::success(payments))
}

/// GET /payments/:id
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;
    if payment.user_id != current.0.id && !current.0.is_superadmin() {
        return Err(ApiError::forbidden("Not your payment"));
    }
    Ok(api::success(payment))
}

fn generate_transaction_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..12)
        .map(|_| {
            let chars = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
            chars[rng.gen_range(0..chars.len())] as char
        })
        .collect();
    format!("TXN-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_are_distinct_and_prefixed() {
        let a = generate_transaction_id();
        let b = generate_transaction_id();
        assert!(a.starts_with("TXN-"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
