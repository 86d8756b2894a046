//! Commission reporting and per-seller rate administration, superadmin only.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::{Datelike, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::api;
use crate::config::config;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::commission::{self, CommissionDefaults};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommissionQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CommissionStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CommissionPercentageRequest {
    pub percentage: f64,
}

#[derive(Debug, Deserialize)]
pub struct DefaultsRequest {
    pub default_rate: Option<f64>,
    pub top_seller_bonus: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct SellerVolume {
    seller_id: Uuid,
    order_count: i64,
    revenue: f64,
}

/// GET /commissions — per-seller order volume, revenue and the effective
/// commission for the selected (default current) month. Every seller is
/// listed, including those without sales; the top tier is ranked within the
/// same month window as the volumes.
pub async fn commission_report(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<CommissionQuery>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;

    let now = Utc::now();
    let year = query.year.unwrap_or(now.year());
    let month = query.month.unwrap_or(now.month()).clamp(1, 12);
    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ApiError::bad_request("Invalid month"))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ApiError::bad_request("Invalid month"))?;

    let volumes = sqlx::query_as::<_, SellerVolume>(
        "SELECT oi.seller_id, COUNT(DISTINCT o.id) AS order_count, \
                COALESCE(SUM(oi.price * oi.quantity), 0)::float8 AS revenue \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         WHERE o.status <> 'cancelled' AND o.created_at >= $1 AND o.created_at < $2 \
         GROUP BY oi.seller_id",
    )
    .bind(start)
    .bind(end)
    .fetch_all(&state.pool)
    .await?;
    let volumes: HashMap<Uuid, (i64, f64)> = volumes
        .into_iter()
        .map(|v| (v.seller_id, (v.order_count, v.revenue)))
        .collect();

    let defaults = *state.commission.read().await;
    let top = commission::top_seller_ids(
        &state.pool,
        start,
        end,
        config().commission.top_seller_count as i64,
    )
    .await?;

    let sellers = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE role = 'seller' ORDER BY username",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut rows = Vec::with_capacity(sellers.len());
    for seller in &sellers {
        let (order_count, revenue) = volumes.get(&seller.id).copied().unwrap_or((0, 0.0));
        let is_top = top.contains(&seller.id);
        let rate = commission::effective_rate(seller.commission_percentage, is_top, &defaults);
        let (commission_amount, seller_earnings) = commission::split_amount(revenue, rate);

        rows.push(json!({
            "seller": seller.summary(),
            "order_count": order_count,
            "revenue": revenue,
            "is_top_seller": is_top,
            "rate": rate,
            "commission_status": seller.commission_status,
            "commission_amount": commission_amount,
            "seller_earnings": seller_earnings,
        }));
    }
    rows.sort_by(|a, b| b["order_count"].as_i64().cmp(&a["order_count"].as_i64()));

    Ok(api::success(json!({
        "year": year,
        "month": month,
        "defaults": defaults,
        "sellers": rows,
    })))
}

/// PUT /commissions/:seller_id/status — `pending` or `paid`.
pub async fn update_commission_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(seller_id): Path<Uuid>,
    Json(req): Json<CommissionStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    if !matches!(req.status.as_str(), "pending" | "paid") {
        return Err(ApiError::bad_request("Status must be 'pending' or 'paid'"));
    }
    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET commission_status = $2 WHERE id = $1 RETURNING *",
    )
    .bind(seller_id)
    .bind(&req.status)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Seller not found"))?;
    Ok(api::success(updated.summary()))
}

/// PUT /commissions/:seller_id/percentage — per-seller override, 0..=1.
pub async fn update_commission_percentage(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(seller_id): Path<Uuid>,
    Json(req): Json<CommissionPercentageRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    if !(0.0..=1.0).contains(&req.percentage) {
        return Err(ApiError::bad_request("Percentage must be between 0 and 1"));
    }
    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET commission_percentage = $2 WHERE id = $1 RETURNING *",
    )
    .bind(seller_id)
    .bind(req.percentage)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Seller not found"))?;
    tracing::info!(seller_id = %seller_id, percentage = req.percentage, "commission override set");
    Ok(api::success(updated.summary()))
}

/// GET /commissions/defaults
pub async fn get_defaults(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    let defaults = *state.commission.read().await;
    Ok(api::success(defaults))
}

/// PUT /commissions/defaults
pub async fn update_defaults(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<DefaultsRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    for rate in [req.default_rate, req.top_seller_bonus].into_iter().flatten() {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ApiError::bad_request("Rates must be between 0 and 1"));
        }
    }

    let mut defaults = state.commission.write().await;
    if let Some(rate) = req.default_rate {
        defaults.default_rate = rate;
    }
    if let Some(bonus) = req.top_seller_bonus {
        defaults.top_seller_bonus = bonus;
    }
    let updated: CommissionDefaults = *defaults;
    drop(defaults);

    tracing::info!(
        default_rate = updated.default_rate,
        top_seller_bonus = updated.top_seller_bonus,
        "commission defaults updated"
    );
    Ok(api::success(updated))
}
