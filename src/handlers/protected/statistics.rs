//! Dashboard statistics. Sellers are implicitly scoped to their own items;
//! superadmins may pass `seller_id` or omit it for platform-wide numbers.
//! "Completed" revenue counts delivered, paid orders only.

use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub seller_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub months: Option<u32>,
    pub seller_id: Option<Uuid>,
}

/// Resolve the seller scope for a statistics request. Sellers always see
/// themselves; staff may pick a seller or the whole platform.
fn resolve_scope(current: &CurrentUser, requested: Option<Uuid>) -> Result<Option<Uuid>, ApiError> {
    if current.0.is_seller() {
        return Ok(Some(current.0.id));
    }
    current.require_staff()?;
    Ok(requested)
}

async fn window_stats(
    state: &AppState,
    seller: Option<Uuid>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<(i64, f64), ApiError> {
    let row = sqlx::query_as::<_, (i64, f64)>(
        "SELECT COUNT(DISTINCT o.id), COALESCE(SUM(oi.price * oi.quantity), 0)::float8 \
         FROM orders o \
         JOIN order_items oi ON oi.order_id = o.id \
         WHERE o.status = 'delivered' AND o.payment_status = 'paid' \
           AND o.created_at >= $1 AND o.created_at < $2 \
           AND ($3::uuid IS NULL OR oi.seller_id = $3)",
    )
    .bind(from)
    .bind(to)
    .bind(seller)
    .fetch_one(&state.pool)
    .await?;
    Ok(row)
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// GET /statistics/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, ApiError> {
    let seller = resolve_scope(&current, query.seller_id)?;
    let now = Utc::now();

    let product_count = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM products WHERE $1::uuid IS NULL OR seller_id = $1",
    )
    .bind(seller)
    .fetch_one(&state.pool)
    .await?;

    let today_start = now.date_naive().and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok_or_else(|| ApiError::internal_server_error("Clock error"))?;
    let yesterday_start = today_start - Duration::days(1);
    let (today_orders, today_revenue) = window_stats(&state, seller, today_start, now).await?;
    let (yesterday_orders, yesterday_revenue) =
        window_stats(&state, seller, yesterday_start, today_start).await?;

    let this_month_start = month_start(now.year(), now.month())
        .ok_or_else(|| ApiError::internal_server_error("Clock error"))?;
    let (py, pm) = previous_month(now.year(), now.month());
    let last_month_start = month_start(py, pm)
        .ok_or_else(|| ApiError::internal_server_error("Clock error"))?;
    let (month_orders, month_revenue) = window_stats(&state, seller, this_month_start, now).await?;
    let (last_month_orders, last_month_revenue) =
        window_stats(&state, seller, last_month_start, this_month_start).await?;

    let mut body = json!({
        "product_count": product_count.0,
        "today": { "orders": today_orders, "revenue": today_revenue },
        "yesterday": { "orders": yesterday_orders, "revenue": yesterday_revenue },
        "this_month": { "orders": month_orders, "revenue": month_revenue },
        "last_month": { "orders": last_month_orders, "revenue": last_month_revenue },
        "revenue_history": monthly_series(&state, seller, 6).await?,
    });

    // Platform-wide extras for the staff view.
    if seller.is_none() {
        let customers = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM users WHERE role = 'customer'",
        )
        .fetch_one(&state.pool)
        .await?;
        let sellers = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM users WHERE role = 'seller'",
        )
        .fetch_one(&state.pool)
        .await?;
        let pending = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM seller_applications WHERE status = 'pending'",
        )
        .fetch_one(&state.pool)
        .await?;
        body["customer_count"] = json!(customers.0);
        body["seller_count"] = json!(sellers.0);
        body["pending_applications"] = json!(pending.0);
    }

    Ok(api::success(body))
}

/// GET /statistics/history?months=N
pub async fn history(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let seller = resolve_scope(&current, query.seller_id)?;
    let months = query.months.unwrap_or(6).clamp(1, 36);
    Ok(api::success(monthly_series(&state, seller, months).await?))
}

async fn monthly_series(
    state: &AppState,
    seller: Option<Uuid>,
    months: u32,
) -> Result<Value, ApiError> {
    let now = Utc::now();
    let mut year = now.year();
    let mut month = now.month();
    let mut series = Vec::with_capacity(months as usize);

    for _ in 0..months {
        let from = month_start(year, month)
            .ok_or_else(|| ApiError::internal_server_error("Clock error"))?;
        let (ny, nm) = next_month(year, month);
        let to = month_start(ny, nm)
            .ok_or_else(|| ApiError::internal_server_error("Clock error"))?;
        let (orders, revenue) = window_stats(state, seller, from, to).await?;
        series.push(json!({
            "year": year,
            "month": month,
            "orders": orders,
            "revenue": revenue,
        }));
        let (py, pm) = previous_month(year, month);
        year = py;
        month = pm;
    }

    series.reverse();
    Ok(Value::Array(series))
}

/// GET /statistics/top-sellers — superadmin, current month.
pub async fn top_sellers(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    let now = Utc::now();
    let from = month_start(now.year(), now.month())
        .ok_or_else(|| ApiError::internal_server_error("Clock error"))?;

    let rows = sqlx::query_as::<_, (Uuid, String, i64, f64)>(
        "SELECT u.id, u.username, COUNT(DISTINCT o.id), \
                COALESCE(SUM(oi.price * oi.quantity), 0)::float8 \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         JOIN users u ON u.id = oi.seller_id \
         WHERE o.status <> 'cancelled' AND o.created_at >= $1 \
         GROUP BY u.id, u.username \
         ORDER BY COUNT(DISTINCT o.id) DESC LIMIT 10",
    )
    .bind(from)
    .fetch_all(&state.pool)
    .await?;

    let sellers: Vec<Value> = rows
        .into_iter()
        .map(|(id, username, orders, revenue)| {
            json!({ "seller_id": id, "username": username, "orders": orders, "revenue": revenue })
        })
        .collect();
    Ok(api::success(sellers))
}

/// GET /statistics/top-products — superadmin, current month.
pub async fn top_products(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    let now = Utc::now();
    let from = month_start(now.year(), now.month())
        .ok_or_else(|| ApiError::internal_server_error("Clock error"))?;

    let rows = sqlx::query_as::<_, (Uuid, String, i64, f64)>(
        "SELECT oi.product_id, oi.product_title, SUM(oi.quantity)::int8, \
                COALESCE(SUM(oi.price * oi.quantity), 0)::float8 \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         WHERE o.status <> 'cancelled' AND o.created_at >= $1 \
         GROUP BY oi.product_id, oi.product_title \
         ORDER BY SUM(oi.quantity) DESC LIMIT 10",
    )
    .bind(from)
    .fetch_all(&state.pool)
    .await?;

    let products: Vec<Value> = rows
        .into_iter()
        .map(|(id, title, units, revenue)| {
            json!({ "product_id": id, "title": title, "units": units, "revenue": revenue })
        })
        .collect();
    Ok(api::success(products))
}
