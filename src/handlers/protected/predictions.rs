//! Sales forecast endpoints. Forecasts are cached in `sales_forecasts` and
//! reused while less than a day old; see `services::forecast` for the model.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api;
use crate::database::models::Product;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::forecast::{self, SalesForecast};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub days: Option<i64>,
}

impl ForecastQuery {
    fn horizon(&self) -> i64 {
        self.days.unwrap_or(30).clamp(1, 365)
    }
}

/// GET /predictions/sales/:product_id?days=N — owner or superadmin.
pub async fn product_forecast(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<Value>, ApiError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    if product.seller_id != current.0.id && !current.0.is_superadmin() {
        return Err(ApiError::forbidden("Not your product"));
    }

    let horizon = query.horizon();
    if let Some(cached) = load_cached(&state, product.seller_id, Some(product.id), horizon).await? {
        return Ok(api::success(cached));
    }

    let history = forecast::daily_sales(&state.pool, product.seller_id, Some(product.id)).await?;
    let result = forecast::project(&history, horizon);
    store(&state, product.seller_id, Some(product.id), &result).await?;
    Ok(api::success(forecast_body(&result, Some(product.id), product.seller_id)?))
}

/// GET /predictions/sales/seller/me?days=N
pub async fn my_seller_forecast(
    state: State<AppState>,
    Extension(current): Extension<CurrentUser>,
    query: Query<ForecastQuery>,
) -> Result<Json<Value>, ApiError> {
    current.require_seller()?;
    let seller_id = current.0.id;
    seller_forecast_inner(state, seller_id, query).await
}

/// GET /predictions/sales/seller/:seller_id?days=N — superadmin or self.
pub async fn seller_forecast(
    state: State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(seller_id): Path<Uuid>,
    query: Query<ForecastQuery>,
) -> Result<Json<Value>, ApiError> {
    if seller_id != current.0.id && !current.0.is_superadmin() {
        return Err(ApiError::forbidden("Not your sales data"));
    }
    seller_forecast_inner(state, seller_id, query).await
}

async fn seller_forecast_inner(
    State(state): State<AppState>,
    seller_id: Uuid,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<Value>, ApiError> {
    let horizon = query.horizon();
    if let Some(cached) = load_cached(&state, seller_id, None, horizon).await? {
        return Ok(api::success(cached));
    }

    let history = forecast::daily_sales(&state.pool, seller_id, None).await?;
    let result = forecast::project(&history, horizon);
    store(&state, seller_id, None, &result).await?;
    Ok(api::success(forecast_body(&result, None, seller_id)?))
}

#[derive(sqlx::FromRow)]
struct CachedForecast {
    product_id: Option<Uuid>,
    seller_id: Uuid,
    predicted_units: Value,
    predicted_revenue: Value,
    confidence: f64,
    created_at: chrono::DateTime<Utc>,
}

async fn load_cached(
    state: &AppState,
    seller_id: Uuid,
    product_id: Option<Uuid>,
    horizon: i64,
) -> Result<Option<Value>, ApiError> {
    let cutoff = Utc::now() - Duration::hours(forecast::CACHE_MAX_AGE_HOURS);
    let cached = sqlx::query_as::<_, CachedForecast>(
        "SELECT product_id, seller_id, predicted_units, predicted_revenue, confidence, created_at \
         FROM sales_forecasts \
         WHERE seller_id = $1 AND product_id IS NOT DISTINCT FROM $2 \
           AND horizon_days = $3 AND created_at >= $4 \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(seller_id)
    .bind(product_id)
    .bind(horizon)
    .bind(cutoff)
    .fetch_optional(&state.pool)
    .await?;

    Ok(cached.map(|c| {
        json!({
            "product_id": c.product_id,
            "seller_id": c.seller_id,
            "horizon_days": horizon,
            "predicted_units": c.predicted_units,
            "predicted_revenue": c.predicted_revenue,
            "confidence": c.confidence,
            "cached": true,
            "generated_at": c.created_at,
        })
    }))
}

async fn store(
    state: &AppState,
    seller_id: Uuid,
    product_id: Option<Uuid>,
    result: &SalesForecast,
) -> Result<(), ApiError> {
    sqlx::query(
        "INSERT INTO sales_forecasts \
         (product_id, seller_id, horizon_days, predicted_units, predicted_revenue, confidence) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(product_id)
    .bind(seller_id)
    .bind(result.horizon_days)
    .bind(serde_json::to_value(&result.predicted_units)?)
    .bind(serde_json::to_value(&result.predicted_revenue)?)
    .bind(result.confidence)
    .execute(&state.pool)
    .await?;
    Ok(())
}

fn forecast_body(
    result: &SalesForecast,
    product_id: Option<Uuid>,
    seller_id: Uuid,
) -> Result<Value, ApiError> {
    let mut body = serde_json::to_value(result)?;
    body["product_id"] = json!(product_id);
    body["seller_id"] = json!(seller_id);
    body["cached"] = json!(false);
    Ok(body)
}
