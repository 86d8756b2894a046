//! Promotion management and checkout-time validation.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api;
use crate::database::models::Promotion;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PromotionListQuery {
    pub active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePromotionRequest {
    pub code: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: f64,
    #[serde(default)]
    pub min_purchase: f64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub usage_limit: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromotionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub discount_value: Option<f64>,
    pub min_purchase: Option<f64>,
    pub end_date: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ValidatePromotionRequest {
    pub code: String,
    pub cart_total: f64,
}

/// POST /promotions — seller or superadmin; codes are unique.
pub async fn create_promotion(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreatePromotionRequest>,
) -> Result<Json<Value>, ApiError> {
    if !current.0.is_seller() && !current.0.is_superadmin() {
        return Err(ApiError::forbidden("Seller access required"));
    }
    let code = req.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ApiError::bad_request("Promotion code is required"));
    }
    if !matches!(req.discount_type.as_str(), "percentage" | "fixed") {
        return Err(ApiError::bad_request(
            "discount_type must be 'percentage' or 'fixed'",
        ));
    }
    if req.discount_value <= 0.0 {
        return Err(ApiError::bad_request("Discount value must be positive"));
    }
    if req.discount_type == "percentage" && req.discount_value > 100.0 {
        return Err(ApiError::bad_request("Percentage discount cannot exceed 100"));
    }

    let duplicate = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM promotions WHERE code = $1")
        .bind(&code)
        .fetch_one(&state.pool)
        .await?;
    if duplicate.0 > 0 {
        return Err(ApiError::conflict("Promotion code already exists"));
    }

    let promotion = sqlx::query_as::<_, Promotion>(
        "INSERT INTO promotions \
         (code, title, description, discount_type, discount_value, min_purchase, \
          start_date, end_date, product_ids, categories, usage_limit, seller_id) \
         VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, now()), $8, $9, $10, $11, $12) \
         RETURNING *",
    )
    .bind(&code)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.discount_type)
    .bind(req.discount_value)
    .bind(req.min_purchase)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(&req.product_ids)
    .bind(&req.categories)
    .bind(req.usage_limit)
    .bind(current.0.id)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(promotion_id = %promotion.id, code = %code, "promotion created");
    Ok(api::success(promotion))
}

/// GET /promotions — sellers see their own, superadmin all.
pub async fn list_promotions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<PromotionListQuery>,
) -> Result<Json<Value>, ApiError> {
    let promotions = sqlx::query_as::<_, Promotion>(
        "SELECT * FROM promotions \
         WHERE ($1 OR seller_id = $2) \
           AND (NOT $3 OR (start_date <= now() AND (end_date IS NULL OR end_date >= now()))) \
         ORDER BY created_at DESC",
    )
    .bind(current.0.is_superadmin())
    .bind(current.0.id)
    .bind(query.active_only.unwrap_or(false))
    .fetch_all(&state.pool)
    .await?;
    Ok(api::success(promotions))
}

/// GET /promotions/:id
pub async fn get_promotion(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    Ok(api::success(load_owned(&state, &current, id).await?))
}

/// PUT /promotions/:id
pub async fn update_promotion(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePromotionRequest>,
) -> Result<Json<Value>, ApiError> {
    let promotion = load_owned(&state, &current, id).await?;
    if let Some(value) = req.discount_value {
        if value <= 0.0 {
            return Err(ApiError::bad_request("Discount value must be positive"));
        }
    }

    let updated = sqlx::query_as::<_, Promotion>(
        "UPDATE promotions SET \
           title = COALESCE($2, title), \
           description = COALESCE($3, description), \
           discount_value = COALESCE($4, discount_value), \
           min_purchase = COALESCE($5, min_purchase), \
           end_date = COALESCE($6, end_date), \
           usage_limit = COALESCE($7, usage_limit), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(promotion.id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.discount_value)
    .bind(req.min_purchase)
    .bind(req.end_date)
    .bind(req.usage_limit)
    .fetch_one(&state.pool)
    .await?;
    Ok(api::success(updated))
}

/// DELETE /promotions/:id
pub async fn delete_promotion(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let promotion = load_owned(&state, &current, id).await?;
    sqlx::query("DELETE FROM promotions WHERE id = $1")
        .bind(promotion.id)
        .execute(&state.pool)
        .await?;
    Ok(api::success_message("Promotion deleted"))
}

/// POST /promotions/validate — checkout-time check returning the discount
/// and final total for a cart.
pub async fn validate_promotion(
    State(state): State<AppState>,
    Json(req): Json<ValidatePromotionRequest>,
) -> Result<Json<Value>, ApiError> {
    let code = req.code.trim().to_uppercase();
    let promotion = sqlx::query_as::<_, Promotion>("SELECT * FROM promotions WHERE code = $1")
        .bind(&code)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Unknown promotion code"))?;

    let now = Utc::now();
    if promotion.start_date > now {
        return Err(ApiError::bad_request("Promotion is not active yet"));
    }
    if promotion.end_date.is_some_and(|end| end < now) {
        return Err(ApiError::bad_request("Promotion has expired"));
    }
    if promotion
        .usage_limit
        .is_some_and(|limit| promotion.usage_count >= limit)
    {
        return Err(ApiError::bad_request("Promotion usage limit reached"));
    }
    if req.cart_total < promotion.min_purchase {
        return Err(ApiError::bad_request(format!(
            "Minimum purchase of {:.2} required",
            promotion.min_purchase
        )));
    }

    // Validation is read-only; re-checking a code at checkout must not
    // consume a limited-use slot.
    let discount = promotion.discount_amount(req.cart_total).min(req.cart_total);
    let final_total = ((req.cart_total - discount) * 100.0).round() / 100.0;

    Ok(api::success(json!({
        "code": promotion.code,
        "discount_amount": (discount * 100.0).round() / 100.0,
        "final_total": final_total,
    })))
}

async fn load_owned(
    state: &AppState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<Promotion, ApiError> {
    let promotion = sqlx::query_as::<_, Promotion>("SELECT * FROM promotions WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Promotion not found"))?;
    if promotion.seller_id != current.0.id && !current.0.is_superadmin() {
        return Err(ApiError::forbidden("Not your promotion"));
    }
    Ok(promotion)
}
