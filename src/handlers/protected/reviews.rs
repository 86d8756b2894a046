//! Product reviews. The product's aggregate rating is recomputed after any
//! change to its review set.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api;
use crate::database::models::{Review, User};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

/// POST /reviews
pub async fn create_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<Json<Value>, ApiError> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::bad_request("Rating must be between 1 and 5"));
    }
    let product_exists = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM products WHERE id = $1")
        .bind(req.product_id)
        .fetch_one(&state.pool)
        .await?;
    if product_exists.0 == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    // A verified review means the reviewer actually bought the product.
    let purchased = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         WHERE o.user_id = $1 AND oi.product_id = $2 AND o.status <> 'cancelled'",
    )
    .bind(current.0.id)
    .bind(req.product_id)
    .fetch_one(&state.pool)
    .await?;

    let review = sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (product_id, user_id, rating, comment, verified) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(req.product_id)
    .bind(current.0.id)
    .bind(req.rating)
    .bind(&req.comment)
    .bind(purchased.0 > 0)
    .fetch_one(&state.pool)
    .await?;

    recompute_rating(&state, req.product_id).await?;
    Ok(api::success(review))
}

/// GET /reviews/:id
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    Ok(api::success(review))
}

/// PUT /reviews/:id — author only.
pub async fn update_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReviewRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(rating) = req.rating {
        if !(1..=5).contains(&rating) {
            return Err(ApiError::bad_request("Rating must be between 1 and 5"));
        }
    }

    let updated = sqlx::query_as::<_, Review>(
        "UPDATE reviews SET rating = COALESCE($3, rating), \
         comment = COALESCE($4, comment), updated_at = now() \
         WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(current.0.id)
    .bind(req.rating)
    .bind(&req.comment)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Review not found"))?;

    recompute_rating(&state, updated.product_id).await?;
    Ok(api::success(updated))
}

/// PUT /reviews/:id/verify — superadmin.
pub async fn verify_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    current.require_superadmin()?;
    let updated = sqlx::query_as::<_, Review>(
        "UPDATE reviews SET verified = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Review not found"))?;
    Ok(api::success(updated))
}

/// DELETE /reviews/:id — author or superadmin.
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    if review.user_id != current.0.id && !current.0.is_superadmin() {
        return Err(ApiError::forbidden("Not your review"));
    }

    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review.id)
        .execute(&state.pool)
        .await?;
    recompute_rating(&state, review.product_id).await?;
    Ok(api::success_message("Review deleted"))
}

/// GET /reviews/product/:product_id — embeds reviewer summaries.
pub async fn product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC",
    )
    .bind(product_id)
    .fetch_all(&state.pool)
    .await?;

    let mut expanded = Vec::with_capacity(reviews.len());
    for review in &reviews {
        let reviewer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(review.user_id)
            .fetch_optional(&state.pool)
            .await?;
        let mut body = serde_json::to_value(review)?;
        body["reviewer"] = reviewer.map(|u| u.summary()).unwrap_or(Value::Null);
        expanded.push(body);
    }
    Ok(api::success(expanded))
}

/// Product rating = mean of its reviews, 0 with none.
async fn recompute_rating(state: &AppState, product_id: Uuid) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE products SET rating = COALESCE( \
           (SELECT AVG(rating)::float8 FROM reviews WHERE product_id = $1), 0) \
         WHERE id = $1",
    )
    .bind(product_id)
    .execute(&state.pool)
    .await?;
    Ok(())
}
