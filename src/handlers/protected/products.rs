//! Product management for sellers. Browsing is public, see
//! `handlers::public::catalog`.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api;
use crate::database::models::Product;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub stock: Option<i32>,
    pub discount_percent: Option<f64>,
    pub tags: Option<Vec<String>>,
}

/// POST /products — seller or superadmin.
pub async fn create_product(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateProductRequest>,
) -> Result<Json<Value>, ApiError> {
    if !current.0.is_seller() && !current.0.is_superadmin() {
        return Err(ApiError::forbidden("Seller access required"));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::bad_request("Product title is required"));
    }
    if req.price <= 0.0 {
        return Err(ApiError::bad_request("Price must be positive"));
    }
    if req.stock < 0 {
        return Err(ApiError::bad_request("Stock cannot be negative"));
    }
    if !(0.0..=100.0).contains(&req.discount_percent) {
        return Err(ApiError::bad_request("Discount must be between 0 and 100"));
    }

    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products \
         (seller_id, title, description, price, category, brand, image_url, stock, \
          discount_percent, tags) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(current.0.id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.category)
    .bind(&req.brand)
    .bind(&req.image_url)
    .bind(req.stock)
    .bind(req.discount_percent)
    .bind(&req.tags)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(product_id = %product.id, seller_id = %current.0.id, "product created");
    Ok(api::success(product))
}

/// PUT /products/:id — owner or superadmin.
pub async fn update_product(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Value>, ApiError> {
    let product = load_owned(&state, &current, id).await?;

    if let Some(price) = req.price {
        if price <= 0.0 {
            return Err(ApiError::bad_request("Price must be positive"));
        }
    }
    if let Some(stock) = req.stock {
        if stock < 0 {
            return Err(ApiError::bad_request("Stock cannot be negative"));
        }
    }
    if let Some(discount) = req.discount_percent {
        if !(0.0..=100.0).contains(&discount) {
            return Err(ApiError::bad_request("Discount must be between 0 and 100"));
        }
    }

    let updated = sqlx::query_as::<_, Product>(
        "UPDATE products SET \
           title = COALESCE($2, title), \
           description = COALESCE($3, description), \
           price = COALESCE($4, price), \
           category = COALESCE($5, category), \
           brand = COALESCE($6, brand), \
           image_url = COALESCE($7, image_url), \
           stock = COALESCE($8, stock), \
           discount_percent = COALESCE($9, discount_percent), \
           tags = COALESCE($10, tags), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(product.id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.category)
    .bind(&req.brand)
    .bind(&req.image_url)
    .bind(req.stock)
    .bind(req.discount_percent)
    .bind(&req.tags)
    .fetch_one(&state.pool)
    .await?;

    Ok(api::success(updated))
}

/// DELETE /products/:id — owner or superadmin.
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let product = load_owned(&state, &current, id).await?;
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product.id)
        .execute(&state.pool)
        .await?;
    tracing::info!(product_id = %product.id, "product deleted");
    Ok(api::success_message("Product deleted"))
}

async fn load_owned(
    state: &AppState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<Product, ApiError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    if product.seller_id != current.0.id && !current.0.is_superadmin() {
        return Err(ApiError::forbidden("Not your product"));
    }
    Ok(product)
}
