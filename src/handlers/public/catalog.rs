//! Public product browsing. Mutating product endpoints live under the
//! authenticated router in `handlers::protected::products`.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::api;
use crate::database::models::{Product, User};
use crate::error::ApiError;
use crate::handlers::Pagination;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub brand: Option<String>,
    pub in_stock: Option<bool>,
    pub min_rating: Option<f64>,
    pub seller_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /products
pub async fn list_products(
    State(state): State<AppState>,
    Query(filters): Query<ProductFilters>,
) -> Result<Json<Value>, ApiError> {
    let mut qb = QueryBuilder::new("SELECT * FROM products WHERE TRUE");

    if let Some(category) = &filters.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min) = filters.min_price {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filters.max_price {
        qb.push(" AND price <= ").push_bind(max);
    }
    if let Some(brand) = &filters.brand {
        qb.push(" AND brand = ").push_bind(brand);
    }
    if filters.in_stock == Some(true) {
        qb.push(" AND stock > 0");
    }
    if let Some(rating) = filters.min_rating {
        qb.push(" AND rating >= ").push_bind(rating);
    }
    if let Some(seller_id) = filters.seller_id {
        qb.push(" AND seller_id = ").push_bind(seller_id);
    }

    let (limit, offset) = Pagination {
        page: filters.page,
        limit: filters.limit,
    }
    .window();
    qb.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let products: Vec<Product> = qb.build_query_as().fetch_all(&state.pool).await?;
    Ok(api::success(products))
}

/// GET /products/categories
pub async fn categories(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT DISTINCT category FROM products WHERE category IS NOT NULL ORDER BY category",
    )
    .fetch_all(&state.pool)
    .await?;
    let categories: Vec<String> = rows.into_iter().map(|(c,)| c).collect();
    Ok(api::success(categories))
}

/// GET /products/:id — embeds a seller summary.
pub async fn product_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let seller = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(product.seller_id)
        .fetch_optional(&state.pool)
        .await?;

    let mut body = serde_json::to_value(&product)?;
    body["seller"] = seller.map(|s| s.summary()).unwrap_or(Value::Null);
    Ok(api::success(body))
}

/// POST /products/:id/views
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    bump_counter(&state, id, "views_count").await
}

/// POST /products/:id/clicks
pub async fn record_click(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    bump_counter(&state, id, "clicks_count").await
}

async fn bump_counter(state: &AppState, id: Uuid, column: &str) -> Result<Json<Value>, ApiError> {
    // column is one of two compile-time literals, never user input
    let sql = format!(
        "UPDATE products SET {column} = {column} + 1 WHERE id = $1 RETURNING {column}"
    );
    let count = sqlx::query_as::<_, (i32,)>(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(api::success(json!({ "count": count.0 })))
}
