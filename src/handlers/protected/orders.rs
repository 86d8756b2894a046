//! Order lifecycle: creation with stock accounting, role-scoped listing,
//! status transitions and shipment tracking.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use uuid::Uuid;

use crate::api;
use crate::database::models::{order::ORDER_STATUSES, Order, OrderItem, Product, TrackingEvent, User};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CreateOrderItem>,
    pub shipping_address: Option<Value>,
    pub billing_address: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub tracking_number: String,
    pub carrier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackingEventRequest {
    pub status: String,
    pub location: String,
    pub description: Option<String>,
}

/// GET /orders — customers see their own orders, sellers the orders that
/// contain their items, superadmins everything.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Value>, ApiError> {
    let (limit, offset) = crate::handlers::Pagination {
        page: query.page,
        limit: query.limit,
    }
    .window();

    let orders = sqlx::query_as::<_, Order>(
        "SELECT DISTINCT o.* FROM orders o \
         LEFT JOIN order_items oi ON oi.order_id = o.id \
         WHERE ($1 OR o.user_id = $2 OR ($3 AND oi.seller_id = $2)) \
           AND ($4::text IS NULL OR o.status = $4) \
         ORDER BY o.created_at DESC LIMIT $5 OFFSET $6",
    )
    .bind(current.0.is_superadmin())
    .bind(current.0.id)
    .bind(current.0.is_seller())
    .bind(&query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let mut expanded = Vec::with_capacity(orders.len());
    for order in &orders {
        expanded.push(expand_order(&state, order).await?);
    }
    Ok(api::success(expanded))
}

/// GET /orders/count
pub async fn count_orders(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Value>, ApiError> {
    let count = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(DISTINCT o.id) FROM orders o \
         LEFT JOIN order_items oi ON oi.order_id = o.id \
         WHERE ($1 OR o.user_id = $2 OR ($3 AND oi.seller_id = $2)) \
           AND ($4::text IS NULL OR o.status = $4)",
    )
    .bind(current.0.is_superadmin())
    .bind(current.0.id)
    .bind(current.0.is_seller())
    .bind(&query.status)
    .fetch_one(&state.pool)
    .await?;
    Ok(api::success(json!({ "count": count.0 })))
}

/// GET /orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let order = load_visible(&state, &current, id).await?;
    Ok(api::success(expand_order(&state, &order).await?))
}

/// POST /orders
///
/// Stock is checked and decremented per item inside one transaction; unit
/// price is the product's discounted price at purchase time. Each distinct
/// seller gets a notification.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::bad_request("Order must contain at least one item"));
    }
    for item in &req.items {
        if item.quantity <= 0 {
            return Err(ApiError::bad_request("Item quantity must be positive"));
        }
    }

    let mut tx = state.pool.begin().await?;

    let mut total = 0.0;
    let mut line_items = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let product =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
                .bind(item.product_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ApiError::not_found("Product not found"))?;

        if product.stock < item.quantity {
            return Err(ApiError::bad_request(format!(
                "Insufficient stock for '{}': {} available",
                product.title, product.stock
            )));
        }

        let unit_price = product.effective_price();
        total += unit_price * item.quantity as f64;

        sqlx::query(
            "UPDATE products SET stock = stock - $2, sales_count = sales_count + $2 \
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;

        line_items.push((product, item.quantity, unit_price));
    }

    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (user_id, total, shipping_address, billing_address) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(current.0.id)
    .bind((total * 100.0).round() / 100.0)
    .bind(&req.shipping_address)
    .bind(&req.billing_address)
    .fetch_one(&mut *tx)
    .await?;

    for (product, quantity, unit_price) in &line_items {
        sqlx::query(
            "INSERT INTO order_items \
             (order_id, product_id, seller_id, quantity, price, product_title, product_image) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.id)
        .bind(product.id)
        .bind(product.seller_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(&product.title)
        .bind(&product.image_url)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(order_id = %order.id, user_id = %current.0.id, total, "order created");

    let sellers: HashSet<Uuid> = line_items.iter().map(|(p, _, _)| p.seller_id).collect();
    for seller_id in sellers {
        notify::notify_user(
            &state,
            Some(seller_id),
            "new_order",
            "New order",
            &format!("Order #{} contains your products", order.short_ref()),
            Some(json!({ "order_id": order.id })),
        )
        .await
        .ok();
    }

    Ok(api::success(expand_order(&state, &order).await?))
}

/// PUT /orders/:id/status — involved seller or superadmin.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    if !ORDER_STATUSES.contains(&req.status.as_str()) {
        return Err(ApiError::bad_request(format!(
            "Invalid status, expected one of {:?}",
            ORDER_STATUSES
        )));
    }

    let order = load_visible(&state, &current, id).await?;
    if !current.0.is_superadmin() && !seller_involved(&state, &current, order.id).await? {
        return Err(ApiError::forbidden("Only an involved seller can update this order"));
    }
    if order.status == "cancelled" {
        return Err(ApiError::bad_request("Cancelled orders cannot be updated"));
    }

    let mut tx = state.pool.begin().await?;
    if req.status == "cancelled" {
        // Put the stock and sales counters back.
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1",
        )
        .bind(order.id)
        .fetch_all(&mut *tx)
        .await?;
        for item in &items {
            sqlx::query(
                "UPDATE products SET stock = stock + $2, \
                 sales_count = GREATEST(sales_count - $2, 0) WHERE id = $1",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }
    }

    let updated = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(&req.status)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    notify::notify_user(
        &state,
        Some(updated.user_id),
        "order_status",
        "Order update",
        &format!("Order #{} is now {}", updated.short_ref(), updated.status),
        Some(json!({ "order_id": updated.id, "status": updated.status })),
    )
    .await
    .ok();

    Ok(api::success(updated))
}

/// PUT /orders/:id/tracking
pub async fn set_tracking(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<TrackingRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.tracking_number.trim().is_empty() {
        return Err(ApiError::bad_request("Tracking number is required"));
    }
    let order = load_visible(&state, &current, id).await?;
    if !current.0.is_superadmin() && !seller_involved(&state, &current, order.id).await? {
        return Err(ApiError::forbidden("Only an involved seller can update this order"));
    }

    let updated = sqlx::query_as::<_, Order>(
        "UPDATE orders SET tracking_number = $2, carrier = $3, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(req.tracking_number.trim())
    .bind(&req.carrier)
    .fetch_one(&state.pool)
    .await?;

    notify::notify_user(
        &state,
        Some(updated.user_id),
        "order_tracking",
        "Shipment tracking",
        &format!(
            "Order #{} tracking number: {}",
            updated.short_ref(),
            req.tracking_number.trim()
        ),
        Some(json!({ "order_id": updated.id })),
    )
    .await
    .ok();

    Ok(api::success(updated))
}

/// POST /orders/:id/tracking-updates
pub async fn add_tracking_event(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<TrackingEventRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.status.trim().is_empty() || req.location.trim().is_empty() {
        return Err(ApiError::bad_request("Status and location are required"));
    }
    let order = load_visible(&state, &current, id).await?;
    if !current.0.is_superadmin() && !seller_involved(&state, &current, order.id).await? {
        return Err(ApiError::forbidden("Only an involved seller can update this order"));
    }

    let event = sqlx::query_as::<_, TrackingEvent>(
        "INSERT INTO order_tracking_events (order_id, status, location, description) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(order.id)
    .bind(req.status.trim())
    .bind(req.location.trim())
    .bind(req.description.as_deref().unwrap_or(""))
    .fetch_one(&state.pool)
    .await?;

    notify::notify_user(
        &state,
        Some(order.user_id),
        "order_tracking",
        "Shipment update",
        &format!("Order #{}: {} at {}", order.short_ref(), event.status, event.location),
        Some(json!({ "order_id": order.id })),
    )
    .await
    .ok();

    Ok(api::success(event))
}

/// GET /orders/:id/track
pub async fn track_order(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let order = load_visible(&state, &current, id).await?;
    let events = sqlx::query_as::<_, TrackingEvent>(
        "SELECT * FROM order_tracking_events WHERE order_id = $1 ORDER BY occurred_at",
    )
    .bind(order.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(api::success(json!({ "order": order, "events": events })))
}

/// Fetch the order iff the current user may see it.
async fn load_visible(
    state: &AppState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<Order, ApiError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    if order.user_id == current.0.id || current.0.is_superadmin() {
        return Ok(order);
    }
    if current.0.is_seller() && seller_involved(state, current, order.id).await? {
        return Ok(order);
    }
    Err(ApiError::forbidden("Not your order"))
}

async fn seller_involved(
    state: &AppState,
    current: &CurrentUser,
    order_id: Uuid,
) -> Result<bool, ApiError> {
    let count = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM order_items WHERE order_id = $1 AND seller_id = $2",
    )
    .bind(order_id)
    .bind(current.0.id)
    .fetch_one(&state.pool)
    .await?;
    Ok(count.0 > 0)
}

/// Order plus buyer summary and items with product/seller summaries.
async fn expand_order(state: &AppState, order: &Order) -> Result<Value, ApiError> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1")
        .bind(order.id)
        .fetch_all(&state.pool)
        .await?;

    let buyer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(order.user_id)
        .fetch_optional(&state.pool)
        .await?;

    let mut item_values = Vec::with_capacity(items.len());
    for item in &items {
        let seller = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(item.seller_id)
            .fetch_optional(&state.pool)
            .await?;
        let mut value = serde_json::to_value(item)?;
        value["seller"] = seller.map(|s| s.summary()).unwrap_or(Value::Null);
        item_values.push(value);
    }

    let mut body = serde_json::to_value(order)?;
    body["buyer"] = buyer.map(|u| u.summary()).unwrap_or(Value::Null);
    body["items"] = Value::Array(item_values);
    Ok(body)
}
