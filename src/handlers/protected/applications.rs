//! Seller onboarding: application submission and review. Approval promotes
//! the applicant to the seller role.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api;
use crate::database::models::{seller::APPLICATION_STATUSES, SellerApplication, User};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub business_name: String,
    pub business_type: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

/// POST /seller-applications — one pending application per user.
pub async fn submit_application(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateApplicationRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.business_name.trim().is_empty() {
        return Err(ApiError::bad_request("Business name is required"));
    }
    if current.0.is_seller() {
        return Err(ApiError::conflict("You are already a seller"));
    }

    let pending = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM seller_applications WHERE user_id = $1 AND status = 'pending'",
    )
    .bind(current.0.id)
    .fetch_one(&state.pool)
    .await?;
    if pending.0 > 0 {
        return Err(ApiError::conflict("You already have a pending application"));
    }

    let application = sqlx::query_as::<_, SellerApplication>(
        "INSERT INTO seller_applications \
         (user_id, business_name, business_type, category, description, address, phone, tax_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(current.0.id)
    .bind(req.business_name.trim())
    .bind(&req.business_type)
    .bind(&req.category)
    .bind(&req.description)
    .bind(&req.address)
    .bind(&req.phone)
    .bind(&req.tax_id)
    .fetch_one(&state.pool)
    .await?;

    // Untargeted: reaches the superadmin audience.
    notify::notify_user(
        &state,
        None,
        "seller_application",
        "New seller application",
        &format!("{} applied to become a seller", current.0.username),
        Some(json!({ "application_id": application.id })),
    )
    .await
    .ok();

    tracing::info!(application_id = %application.id, user_id = %current.0.id, "seller application submitted");
    Ok(api::success(application))
}

/// GET /seller-applications — admin/superadmin, optional status filter.
pub async fn list_applications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Value>, ApiError> {
    current.require_staff()?;
    let applications = sqlx::query_as::<_, SellerApplication>(
        "SELECT * FROM seller_applications \
         WHERE ($1::text IS NULL OR status = $1) ORDER BY submitted_at DESC",
    )
    .bind(&query.status)
    .fetch_all(&state.pool)
    .await?;

    let mut expanded = Vec::with_capacity(applications.len());
    for application in &applications {
        expanded.push(expand_application(&state, application).await?);
    }
    Ok(api::success(expanded))
}

/// GET /seller-applications/my
pub async fn my_applications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let applications = sqlx::query_as::<_, SellerApplication>(
        "SELECT * FROM seller_applications WHERE user_id = $1 ORDER BY submitted_at DESC",
    )
    .bind(current.0.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(api::success(applications))
}

/// GET /seller-applications/:id — owner or staff.
pub async fn get_application(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let application = sqlx::query_as::<_, SellerApplication>(
        "SELECT * FROM seller_applications WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Application not found"))?;

    if application.user_id != current.0.id && !current.0.is_staff() {
        return Err(ApiError::forbidden("Not your application"));
    }
    Ok(api::success(expand_application(&state, &application).await?))
}

/// PUT /seller-applications/:id/status — admin/superadmin.
pub async fn update_application_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplicationStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_staff()?;
    if !APPLICATION_STATUSES.contains(&req.status.as_str()) {
        return Err(ApiError::bad_request(format!(
            "Invalid status, expected one of {:?}",
            APPLICATION_STATUSES
        )));
    }

    let mut tx = state.pool.begin().await?;
    let application = sqlx::query_as::<_, SellerApplication>(
        "UPDATE seller_applications SET status = $2, reason = $3, \
         reviewed_by = $4, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.status)
    .bind(&req.reason)
    .bind(current.0.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Application not found"))?;

    if application.status == "approved" {
        sqlx::query("UPDATE users SET role = 'seller' WHERE id = $1 AND role = 'customer'")
            .bind(application.user_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let (title, message) = match application.status.as_str() {
        "approved" => (
            "Application approved",
            "Congratulations, your seller application was approved".to_string(),
        ),
        "rejected" => (
            "Application rejected",
            format!(
                "Your seller application was rejected{}",
                application
                    .reason
                    .as_deref()
                    .map(|r| format!(": {r}"))
                    .unwrap_or_default()
            ),
        ),
        _ => ("Application updated", "Your seller application status changed".to_string()),
    };
    notify::notify_user(
        &state,
        Some(application.user_id),
        "seller_application",
        title,
        &message,
        Some(json!({ "application_id": application.id, "status": application.status })),
    )
    .await
    .ok();

    tracing::info!(
        application_id = %application.id,
        status = %application.status,
        "seller application reviewed"
    );
    Ok(api::success(application))
}

async fn expand_application(
    state: &AppState,
    application: &SellerApplication,
) -> Result<Value, ApiError> {
    let applicant = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(application.user_id)
        .fetch_optional(&state.pool)
        .await?;
    let mut body = serde_json::to_value(application)?;
    body["applicant"] = applicant.map(|u| u.summary()).unwrap_or(Value::Null);
    Ok(body)
}
