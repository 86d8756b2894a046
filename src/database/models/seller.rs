use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const APPLICATION_STATUSES: &[&str] = &["pending", "approved", "rejected"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SellerApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub business_type: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub amount: f64,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<Uuid>,
}
