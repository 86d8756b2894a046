use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored notification. `user_id = None` addresses the superadmin audience
/// (seller applications, payout requests and similar platform events).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}
