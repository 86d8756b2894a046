use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

pub const ORDER_STATUSES: &[&str] = &["pending", "processing", "shipped", "delivered", "cancelled"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub total: f64,
    pub shipping_address: Option<Value>,
    pub billing_address: Option<Value>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Short human-facing reference, e.g. for notification copy.
    pub fn short_ref(&self) -> String {
        let s = self.id.simple().to_string();
        s[s.len() - 6..].to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i32,
    pub price: f64,
    pub product_title: String,
    pub product_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackingEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    pub location: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ref_is_six_chars() {
        let order = Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: "pending".into(),
            payment_status: "pending".into(),
            total: 0.0,
            shipping_address: None,
            billing_address: None,
            tracking_number: None,
            carrier: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(order.short_ref().len(), 6);
    }
}
