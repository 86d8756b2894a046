use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Promotion {
    pub id: Uuid,
    pub code: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: f64,
    pub min_purchase: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub product_ids: Vec<Uuid>,
    pub categories: Vec<String>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub seller_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    /// Discount for the given cart total, percentage or fixed.
    pub fn discount_amount(&self, cart_total: f64) -> f64 {
        if self.discount_type == "percentage" {
            cart_total * (self.discount_value / 100.0)
        } else {
            self.discount_value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn promotion(kind: &str, value: f64) -> Promotion {
        Promotion {
            id: Uuid::new_v4(),
            code: "SAVE".into(),
            title: None,
            description: None,
            discount_type: kind.into(),
            discount_value: value,
            min_purchase: 0.0,
            start_date: Utc::now(),
            end_date: None,
            product_ids: vec![],
            categories: vec![],
            usage_limit: None,
            usage_count: 0,
            seller_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_discount() {
        assert!((promotion("percentage", 20.0).discount_amount(50.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_discount_ignores_total() {
        assert!((promotion("fixed", 5.0).discount_amount(50.0) - 5.0).abs() < 1e-9);
    }
}
