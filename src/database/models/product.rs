use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub stock: i32,
    pub rating: f64,
    pub discount_percent: f64,
    pub tags: Vec<String>,
    pub views_count: i32,
    pub clicks_count: i32,
    pub sales_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Unit price with the product's own discount applied.
    pub fn effective_price(&self) -> f64 {
        if self.discount_percent > 0.0 {
            self.price * (1.0 - self.discount_percent / 100.0)
        } else {
            self.price
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: f64, discount: f64) -> Product {
        Product {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            title: "t".into(),
            description: None,
            price,
            category: None,
            brand: None,
            image_url: None,
            stock: 1,
            rating: 0.0,
            discount_percent: discount,
            tags: vec![],
            views_count: 0,
            clicks_count: 0,
            sales_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn effective_price_applies_discount() {
        assert!((product(100.0, 25.0).effective_price() - 75.0).abs() < 1e-9);
        assert!((product(100.0, 0.0).effective_price() - 100.0).abs() < 1e-9);
    }
}
