//! Commission rate resolution for seller payouts.
//!
//! Rate precedence, highest first:
//!   1. per-seller override set by a superadmin
//!   2. top-seller bonus rate for the sellers with the most completed orders
//!   3. platform default rate
//!
//! Runtime-adjustable defaults live in `AppState` behind an `RwLock`;
//! configuration only seeds them at startup.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::config;
use crate::error::ApiError;

/// Mutable platform-wide commission settings, seeded from configuration.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CommissionDefaults {
    pub default_rate: f64,
    pub top_seller_bonus: f64,
}

impl CommissionDefaults {
    pub fn from_config() -> Self {
        let cfg = &config().commission;
        Self {
            default_rate: cfg.default_rate,
            top_seller_bonus: cfg.top_seller_bonus,
        }
    }
}

/// The effective rate for one seller. An override always wins, even over the
/// top-seller bonus.
pub fn effective_rate(
    override_rate: Option<f64>,
    is_top: bool,
    defaults: &CommissionDefaults,
) -> f64 {
    match override_rate {
        Some(rate) => rate,
        None if is_top => defaults.top_seller_bonus,
        None => defaults.default_rate,
    }
}

/// Sellers ranked into the top tier by completed order count within the
/// `[from, to)` window. Sellers with zero orders in the window never
/// qualify, even when fewer sellers exist than slots.
pub async fn top_seller_ids(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    count: i64,
) -> Result<Vec<Uuid>, ApiError> {
    let rows = sqlx::query_as::<_, (Uuid,)>(
        "SELECT oi.seller_id FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         WHERE o.status <> 'cancelled' AND o.created_at >= $1 AND o.created_at < $2 \
         GROUP BY oi.seller_id \
         HAVING COUNT(DISTINCT o.id) > 0 \
         ORDER BY COUNT(DISTINCT o.id) DESC, oi.seller_id \
         LIMIT $3",
    )
    .bind(from)
    .bind(to)
    .bind(count)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Split a gross sale amount into platform commission and seller earnings.
pub fn split_amount(gross: f64, rate: f64) -> (f64, f64) {
    let commission = round_currency(gross * rate);
    (commission, round_currency(gross - commission))
}

fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> CommissionDefaults {
        CommissionDefaults {
            default_rate: 0.10,
            top_seller_bonus: 0.15,
        }
    }

    #[test]
    fn split_rounds_to_cents() {
        let (commission, earnings) = split_amount(99.99, 0.10);
        assert_eq!(commission, 10.0);
        assert_eq!(earnings, 89.99);
    }

    #[test]
    fn split_with_zero_rate_keeps_everything() {
        let (commission, earnings) = split_amount(50.0, 0.0);
        assert_eq!(commission, 0.0);
        assert_eq!(earnings, 50.0);
    }

    #[test]
    fn override_beats_top_bonus_and_default() {
        assert_eq!(effective_rate(Some(0.07), true, &defaults()), 0.07);
        assert_eq!(effective_rate(Some(0.07), false, &defaults()), 0.07);
    }

    #[test]
    fn top_sellers_get_the_bonus_rate() {
        assert_eq!(effective_rate(None, true, &defaults()), 0.15);
    }

    #[test]
    fn everyone_else_gets_the_default() {
        assert_eq!(effective_rate(None, false, &defaults()), 0.10);
    }

    #[test]
    fn defaults_seed_from_config() {
        let defaults = CommissionDefaults::from_config();
        assert!(defaults.default_rate > 0.0);
        assert!(defaults.top_seller_bonus > defaults.default_rate);
    }
}
