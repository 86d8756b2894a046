//! Sales forecasting with ordinary least squares over daily sales history.
//!
//! Two regressions run per forecast, one over daily units sold and one over
//! daily revenue, each trained on the trailing 90 days. Predictions clamp at
//! zero since negative sales are meaningless; confidence is the mean of the
//! two fits' coefficients of determination.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

/// Days of history the regressions are trained on.
const HISTORY_DAYS: i64 = 90;

/// Cached forecasts older than this are recomputed.
pub const CACHE_MAX_AGE_HOURS: i64 = 24;

/// One observed day of sales for a seller or product.
#[derive(Debug, Clone, Copy)]
pub struct SalesDay {
    pub day_offset: f64,
    pub units: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesForecast {
    pub horizon_days: i64,
    pub predicted_units: Vec<DailyPrediction>,
    pub predicted_revenue: Vec<DailyPrediction>,
    pub total_units: f64,
    pub total_revenue: f64,
    /// Mean R² of the units and revenue fits, 0 for flat or thin history.
    pub confidence: f64,
    pub history_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPrediction {
    pub date: NaiveDate,
    pub amount: f64,
}

struct LinearFit {
    slope: f64,
    intercept: f64,
    r_squared: f64,
}

/// Least-squares fit over (x, y) points. Returns `None` with fewer than two
/// distinct x values.
fn fit_line(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    let mut ss_yy = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        ss_xy += dx * dy;
        ss_xx += dx * dx;
        ss_yy += dy * dy;
    }
    if ss_xx == 0.0 {
        return None;
    }
    let slope = ss_xy / ss_xx;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        r_squared: if ss_yy == 0.0 {
            0.0
        } else {
            (ss_xy * ss_xy) / (ss_xx * ss_yy)
        },
    })
}

/// Extrapolate one series `horizon_days` forward. With too little history
/// the projection repeats the historical mean.
fn project_series(points: &[(f64, f64)], horizon_days: i64) -> (Vec<DailyPrediction>, f64, f64) {
    let today = Utc::now().date_naive();
    let fit = fit_line(points);
    let mean = if points.is_empty() {
        0.0
    } else {
        points.iter().map(|(_, y)| y).sum::<f64>() / points.len() as f64
    };
    let last_x = points.iter().map(|(x, _)| *x).fold(0.0, f64::max);

    let mut daily = Vec::with_capacity(horizon_days as usize);
    let mut total = 0.0;
    for i in 1..=horizon_days {
        let amount = match &fit {
            Some(f) => (f.intercept + f.slope * (last_x + i as f64)).max(0.0),
            None => mean.max(0.0),
        };
        total += amount;
        daily.push(DailyPrediction {
            date: today + Duration::days(i),
            amount: round2(amount),
        });
    }
    let confidence = fit.map(|f| f.r_squared).unwrap_or(0.0);
    (daily, round2(total), confidence)
}

/// Run both regressions over observed history.
pub fn project(history: &[SalesDay], horizon_days: i64) -> SalesForecast {
    let units: Vec<(f64, f64)> = history.iter().map(|d| (d.day_offset, d.units)).collect();
    let revenue: Vec<(f64, f64)> = history.iter().map(|d| (d.day_offset, d.revenue)).collect();

    let (predicted_units, total_units, units_r2) = project_series(&units, horizon_days);
    let (predicted_revenue, total_revenue, revenue_r2) = project_series(&revenue, horizon_days);

    SalesForecast {
        horizon_days,
        predicted_units,
        predicted_revenue,
        total_units,
        total_revenue,
        confidence: round2((units_r2 + revenue_r2) / 2.0),
        history_days: HISTORY_DAYS,
    }
}

/// Load per-day units and revenue for a seller, optionally narrowed to one
/// product. Cancelled orders are excluded.
pub async fn daily_sales(
    pool: &PgPool,
    seller_id: Uuid,
    product_id: Option<Uuid>,
) -> Result<Vec<SalesDay>, ApiError> {
    let since = Utc::now() - Duration::days(HISTORY_DAYS);
    let rows = sqlx::query_as::<_, (NaiveDate, f64, f64)>(
        "SELECT o.created_at::date AS day, \
                SUM(oi.quantity)::float8 AS units, \
                SUM(oi.price * oi.quantity)::float8 AS revenue \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         WHERE oi.seller_id = $1 \
           AND o.status <> 'cancelled' \
           AND o.created_at >= $2 \
           AND ($3::uuid IS NULL OR oi.product_id = $3) \
         GROUP BY day ORDER BY day",
    )
    .bind(seller_id)
    .bind(since)
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    let start = since.date_naive();
    Ok(rows
        .into_iter()
        .map(|(day, units, revenue)| SalesDay {
            day_offset: (day - start).num_days() as f64,
            units,
            revenue,
        })
        .collect())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(days: &[(f64, f64)]) -> Vec<SalesDay> {
        days.iter()
            .enumerate()
            .map(|(i, &(units, revenue))| SalesDay {
                day_offset: i as f64,
                units,
                revenue,
            })
            .collect()
    }

    #[test]
    fn perfect_trend_has_full_confidence() {
        let days = history(&[(1.0, 10.0), (2.0, 20.0), (3.0, 30.0), (4.0, 40.0)]);
        let forecast = project(&days, 3);
        assert_eq!(forecast.confidence, 1.0);
        // Both lines continue: units 5,6,7 and revenue 50,60,70.
        assert_eq!(forecast.predicted_units[0].amount, 5.0);
        assert_eq!(forecast.predicted_revenue[0].amount, 50.0);
        assert_eq!(forecast.total_revenue, 180.0);
    }

    #[test]
    fn declining_trend_clamps_at_zero() {
        let days = history(&[(3.0, 30.0), (2.0, 20.0), (1.0, 10.0)]);
        let forecast = project(&days, 5);
        assert!(forecast.predicted_revenue.iter().all(|d| d.amount >= 0.0));
        assert_eq!(forecast.predicted_revenue.last().unwrap().amount, 0.0);
        assert_eq!(forecast.predicted_units.last().unwrap().amount, 0.0);
    }

    #[test]
    fn flat_history_has_zero_confidence() {
        let days = history(&[(5.0, 15.0), (5.0, 15.0), (5.0, 15.0)]);
        let forecast = project(&days, 2);
        assert_eq!(forecast.confidence, 0.0);
        assert_eq!(forecast.predicted_revenue[0].amount, 15.0);
    }

    #[test]
    fn single_point_falls_back_to_mean() {
        let days = history(&[(2.0, 42.0)]);
        let forecast = project(&days, 2);
        assert_eq!(forecast.total_revenue, 84.0);
        assert_eq!(forecast.total_units, 4.0);
        assert_eq!(forecast.confidence, 0.0);
    }

    #[test]
    fn empty_history_predicts_nothing() {
        let forecast = project(&[], 7);
        assert_eq!(forecast.total_revenue, 0.0);
        assert_eq!(forecast.predicted_units.len(), 7);
    }

    #[test]
    fn mixed_fit_quality_averages_confidence() {
        // Units perfectly linear, revenue flat.
        let days: Vec<SalesDay> = (0..4)
            .map(|i| SalesDay {
                day_offset: i as f64,
                units: (i + 1) as f64,
                revenue: 100.0,
            })
            .collect();
        let forecast = project(&days, 1);
        assert_eq!(forecast.confidence, 0.5);
    }
}
