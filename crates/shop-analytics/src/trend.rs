//! Daily revenue trend.
//!
//! Orders are bucketed by the calendar date of their timestamp. Only days
//! with at least one order appear in the series; the dataset does not model
//! a continuous calendar, so gaps are left as gaps.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::snapshot::Snapshot;

/// Revenue and order count for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRevenue {
    /// Calendar day
    pub date: NaiveDate,
    /// Summed order totals
    pub revenue: f64,
    /// Orders placed that day
    pub order_count: u64,
}

/// Time-ordered daily revenue series with summary statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesTrend {
    /// Strictly ascending by date, one entry per day with orders
    pub days: Vec<DailyRevenue>,
    /// Mean revenue over the days present, 0 for an empty series
    pub average_daily_revenue: f64,
    /// Sample standard deviation, 0 with fewer than two days
    pub revenue_std_dev: f64,
    /// Highest-revenue day, earliest on ties
    pub best_day: Option<DailyRevenue>,
}

impl SalesTrend {
    /// Sum of daily revenue
    pub fn total_revenue(&self) -> f64 {
        self.days.iter().map(|d| d.revenue).sum()
    }

    /// Earliest day with orders
    pub fn first_day(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    /// Latest day with orders
    pub fn last_day(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }
}

/// Bucket orders by calendar day.
pub fn daily_trend(snapshot: &Snapshot) -> SalesTrend {
    let mut buckets: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();
    for order in snapshot.orders() {
        let (revenue, count) = buckets.entry(order.order_date()).or_default();
        *revenue += order.total;
        *count += 1;
    }

    let days: Vec<DailyRevenue> = buckets
        .into_iter()
        .map(|(date, (revenue, order_count))| DailyRevenue {
            date,
            revenue,
            order_count,
        })
        .collect();

    let revenues: Vec<f64> = days.iter().map(|d| d.revenue).collect();
    let average_daily_revenue = if revenues.is_empty() {
        0.0
    } else {
        revenues.iter().mean()
    };
    let revenue_std_dev = if revenues.len() < 2 {
        0.0
    } else {
        revenues.iter().std_dev()
    };

    // Strict comparison keeps the earliest date on equal revenue.
    let best_day = days
        .iter()
        .fold(None::<&DailyRevenue>, |best, day| match best {
            Some(b) if b.revenue >= day.revenue => Some(b),
            _ => Some(day),
        })
        .cloned();

    tracing::debug!(
        days = days.len(),
        average = average_daily_revenue,
        "Computed daily trend"
    );

    SalesTrend {
        days,
        average_daily_revenue,
        revenue_std_dev,
        best_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_metrics;
    use crate::snapshot::fixtures::{self, at, customer, order, product};
    use shop_domain::Category;

    #[test]
    fn test_scenario_trend() {
        let trend = daily_trend(&fixtures::scenario());
        assert_eq!(trend.days.len(), 2);

        assert_eq!(trend.days[0].date, at(1, 0).date());
        assert!((trend.days[0].revenue - 25.0).abs() < 1e-9);
        assert_eq!(trend.days[0].order_count, 2);

        assert_eq!(trend.days[1].date, at(3, 0).date());
        assert!((trend.days[1].revenue - 10.0).abs() < 1e-9);

        assert!((trend.average_daily_revenue - 17.5).abs() < 1e-9);
        assert_eq!(trend.best_day.as_ref().unwrap().date, at(1, 0).date());
    }

    #[test]
    fn test_std_dev_is_sample() {
        let trend = daily_trend(&fixtures::scenario());
        // sample std dev of [25, 10]
        let expected = (2.0f64 * 7.5 * 7.5).sqrt();
        assert!((trend.revenue_std_dev - expected).abs() < 1e-9);
    }

    #[test]
    fn test_best_day_tie_keeps_earliest() {
        let p = product(1, Category::Home, 10.0);
        let orders = vec![order(1, 1, &p, 1, at(9, 10)), order(2, 1, &p, 1, at(4, 10))];
        let snapshot = Snapshot::new(vec![p], vec![customer(1)], orders).unwrap();
        let trend = daily_trend(&snapshot);
        assert_eq!(trend.best_day.unwrap().date, at(4, 0).date());
    }

    #[test]
    fn test_empty_trend() {
        let trend = daily_trend(&Snapshot::default());
        assert_eq!(trend, SalesTrend::default());
        assert!(trend.first_day().is_none());
    }

    #[test]
    fn test_single_day_has_zero_std_dev() {
        let p = product(1, Category::Home, 10.0);
        let snapshot = Snapshot::new(vec![p.clone()], vec![customer(1)], vec![order(1, 1, &p, 2, at(2, 23))]).unwrap();
        let trend = daily_trend(&snapshot);
        assert_eq!(trend.revenue_std_dev, 0.0);
        assert!((trend.average_daily_revenue - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_dates_strictly_increasing_and_sum_to_total() {
        let snapshot = fixtures::random(400);
        let trend = daily_trend(&snapshot);
        assert!(trend.days.windows(2).all(|w| w[0].date < w[1].date));

        let total = compute_metrics(&snapshot).total_revenue;
        assert!((trend.total_revenue() - total).abs() < 1e-6);

        let orders: u64 = trend.days.iter().map(|d| d.order_count).sum();
        assert_eq!(orders, snapshot.orders().len() as u64);
    }
}
