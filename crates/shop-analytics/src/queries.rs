//! SQL aggregates computed inside DuckDB.
//!
//! These mirror the in-process engine and are used to cross-check it
//! against the database.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::metrics::SalesMetrics;
use crate::store::{DuckDbStore, DATE_FORMAT};
use crate::trend::DailyRevenue;

/// Revenue totals as computed by SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueSummary {
    /// `SUM(total)`
    pub total_revenue: f64,
    /// `COUNT(*)`
    pub order_count: u64,
    /// `COUNT(DISTINCT customer_id)`
    pub unique_customers: u64,
    /// `SUM(quantity)`
    pub units_sold: u64,
}

/// Outcome of comparing engine metrics against SQL aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Totals as SQL sees them
    pub sql: RevenueSummary,
    /// Absolute revenue difference
    pub revenue_delta: f64,
    /// Whether every total agrees
    pub matches: bool,
}

/// Tolerance on revenue when reconciling.
pub const RECONCILE_TOLERANCE: f64 = 1e-6;

impl DuckDbStore {
    /// Headline totals straight from the orders relation.
    pub fn revenue_summary(&self) -> Result<RevenueSummary> {
        self.require_relation("orders")?;

        let (total_revenue, order_count, unique_customers, units_sold) = self.conn.query_row(
            r#"
            SELECT
                COALESCE(SUM(total), 0.0) as total_revenue,
                COUNT(*) as order_count,
                COUNT(DISTINCT customer_id) as unique_customers,
                CAST(COALESCE(SUM(quantity), 0) AS BIGINT) as units_sold
            FROM orders
            "#,
            [],
            |row| {
                Ok((
                    row.get::<_, f64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;

        Ok(RevenueSummary {
            total_revenue,
            order_count: non_negative(order_count)?,
            unique_customers: non_negative(unique_customers)?,
            units_sold: non_negative(units_sold)?,
        })
    }

    /// Revenue and order count per calendar day, ascending.
    pub fn daily_revenue(&self) -> Result<Vec<DailyRevenue>> {
        self.require_relation("orders")?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                strftime(CAST(ordered_at AS DATE), '%Y-%m-%d') as day,
                SUM(total) as revenue,
                COUNT(*) as order_count
            FROM orders
            GROUP BY day
            ORDER BY day
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let raw = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(day, revenue, count)| {
                let date = NaiveDate::parse_from_str(&day, DATE_FORMAT)
                    .map_err(|e| AnalyticsError::Conversion(format!("day '{day}': {e}")))?;
                Ok(DailyRevenue {
                    date,
                    revenue,
                    order_count: non_negative(count)?,
                })
            })
            .collect()
    }

    /// Revenue per category, highest first.
    pub fn category_revenue(&self) -> Result<Vec<(String, f64)>> {
        self.require_relation("orders")?;
        self.require_relation("products")?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                p.category,
                SUM(o.total) as revenue
            FROM orders o
            JOIN products p ON o.product_id = p.id
            GROUP BY p.category
            ORDER BY revenue DESC, p.category
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(AnalyticsError::from)
    }

    /// Compare engine metrics with the SQL totals for the same data.
    pub fn reconcile(&self, metrics: &SalesMetrics) -> Result<Reconciliation> {
        let sql = self.revenue_summary()?;
        let revenue_delta = (sql.total_revenue - metrics.total_revenue).abs();
        let matches = revenue_delta <= RECONCILE_TOLERANCE
            && sql.order_count == metrics.order_count
            && sql.unique_customers == metrics.unique_customers
            && sql.units_sold == metrics.units_sold;

        if !matches {
            tracing::warn!(
                sql_revenue = sql.total_revenue,
                engine_revenue = metrics.total_revenue,
                sql_orders = sql.order_count,
                engine_orders = metrics.order_count,
                "Engine metrics disagree with SQL aggregates"
            );
        }

        Ok(Reconciliation {
            sql,
            revenue_delta,
            matches,
        })
    }
}

fn non_negative(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| AnalyticsError::Conversion(format!("negative count {value}")))
}
