//! Scalar business KPIs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// Headline sales metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesMetrics {
    /// Sum of order totals
    pub total_revenue: f64,
    /// Number of orders
    pub order_count: u64,
    /// Sum of order quantities
    pub units_sold: u64,
    /// Revenue per order, 0 when there are no orders
    pub average_order_value: f64,
    /// Distinct customers with at least one order
    pub unique_customers: u64,
    /// Revenue per ordering customer, 0 when nobody ordered
    pub average_customer_value: f64,
}

/// Division that defines x / 0 as 0.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Compute headline metrics over every order in the snapshot.
pub fn compute_metrics(snapshot: &Snapshot) -> SalesMetrics {
    let orders = snapshot.orders();

    let total_revenue: f64 = orders.iter().map(|o| o.total).sum();
    let units_sold: u64 = orders.iter().map(|o| u64::from(o.quantity)).sum();
    let unique_customers = orders
        .iter()
        .map(|o| o.customer_id)
        .collect::<BTreeSet<_>>()
        .len() as u64;
    let order_count = orders.len() as u64;

    let metrics = SalesMetrics {
        total_revenue,
        order_count,
        units_sold,
        average_order_value: ratio(total_revenue, order_count as f64),
        unique_customers,
        average_customer_value: ratio(total_revenue, unique_customers as f64),
    };

    tracing::debug!(
        total_revenue = metrics.total_revenue,
        orders = metrics.order_count,
        customers = metrics.unique_customers,
        "Computed sales metrics"
    );

    metrics
}
