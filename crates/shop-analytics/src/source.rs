//! # Data Source
//!
//! Read-only access to the three store relations. Implementations can be
//! swapped for different backends (DuckDB, in-memory snapshot, ...).

use shop_domain::{Customer, DateRange, Order, Product};

use crate::error::Result;
use crate::snapshot::Snapshot;

/// Read-only source of products, customers and orders.
pub trait SalesSource {
    /// Fetch all rows of the products relation
    fn fetch_products(&self) -> Result<Vec<Product>>;

    /// Fetch all rows of the customers relation
    fn fetch_customers(&self) -> Result<Vec<Customer>>;

    /// Fetch all rows of the orders relation
    fn fetch_orders(&self) -> Result<Vec<Order>>;

    /// Fetch orders whose calendar date falls inside `range`
    fn fetch_orders_between(&self, range: DateRange) -> Result<Vec<Order>> {
        Ok(self
            .fetch_orders()?
            .into_iter()
            .filter(|order| range.contains(order.order_date()))
            .collect())
    }

    /// Load a validated snapshot of all three relations.
    fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::new(
            self.fetch_products()?,
            self.fetch_customers()?,
            self.fetch_orders()?,
        )
    }

    /// Load a validated snapshot restricted to orders inside `range`.
    ///
    /// Products and customers are always loaded in full so that references
    /// from the filtered orders still resolve.
    fn snapshot_between(&self, range: DateRange) -> Result<Snapshot> {
        Snapshot::new(
            self.fetch_products()?,
            self.fetch_customers()?,
            self.fetch_orders_between(range)?,
        )
    }
}
