//! Immutable, validated view of the store relations for one analysis run.

use std::collections::{BTreeMap, BTreeSet};

use shop_domain::{Customer, CustomerId, DateRange, EntityKind, Order, Product, ProductId};

use crate::error::{AnalyticsError, Result};
use crate::source::SalesSource;

/// Point-in-time view of products, customers and orders.
///
/// Construction checks referential integrity and per-record invariants, so
/// every order in a snapshot resolves to an existing product and customer
/// and its total reconciles with quantity × unit price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    products: BTreeMap<ProductId, Product>,
    customers: BTreeMap<CustomerId, Customer>,
    orders: Vec<Order>,
}

impl Snapshot {
    /// Build and validate a snapshot. Orders are kept sorted by id.
    pub fn new(products: Vec<Product>, customers: Vec<Customer>, orders: Vec<Order>) -> Result<Self> {
        let mut product_map = BTreeMap::new();
        for product in products {
            product.validate()?;
            let id = product.id;
            if product_map.insert(id, product).is_some() {
                return Err(duplicate(EntityKind::Product, id.get()));
            }
        }

        let mut customer_map = BTreeMap::new();
        for customer in customers {
            let id = customer.id;
            if customer_map.insert(id, customer).is_some() {
                return Err(duplicate(EntityKind::Customer, id.get()));
            }
        }

        let mut seen = BTreeSet::new();
        for order in &orders {
            if !seen.insert(order.id) {
                return Err(duplicate(EntityKind::Order, order.id.get()));
            }
            if !customer_map.contains_key(&order.customer_id) {
                return Err(AnalyticsError::InvalidReference {
                    order_id: order.id,
                    entity: EntityKind::Customer,
                    id: order.customer_id.get(),
                });
            }
            let product =
                product_map
                    .get(&order.product_id)
                    .ok_or(AnalyticsError::InvalidReference {
                        order_id: order.id,
                        entity: EntityKind::Product,
                        id: order.product_id.get(),
                    })?;
            order.validate(product)?;
        }

        let mut orders = orders;
        orders.sort_by_key(|order| order.id);

        tracing::debug!(
            products = product_map.len(),
            customers = customer_map.len(),
            orders = orders.len(),
            "Snapshot validated"
        );

        Ok(Self {
            products: product_map,
            customers: customer_map,
            orders,
        })
    }

    /// Products keyed by id
    pub fn products(&self) -> &BTreeMap<ProductId, Product> {
        &self.products
    }

    /// Customers keyed by id
    pub fn customers(&self) -> &BTreeMap<CustomerId, Customer> {
        &self.customers
    }

    /// Orders sorted by id
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Resolve the product an order refers to.
    pub fn product_of(&self, order: &Order) -> Result<&Product> {
        self.products
            .get(&order.product_id)
            .ok_or(AnalyticsError::InvalidReference {
                order_id: order.id,
                entity: EntityKind::Product,
                id: order.product_id.get(),
            })
    }

    /// Resolve the customer an order refers to.
    pub fn customer_of(&self, order: &Order) -> Result<&Customer> {
        self.customers
            .get(&order.customer_id)
            .ok_or(AnalyticsError::InvalidReference {
                order_id: order.id,
                entity: EntityKind::Customer,
                id: order.customer_id.get(),
            })
    }

    /// Snapshot with the same products and customers and only the orders
    /// whose date falls inside `range`.
    #[must_use]
    pub fn restricted_to(&self, range: DateRange) -> Self {
        Self {
            products: self.products.clone(),
            customers: self.customers.clone(),
            orders: self
                .orders
                .iter()
                .filter(|order| range.contains(order.order_date()))
                .cloned()
                .collect(),
        }
    }
}

fn duplicate(entity: EntityKind, id: i64) -> AnalyticsError {
    AnalyticsError::invalid_record(entity, id, "duplicate identifier")
}

impl SalesSource for Snapshot {
    fn fetch_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.values().cloned().collect())
    }

    fn fetch_customers(&self) -> Result<Vec<Customer>> {
        Ok(self.customers.values().cloned().collect())
    }

    fn fetch_orders(&self) -> Result<Vec<Order>> {
        Ok(self.orders.clone())
    }

    fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.clone())
    }

    fn snapshot_between(&self, range: DateRange) -> Result<Snapshot> {
        Ok(self.restricted_to(range))
    }
}
