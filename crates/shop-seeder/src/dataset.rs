//! Full dataset generation and loading.

use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use shop_analytics::store::RelationCounts;
use shop_analytics::{DuckDbStore, Snapshot};
use shop_domain::{Customer, Order, Product};

use crate::catalog::{self, CustomerGenerator};
use crate::orders::OrderGenerator;

pub const DEFAULT_ORDER_COUNT: usize = 200;

/// Seeding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Number of orders to generate
    pub order_count: usize,
    /// RNG seed; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Date that registration and order offsets count back from
    pub anchor: NaiveDate,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            order_count: DEFAULT_ORDER_COUNT,
            seed: None,
            anchor: Utc::now().date_naive(),
        }
    }
}

/// Generated relations, ready to load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
    pub orders: Vec<Order>,
}

impl Dataset {
    /// Generate the catalog, the customer roster and `order_count` orders.
    pub fn generate(config: &SeedConfig) -> anyhow::Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let products = catalog::products();
        let mut customer_gen = CustomerGenerator::new(rng);
        let customers = customer_gen.generate(config.anchor);

        let mut order_gen = OrderGenerator::new(customer_gen.into_rng())?;
        let orders = order_gen.generate(config.order_count, &products, &customers, config.anchor);

        tracing::debug!(
            products = products.len(),
            customers = customers.len(),
            orders = orders.len(),
            seed = ?config.seed,
            anchor = %config.anchor,
            "Dataset generated"
        );

        Ok(Self {
            products,
            customers,
            orders,
        })
    }

    /// Check the dataset against the snapshot invariants.
    pub fn to_snapshot(&self) -> shop_analytics::error::Result<Snapshot> {
        Snapshot::new(
            self.products.clone(),
            self.customers.clone(),
            self.orders.clone(),
        )
    }

    /// Insert every relation into `store` in one transaction.
    ///
    /// Fails without writing anything if any id is already present.
    pub fn load_into(&self, store: &DuckDbStore) -> shop_analytics::error::Result<RelationCounts> {
        store.insert_dataset(&self.products, &self.customers, &self.orders)
    }

    /// Load into `store`, clearing it first when `reset` is set.
    ///
    /// A store that already holds rows is refused unless `reset` is given,
    /// so the database always matches the dataset that was generated.
    pub fn seed(&self, store: &DuckDbStore, reset: bool) -> anyhow::Result<RelationCounts> {
        if reset {
            store.clear()?;
        } else {
            let existing = store.row_counts()?;
            if !existing.is_empty() {
                anyhow::bail!(
                    "store already holds {} products, {} customers and {} orders; rerun with --reset",
                    existing.products,
                    existing.customers,
                    existing.orders
                );
            }
        }
        Ok(self.load_into(store)?)
    }
}
