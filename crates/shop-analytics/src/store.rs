//! DuckDB-backed store for the products, customers and orders relations.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use duckdb::{params, AccessMode, Config as DbConfig, Connection};
use serde::{Deserialize, Serialize};
use shop_domain::{
    Category, Customer, CustomerId, DateRange, EntityKind, Order, OrderId, Product, ProductId,
};

use crate::error::{AnalyticsError, Result};
use crate::source::SalesSource;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
/// Written on insert and parsed on read. DuckDB timestamps keep microseconds,
/// so the fraction is carried through.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Relation names, in dependency order.
pub const RELATIONS: [&str; 3] = ["products", "customers", "orders"];

/// Row counts of the three relations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCounts {
    /// Rows in `products`
    pub products: u64,
    /// Rows in `customers`
    pub customers: u64,
    /// Rows in `orders`
    pub orders: u64,
}

impl RelationCounts {
    /// Whether all three relations are empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.products == 0 && self.customers == 0 && self.orders == 0
    }
}

/// DuckDB store for the online store relations.
pub struct DuckDbStore {
    pub(crate) conn: Connection,
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore").finish_non_exhaustive()
    }
}

impl DuckDbStore {
    /// Create a new in-memory store.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create a store with persistent storage, creating the schema if needed.
    pub fn new_persistent<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an existing database file read-only, without touching its schema.
    ///
    /// Missing tables surface as `DataUnavailable` when read.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnalyticsError::DataUnavailable(format!(
                "database file {} does not exist",
                path.display()
            )));
        }
        let config = DbConfig::default().access_mode(AccessMode::ReadOnly)?;
        Ok(Self {
            conn: Connection::open_with_flags(path, config)?,
        })
    }

    /// Initialize the store schema.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id BIGINT PRIMARY KEY,
                name VARCHAR NOT NULL,
                category VARCHAR NOT NULL,
                unit_price DOUBLE NOT NULL,
                stock INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS customers (
                id BIGINT PRIMARY KEY,
                name VARCHAR NOT NULL,
                email VARCHAR NOT NULL UNIQUE,
                registered_on DATE NOT NULL,
                city VARCHAR NOT NULL
            );

            -- Orders fact table. References are checked when a snapshot is
            -- loaded so that dangling ids are reported, not rejected on insert.
            CREATE TABLE IF NOT EXISTS orders (
                id BIGINT PRIMARY KEY,
                customer_id BIGINT NOT NULL,
                product_id BIGINT NOT NULL,
                quantity INTEGER NOT NULL,
                ordered_at TIMESTAMP NOT NULL,
                total DOUBLE NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_id);
            CREATE INDEX IF NOT EXISTS idx_orders_product ON orders(product_id);
            CREATE INDEX IF NOT EXISTS idx_orders_ordered_at ON orders(ordered_at);
            "#,
        )?;
        Ok(())
    }

    /// Insert a product.
    pub fn insert_product(&self, product: &Product) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO products (id, name, category, unit_price, stock)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                product.id.get(),
                product.name,
                product.category.as_str(),
                product.unit_price,
                i64::from(product.stock),
            ],
        )?;
        Ok(())
    }

    /// Insert a customer.
    pub fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO customers (id, name, email, registered_on, city)
            VALUES (?, ?, ?, CAST(? AS DATE), ?)
            "#,
            params![
                customer.id.get(),
                customer.name,
                customer.email,
                customer.registered_on.format(DATE_FORMAT).to_string(),
                customer.city,
            ],
        )?;
        Ok(())
    }

    /// Insert an order.
    pub fn insert_order(&self, order: &Order) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO orders (id, customer_id, product_id, quantity, ordered_at, total)
            VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), ?)
            "#,
            params![
                order.id.get(),
                order.customer_id.get(),
                order.product_id.get(),
                i64::from(order.quantity),
                order.ordered_at.format(TIMESTAMP_FORMAT).to_string(),
                order.total,
            ],
        )?;
        Ok(())
    }

    /// Insert a full dataset in one transaction.
    ///
    /// Any row whose id already exists aborts the whole load and leaves the
    /// store as it was.
    pub fn insert_dataset(
        &self,
        products: &[Product],
        customers: &[Customer],
        orders: &[Order],
    ) -> Result<RelationCounts> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        let inserted = self.insert_all(products, customers, orders);
        match inserted {
            Ok(()) => self.conn.execute_batch("COMMIT")?,
            Err(e) => {
                self.conn.execute_batch("ROLLBACK")?;
                return Err(e);
            }
        }

        tracing::info!(
            products = products.len(),
            customers = customers.len(),
            orders = orders.len(),
            "Dataset inserted"
        );
        self.row_counts()
    }

    fn insert_all(&self, products: &[Product], customers: &[Customer], orders: &[Order]) -> Result<()> {
        for product in products {
            self.insert_product(product)?;
        }
        for customer in customers {
            self.insert_customer(customer)?;
        }
        for order in orders {
            self.insert_order(order)?;
        }
        Ok(())
    }

    /// Delete every row, orders first.
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM orders; DELETE FROM customers; DELETE FROM products;")?;
        tracing::info!("Store cleared");
        Ok(())
    }

    /// Whether a relation exists in the database.
    pub fn relation_exists(&self, relation: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            params![relation],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn require_relation(&self, relation: &str) -> Result<()> {
        if self.relation_exists(relation)? {
            Ok(())
        } else {
            Err(AnalyticsError::DataUnavailable(relation.to_string()))
        }
    }

    /// Row counts of the three relations.
    pub fn row_counts(&self) -> Result<RelationCounts> {
        let mut counts = [0u64; 3];
        for (slot, relation) in counts.iter_mut().zip(RELATIONS) {
            self.require_relation(relation)?;
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {relation}"), [], |row| row.get(0))?;
            *slot = n.try_into().unwrap_or_default();
        }
        Ok(RelationCounts {
            products: counts[0],
            customers: counts[1],
            orders: counts[2],
        })
    }

    fn query_orders(&self, filter: Option<DateRange>) -> Result<Vec<Order>> {
        self.require_relation("orders")?;

        let select = r#"
            SELECT id, customer_id, product_id, quantity,
                   strftime(ordered_at, '%Y-%m-%d %H:%M:%S.%f'), total
            FROM orders
        "#;
        let map_row = |row: &duckdb::Row| -> duckdb::Result<RawOrder> {
            Ok(RawOrder {
                id: row.get(0)?,
                customer_id: row.get(1)?,
                product_id: row.get(2)?,
                quantity: row.get(3)?,
                ordered_at: row.get(4)?,
                total: row.get(5)?,
            })
        };

        let raw = match filter {
            Some(range) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{select} WHERE CAST(ordered_at AS DATE) BETWEEN CAST(? AS DATE) AND CAST(? AS DATE) ORDER BY id"
                ))?;
                let rows = stmt.query_map(
                    params![
                        range.start.format(DATE_FORMAT).to_string(),
                        range.end.format(DATE_FORMAT).to_string(),
                    ],
                    map_row,
                )?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!("{select} ORDER BY id"))?;
                let rows = stmt.query_map([], map_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        raw.into_iter().map(RawOrder::into_order).collect()
    }
}

struct RawOrder {
    id: i64,
    customer_id: i64,
    product_id: i64,
    quantity: i64,
    ordered_at: String,
    total: f64,
}

impl RawOrder {
    fn into_order(self) -> Result<Order> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            AnalyticsError::invalid_record(
                EntityKind::Order,
                self.id,
                format!("quantity {} out of range", self.quantity),
            )
        })?;
        let ordered_at = NaiveDateTime::parse_from_str(&self.ordered_at, TIMESTAMP_FORMAT)
            .map_err(|e| {
                AnalyticsError::invalid_record(
                    EntityKind::Order,
                    self.id,
                    format!("malformed order date '{}': {e}", self.ordered_at),
                )
            })?;
        Ok(Order {
            id: OrderId(self.id),
            customer_id: CustomerId(self.customer_id),
            product_id: ProductId(self.product_id),
            quantity,
            ordered_at,
            total: self.total,
        })
    }
}

impl SalesSource for DuckDbStore {
    fn fetch_products(&self) -> Result<Vec<Product>> {
        self.require_relation("products")?;

        let mut stmt = self
            .conn
            .prepare("SELECT id, name, category, unit_price, stock FROM products ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        let raw = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, name, category, unit_price, stock)| {
                let category: Category = category.parse().map_err(|_| {
                    AnalyticsError::invalid_record(
                        EntityKind::Product,
                        id,
                        format!("unknown category '{category}'"),
                    )
                })?;
                let stock = u32::try_from(stock).map_err(|_| {
                    AnalyticsError::invalid_record(
                        EntityKind::Product,
                        id,
                        format!("stock {stock} out of range"),
                    )
                })?;
                Ok(Product {
                    id: ProductId(id),
                    name,
                    category,
                    unit_price,
                    stock,
                })
            })
            .collect()
    }

    fn fetch_customers(&self) -> Result<Vec<Customer>> {
        self.require_relation("customers")?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, email, strftime(registered_on, '%Y-%m-%d'), city
            FROM customers
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let raw = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, name, email, registered_on, city)| {
                let registered_on = NaiveDate::parse_from_str(&registered_on, DATE_FORMAT)
                    .map_err(|e| {
                        AnalyticsError::invalid_record(
                            EntityKind::Customer,
                            id,
                            format!("malformed registration date '{registered_on}': {e}"),
                        )
                    })?;
                Ok(Customer {
                    id: CustomerId(id),
                    name,
                    email,
                    registered_on,
                    city,
                })
            })
            .collect()
    }

    fn fetch_orders(&self) -> Result<Vec<Order>> {
        self.query_orders(None)
    }

    fn fetch_orders_between(&self, range: DateRange) -> Result<Vec<Order>> {
        self.query_orders(Some(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures;
    use crate::snapshot::Snapshot;

    fn seeded(snapshot: &Snapshot) -> DuckDbStore {
        let store = DuckDbStore::new_in_memory().unwrap();
        store
            .insert_dataset(
                &snapshot.fetch_products().unwrap(),
                &snapshot.fetch_customers().unwrap(),
                &snapshot.fetch_orders().unwrap(),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_create_store() {
        let store = DuckDbStore::new_in_memory().unwrap();
        assert_eq!(store.row_counts().unwrap(), RelationCounts::default());
        assert!(store.snapshot().unwrap().orders().is_empty());
    }

    #[test]
    fn test_round_trip_snapshot() {
        let expected = fixtures::scenario();
        let store = seeded(&expected);

        let counts = store.row_counts().unwrap();
        assert_eq!(counts.products, 2);
        assert_eq!(counts.customers, 2);
        assert_eq!(counts.orders, 3);

        assert_eq!(store.snapshot().unwrap(), expected);
    }

    #[test]
    fn test_conflicting_insert_rolls_back() {
        let snapshot = fixtures::scenario();
        let store = seeded(&snapshot);

        let p1 = fixtures::product(1, Category::Home, 10.0);
        let fresh = fixtures::order(4, 2, &p1, 1, fixtures::at(4, 12));
        let mut duplicate = snapshot.orders()[0].clone();
        duplicate.quantity = 5;

        let result = store.insert_dataset(&[], &[], &[fresh, duplicate]);
        assert!(matches!(result, Err(AnalyticsError::DuckDb(_))));

        assert_eq!(store.row_counts().unwrap().orders, 3);
        assert_eq!(store.snapshot().unwrap(), snapshot);
    }

    #[test]
    fn test_subsecond_timestamps_survive() {
        let p1 = fixtures::product(1, Category::Books, 10.0);
        let ordered_at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(10, 0, 0, 500_000)
            .unwrap();
        let expected = Snapshot::new(
            vec![p1.clone()],
            vec![fixtures::customer(1)],
            vec![fixtures::order(1, 1, &p1, 1, ordered_at)],
        )
        .unwrap();

        let store = seeded(&expected);
        assert_eq!(store.snapshot().unwrap(), expected);
    }

    #[test]
    fn test_orders_between() {
        let store = seeded(&fixtures::scenario());
        let day = fixtures::at(3, 0).date();
        let orders = store
            .fetch_orders_between(DateRange::new(day, day).unwrap())
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, OrderId(3));
    }

    #[test]
    fn test_missing_relation_is_data_unavailable() {
        let store = DuckDbStore::new_in_memory().unwrap();
        store.conn.execute_batch("DROP TABLE orders").unwrap();
        let err = store.fetch_orders().unwrap_err();
        assert!(matches!(err, AnalyticsError::DataUnavailable(ref r) if r == "orders"));
    }

    #[test]
    fn test_dangling_reference_surfaces_on_snapshot() {
        let snapshot = fixtures::scenario();
        let store = seeded(&snapshot);
        store
            .conn
            .execute_batch(
                "INSERT INTO orders VALUES (10, 1, 77, 1, TIMESTAMP '2024-05-02 10:00:00', 10.0)",
            )
            .unwrap();
        let err = store.snapshot().unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InvalidReference {
                order_id: OrderId(10),
                entity: EntityKind::Product,
                id: 77,
            }
        ));
    }

    #[test]
    fn test_unknown_category_surfaces_product_id() {
        let store = DuckDbStore::new_in_memory().unwrap();
        store
            .conn
            .execute_batch("INSERT INTO products VALUES (4, 'Rake', 'GARDEN', 12.5, 3)")
            .unwrap();
        let err = store.fetch_products().unwrap_err();
        assert!(err.to_string().contains("product record 4"));
    }

    #[test]
    fn test_persistent_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.duckdb");
        {
            let store = DuckDbStore::new_persistent(&path).unwrap();
            let snapshot = fixtures::scenario();
            store
                .insert_dataset(
                    &snapshot.fetch_products().unwrap(),
                    &snapshot.fetch_customers().unwrap(),
                    &snapshot.fetch_orders().unwrap(),
                )
                .unwrap();
        }
        let reopened = DuckDbStore::open_existing(&path).unwrap();
        assert_eq!(reopened.row_counts().unwrap().orders, 3);
    }

    #[test]
    fn test_open_existing_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.duckdb");
        drop(DuckDbStore::new_persistent(&path).unwrap());

        let reopened = DuckDbStore::open_existing(&path).unwrap();
        let p1 = fixtures::product(1, Category::Home, 10.0);
        assert!(reopened.insert_product(&p1).is_err());
        assert_eq!(reopened.row_counts().unwrap(), RelationCounts::default());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        match DuckDbStore::open_existing(dir.path().join("absent.duckdb")) {
            Err(AnalyticsError::DataUnavailable(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(store) => panic!("opened a missing file: {store:?}"),
        }
    }
}
