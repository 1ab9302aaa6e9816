//! # Online Store - Domain Model
//!
//! Core entities, identifiers and enums for the online store sales
//! pipeline. These types are the single source of truth across all
//! layers: storage, seeding, analytics and reporting.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Tolerance used when reconciling an order total against
/// quantity × unit price (currency rounding).
pub const TOTAL_TOLERANCE: f64 = 0.01;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Product primary key
    ProductId
);
entity_id!(
    /// Customer primary key
    CustomerId
);
entity_id!(
    /// Order primary key
    OrderId
);

// =============================================================================
// ENUMS
// =============================================================================

/// Product categories carried by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Electronics,
    Clothing,
    Books,
    Home,
}

impl Category {
    pub const ALL: [Self; 4] = [Self::Electronics, Self::Clothing, Self::Books, Self::Home];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electronics => "ELECTRONICS",
            Self::Clothing => "CLOTHING",
            Self::Books => "BOOKS",
            Self::Home => "HOME",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownCategory(s.to_string()))
    }
}

/// Customer tier derived from cumulative spend.
///
/// Ordered from lowest to highest tier so `Basic < Premium < Vip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerSegment {
    Basic,
    Premium,
    Vip,
}

impl CustomerSegment {
    /// Highest tier first, the order reports list segments in.
    pub const DESCENDING: [Self; 3] = [Self::Vip, Self::Premium, Self::Basic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::Premium => "PREMIUM",
            Self::Vip => "VIP",
        }
    }
}

impl fmt::Display for CustomerSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity kinds, used to locate bad records in errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Customer,
    Order,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Customer => "customer",
            Self::Order => "order",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: Category,
    pub unit_price: f64,
    pub stock: u32,
}

impl Product {
    /// Check the record-level invariants of a product row.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.unit_price.is_finite() || self.unit_price < 0.0 {
            return Err(DomainError::InvalidRecord {
                entity: EntityKind::Product,
                id: self.id.get(),
                reason: format!("unit price {} is not a non-negative amount", self.unit_price),
            });
        }
        Ok(())
    }
}

/// Registered customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub registered_on: NaiveDate,
    pub city: String,
}

/// Single-line order: one product, one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub ordered_at: NaiveDateTime,
    pub total: f64,
}

impl Order {
    /// Calendar day the order falls on
    #[must_use]
    pub fn order_date(&self) -> NaiveDate {
        self.ordered_at.date()
    }

    /// Total implied by quantity and the product's unit price
    #[must_use]
    pub fn expected_total(&self, unit_price: f64) -> f64 {
        f64::from(self.quantity) * unit_price
    }

    /// Check the record-level invariants of an order against its product.
    pub fn validate(&self, product: &Product) -> Result<(), DomainError> {
        let invalid = |reason: String| DomainError::InvalidRecord {
            entity: EntityKind::Order,
            id: self.id.get(),
            reason,
        };

        if self.quantity == 0 {
            return Err(invalid("quantity must be positive".to_string()));
        }
        if !self.total.is_finite() || self.total < 0.0 {
            return Err(invalid(format!(
                "total {} is not a non-negative amount",
                self.total
            )));
        }

        let expected = self.expected_total(product.unit_price);
        if (expected - self.total).abs() > TOTAL_TOLERANCE {
            return Err(invalid(format!(
                "total {:.2} does not reconcile with {} x {:.2} = {:.2}",
                self.total, self.quantity, product.unit_price, expected
            )));
        }
        Ok(())
    }
}

// =============================================================================
// QUERY/FILTER TYPES
// =============================================================================

/// Inclusive calendar range filter for order queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid {entity} record {id}: {reason}")]
    InvalidRecord {
        entity: EntityKind,
        id: i64,
        reason: String,
    },

    #[error("Unknown product category: {0}")]
    UnknownCategory(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}
