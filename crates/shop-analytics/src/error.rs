//! Analytics error types.

use shop_domain::{DomainError, EntityKind, OrderId};
use thiserror::Error;

/// Analytics errors.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// DuckDB error
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// A source relation is missing
    #[error("Relation unavailable: {0}")]
    DataUnavailable(String),

    /// An order points at a product or customer that does not exist
    #[error("Order {order_id} references missing {entity} {id}")]
    InvalidReference {
        /// Offending order
        order_id: OrderId,
        /// Kind of the referenced entity
        entity: EntityKind,
        /// Referenced identifier
        id: i64,
    },

    /// Malformed or inconsistent record
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Data conversion error
    #[error("Data conversion error: {0}")]
    Conversion(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Background analysis task failed to complete
    #[error("Analysis task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    /// Build an `InvalidRecord` error for a row that could not be decoded.
    pub(crate) fn invalid_record(entity: EntityKind, id: i64, reason: impl Into<String>) -> Self {
        Self::Domain(DomainError::InvalidRecord {
            entity,
            id,
            reason: reason.into(),
        })
    }
}

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
