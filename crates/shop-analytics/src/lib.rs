//! # Shop Analytics
//!
//! Sales analytics aggregation engine for the online store.
//! Uses DuckDB for storage and SQL cross-checks; the analyses themselves
//! are pure functions over an immutable [`Snapshot`].
//!
//! ## Features
//!
//! - Headline KPIs (revenue, orders, average ticket, customers)
//! - Top-N products and category revenue share
//! - Customer segmentation (quantile, fixed-threshold, equal-width)
//! - Daily revenue trend
//! - JSON and Markdown reports

#![forbid(unsafe_code)]
#![warn(clippy::all, missing_docs)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod queries;
pub mod ranking;
pub mod report;
pub mod segmentation;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod trend;

pub use config::{Config, ReportFormat};
pub use error::AnalyticsError;
pub use report::{AnalysisConfig, ReportAssembler, SalesReport};
pub use snapshot::Snapshot;
pub use source::SalesSource;
pub use store::DuckDbStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
