//! # Shop Seeder
//!
//! Synthetic data generator for the online store database.
//!
//! ## Features
//!
//! - Fixed product catalog across four categories
//! - Customer roster with derived emails, cities and registration dates
//! - Randomized orders with reconciled totals
//! - Deterministic output for a given seed

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod catalog;
pub mod dataset;
pub mod orders;

pub use catalog::CustomerGenerator;
pub use dataset::{Dataset, SeedConfig};
pub use orders::OrderGenerator;
