//! Online Store Seeder CLI
//!
//! Generates products, customers and orders and loads them into DuckDB.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use shop_analytics::config::DEFAULT_DATABASE_PATH;
use shop_analytics::DuckDbStore;
use shop_seeder::dataset::DEFAULT_ORDER_COUNT;
use shop_seeder::{Dataset, SeedConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shop-seeder")]
#[command(about = "Populate the online store database with synthetic data")]
struct Args {
    /// DuckDB database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = DEFAULT_DATABASE_PATH)]
    database: PathBuf,

    /// Number of orders to generate
    #[arg(short, long, default_value_t = DEFAULT_ORDER_COUNT)]
    orders: usize,

    /// RNG seed for reproducible data
    #[arg(short, long)]
    seed: Option<u64>,

    /// Date offsets count back from (YYYY-MM-DD, default today)
    #[arg(long)]
    anchor: Option<NaiveDate>,

    /// Delete existing rows before loading; required for a non-empty store
    #[arg(long)]
    reset: bool,

    /// Also write the generated dataset as JSON
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shop_seeder=info".parse()?))
        .init();

    let args = Args::parse();
    let config = SeedConfig {
        order_count: args.orders,
        seed: args.seed,
        anchor: args.anchor.unwrap_or_else(|| Utc::now().date_naive()),
    };

    info!(
        database = %args.database.display(),
        orders = config.order_count,
        seed = ?config.seed,
        anchor = %config.anchor,
        "Seeding online store"
    );

    let dataset = Dataset::generate(&config)?;
    dataset.to_snapshot().context("generated dataset is inconsistent")?;

    if let Some(parent) = args.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let store = DuckDbStore::new_persistent(&args.database)
        .with_context(|| format!("opening {}", args.database.display()))?;

    let counts = dataset.seed(&store, args.reset)?;
    info!(
        products = counts.products,
        customers = counts.customers,
        orders = counts.orders,
        "Relations loaded"
    );

    let summary = store.revenue_summary()?;
    info!(
        total_revenue = summary.total_revenue,
        order_count = summary.order_count,
        unique_customers = summary.unique_customers,
        units_sold = summary.units_sold,
        "Store totals"
    );

    if let Some(path) = args.dump {
        let json = serde_json::to_string_pretty(&dataset)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Dataset dumped");
    }

    Ok(())
}
