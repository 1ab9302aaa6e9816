//! # Sales Report CLI
//!
//! Loads the store relations from DuckDB, runs the analyses and prints the
//! report as Markdown or JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use shop_analytics::config::{parse_boundaries, Overrides};
use shop_analytics::segmentation::SegmentationMethod;
use shop_analytics::{Config, DuckDbStore, ReportAssembler, ReportFormat, SalesSource};
use shop_domain::DateRange;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sales-report")]
#[command(about = "Generate the online store sales report")]
struct Args {
    /// DuckDB database file (overrides DATABASE_PATH)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Output format: json or markdown (overrides REPORT_FORMAT)
    #[arg(short, long)]
    format: Option<ReportFormat>,

    /// Number of products in the ranking (overrides TOP_N)
    #[arg(long)]
    top_n: Option<usize>,

    /// Segmentation method: quantile, fixed-threshold, equal-width
    #[arg(long)]
    segment_method: Option<SegmentationMethod>,

    /// Spend cutoffs "premium,vip" for fixed-threshold segmentation
    #[arg(long)]
    segment_boundaries: Option<String>,

    /// Only include orders on or after this date (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Only include orders on or before this date (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run the analyses one after another on the main thread
    #[arg(long)]
    sequential: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    config.apply(args.overrides()?)?;

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into());
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!(
        version = shop_analytics::VERSION,
        database = %config.database_path.display(),
        method = %config.analysis.segmentation.method,
        top_n = config.analysis.top_n,
        "Starting sales report"
    );

    let store = DuckDbStore::open_existing(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    let snapshot = match (args.from, args.to) {
        (Some(start), Some(end)) => store.snapshot_between(DateRange::new(start, end)?)?,
        _ => store.snapshot()?,
    };

    let assembler = ReportAssembler::new(config.analysis)?;
    let report = if args.sequential {
        assembler.assemble(&snapshot)?
    } else {
        assembler.assemble_concurrent(Arc::new(snapshot)).await?
    };

    if args.from.is_none() {
        let reconciliation = store.reconcile(&report.metrics)?;
        tracing::info!(
            matches = reconciliation.matches,
            delta = reconciliation.revenue_delta,
            "Reconciled with SQL aggregates"
        );
    }

    let rendered = match config.format {
        ReportFormat::Json => report.to_json()?,
        ReportFormat::Markdown => report.to_markdown(),
    };

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, rendered)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), format = %config.format, "Report written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

impl Args {
    fn overrides(&self) -> anyhow::Result<Overrides> {
        Ok(Overrides {
            database_path: self.database.clone(),
            format: self.format,
            top_n: self.top_n,
            segment_method: self.segment_method,
            segment_boundaries: self
                .segment_boundaries
                .as_deref()
                .map(parse_boundaries)
                .transpose()?,
        })
    }
}
