//! Report assembly and rendering.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::metrics::{compute_metrics, SalesMetrics};
use crate::ranking::{category_shares, top_products, CategoryShare, ProductRevenue, DEFAULT_TOP_N};
use crate::segmentation::{segment_customers, Segmentation, SegmentationConfig};
use crate::snapshot::Snapshot;
use crate::trend::{daily_trend, SalesTrend};

/// Number of customers listed in the Markdown highlights.
pub const DEFAULT_TOP_CUSTOMERS: usize = 5;

/// Parameters of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Length of the product ranking
    pub top_n: usize,
    /// Customer tier policy
    pub segmentation: SegmentationConfig,
    /// Customers listed in the Markdown highlights
    pub top_customers: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            segmentation: SegmentationConfig::default(),
            top_customers: DEFAULT_TOP_CUSTOMERS,
        }
    }
}

impl AnalysisConfig {
    /// Reject an empty ranking and inconsistent segmentation parameters.
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "top_n must be at least 1".to_string(),
            ));
        }
        self.segmentation.validate()
    }
}

/// Combined analysis result handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesReport {
    /// RFC 3339 timestamp of assembly
    pub generated_at: String,
    /// Parameters the report was built with
    pub config: AnalysisConfig,
    /// Headline KPIs
    pub metrics: SalesMetrics,
    /// Top-N products by revenue
    pub top_products: Vec<ProductRevenue>,
    /// Category revenue share
    pub categories: Vec<CategoryShare>,
    /// Customer tiers
    pub segmentation: Segmentation,
    /// Daily revenue series
    pub trend: SalesTrend,
}

/// Runs the four analyses over a snapshot and joins their results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAssembler {
    config: AnalysisConfig,
}

impl ReportAssembler {
    /// Create an assembler for a validated configuration.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Analysis parameters
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Generate the report on the calling thread.
    pub fn assemble(&self, snapshot: &Snapshot) -> Result<SalesReport> {
        let metrics = compute_metrics(snapshot);
        let top_products = top_products(snapshot, self.config.top_n)?;
        let categories = category_shares(snapshot)?;
        let segmentation = segment_customers(snapshot, self.config.segmentation)?;
        let trend = daily_trend(snapshot);

        Ok(self.finish(metrics, top_products, categories, segmentation, trend))
    }

    /// Generate the report with the four analyses running as blocking
    /// tasks over a shared snapshot.
    pub async fn assemble_concurrent(&self, snapshot: Arc<Snapshot>) -> Result<SalesReport> {
        let AnalysisConfig {
            top_n,
            segmentation,
            ..
        } = self.config;

        let for_metrics = Arc::clone(&snapshot);
        let for_ranking = Arc::clone(&snapshot);
        let for_segments = Arc::clone(&snapshot);
        let for_trend = snapshot;

        let (metrics, rankings, segments, trend) = tokio::try_join!(
            tokio::task::spawn_blocking(move || compute_metrics(&for_metrics)),
            tokio::task::spawn_blocking(move || -> Result<_> {
                Ok((
                    top_products(&for_ranking, top_n)?,
                    category_shares(&for_ranking)?,
                ))
            }),
            tokio::task::spawn_blocking(move || segment_customers(&for_segments, segmentation)),
            tokio::task::spawn_blocking(move || daily_trend(&for_trend)),
        )?;

        let (top_products, categories) = rankings?;
        Ok(self.finish(metrics, top_products, categories, segments?, trend))
    }

    fn finish(
        &self,
        metrics: SalesMetrics,
        top_products: Vec<ProductRevenue>,
        categories: Vec<CategoryShare>,
        segmentation: Segmentation,
        trend: SalesTrend,
    ) -> SalesReport {
        tracing::info!(
            orders = metrics.order_count,
            revenue = metrics.total_revenue,
            products = top_products.len(),
            categories = categories.len(),
            days = trend.days.len(),
            "Sales report assembled"
        );

        SalesReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            config: self.config,
            metrics,
            top_products,
            categories,
            segmentation,
            trend,
        }
    }
}

impl SalesReport {
    /// Render the report as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AnalyticsError::Conversion(e.to_string()))
    }

    /// Render the report as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_markdown(&mut md);
        md
    }

    fn write_markdown(&self, md: &mut String) -> std::fmt::Result {
        writeln!(md, "# Online Store Sales Report\n")?;
        writeln!(md, "**Generated:** {}\n", self.generated_at)?;

        let m = &self.metrics;
        writeln!(md, "## Key Metrics\n")?;
        writeln!(md, "| Metric | Value |")?;
        writeln!(md, "|--------|-------|")?;
        writeln!(md, "| Total Revenue | {:.2} |", m.total_revenue)?;
        writeln!(md, "| Orders | {} |", m.order_count)?;
        writeln!(md, "| Units Sold | {} |", m.units_sold)?;
        writeln!(md, "| Average Order Value | {:.2} |", m.average_order_value)?;
        writeln!(md, "| Unique Customers | {} |", m.unique_customers)?;
        writeln!(md, "| Average Value per Customer | {:.2} |\n", m.average_customer_value)?;

        if !self.top_products.is_empty() {
            writeln!(md, "## Top {} Products by Revenue\n", self.config.top_n)?;
            writeln!(md, "| Rank | Product | Category | Units | Revenue | Share |")?;
            writeln!(md, "|------|---------|----------|-------|---------|-------|")?;
            for p in &self.top_products {
                writeln!(
                    md,
                    "| {} | {} | {} | {} | {:.2} | {:.1}% |",
                    p.rank,
                    p.name,
                    p.category,
                    p.units_sold,
                    p.revenue,
                    p.share * 100.0
                )?;
            }
            writeln!(md)?;
        }

        if !self.categories.is_empty() {
            writeln!(md, "## Revenue by Category\n")?;
            writeln!(md, "| Category | Products | Units | Revenue | Avg Order | Share |")?;
            writeln!(md, "|----------|----------|-------|---------|-----------|-------|")?;
            for c in &self.categories {
                writeln!(
                    md,
                    "| {} | {} | {} | {:.2} | {:.2} | {:.1}% |",
                    c.category,
                    c.product_count,
                    c.units_sold,
                    c.revenue,
                    c.average_order_value,
                    c.share * 100.0
                )?;
            }
            writeln!(md)?;
        }

        let seg = &self.segmentation;
        if !seg.customers.is_empty() {
            writeln!(md, "## Customer Segments ({})\n", seg.config.method)?;
            writeln!(md, "| Segment | Customers | Total Spend | Avg Spend | Avg Orders |")?;
            writeln!(md, "|---------|-----------|-------------|-----------|------------|")?;
            for s in &seg.summary {
                writeln!(
                    md,
                    "| {} | {} | {:.2} | {:.2} | {:.1} |",
                    s.segment, s.customer_count, s.total_spend, s.average_spend, s.average_orders
                )?;
            }
            writeln!(md)?;

            writeln!(md, "### Top Customers\n")?;
            writeln!(md, "| Customer | City | Orders | Spend | Avg Ticket | Last Purchase | Segment |")?;
            writeln!(md, "|----------|------|--------|-------|------------|---------------|---------|")?;
            for c in seg.top_customers(self.config.top_customers) {
                writeln!(
                    md,
                    "| {} | {} | {} | {:.2} | {:.2} | {} | {} |",
                    c.name,
                    c.city,
                    c.order_count,
                    c.total_spend,
                    c.average_order_value,
                    c.last_purchase.date(),
                    c.segment
                )?;
            }
            writeln!(md)?;
        }

        let trend = &self.trend;
        if !trend.days.is_empty() {
            writeln!(md, "## Daily Trend\n")?;
            writeln!(md, "- Days with sales: {}", trend.days.len())?;
            writeln!(md, "- Average daily revenue: {:.2}", trend.average_daily_revenue)?;
            writeln!(md, "- Daily revenue std dev: {:.2}", trend.revenue_std_dev)?;
            if let Some(best) = &trend.best_day {
                writeln!(
                    md,
                    "- Best day: {} ({:.2} from {} orders)",
                    best.date, best.revenue, best.order_count
                )?;
            }
            writeln!(md)?;
            writeln!(md, "| Date | Orders | Revenue |")?;
            writeln!(md, "|------|--------|---------|")?;
            for d in &trend.days {
                writeln!(md, "| {} | {} | {:.2} |", d.date, d.order_count, d.revenue)?;
            }
            writeln!(md)?;
        }

        Ok(())
    }
}
