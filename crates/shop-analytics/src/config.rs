//! # Report Configuration
//!
//! Environment-based configuration for the sales report binary.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::report::{AnalysisConfig, DEFAULT_TOP_CUSTOMERS};
use crate::segmentation::{SegmentationConfig, SegmentationMethod};

/// Default DuckDB database location
pub const DEFAULT_DATABASE_PATH: &str = "data/online_store.duckdb";

/// Output format of the rendered report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Pretty-printed JSON
    Json,
    /// Markdown tables
    #[default]
    Markdown,
}

impl FromStr for ReportFormat {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unknown report format '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
        })
    }
}

/// Report binary configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// DuckDB database file
    pub database_path: PathBuf,

    /// Analysis parameters
    pub analysis: AnalysisConfig,

    /// Output format
    pub format: ReportFormat,

    /// Logging level
    pub log_level: String,

    /// Emit logs as JSON
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Values are parsed but the analysis parameters are not cross-checked
    /// here; call [`Config::apply`] or [`Config::validate`] once every
    /// source has been merged.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let top_n = match lookup("TOP_N") {
            Some(v) => v
                .parse()
                .map_err(|_| AnalyticsError::InvalidParameter(format!("TOP_N '{v}'")))?,
            None => crate::ranking::DEFAULT_TOP_N,
        };

        let method = lookup("SEGMENT_METHOD")
            .map(|v| v.parse::<SegmentationMethod>())
            .transpose()?
            .unwrap_or_default();
        let boundaries = lookup("SEGMENT_BOUNDARIES")
            .map(|v| parse_boundaries(&v))
            .transpose()?;

        let analysis = AnalysisConfig {
            top_n,
            segmentation: SegmentationConfig { method, boundaries },
            top_customers: DEFAULT_TOP_CUSTOMERS,
        };

        Ok(Self {
            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
                .into(),

            analysis,

            format: lookup("REPORT_FORMAT")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            log_json: lookup("LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

/// Values that take precedence over the environment, typically CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Database file
    pub database_path: Option<PathBuf>,
    /// Output format
    pub format: Option<ReportFormat>,
    /// Product ranking length
    pub top_n: Option<usize>,
    /// Segmentation method
    pub segment_method: Option<SegmentationMethod>,
    /// `(premium_from, vip_from)` spend cutoffs
    pub segment_boundaries: Option<(f64, f64)>,
}

impl Config {
    /// Merge `overrides` over the loaded values, then validate the result.
    ///
    /// Switching to a method other than `fixed-threshold` without new
    /// boundaries drops boundaries inherited from the environment.
    pub fn apply(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(path) = overrides.database_path {
            self.database_path = path;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if let Some(top_n) = overrides.top_n {
            self.analysis.top_n = top_n;
        }
        if let Some(method) = overrides.segment_method {
            self.analysis.segmentation.method = method;
            if overrides.segment_boundaries.is_none() && method != SegmentationMethod::FixedThreshold {
                self.analysis.segmentation.boundaries = None;
            }
        }
        if let Some(boundaries) = overrides.segment_boundaries {
            self.analysis.segmentation.boundaries = Some(boundaries);
        }
        self.validate()
    }

    /// Check the merged analysis parameters.
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()
    }
}

/// Parse `"premium,vip"` spend cutoffs.
pub fn parse_boundaries(value: &str) -> Result<(f64, f64)> {
    let invalid = || AnalyticsError::InvalidParameter(format!("segment boundaries '{value}'"));

    let mut parts = value.split(',').map(str::trim);
    let premium = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let vip = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok((premium, vip))
}
