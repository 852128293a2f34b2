//! Command-line arguments.

use chrono::NaiveDate;
use clap::Parser;
use insight::config::cache_ttl_from_secs;
use insight::{CacheMode, InsightConfig, InsightError};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "insight-dashboard")]
#[command(about = "LLM-generated financial insights for listed companies, backed by the Sectors API")]
#[command(version)]
pub(crate) struct Cli {
    /// Subsector to pick companies from (skips the subsector prompt)
    #[arg(short = 's', long)]
    pub(crate) subsector: Option<String>,

    /// Company symbol, or a "SYMBOL - name" label (skips the company prompt)
    #[arg(short = 'c', long)]
    pub(crate) symbol: Option<String>,

    /// Also write the revenue chart as an SVG file
    #[arg(long, value_name = "PATH")]
    pub(crate) svg: Option<PathBuf>,

    /// Replicate model, as owner/name or owner/name:version
    #[arg(short = 'm', long)]
    pub(crate) model: Option<String>,

    /// Last reporting date of the financials window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) report_date: Option<NaiveDate>,

    /// Number of quarters to fetch (1-12)
    #[arg(short = 'q', long)]
    pub(crate) quarters: Option<u8>,

    /// Response cache: none, memory or a path to a SQLite file
    #[arg(long)]
    pub(crate) cache: Option<CacheMode>,

    /// Drop cached responses older than this many seconds (0 keeps them)
    #[arg(long, value_name = "SECONDS")]
    pub(crate) cache_ttl: Option<u64>,

    /// Do not ask for confirmation before generating insights
    #[arg(short = 'y', long)]
    pub(crate) yes: bool,

    /// Enable debug logging to stderr
    #[arg(short = 'v', long)]
    pub(crate) verbose: bool,
}

impl Cli {
    /// Applies command-line overrides and validates the result.
    pub(crate) fn apply(&self, config: &mut InsightConfig) -> Result<(), InsightError> {
        if let Some(model) = &self.model {
            config.model.model.clone_from(model);
        }
        if let Some(date) = self.report_date {
            config.financials.report_date = date;
        }
        if let Some(n) = self.quarters {
            config.financials.n_quarters = n;
        }
        if let Some(cache) = &self.cache {
            config.cache = cache.clone();
        }
        if let Some(secs) = self.cache_ttl {
            config.cache_ttl = cache_ttl_from_secs(secs);
        }
        config.validate()
    }

    /// True when no selection prompt is needed.
    pub(crate) const fn is_non_interactive(&self) -> bool {
        self.symbol.is_some()
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}
