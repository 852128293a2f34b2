//! Startup configuration.
//!
//! [`InsightConfig`] gathers everything the dashboard needs from the
//! environment and validates it before any request is made. Credentials never
//! leave the config objects they were loaded into.

use chrono::NaiveDate;
use insight_cache::{InMemoryCache, NoopCache};
use insight_core::{FinancialsQuery, GenerationParams, InsightError, ResponseCache, Result};
use insight_replicate::ReplicateConfig;
use insight_sectors::SectorsConfig;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Sectors API key (required).
pub const SECTORS_API_KEY: &str = "SECTORS_API_KEY";
/// Replicate API token (required).
pub const REPLICATE_API_TOKEN: &str = "REPLICATE_API_TOKEN";
/// Override for the Sectors base URL.
pub const SECTORS_BASE_URL: &str = "SECTORS_BASE_URL";
/// Override for the Replicate base URL.
pub const REPLICATE_BASE_URL: &str = "REPLICATE_BASE_URL";
/// Override for the hosted model.
pub const REPLICATE_MODEL: &str = "REPLICATE_MODEL";
/// Last reporting date of the financials window, `YYYY-MM-DD`.
pub const INSIGHT_REPORT_DATE: &str = "INSIGHT_REPORT_DATE";
/// Number of quarters in the financials window.
pub const INSIGHT_N_QUARTERS: &str = "INSIGHT_N_QUARTERS";
/// Completion length bound.
pub const INSIGHT_MAX_TOKENS: &str = "INSIGHT_MAX_TOKENS";
/// Sampling temperature.
pub const INSIGHT_TEMPERATURE: &str = "INSIGHT_TEMPERATURE";
/// Cache mode: `none`, `memory` or a path to a SQLite file.
pub const INSIGHT_CACHE: &str = "INSIGHT_CACHE";
/// Age in seconds after which cached responses are dropped; `0` keeps them.
pub const INSIGHT_CACHE_TTL: &str = "INSIGHT_CACHE_TTL";

/// Largest accepted financials window.
pub const MAX_QUARTERS: u8 = 12;

/// Default age limit for cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Accepted sampling temperature range.
const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Where provider responses are cached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Every selection re-queries the API.
    #[default]
    None,
    /// Responses live for the lifetime of the process.
    Memory,
    /// Responses persist in a SQLite file.
    Sqlite(PathBuf),
}

impl CacheMode {
    /// Builds the cache this mode describes.
    ///
    /// # Errors
    /// Returns [`InsightError::Cache`] if the SQLite file cannot be opened,
    /// or [`InsightError::Config`] if SQLite support was compiled out.
    pub fn build(&self) -> Result<Arc<dyn ResponseCache>> {
        match self {
            Self::None => Ok(Arc::new(NoopCache::new())),
            Self::Memory => Ok(Arc::new(InMemoryCache::new())),
            #[cfg(feature = "cache-sqlite")]
            Self::Sqlite(path) => Ok(Arc::new(insight_cache::SqliteCache::new(path)?)),
            #[cfg(not(feature = "cache-sqlite"))]
            Self::Sqlite(path) => Err(InsightError::Config(format!(
                "cannot open {}: built without the cache-sqlite feature",
                path.display()
            ))),
        }
    }
}

impl FromStr for CacheMode {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "none" | "off" => Ok(Self::None),
            "memory" | "mem" => Ok(Self::Memory),
            path => Ok(Self::Sqlite(PathBuf::from(path))),
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Memory => f.write_str("memory"),
            Self::Sqlite(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Everything the dashboard needs, validated.
#[derive(Clone, Debug)]
pub struct InsightConfig {
    /// Sectors API connection.
    pub sectors: SectorsConfig,
    /// Hosted model connection.
    pub model: ReplicateConfig,
    /// Financials window.
    pub financials: FinancialsQuery,
    /// Decoding parameters sent with every prompt.
    pub generation: GenerationParams,
    /// Response cache.
    pub cache: CacheMode,
    /// Age after which cached responses are dropped at startup; `None` keeps
    /// them indefinitely.
    pub cache_ttl: Option<Duration>,
}

impl InsightConfig {
    /// Creates a config with default settings for the given credentials.
    #[must_use]
    pub fn new(sectors_api_key: impl Into<String>, replicate_api_token: impl Into<String>) -> Self {
        Self {
            sectors: SectorsConfig::new(sectors_api_key),
            model: ReplicateConfig::new(replicate_api_token),
            financials: FinancialsQuery::default(),
            generation: GenerationParams::default(),
            cache: CacheMode::default(),
            cache_ttl: Some(DEFAULT_CACHE_TTL),
        }
    }

    /// Loads the config from process environment variables.
    ///
    /// # Errors
    /// See [`InsightConfig::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the config through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns [`InsightError::MissingCredential`] if a credential is missing
    /// or blank, and [`InsightError::Config`] if any value fails to parse or
    /// falls outside its accepted range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = var(SECTORS_API_KEY).ok_or(InsightError::MissingCredential(SECTORS_API_KEY))?;
        let api_token =
            var(REPLICATE_API_TOKEN).ok_or(InsightError::MissingCredential(REPLICATE_API_TOKEN))?;

        let mut config = Self::new(api_key, api_token);

        if let Some(url) = var(SECTORS_BASE_URL) {
            config.sectors = config.sectors.with_base_url(url);
        }
        if let Some(url) = var(REPLICATE_BASE_URL) {
            config.model = config.model.with_base_url(url);
        }
        if let Some(model) = var(REPLICATE_MODEL) {
            config.model = config.model.with_model(model);
        }
        if let Some(date) = var(INSIGHT_REPORT_DATE) {
            config.financials.report_date = parse_date(INSIGHT_REPORT_DATE, &date)?;
        }
        if let Some(n) = var(INSIGHT_N_QUARTERS) {
            config.financials.n_quarters = parse_value(INSIGHT_N_QUARTERS, &n)?;
        }
        if let Some(n) = var(INSIGHT_MAX_TOKENS) {
            config.generation.max_tokens = parse_value(INSIGHT_MAX_TOKENS, &n)?;
        }
        if let Some(t) = var(INSIGHT_TEMPERATURE) {
            config.generation.temperature = parse_value(INSIGHT_TEMPERATURE, &t)?;
        }
        if let Some(mode) = var(INSIGHT_CACHE) {
            config.cache = mode.parse()?;
        }
        if let Some(secs) = var(INSIGHT_CACHE_TTL) {
            config.cache_ttl = cache_ttl_from_secs(parse_value(INSIGHT_CACHE_TTL, &secs)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its accepted range.
    ///
    /// Call again after applying overrides.
    ///
    /// # Errors
    /// Returns [`InsightError::MissingCredential`] or [`InsightError::Config`]
    /// on the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.sectors.api_key.trim().is_empty() {
            return Err(InsightError::MissingCredential(SECTORS_API_KEY));
        }
        if self.model.api_token.trim().is_empty() {
            return Err(InsightError::MissingCredential(REPLICATE_API_TOKEN));
        }
        if !(1..=MAX_QUARTERS).contains(&self.financials.n_quarters) {
            return Err(InsightError::Config(format!(
                "{INSIGHT_N_QUARTERS} must be between 1 and {MAX_QUARTERS}, got {}",
                self.financials.n_quarters
            )));
        }
        if self.generation.max_tokens == 0 {
            return Err(InsightError::Config(format!(
                "{INSIGHT_MAX_TOKENS} must be positive"
            )));
        }
        if !TEMPERATURE_RANGE.contains(&self.generation.temperature) {
            return Err(InsightError::Config(format!(
                "{INSIGHT_TEMPERATURE} must be between {} and {}, got {}",
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end(),
                self.generation.temperature
            )));
        }
        for (name, url) in [
            (SECTORS_BASE_URL, &self.sectors.base_url),
            (REPLICATE_BASE_URL, &self.model.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(InsightError::Config(format!(
                    "{name} must be an http(s) URL, got {url:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Converts a TTL in seconds; zero disables expiry.
#[must_use]
pub const fn cache_ttl_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// Parses `YYYY-MM-DD`.
fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| InsightError::Config(format!("{name}: expected YYYY-MM-DD, got {value:?} ({e})")))
}

fn parse_value<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|e| InsightError::Config(format!("{name}: invalid value {value:?} ({e})")))
}
