//! Core data types for market catalog and financial data.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Symbol`] - Ticker symbol
//! - [`Subsector`] - Market subsector catalog entry
//! - [`Company`] - Company catalog entry within a subsector
//! - [`QuarterlyFinancial`] - One reporting quarter of financial figures
//! - [`FinancialsQuery`] - Window of quarters to fetch

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Separator between symbol and company name in a company label.
pub const COMPANY_LABEL_SEPARATOR: &str = " - ";

/// A ticker symbol.
///
/// Symbols are automatically uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the symbol from a `"symbol - company name"` label.
    ///
    /// Everything before the first separator is the symbol. A label without a
    /// separator is treated as a bare symbol.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let symbol = label
            .split(COMPANY_LABEL_SEPARATOR)
            .next()
            .unwrap_or(label);
        Self::new(symbol)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A market subsector, the first selection filter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subsector {
    /// Subsector identifier as used by the catalog API (e.g. "banks").
    pub subsector: String,
}

impl Subsector {
    /// Creates a new subsector entry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            subsector: name.into(),
        }
    }

    /// Returns the subsector name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.subsector
    }
}

impl fmt::Display for Subsector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subsector)
    }
}

/// A company listed under a subsector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Registered company name.
    #[serde(default)]
    pub company_name: String,
}

impl Company {
    /// Creates a new company entry.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, company_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: company_name.into(),
        }
    }

    /// Returns the selection label, formatted as `"symbol - company name"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{}{COMPANY_LABEL_SEPARATOR}{}",
            self.symbol, self.company_name
        )
    }
}

/// One quarter of financial figures for a company.
///
/// The named fields are the ones the insight panels reason about; every other
/// field returned by the API is preserved in [`extra`](Self::extra) so that
/// it still reaches the model prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyFinancial {
    /// Ticker symbol, when the API echoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// End date of the reporting quarter.
    pub date: NaiveDate,
    /// Total revenue.
    pub revenue: Option<f64>,
    /// Net income.
    pub net_income: Option<f64>,
    /// Operating cash flow.
    pub operating: Option<f64>,
    /// Remaining fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuarterlyFinancial {
    /// Creates a record with the named figures and no extra fields.
    #[must_use]
    pub fn new(
        date: NaiveDate,
        revenue: Option<f64>,
        net_income: Option<f64>,
        operating: Option<f64>,
    ) -> Self {
        Self {
            symbol: None,
            date,
            revenue,
            net_income,
            operating,
            extra: Map::new(),
        }
    }

    /// Adds an extra field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// The window of quarters requested from the financials endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FinancialsQuery {
    /// Number of quarters to fetch.
    pub n_quarters: u8,
    /// Last reporting date of the window.
    pub report_date: NaiveDate,
}

impl FinancialsQuery {
    /// Default number of quarters.
    pub const DEFAULT_QUARTERS: u8 = 4;

    /// Creates a new query.
    #[must_use]
    pub const fn new(n_quarters: u8, report_date: NaiveDate) -> Self {
        Self {
            n_quarters,
            report_date,
        }
    }
}

impl Default for FinancialsQuery {
    /// Four quarters ending 2023-09-30.
    fn default() -> Self {
        Self {
            n_quarters: Self::DEFAULT_QUARTERS,
            report_date: NaiveDate::from_ymd_opt(2023, 9, 30).unwrap_or_default(),
        }
    }
}
