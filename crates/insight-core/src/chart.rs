//! Closed chart specification.
//!
//! The model never produces plotting code. It picks a [`ChartSpec`] from a
//! closed enumeration of chart kinds and axis bindings, and a fixed renderer
//! draws the figure from the financial table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{
    error::{InsightError, Result},
    prompt::clean_code_block,
    types::QuarterlyFinancial,
};

/// Kind of chart the renderer can draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// Points joined by straight lines.
    #[default]
    Line,
    /// One vertical bar per quarter.
    Bar,
    /// Line with the region below it filled.
    Area,
}

impl ChartKind {
    /// All chart kinds, in prompt order.
    pub const ALL: [Self; 3] = [Self::Line, Self::Bar, Self::Area];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Area => "area",
        }
    }
}

/// Horizontal axis binding. Quarterly data is always plotted over time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxis {
    /// Reporting date of the quarter.
    #[default]
    Date,
}

/// A numeric column of the financial table that can be charted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Total revenue.
    #[default]
    Revenue,
    /// Net income.
    NetIncome,
    /// Operating cash flow.
    Operating,
}

impl Metric {
    /// All chartable metrics, in column order.
    pub const ALL: [Self; 3] = [Self::Revenue, Self::NetIncome, Self::Operating];

    /// Returns the column name in the financial table.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::NetIncome => "net_income",
            Self::Operating => "operating",
        }
    }

    /// Reads this metric from a record.
    #[must_use]
    pub const fn value(&self, record: &QuarterlyFinancial) -> Option<f64> {
        match self {
            Self::Revenue => record.revenue,
            Self::NetIncome => record.net_income,
            Self::Operating => record.operating,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.column().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| InsightError::InvalidParameter(format!("Unknown metric: {s}")))
    }
}

/// Declarative chart request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart kind.
    #[serde(default)]
    pub kind: ChartKind,
    /// Horizontal axis.
    #[serde(default)]
    pub x: XAxis,
    /// Vertical axis.
    #[serde(default)]
    pub y: Metric,
    /// Chart title.
    #[serde(default)]
    pub title: String,
}

impl ChartSpec {
    /// Creates a spec with a title derived from the metric.
    #[must_use]
    pub fn new(kind: ChartKind, y: Metric) -> Self {
        Self {
            kind,
            x: XAxis::Date,
            y,
            title: format!("{y} per quarter"),
        }
    }

    /// The rule-based default: a revenue line over time.
    #[must_use]
    pub fn revenue_line() -> Self {
        Self::new(ChartKind::Line, Metric::Revenue)
    }

    /// Parses model output into a spec.
    ///
    /// Fence markers and a language tag are stripped first, then the text
    /// between the first `{` and the last `}` is decoded. Anything outside
    /// the closed enumeration is rejected.
    ///
    /// # Errors
    /// Returns [`InsightError::Chart`] if no valid specification is found.
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned = clean_code_block(raw);
        let json = match (cleaned.find('{'), cleaned.rfind('}')) {
            (Some(start), Some(end)) if start < end => &cleaned[start..=end],
            _ => {
                return Err(InsightError::Chart(format!(
                    "no chart specification in model output: {cleaned}"
                )));
            }
        };

        let mut spec: Self = serde_json::from_str(json)
            .map_err(|e| InsightError::Chart(format!("{e}: {json}")))?;
        if spec.title.trim().is_empty() {
            spec.title = format!("{} per quarter", spec.y);
        }
        Ok(spec)
    }
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self::revenue_line()
    }
}
