//! Quarterly financial table.
//!
//! [`FinancialTable`] holds the rows returned for one symbol, ordered by date,
//! and converts them to a polars [`DataFrame`] for flat-text rendering and
//! series extraction.

use chrono::NaiveDate;
use comfy_table::{CellAlignment, Table, presets::NOTHING};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    chart::Metric,
    error::{InsightError, Result},
    types::{QuarterlyFinancial, Symbol},
};

/// Date format used for the `date` column.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Left and right padding of rendered columns.
const COLUMN_PADDING: (u16, u16) = (0, 2);

/// Quarterly financial rows for one company, sorted by date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinancialTable {
    symbol: Symbol,
    records: Vec<QuarterlyFinancial>,
}

impl FinancialTable {
    /// Creates a table, sorting the records by ascending date.
    #[must_use]
    pub fn new(symbol: Symbol, mut records: Vec<QuarterlyFinancial>) -> Self {
        records.sort_by_key(|r| r.date);
        Self { symbol, records }
    }

    /// Returns the symbol this table belongs to.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Returns the records in date order.
    #[must_use]
    pub fn records(&self) -> &[QuarterlyFinancial] {
        &self.records
    }

    /// Returns the number of quarters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the extra column names in first-seen order.
    fn extra_columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for record in &self.records {
            for key in record.extra.keys() {
                if !names.contains(&key.as_str()) {
                    names.push(key);
                }
            }
        }
        names
    }

    /// Converts the table to a DataFrame.
    ///
    /// Columns: `symbol` (when present), `date`, `revenue`, `net_income`,
    /// `operating`, then every extra field. Extra fields whose non-null
    /// values are all numbers become `f64` columns, the rest become strings.
    ///
    /// # Errors
    /// Returns [`InsightError::Parse`] if the frame cannot be assembled.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(5 + self.extra_columns().len());

        if self.records.iter().any(|r| r.symbol.is_some()) {
            let symbols: Vec<Option<String>> =
                self.records.iter().map(|r| r.symbol.clone()).collect();
            columns.push(Column::new("symbol".into(), symbols));
        }

        let dates: Vec<String> = self
            .records
            .iter()
            .map(|r| r.date.format(DATE_FORMAT).to_string())
            .collect();
        columns.push(Column::new("date".into(), dates));

        for metric in Metric::ALL {
            let values: Vec<Option<f64>> = self.records.iter().map(|r| metric.value(r)).collect();
            columns.push(Column::new(metric.column().into(), values));
        }

        for name in self.extra_columns() {
            let values: Vec<Option<&Value>> = self
                .records
                .iter()
                .map(|r| r.extra.get(name).filter(|v| !v.is_null()))
                .collect();

            if values.iter().flatten().all(|v| v.is_number()) {
                let numbers: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| v.and_then(Value::as_f64))
                    .collect();
                columns.push(Column::new(name.into(), numbers));
            } else {
                let texts: Vec<Option<String>> = values
                    .iter()
                    .map(|v| {
                        v.map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                    })
                    .collect();
                columns.push(Column::new(name.into(), texts));
            }
        }

        let df = DataFrame::new(columns).map_err(|e| InsightError::Parse(e.to_string()))?;

        df.lazy()
            .sort(["date"], Default::default())
            .collect()
            .map_err(|e| InsightError::Parse(e.to_string()))
    }

    /// Renders the whole table as flat text, one row per quarter, no index.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be built.
    pub fn render_text(&self) -> Result<String> {
        render_frame(&self.to_frame()?)
    }

    /// Extracts `(date, value)` pairs for a metric, dropping quarters where
    /// the value is missing.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be built.
    pub fn series(&self, metric: Metric) -> Result<Vec<(NaiveDate, f64)>> {
        let df = self.to_frame()?;
        let dates = df
            .column("date")
            .and_then(|c| c.str())
            .map_err(|e| InsightError::Parse(e.to_string()))?;
        let values = df
            .column(metric.column())
            .and_then(|c| c.f64())
            .map_err(|e| InsightError::Parse(e.to_string()))?;

        Ok(dates
            .into_iter()
            .zip(values.into_iter())
            .filter_map(|(date, value)| {
                let date = NaiveDate::parse_from_str(date?, DATE_FORMAT).ok()?;
                Some((date, value?))
            })
            .collect())
    }

    /// Renders the `(date, metric)` series as flat text.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be built.
    pub fn render_series_text(&self, metric: Metric) -> Result<String> {
        let series = self.series(metric)?;
        let dates: Vec<String> = series
            .iter()
            .map(|(d, _)| d.format(DATE_FORMAT).to_string())
            .collect();
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

        let df = DataFrame::new(vec![
            Column::new("date".into(), dates),
            Column::new(metric.column().into(), values),
        ])
        .map_err(|e| InsightError::Parse(e.to_string()))?;

        render_frame(&df)
    }
}

/// Renders a frame as a borderless, right-aligned text table with a header
/// row and no index column.
fn render_frame(df: &DataFrame) -> Result<String> {
    let mut table = Table::new();
    table.load_preset(NOTHING).set_header(
        df.get_column_names()
            .into_iter()
            .map(|name| name.to_string()),
    );

    for idx in 0..df.height() {
        let row = df
            .get_columns()
            .iter()
            .map(|column| column.get(idx).map(|value| format_cell(&value)))
            .collect::<PolarsResult<Vec<String>>>()
            .map_err(|e| InsightError::Parse(e.to_string()))?;
        table.add_row(row);
    }

    for column in table.column_iter_mut() {
        column.set_cell_alignment(CellAlignment::Right);
        column.set_padding(COLUMN_PADDING);
    }

    Ok(table.trim_fmt())
}

fn format_cell(value: &AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => "NaN".to_string(),
        AnyValue::String(s) => (*s).to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Float64(v) => format_number(*v),
        other => other.to_string(),
    }
}

/// Whole numbers print without decimals, everything else with two.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
