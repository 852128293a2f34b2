#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insight/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the sectors insight dashboard.
//!
//! This crate provides the foundational abstractions shared by the data
//! client, the model client and the dashboard:
//!
//! - [`CatalogProvider`](provider::CatalogProvider) - Subsector and company lists
//! - [`FinancialsProvider`](provider::FinancialsProvider) - Quarterly financials
//! - [`LanguageModel`](provider::LanguageModel) - Hosted text generation
//! - [`ResponseCache`](cache::ResponseCache) - Caching abstraction
//! - [`FinancialTable`](table::FinancialTable) - Quarterly rows as a DataFrame
//! - [`ChartSpec`](chart::ChartSpec) - Closed, data-only chart request

/// Cache trait for storing provider responses.
pub mod cache;
/// Closed chart specification.
pub mod chart;
/// Error types for insight operations.
pub mod error;
/// Prompt templates and code-fence cleanup.
pub mod prompt;
/// Provider traits for market data and language models.
pub mod provider;
/// Retry policy for transient failures.
pub mod retry;
/// Quarterly financial table.
pub mod table;
/// Core data types (Symbol, Subsector, Company, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::ResponseCache;
pub use chart::{ChartKind, ChartSpec, Metric, XAxis};
pub use error::{InsightError, Result};
pub use prompt::{DATA_PLACEHOLDER, PromptTemplate, clean_code_block};
pub use provider::{
    CatalogProvider, DataProvider, FinancialsProvider, GenerationParams, LanguageModel,
};
pub use retry::RetryPolicy;
pub use table::{FinancialTable, format_number};
pub use types::{Company, FinancialsQuery, QuarterlyFinancial, Subsector, Symbol};
