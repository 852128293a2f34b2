//! Provider traits for the two external services.
//!
//! This module defines the core traits:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`CatalogProvider`] - Subsector and company lookup lists
//! - [`FinancialsProvider`] - Quarterly financial tables
//! - [`LanguageModel`] - Hosted text-generation model

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{
    error::Result,
    table::FinancialTable,
    types::{Company, FinancialsQuery, Subsector, Symbol},
};

/// Base trait for all data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Sectors").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Provider for the selection catalog.
#[async_trait]
pub trait CatalogProvider: DataProvider {
    /// Fetches every subsector, in the order the provider returns them.
    async fn subsectors(&self) -> Result<Vec<Subsector>>;

    /// Fetches the companies listed under a subsector.
    async fn companies(&self, subsector: &Subsector) -> Result<Vec<Company>>;
}

/// Provider for quarterly financial data.
#[async_trait]
pub trait FinancialsProvider: DataProvider {
    /// Fetches the quarterly financials of a symbol for the requested window.
    async fn quarterly_financials(
        &self,
        symbol: &Symbol,
        query: &FinancialsQuery,
    ) -> Result<FinancialTable>;
}

/// Fixed decoding parameters sent with every prompt.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl GenerationParams {
    /// Default output bound.
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;
    /// Default sampling temperature.
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: Self::DEFAULT_TEMPERATURE,
        }
    }
}

/// A hosted text-generation model.
///
/// Implementations return the raw completion text. Network, quota and model
/// failures are reported as errors and never swallowed.
#[async_trait]
pub trait LanguageModel: Send + Sync + Debug {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Sends a prompt and returns the completion.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}
