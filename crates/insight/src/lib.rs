#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insight/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Financial insight dashboard.
//!
//! This crate re-exports the core types, the Sectors and Replicate clients
//! and the response caches, and adds the pieces that tie them together:
//!
//! - [`InsightConfig`] - Validated startup configuration
//! - [`Dashboard`] - Cached lookups, the four insight panels and their driver
//! - [`SelectionFlow`] - Subsector then company selection
//! - [`Figure`] - Fixed SVG and terminal chart renderer
//!
//! # Features
//!
//! - `cache-sqlite` - SQLite-based response cache

// Core types and traits
pub use insight_core::*;

// Cache implementations
#[cfg(feature = "cache-sqlite")]
pub use insight_cache::SqliteCache;
pub use insight_cache::{InMemoryCache, NoopCache};

// Providers
pub use insight_replicate::{ReplicateConfig, ReplicateModel};
pub use insight_sectors::{SectorsConfig, SectorsProvider};

/// Startup configuration.
pub mod config;
mod dashboard;
/// Fixed panel prompts.
pub mod prompts;
mod render;
mod selection;

#[cfg(test)]
mod testing;

pub use config::{CacheMode, InsightConfig};
pub use dashboard::{Dashboard, Insight, InsightBody, InsightReport, PanelKind};
pub use render::Figure;
pub use selection::SelectionFlow;
