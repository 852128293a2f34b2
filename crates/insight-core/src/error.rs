//! Error types for insight operations.
//!
//! This module defines [`InsightError`] which covers every failure that can
//! occur while fetching market data, prompting the model, caching responses
//! or rendering a chart.

use thiserror::Error;

/// Errors that can occur while producing insights.
#[derive(Error, Debug)]
pub enum InsightError {
    /// Network-related errors (connection failures, DNS, broken bodies).
    #[error("Network error: {0}")]
    Network(String),

    /// A request exceeded its configured timeout.
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<std::time::Duration>,
    },

    /// Authentication failed for a provider.
    #[error("Authentication failed for provider {0}")]
    AuthenticationFailed(String),

    /// The requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status.
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        /// The provider that returned the status.
        provider: String,
        /// The HTTP status code.
        status: u16,
        /// The response body, as text.
        body: String,
    },

    /// Error parsing data from a provider.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The language model failed to produce a completion.
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required credential is missing or blank.
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested subsector or company is not part of the current selection.
    #[error("Selection error: {0}")]
    Selection(String),

    /// Error interacting with the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A chart could not be built from the available data.
    #[error("Chart error: {0}")]
    Chart(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl InsightError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Only network failures, timeouts, rate limits and server-side (5xx)
    /// statuses are transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using [`InsightError`].
pub type Result<T> = std::result::Result<T, InsightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(InsightError::Network("reset".into()).is_transient());
        assert!(InsightError::Timeout("sectors".into()).is_transient());
        assert!(
            InsightError::RateLimited {
                provider: "Sectors".into(),
                retry_after: None,
            }
            .is_transient()
        );
        assert!(
            InsightError::Http {
                provider: "Sectors".into(),
                status: 503,
                body: String::new(),
            }
            .is_transient()
        );
        assert!(
            !InsightError::Http {
                provider: "Sectors".into(),
                status: 400,
                body: String::new(),
            }
            .is_transient()
        );
        assert!(!InsightError::AuthenticationFailed("Sectors".into()).is_transient());
        assert!(!InsightError::Parse("bad json".into()).is_transient());
    }

    #[test]
    fn test_missing_credential_message_names_variable() {
        let err = InsightError::MissingCredential("SECTORS_API_KEY");
        assert!(err.to_string().contains("SECTORS_API_KEY"));
    }
}
