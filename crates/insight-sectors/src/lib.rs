#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insight/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Sectors REST API data provider.
//!
//! This crate implements the insight-core provider traits for the
//! [Sectors](https://sectors.app/) API.
//!
//! # Usage
//!
//! ```rust,ignore
//! use insight_sectors::{SectorsConfig, SectorsProvider};
//! use insight_core::{CatalogProvider, FinancialsProvider, FinancialsQuery, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = SectorsProvider::new(SectorsConfig::new("your_api_key"))?;
//!
//!     let subsectors = provider.subsectors().await?;
//!     let companies = provider.companies(&subsectors[0]).await?;
//!
//!     let financials = provider
//!         .quarterly_financials(&Symbol::new("BBCA"), &FinancialsQuery::default())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use insight_core::{
    CatalogProvider, Company, DataProvider, FinancialTable, FinancialsProvider, FinancialsQuery,
    InsightError, QuarterlyFinancial, Result, RetryPolicy, Subsector, Symbol,
};
use reqwest::{Client, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Base URL for the Sectors v1 API.
pub const SECTORS_BASE_URL: &str = "https://api.sectors.app/v1";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider name used in errors and cache keys.
const PROVIDER_NAME: &str = "Sectors";

/// Connection settings for the Sectors API.
#[derive(Clone)]
pub struct SectorsConfig {
    /// API key, sent verbatim in the `Authorization` header.
    pub api_key: String,
    /// Base URL, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl SectorsConfig {
    /// Creates a config for the public API with default timeout and retries.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: SECTORS_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl fmt::Debug for SectorsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectorsConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Sectors API data provider.
///
/// Provides access to:
/// - The subsector catalog
/// - Companies filtered by subsector
/// - Quarterly financials filtered by symbol, quarter count and report date
#[derive(Clone)]
pub struct SectorsProvider {
    client: Client,
    config: SectorsConfig,
}

impl fmt::Debug for SectorsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectorsProvider")
            .field("config", &self.config)
            .finish()
    }
}

impl SectorsProvider {
    /// Create a new provider with an HTTP client honoring the configured timeout.
    ///
    /// # Errors
    /// Returns [`InsightError::Config`] if the HTTP client cannot be built.
    pub fn new(config: SectorsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InsightError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Create a new provider with a custom HTTP client.
    #[must_use]
    pub const fn with_client(client: Client, config: SectorsConfig) -> Self {
        Self { client, config }
    }

    /// Returns the connection settings.
    #[must_use]
    pub const fn config(&self) -> &SectorsConfig {
        &self.config
    }

    /// Build the full URL from path segments, percent-encoding each one.
    ///
    /// An empty last segment keeps the trailing slash the API expects.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let base = &self.config.base_url;
        let mut url = Url::parse(base)
            .map_err(|e| InsightError::Config(format!("invalid Sectors base URL {base:?}: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| InsightError::Config(format!("Sectors base URL {base:?} cannot take a path")))?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }

    /// Performs an authenticated GET and returns the decoded JSON body.
    ///
    /// The body is returned exactly as decoded. Transient failures are
    /// retried according to the configured policy; any other non-success
    /// status is reported without reading further.
    ///
    /// # Errors
    /// - [`InsightError::AuthenticationFailed`] on 401/403
    /// - [`InsightError::NotFound`] on 404
    /// - [`InsightError::RateLimited`] on 429
    /// - [`InsightError::Http`] on any other non-success status
    /// - [`InsightError::Parse`] if the body is not valid JSON
    pub async fn fetch_json(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let segments: Vec<&str> = endpoint.trim_start_matches('/').split('/').collect();
        self.get_json(&self.url(&segments)?, params).await
    }

    /// Fetches the endpoint at `segments` and decodes it into `T`.
    async fn fetch<T: DeserializeOwned>(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<T> {
        let url = self.url(segments)?;
        let value = self.get_json(&url, params).await?;
        serde_json::from_value(value).map_err(|e| InsightError::Parse(format!("{}: {e}", url.path())))
    }

    async fn get_json(&self, url: &Url, params: &[(&str, &str)]) -> Result<Value> {
        self.config
            .retry
            .run(url.path(), || self.get_once(url, params))
            .await
    }

    async fn get_once(&self, url: &Url, params: &[(&str, &str)]) -> Result<Value> {
        let endpoint = url.path();
        debug!(endpoint, ?params, "Sectors request");

        let mut request = self
            .client
            .get(url.clone())
            .header(header::AUTHORIZATION, &self.config.api_key);
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(InsightError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                retry_after,
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(InsightError::AuthenticationFailed(PROVIDER_NAME.to_string()));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(InsightError::NotFound(endpoint.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::Http {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(map_transport_error)?;
        serde_json::from_str(&text).map_err(|e| InsightError::Parse(format!("{e}: {text}")))
    }
}

fn map_transport_error(e: reqwest::Error) -> InsightError {
    if e.is_timeout() {
        InsightError::Timeout(PROVIDER_NAME.to_string())
    } else {
        InsightError::Network(e.to_string())
    }
}

impl DataProvider for SectorsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "Sectors - Indonesian and regional market data API"
    }
}

#[async_trait]
impl CatalogProvider for SectorsProvider {
    async fn subsectors(&self) -> Result<Vec<Subsector>> {
        self.fetch(&["subsectors", ""], &[]).await
    }

    async fn companies(&self, subsector: &Subsector) -> Result<Vec<Company>> {
        self.fetch(&["companies", ""], &[("sub_sector", subsector.name())])
            .await
    }
}

#[async_trait]
impl FinancialsProvider for SectorsProvider {
    async fn quarterly_financials(
        &self,
        symbol: &Symbol,
        query: &FinancialsQuery,
    ) -> Result<FinancialTable> {
        let n_quarters = query.n_quarters.to_string();
        let report_date = query.report_date.format("%Y-%m-%d").to_string();

        let records: Vec<QuarterlyFinancial> = self
            .fetch(
                &["financials", "quarterly", symbol.as_str(), ""],
                &[
                    ("n_quarters", n_quarters.as_str()),
                    ("report_date", report_date.as_str()),
                ],
            )
            .await?;

        if records.is_empty() {
            return Err(InsightError::NotFound(format!(
                "no quarterly financials for {symbol} up to {report_date}"
            )));
        }

        debug!(symbol = %symbol, quarters = records.len(), "Fetched quarterly financials");
        Ok(FinancialTable::new(symbol.clone(), records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn provider(server: &Server) -> SectorsProvider {
        let config = SectorsConfig::new("test-key")
            .with_base_url(server.url())
            .with_retry(RetryPolicy::new(
                2,
                Duration::from_millis(1),
                Duration::from_millis(5),
            ));
        SectorsProvider::new(config).unwrap()
    }

    #[test]
    fn test_url_building() {
        let provider = SectorsProvider::new(SectorsConfig::new("key")).unwrap();
        assert_eq!(
            provider.url(&["subsectors", ""]).unwrap().as_str(),
            "https://api.sectors.app/v1/subsectors/"
        );

        let trailing = SectorsProvider::new(
            SectorsConfig::new("key").with_base_url("https://api.sectors.app/v1/"),
        )
        .unwrap();
        assert_eq!(
            trailing.url(&["companies", ""]).unwrap().as_str(),
            "https://api.sectors.app/v1/companies/"
        );
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let provider = SectorsProvider::new(SectorsConfig::new("key")).unwrap();
        let url = provider
            .url(&["financials", "quarterly", "BB/CA?X#1", ""])
            .unwrap();
        assert_eq!(url.path(), "/v1/financials/quarterly/BB%2FCA%3FX%231/");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = SectorsProvider::new(SectorsConfig::new("secret_key_12345")).unwrap();
        let debug_str = format!("{provider:?}");
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_fetch_json_returns_body_unmodified() {
        let mut server = Server::new_async().await;
        let body = json!([
            {"subsector": "banks", "total_companies": 47},
            {"subsector": "retail", "total_companies": null}
        ]);
        let mock = server
            .mock("GET", "/subsectors/")
            .match_header("authorization", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let value = provider(&server).fetch_json("subsectors/", &[]).await.unwrap();
        assert_eq!(value, body);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_is_reported_without_retry() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/companies/")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("{\"detail\": \"bad sub_sector\"}")
            .expect(1)
            .create_async()
            .await;

        let result = provider(&server)
            .fetch_json("companies/", &[("sub_sector", "nope")])
            .await;
        match result {
            Err(InsightError::Http { status, body, .. }) => {
                assert_eq!(status, 400);
                assert!(body.contains("bad sub_sector"));
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_failed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/subsectors/")
            .with_status(403)
            .create_async()
            .await;

        let result = provider(&server).subsectors().await;
        assert!(matches!(result, Err(InsightError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_reported() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/subsectors/")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let result = provider(&server).fetch_json("subsectors/", &[]).await;
        assert!(matches!(result, Err(InsightError::Http { status: 503, .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/subsectors/")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let result = provider(&server).fetch_json("subsectors/", &[]).await;
        assert!(matches!(result, Err(InsightError::Parse(_))));
    }

    #[tokio::test]
    async fn test_companies_filtered_by_subsector() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/companies/")
            .match_query(Matcher::UrlEncoded("sub_sector".into(), "banks".into()))
            .with_status(200)
            .with_body(
                json!([
                    {"symbol": "BBCA.JK", "company_name": "Bank Central Asia Tbk."},
                    {"symbol": "BBRI.JK", "company_name": "Bank Rakyat Indonesia (Persero) Tbk."}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let companies = provider(&server)
            .companies(&Subsector::new("banks"))
            .await
            .unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].label(), "BBCA.JK - Bank Central Asia Tbk.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_quarterly_financials_query_and_ordering() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/financials/quarterly/BBCA.JK/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("n_quarters".into(), "4".into()),
                Matcher::UrlEncoded("report_date".into(), "2023-09-30".into()),
            ]))
            .with_status(200)
            .with_body(
                json!([
                    {"symbol": "BBCA.JK", "date": "2023-09-30", "revenue": 30.0, "net_income": 12.0, "operating": 9.0},
                    {"symbol": "BBCA.JK", "date": "2022-12-31", "revenue": 25.0, "net_income": 10.0, "operating": null},
                    {"symbol": "BBCA.JK", "date": "2023-06-30", "revenue": 28.0, "net_income": 11.0, "operating": 8.0},
                    {"symbol": "BBCA.JK", "date": "2023-03-31", "revenue": 27.0, "net_income": 10.5, "operating": 7.0}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let table = provider(&server)
            .quarterly_financials(&Symbol::new("bbca.jk"), &FinancialsQuery::default())
            .await
            .unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(
            table.records()[0].date,
            NaiveDate::from_ymd_opt(2022, 12, 31).unwrap()
        );
        assert_eq!(table.symbol().as_str(), "BBCA.JK");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_symbol_cannot_escape_financials_path() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                Matcher::Exact("/financials/quarterly/..%2FSUBSECTORS/".into()),
            )
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let result = provider(&server)
            .quarterly_financials(&Symbol::new("../subsectors"), &FinancialsQuery::default())
            .await;
        assert!(matches!(result, Err(InsightError::NotFound(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_financials_is_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/financials/quarterly/XXXX/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let result = provider(&server)
            .quarterly_financials(&Symbol::new("XXXX"), &FinancialsQuery::default())
            .await;
        assert!(matches!(result, Err(InsightError::NotFound(_))));
    }
}
