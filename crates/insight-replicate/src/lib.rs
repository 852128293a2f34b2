#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insight/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Replicate language model provider.
//!
//! Implements [`LanguageModel`] on top of the Replicate predictions API. A
//! prediction is created with `Prefer: wait`; if it has not finished when the
//! call returns, it is polled until it succeeds, fails or is canceled.
//!
//! # Usage
//!
//! ```rust,ignore
//! use insight_replicate::{ReplicateConfig, ReplicateModel};
//! use insight_core::{GenerationParams, LanguageModel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = ReplicateModel::new(ReplicateConfig::new("r8_..."))?;
//!     let text = model.generate("Say hello", &GenerationParams::default()).await?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use insight_core::{GenerationParams, InsightError, LanguageModel, Result, RetryPolicy};
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Base URL for the Replicate v1 API.
pub const REPLICATE_BASE_URL: &str = "https://api.replicate.com/v1";

/// Default hosted model.
pub const DEFAULT_MODEL: &str = "ibm-granite/granite-3.3-8b-instruct";

/// Default budget for one completion, including polling.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default delay between polls of an unfinished prediction.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const PROVIDER_NAME: &str = "Replicate";

/// Connection settings for Replicate.
#[derive(Clone)]
pub struct ReplicateConfig {
    /// API token, sent as a bearer token.
    pub api_token: String,
    /// Base URL, without a trailing slash.
    pub base_url: String,
    /// Model as `owner/name` or `owner/name:version`.
    pub model: String,
    /// Budget for one completion, including polling.
    pub timeout: Duration,
    /// Delay between polls of an unfinished prediction.
    pub poll_interval: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl ReplicateConfig {
    /// Creates a config for the default model with default timeouts.
    #[must_use]
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: REPLICATE_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the completion budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl fmt::Debug for ReplicateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicateConfig")
            .field("api_token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Language model hosted on Replicate.
#[derive(Clone)]
pub struct ReplicateModel {
    client: Client,
    config: ReplicateConfig,
}

impl fmt::Debug for ReplicateModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicateModel")
            .field("config", &self.config)
            .finish()
    }
}

impl ReplicateModel {
    /// Create a new model client.
    ///
    /// # Errors
    /// Returns [`InsightError::Config`] if the model identifier is malformed
    /// or the HTTP client cannot be built.
    pub fn new(config: ReplicateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InsightError::Config(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(client, config)
    }

    /// Create a new model client with a custom HTTP client.
    ///
    /// # Errors
    /// Returns [`InsightError::Config`] if the model identifier is malformed.
    pub fn with_client(client: Client, config: ReplicateConfig) -> Result<Self> {
        ModelRef::parse(&config.model)?;
        Ok(Self { client, config })
    }

    /// Returns the connection settings.
    #[must_use]
    pub const fn config(&self) -> &ReplicateConfig {
        &self.config
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Creates a prediction, waiting synchronously as long as the API allows.
    async fn create_prediction(&self, input: &PredictionInput<'_>) -> Result<Prediction> {
        let (url, body) = match ModelRef::parse(&self.config.model)? {
            ModelRef::Official { owner, name } => (
                format!("{}/models/{owner}/{name}/predictions", self.base_url()),
                PredictionRequest {
                    version: None,
                    input,
                },
            ),
            ModelRef::Versioned { version } => (
                format!("{}/predictions", self.base_url()),
                PredictionRequest {
                    version: Some(version),
                    input,
                },
            ),
        };

        debug!(model = %self.config.model, prompt_len = input.prompt.len(), "Replicate prediction");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        decode_prediction(response).await
    }

    async fn get_prediction(&self, url: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        decode_prediction(response).await
    }

    /// Polls until the prediction reaches a terminal status or `deadline`
    /// passes.
    async fn wait_for(&self, mut prediction: Prediction, deadline: Instant) -> Result<Prediction> {

        while !prediction.status.is_terminal() {
            if Instant::now() >= deadline {
                return Err(InsightError::Timeout(PROVIDER_NAME.to_string()));
            }

            let url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .ok_or_else(|| {
                    InsightError::Model(format!(
                        "prediction {} is {:?} but has no polling URL",
                        prediction.id, prediction.status
                    ))
                })?;

            debug!(id = %prediction.id, status = ?prediction.status, "Polling prediction");
            tokio::time::sleep(self.config.poll_interval).await;
            prediction = self
                .config
                .retry
                .run("replicate poll", || self.get_prediction(&url))
                .await?;
        }

        match prediction.status {
            PredictionStatus::Succeeded => Ok(prediction),
            PredictionStatus::Failed => Err(InsightError::Model(
                prediction
                    .error
                    .as_ref()
                    .map(value_text)
                    .unwrap_or_else(|| format!("prediction {} failed", prediction.id)),
            )),
            _ => Err(InsightError::Model(format!(
                "prediction {} was {:?}",
                prediction.id, prediction.status
            ))),
        }
    }
}

#[async_trait]
impl LanguageModel for ReplicateModel {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let input = PredictionInput {
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let deadline = Instant::now() + self.config.timeout;

        // A rejected create never started a prediction; anything else might
        // have, and resending would run (and bill) it twice.
        let prediction = self
            .config
            .retry
            .run_when(
                "replicate prediction",
                |e| matches!(e, InsightError::RateLimited { .. }),
                || self.create_prediction(&input),
            )
            .await?;
        let prediction = self.wait_for(prediction, deadline).await?;
        prediction.output_text()
    }
}

async fn decode_prediction(response: reqwest::Response) -> Result<Prediction> {
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
        return Err(InsightError::NotFound(response.url().path().to_string()));
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

fn map_transport_error(e: reqwest::Error) -> InsightError {
    if e.is_timeout() {
        InsightError::Timeout(PROVIDER_NAME.to_string())
    } else {
        InsightError::Network(e.to_string())
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parsed model identifier.
#[derive(Debug, PartialEq, Eq)]
enum ModelRef<'a> {
    /// `owner/name`, run through the official-model endpoint.
    Official { owner: &'a str, name: &'a str },
    /// `owner/name:version`, run by version id.
    Versioned { version: &'a str },
}

impl<'a> ModelRef<'a> {
    fn parse(model: &'a str) -> Result<Self> {
        let invalid = || {
            InsightError::Config(format!(
                "model must look like owner/name or owner/name:version, got {model:?}"
            ))
        };

        let (path, version) = match model.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (model, None),
        };
        let (owner, name) = path.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        match version {
            Some("") => Err(invalid()),
            Some(version) => Ok(Self::Versioned { version }),
            None => Ok(Self::Official { owner, name }),
        }
    }
}

// ============================================================================
// Replicate API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: &'a PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Canceled | Self::Aborted
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

impl Prediction {
    /// Joins streamed tokens, or returns a plain string output.
    fn output_text(&self) -> Result<String> {
        match &self.output {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Array(items)) => Ok(items.iter().map(value_text).collect()),
            Some(Value::Null) | None => Err(InsightError::Model(format!(
                "prediction {} returned no output",
                self.id
            ))),
            Some(other) => Ok(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn model(server: &Server) -> ReplicateModel {
        let config = ReplicateConfig::new("r8_test")
            .with_base_url(server.url())
            .with_poll_interval(Duration::from_millis(1))
            .with_retry(RetryPolicy::new(
                1,
                Duration::from_millis(1),
                Duration::from_millis(5),
            ));
        ReplicateModel::new(config).unwrap()
    }

    #[test]
    fn test_model_ref_parsing() {
        assert_eq!(
            ModelRef::parse("ibm-granite/granite-3.3-8b-instruct").unwrap(),
            ModelRef::Official {
                owner: "ibm-granite",
                name: "granite-3.3-8b-instruct"
            }
        );
        assert_eq!(
            ModelRef::parse("owner/name:abc123").unwrap(),
            ModelRef::Versioned { version: "abc123" }
        );
        assert!(ModelRef::parse("granite").is_err());
        assert!(ModelRef::parse("a/b/c").is_err());
        assert!(ModelRef::parse("owner/name:").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let model = ReplicateModel::new(ReplicateConfig::new("r8_secret")).unwrap();
        let debug_str = format!("{model:?}");
        assert!(!debug_str.contains("r8_secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_output_text_joins_tokens() {
        let prediction: Prediction = serde_json::from_value(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["Pendapatan ", "naik ", "12%."]
        }))
        .unwrap();
        assert_eq!(prediction.output_text().unwrap(), "Pendapatan naik 12%.");
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_params() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/models/ibm-granite/granite-3.3-8b-instruct/predictions",
            )
            .match_header("authorization", "Bearer r8_test")
            .match_header("prefer", "wait")
            .match_body(Matcher::Json(json!({
                "input": {"prompt": "Ringkas data ini", "max_tokens": 1024, "temperature": 0.2}
            })))
            .with_status(201)
            .with_body(
                json!({"id": "p1", "status": "succeeded", "output": ["1. ", "Naik"]}).to_string(),
            )
            .create_async()
            .await;

        let text = model(&server)
            .generate("Ringkas data ini", &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(text, "1. Naik");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_polls_unfinished_prediction() {
        let mut server = Server::new_async().await;
        let poll_url = format!("{}/predictions/p2", server.url());

        let _create = server
            .mock(
                "POST",
                "/models/ibm-granite/granite-3.3-8b-instruct/predictions",
            )
            .with_status(201)
            .with_body(
                json!({"id": "p2", "status": "processing", "urls": {"get": poll_url}}).to_string(),
            )
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/predictions/p2")
            .match_header("authorization", "Bearer r8_test")
            .with_status(200)
            .with_body(json!({"id": "p2", "status": "succeeded", "output": "done"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let text = model(&server)
            .generate("prompt", &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(text, "done");
        poll.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_prediction_is_model_error() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock(
                "POST",
                "/models/ibm-granite/granite-3.3-8b-instruct/predictions",
            )
            .with_status(201)
            .with_body(
                json!({"id": "p3", "status": "failed", "error": "CUDA out of memory"}).to_string(),
            )
            .create_async()
            .await;

        let result = model(&server)
            .generate("prompt", &GenerationParams::default())
            .await;
        match result {
            Err(InsightError::Model(message)) => assert!(message.contains("CUDA out of memory")),
            other => panic!("expected model error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_is_not_resent_after_server_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/models/ibm-granite/granite-3.3-8b-instruct/predictions",
            )
            .with_status(502)
            .with_body("bad gateway")
            .expect(1)
            .create_async()
            .await;

        let result = model(&server)
            .generate("prompt", &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(InsightError::Http { status: 502, .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_is_retried_after_rate_limit() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock(
                "POST",
                "/models/ibm-granite/granite-3.3-8b-instruct/predictions",
            )
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let result = model(&server)
            .generate("prompt", &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(InsightError::RateLimited { .. })));
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn test_polling_shares_the_completion_budget() {
        let mut server = Server::new_async().await;
        let poll_url = format!("{}/predictions/p4", server.url());
        let created = json!({"id": "p4", "status": "starting", "urls": {"get": poll_url}}).to_string();
        let _create = server
            .mock(
                "POST",
                "/models/ibm-granite/granite-3.3-8b-instruct/predictions",
            )
            .with_status(201)
            .with_body_from_request(move |_| {
                std::thread::sleep(Duration::from_millis(80));
                created.clone().into_bytes()
            })
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/predictions/p4")
            .with_status(200)
            .with_body(json!({"id": "p4", "status": "processing"}).to_string())
            .expect_at_most(1)
            .create_async()
            .await;

        let config = ReplicateConfig::new("r8_test")
            .with_base_url(server.url())
            .with_timeout(Duration::from_millis(100))
            .with_poll_interval(Duration::from_millis(30))
            .with_retry(RetryPolicy::none());
        let result = ReplicateModel::new(config)
            .unwrap()
            .generate("prompt", &GenerationParams::default())
            .await;

        assert!(matches!(result, Err(InsightError::Timeout(_))));
        poll.assert_async().await;
    }

    #[tokio::test]
    async fn test_quota_error_propagates() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/models/ibm-granite/granite-3.3-8b-instruct/predictions",
            )
            .with_status(402)
            .with_body("{\"detail\": \"insufficient credit\"}")
            .expect(1)
            .create_async()
            .await;

        let result = model(&server)
            .generate("prompt", &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(InsightError::Http { status: 402, .. })));
        mock.assert_async().await;
    }
}
