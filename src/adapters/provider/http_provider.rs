//! HTTP scoring provider - reqwest client for the external scoring API.
//!
//! Issues one POST per submission and classifies the response status into
//! the typed provider outcomes. No retries happen here; the gateway owns
//! retry policy and the admission ticket.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ports::{ScoreProvider, ScoreProviderError, ScoreRequest, ScoreResult};

/// Configuration for the HTTP scoring provider.
#[derive(Debug, Clone)]
pub struct HttpScoreProviderConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Model the provider should score with.
    pub model: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Per-call socket timeout.
    pub timeout: Duration,
}

impl HttpScoreProviderConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "scorer-large-2".to_string(),
            base_url: "https://api.scoring.example.com".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Exposes the API key (for making requests).
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// HTTP implementation of the ScoreProvider port.
pub struct HttpScoreProvider {
    config: HttpScoreProviderConfig,
    client: Client,
}

impl HttpScoreProvider {
    /// Creates a new provider with the given configuration.
    pub fn new(config: HttpScoreProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Builds the scores endpoint URL.
    fn scores_url(&self) -> String {
        format!("{}/v1/scores", self.config.base_url)
    }

    fn to_wire_request(&self, request: &ScoreRequest) -> WireScoreRequest {
        WireScoreRequest {
            model: self.config.model.clone(),
            submission: request.payload.submission.clone(),
            rubric: request.payload.rubric.clone(),
            feature: request.feature.as_str().to_string(),
            trace_id: request.trace_id.clone(),
        }
    }

    async fn send_request(&self, request: &ScoreRequest) -> Result<Response, ScoreProviderError> {
        self.client
            .post(self.scores_url())
            .header("x-api-key", self.config.api_key())
            .header("Content-Type", "application/json")
            .json(&self.to_wire_request(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoreProviderError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    ScoreProviderError::network(format!("Connection failed: {}", e))
                } else {
                    ScoreProviderError::network(e.to_string())
                }
            })
    }

    /// Classifies a non-success response into a typed outcome.
    async fn classify_failure(&self, response: Response) -> ScoreProviderError {
        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ScoreProviderError::AuthenticationFailed
            }
            StatusCode::TOO_MANY_REQUESTS => ScoreProviderError::RateLimited {
                retry_after_secs: retry_after,
            },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ScoreProviderError::invalid_input(body)
            }
            status if status.is_server_error() => ScoreProviderError::ServerError {
                status: status.as_u16(),
                message: body,
            },
            status => {
                ScoreProviderError::network(format!("Unexpected status {}: {}", status, body))
            }
        }
    }
}

/// Reads the standard Retry-After header, seconds form only.
fn parse_retry_after(response: &Response) -> Option<u32> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u32>().ok())
}

#[async_trait]
impl ScoreProvider for HttpScoreProvider {
    async fn submit(&self, request: ScoreRequest) -> Result<ScoreResult, ScoreProviderError> {
        let response = self.send_request(&request).await?;

        if !response.status().is_success() {
            return Err(self.classify_failure(response).await);
        }

        let wire: WireScoreResponse = response
            .json()
            .await
            .map_err(|e| ScoreProviderError::parse(e.to_string()))?;

        Ok(ScoreResult {
            score: wire.score,
            confidence: wire.confidence,
            feedback: wire.feedback,
            model: wire.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }
}

/// Request body for the provider's scores endpoint.
#[derive(Debug, Serialize)]
struct WireScoreRequest {
    model: String,
    submission: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rubric: Option<String>,
    feature: String,
    trace_id: String,
}

/// Response body from the provider's scores endpoint.
#[derive(Debug, Deserialize)]
struct WireScoreResponse {
    score: f64,
    confidence: Option<f64>,
    feedback: Option<String>,
    model: Option<String>,
}
