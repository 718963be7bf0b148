//! ScoreProvider port - the external AI scoring service.
//!
//! The provider is an opaque black box: one network call in, either a
//! structured score or a machine-readable error classification out.
//! Implementations issue exactly one call per `submit` and never retry
//! internally; retry policy belongs to the caller, which holds the
//! admission ticket for the duration of the exchange.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::metering::FeatureKind;

/// The student work to be scored, opaque to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorePayload {
    /// Submission content (text, or a storage reference for audio/images).
    pub submission: String,
    /// Optional rubric guiding the scoring model.
    pub rubric: Option<String>,
}

impl ScorePayload {
    /// Creates a payload with no rubric.
    pub fn new(submission: impl Into<String>) -> Self {
        Self {
            submission: submission.into(),
            rubric: None,
        }
    }

    /// Attaches a rubric.
    pub fn with_rubric(mut self, rubric: impl Into<String>) -> Self {
        self.rubric = Some(rubric.into());
        self
    }
}

/// One scoring call.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub payload: ScorePayload,
    pub feature: FeatureKind,
    /// Trace identifier propagated to the provider for support tickets.
    pub trace_id: String,
}

/// Structured result returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Score on the provider's 0-100 scale.
    pub score: f64,
    /// Model self-reported confidence, when available.
    pub confidence: Option<f64>,
    /// Free-form feedback for the student.
    pub feedback: Option<String>,
    /// Model that produced the score.
    pub model: String,
}

/// Port for the external scoring provider.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Issues exactly one call to the provider and classifies the outcome.
    async fn submit(&self, request: ScoreRequest) -> Result<ScoreResult, ScoreProviderError>;
}

/// Classified provider failures.
#[derive(Debug, thiserror::Error)]
pub enum ScoreProviderError {
    /// The provider rejected the call for exceeding its concurrency or
    /// rate budget.
    #[error("provider rate limited{}", retry_after_secs.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited {
        /// Provider-supplied backoff hint, when present.
        retry_after_secs: Option<u32>,
    },

    /// The call did not complete within the client timeout.
    #[error("provider call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u32 },

    /// The provider rejected the payload as malformed (terminal).
    #[error("provider rejected input: {message}")]
    InvalidInput { message: String },

    /// API key or authentication failed.
    #[error("provider authentication failed")]
    AuthenticationFailed,

    /// The provider reported an internal fault.
    #[error("provider server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Network-level failure before a classified response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The provider response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ScoreProviderError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true when the same ticket may be used to try again.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ScoreProviderError::RateLimited { .. })
    }
}
