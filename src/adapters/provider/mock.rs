//! Mock scoring provider for testing.
//!
//! Configurable to return scripted scores or failures in order, simulate
//! latency, and track calls. It also records the high-water mark of
//! simultaneously in-flight calls, which is what the pool-bound tests
//! assert against.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::ports::{ScoreProvider, ScoreProviderError, ScoreRequest, ScoreResult};

/// A scripted provider outcome.
#[derive(Debug, Clone)]
enum MockOutcome {
    Success(ScoreResult),
    Failure(MockFailure),
}

/// Failure types the mock can inject.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Simulate provider-side rate limiting.
    RateLimited { retry_after_secs: Option<u32> },
    /// Simulate a provider-side timeout classification.
    Timeout { timeout_secs: u32 },
    /// Simulate a terminal input rejection.
    InvalidInput { message: String },
    /// Simulate an authentication failure.
    AuthenticationFailed,
    /// Simulate a provider server fault.
    ServerError { status: u16, message: String },
    /// Simulate a network failure.
    Network { message: String },
}

impl From<MockFailure> for ScoreProviderError {
    fn from(failure: MockFailure) -> Self {
        match failure {
            MockFailure::RateLimited { retry_after_secs } => {
                ScoreProviderError::RateLimited { retry_after_secs }
            }
            MockFailure::Timeout { timeout_secs } => ScoreProviderError::Timeout { timeout_secs },
            MockFailure::InvalidInput { message } => ScoreProviderError::InvalidInput { message },
            MockFailure::AuthenticationFailed => ScoreProviderError::AuthenticationFailed,
            MockFailure::ServerError { status, message } => {
                ScoreProviderError::ServerError { status, message }
            }
            MockFailure::Network { message } => ScoreProviderError::Network(message),
        }
    }
}

/// Mock scoring provider.
#[derive(Clone, Default)]
pub struct MockScoreProvider {
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockScoreProvider {
    /// Creates a mock that scores 80.0 once its script is exhausted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful score.
    pub fn with_score(self, score: f64) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(MockOutcome::Success(ScoreResult {
                score,
                confidence: Some(0.9),
                feedback: Some("Well structured.".to_string()),
                model: "mock-scorer-1".to_string(),
            }));
        self
    }

    /// Queues a failure.
    pub fn with_failure(self, failure: MockFailure) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(MockOutcome::Failure(failure));
        self
    }

    /// Sets simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Acquire)
    }

    fn next_outcome(&self) -> MockOutcome {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                MockOutcome::Success(ScoreResult {
                    score: 80.0,
                    confidence: Some(0.9),
                    feedback: None,
                    model: "mock-scorer-1".to_string(),
                })
            })
    }
}

/// Decrements the in-flight gauge when a call ends on any path.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl ScoreProvider for MockScoreProvider {
    async fn submit(&self, _request: ScoreRequest) -> Result<ScoreResult, ScoreProviderError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight
            .fetch_max(now_in_flight, Ordering::AcqRel);
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_outcome() {
            MockOutcome::Success(result) => Ok(result),
            MockOutcome::Failure(failure) => Err(failure.into()),
        }
    }
}
