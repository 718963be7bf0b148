//! Metering pipeline configuration: ticket pool, deadline, retry policy.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::RetryPolicy;

/// Configuration of the metering pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct MeteringConfig {
    /// Ticket pool capacity: the provider's safe concurrent-call budget.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Maximum callers waiting behind the pool before load shedding.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,

    /// One deadline spanning queueing plus the in-flight call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Total provider attempts per request when rate-limited.
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,

    /// First retry backoff in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl MeteringConfig {
    /// Get the end-to-end deadline as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the gateway retry policy from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    /// Validate metering configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_in_flight == 0 {
            return Err(ValidationError::InvalidPoolCapacity);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.retry_max_attempts == 0 {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        Ok(())
    }
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            max_queue_depth: default_max_queue_depth(),
            request_timeout_secs: default_request_timeout(),
            retry_max_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

fn default_max_in_flight() -> usize {
    18
}

fn default_max_queue_depth() -> usize {
    64
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    4
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_retry_max_delay_ms() -> u64 {
    4000
}
