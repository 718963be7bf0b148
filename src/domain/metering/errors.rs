//! The externally visible error taxonomy of the scoring gateway.

use crate::domain::foundation::OwnerId;

/// Failure reasons a caller of the gateway can observe.
///
/// Each variant carries distinct retry semantics: `NoActiveSubscription`
/// and `ProviderFailed` are terminal, `Overloaded` and `Timeout` are
/// retryable, and `Ledger` is an internal fault. Lower layers report
/// their own error enums; only the gateway maps them into this taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum MeteringError {
    /// The owner has no active quota period.
    #[error("no active subscription for owner {owner_id}")]
    NoActiveSubscription {
        /// Owner whose admission was rejected.
        owner_id: OwnerId,
    },

    /// Admission queue is full, or the provider kept rate-limiting after
    /// all retries.
    #[error("scoring capacity exhausted, retry after {retry_after_secs}s")]
    Overloaded {
        /// Suggested client backoff, derived from queue depth and
        /// observed throughput (or the provider's own hint).
        retry_after_secs: u32,
    },

    /// The queueing-plus-scoring deadline elapsed.
    #[error("scoring request timed out after {timeout_secs}s")]
    Timeout {
        /// The configured end-to-end deadline.
        timeout_secs: u32,
    },

    /// The provider terminally rejected or failed the call.
    #[error("scoring provider failed: {message}")]
    ProviderFailed {
        /// Classification detail from the provider adapter.
        message: String,
    },

    /// The ledger could not be read or written.
    #[error("ledger error: {message}")]
    Ledger {
        /// Underlying storage failure.
        message: String,
    },
}

impl MeteringError {
    /// Creates a ledger error from any storage failure.
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Creates a provider failure.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::ProviderFailed {
            message: message.into(),
        }
    }

    /// Returns true if the caller may reasonably retry this request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MeteringError::Overloaded { .. } | MeteringError::Timeout { .. }
        )
    }

    /// Suggested client backoff in seconds, when one applies.
    pub fn retry_after_secs(&self) -> Option<u32> {
        match self {
            MeteringError::Overloaded { retry_after_secs } => Some(*retry_after_secs),
            MeteringError::Timeout { .. } => Some(1),
            _ => None,
        }
    }
}
