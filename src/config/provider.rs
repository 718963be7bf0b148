//! Scoring provider configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// External scoring provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// API key for the scoring provider
    pub api_key: Option<String>,

    /// Base URL for the provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to score with
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-call socket timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl ProviderConfig {
    /// Get per-call timeout as Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    /// Validate provider configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_api_key() {
            return Err(ValidationError::MissingRequired("PROVIDER_API_KEY"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidProviderUrl);
        }
        if self.call_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.scoring.example.com".to_string()
}

fn default_model() -> String {
    "scorer-large-2".to_string()
}

fn default_call_timeout() -> u64 {
    60
}
