//! Scoring provider adapters.

mod http_provider;
mod mock;

pub use http_provider::{HttpScoreProvider, HttpScoreProviderConfig};
pub use mock::{MockFailure, MockScoreProvider};
