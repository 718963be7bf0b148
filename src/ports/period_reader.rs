//! PeriodReader port - read-only view of the billing collaborator.
//!
//! Subscription issuance and lifecycle live elsewhere; this crate only
//! consumes the guarantee that each owner has at most one active quota
//! period at any instant.

use async_trait::async_trait;

use crate::domain::foundation::OwnerId;
use crate::domain::metering::Period;

/// Port for reading quota periods owned by the billing service.
#[async_trait]
pub trait PeriodReader: Send + Sync {
    /// Returns the owner's active period, if any.
    ///
    /// The billing collaborator guarantees at most one active period per
    /// owner, so a single optional result is sufficient.
    async fn get_active_period(&self, owner_id: &OwnerId)
        -> Result<Option<Period>, PeriodReadError>;
}

/// Errors from the period reader.
#[derive(Debug, thiserror::Error)]
pub enum PeriodReadError {
    /// Storage backend failure.
    #[error("database error: {0}")]
    Database(String),
}
