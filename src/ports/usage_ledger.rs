//! UsageLedger port - the durable record of quota consumption.
//!
//! The ledger owns the one piece of cross-request mutable state in the
//! system: `Period.quota_used`. A charge atomically increments that
//! counter and appends the matching audit entry in a single transaction,
//! so that for every period `sum(points_charged) == quota_used` holds at
//! every observation point, under any concurrency.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ActorId, PeriodId};
use crate::domain::metering::{FeatureKind, UnitKind, UsageEntry};

/// One charge to apply against a period.
///
/// `points` is already normalized; unit conversion happens before the
/// ledger is touched and only normalized points are ever stored.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub period_id: PeriodId,
    pub actor_id: ActorId,
    pub feature: FeatureKind,
    pub unit_count: f64,
    pub unit_kind: UnitKind,
    /// Normalized quota points to charge.
    pub points: i64,
    /// Assignment or submission the charge refers to, when known.
    pub resource_ref: Option<String>,
}

/// Read model for billing dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummaryView {
    pub period_id: PeriodId,
    pub quota_total: i64,
    pub quota_used: i64,
    /// Displayed remaining quota, clamped at zero.
    pub quota_remaining: i64,
    pub entry_count: u64,
}

/// Port for the durable usage ledger.
///
/// Implementations must serialize concurrent charges against the same
/// period (row-level lock or atomic increment) while keeping charges
/// against distinct periods free of shared locks.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Atomically increments the period's `quota_used` and appends one
    /// usage entry, committing or rolling back as a unit.
    ///
    /// Fails with [`LedgerError::PeriodNotActive`] when the period is
    /// missing or no longer active; no partial write survives a failure.
    async fn charge(&self, request: ChargeRequest) -> Result<UsageEntry, LedgerError>;

    /// Returns the consumption summary for a period.
    async fn summary(&self, period_id: PeriodId) -> Result<UsageSummaryView, LedgerError>;

    /// Returns all entries recorded against a period, oldest first.
    async fn entries(&self, period_id: PeriodId) -> Result<Vec<UsageEntry>, LedgerError>;
}

/// Errors from the usage ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The period does not exist.
    #[error("period not found: {0}")]
    PeriodNotFound(PeriodId),

    /// The period exists but is not active.
    #[error("period is not active: {0}")]
    PeriodNotActive(PeriodId),

    /// Storage backend failure.
    #[error("database error: {0}")]
    Database(String),
}
