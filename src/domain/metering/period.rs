//! Quota period - the billing window currently in effect for an owner.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OwnerId, PeriodId, Timestamp};

/// Lifecycle state of a quota period.
///
/// Periods are created by the billing collaborator and transition
/// `Active -> Expired` (time-based) or `Active -> Cancelled`. This crate
/// only reads the at-most-one-active-period-per-owner guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    Active,
    Expired,
    Cancelled,
}

impl PeriodStatus {
    /// Returns the string representation used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Active => "active",
            PeriodStatus::Expired => "expired",
            PeriodStatus::Cancelled => "cancelled",
        }
    }
}

/// A quota-bearing subscription window.
///
/// `quota_used` is mutated only by the ledger's charge path and never
/// decreases. It may exceed `quota_total`: crossing the plan limit never
/// interrupts consumption already in progress (soft cap).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub id: PeriodId,
    pub owner_id: OwnerId,
    /// Plan allowance in normalized quota points.
    pub quota_total: i64,
    /// Points consumed so far; monotonically non-decreasing.
    pub quota_used: i64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: PeriodStatus,
}

impl Period {
    /// Creates a fresh active period with no consumption.
    pub fn new(
        owner_id: OwnerId,
        quota_total: i64,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Self {
        Self {
            id: PeriodId::new(),
            owner_id,
            quota_total,
            quota_used: 0,
            start_time,
            end_time,
            status: PeriodStatus::Active,
        }
    }

    /// Whether the period admits new requests at the given instant.
    ///
    /// Remaining quota is deliberately not consulted here: exhausted quota
    /// is a soft indicator for dashboards, not an admission gate.
    pub fn is_admissible_at(&self, now: Timestamp) -> bool {
        self.status == PeriodStatus::Active && now.is_before(&self.end_time)
    }

    /// Remaining quota for display purposes, clamped at zero.
    pub fn quota_remaining(&self) -> i64 {
        (self.quota_total - self.quota_used).max(0)
    }

    /// Whether consumption has crossed the plan allowance.
    pub fn is_over_quota(&self) -> bool {
        self.quota_used > self.quota_total
    }
}
