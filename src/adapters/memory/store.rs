//! In-memory metering store.
//!
//! Implements both the period reader and the usage ledger over one shared
//! map, mirroring what the billing database holds in production. Charges
//! mutate a period's state and append its entry under a single short-lived
//! lock, so the ledger-log invariant holds under concurrent use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::{OwnerId, PeriodId};
use crate::domain::metering::{Period, PeriodStatus, UsageEntry};
use crate::ports::{
    ChargeRequest, LedgerError, PeriodReadError, PeriodReader, UsageLedger, UsageSummaryView,
};

#[derive(Default)]
struct StoreState {
    periods: HashMap<PeriodId, Period>,
    entries: HashMap<PeriodId, Vec<UsageEntry>>,
}

/// In-memory period store and usage ledger.
#[derive(Default)]
pub struct InMemoryMeteringStore {
    state: Mutex<StoreState>,
}

impl InMemoryMeteringStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a period, replacing any previous one with the same id.
    pub fn insert_period(&self, period: Period) {
        let mut state = self.state.lock().unwrap();
        state.entries.entry(period.id).or_default();
        state.periods.insert(period.id, period);
    }

    /// Updates a period's status in place.
    pub fn set_status(&self, period_id: PeriodId, status: PeriodStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(period) = state.periods.get_mut(&period_id) {
            period.status = status;
        }
    }

    /// Returns a snapshot of a period.
    pub fn period(&self, period_id: PeriodId) -> Option<Period> {
        self.state.lock().unwrap().periods.get(&period_id).cloned()
    }
}

#[async_trait]
impl PeriodReader for InMemoryMeteringStore {
    async fn get_active_period(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Option<Period>, PeriodReadError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .periods
            .values()
            .find(|p| &p.owner_id == owner_id && p.status == PeriodStatus::Active)
            .cloned())
    }
}

#[async_trait]
impl UsageLedger for InMemoryMeteringStore {
    async fn charge(&self, request: ChargeRequest) -> Result<UsageEntry, LedgerError> {
        let mut state = self.state.lock().unwrap();

        let period = state
            .periods
            .get_mut(&request.period_id)
            .ok_or(LedgerError::PeriodNotFound(request.period_id))?;
        if period.status != PeriodStatus::Active {
            return Err(LedgerError::PeriodNotActive(request.period_id));
        }

        let quota_before = period.quota_used;
        period.quota_used += request.points;

        let entry = UsageEntry::new(
            request.period_id,
            request.actor_id,
            request.resource_ref,
            request.feature,
            request.unit_count,
            request.unit_kind,
            request.points,
            quota_before,
        );
        state
            .entries
            .entry(request.period_id)
            .or_default()
            .push(entry.clone());

        Ok(entry)
    }

    async fn summary(&self, period_id: PeriodId) -> Result<UsageSummaryView, LedgerError> {
        let state = self.state.lock().unwrap();
        let period = state
            .periods
            .get(&period_id)
            .ok_or(LedgerError::PeriodNotFound(period_id))?;
        let entry_count = state
            .entries
            .get(&period_id)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0);

        Ok(UsageSummaryView {
            period_id,
            quota_total: period.quota_total,
            quota_used: period.quota_used,
            quota_remaining: period.quota_remaining(),
            entry_count,
        })
    }

    async fn entries(&self, period_id: PeriodId) -> Result<Vec<UsageEntry>, LedgerError> {
        let state = self.state.lock().unwrap();
        if !state.periods.contains_key(&period_id) {
            return Err(LedgerError::PeriodNotFound(period_id));
        }
        Ok(state.entries.get(&period_id).cloned().unwrap_or_default())
    }
}
