//! QuotaGate - admission decisions and atomic quota charges.
//!
//! The gate sits between the gateway pipeline and the billing data: it
//! answers "may this owner spend right now" before anything is queued,
//! and converts successful scores into normalized ledger charges after
//! the fact. It never blocks an in-progress request on remaining quota.

use std::sync::Arc;

use crate::domain::foundation::{ActorId, OwnerId, Timestamp};
use crate::domain::metering::{FeatureKind, MeteringError, Period, UnitKind, UsageEntry};
use crate::ports::{ChargeRequest, LedgerError, PeriodReader, UsageLedger};

/// Admission and charging component of the metering pipeline.
pub struct QuotaGate {
    periods: Arc<dyn PeriodReader>,
    ledger: Arc<dyn UsageLedger>,
}

impl QuotaGate {
    /// Creates a gate over the given billing collaborator and ledger.
    pub fn new(periods: Arc<dyn PeriodReader>, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { periods, ledger }
    }

    /// Returns the owner's active period when admission is granted.
    ///
    /// Admission requires an active period whose end time has not passed.
    /// Remaining quota is not consulted: plan limits never interrupt a
    /// session already in progress.
    pub async fn admit(&self, owner_id: &OwnerId) -> Result<Period, MeteringError> {
        let period = self
            .periods
            .get_active_period(owner_id)
            .await
            .map_err(|err| MeteringError::ledger(err.to_string()))?;

        match period {
            Some(period) if period.is_admissible_at(Timestamp::now()) => Ok(period),
            _ => Err(MeteringError::NoActiveSubscription {
                owner_id: owner_id.clone(),
            }),
        }
    }

    /// Convenience admission probe without returning the period.
    pub async fn is_admissible(&self, owner_id: &OwnerId) -> Result<bool, MeteringError> {
        match self.admit(owner_id).await {
            Ok(_) => Ok(true),
            Err(MeteringError::NoActiveSubscription { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Converts the consumed units into normalized points and applies them
    /// to the period as one atomic ledger transaction.
    pub async fn charge(
        &self,
        period: &Period,
        actor_id: &ActorId,
        feature: FeatureKind,
        unit_count: f64,
        unit_kind: UnitKind,
        resource_ref: Option<String>,
    ) -> Result<UsageEntry, MeteringError> {
        let points = unit_kind.to_points(unit_count);
        let request = ChargeRequest {
            period_id: period.id,
            actor_id: actor_id.clone(),
            feature,
            unit_count,
            unit_kind,
            points,
            resource_ref,
        };

        self.ledger.charge(request).await.map_err(|err| match err {
            LedgerError::PeriodNotFound(_) | LedgerError::PeriodNotActive(_) => {
                MeteringError::NoActiveSubscription {
                    owner_id: period.owner_id.clone(),
                }
            }
            LedgerError::Database(message) => MeteringError::ledger(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMeteringStore;
    use crate::domain::foundation::ActorId;
    use crate::domain::metering::PeriodStatus;

    fn owner() -> OwnerId {
        OwnerId::new("school-1").unwrap()
    }

    fn actor() -> ActorId {
        ActorId::new("student-1").unwrap()
    }

    fn active_period(owner_id: &OwnerId) -> Period {
        let now = Timestamp::now();
        Period::new(owner_id.clone(), 1000, now.minus_days(1), now.add_days(29))
    }

    fn gate_over(store: Arc<InMemoryMeteringStore>) -> QuotaGate {
        QuotaGate::new(store.clone(), store)
    }

    #[tokio::test]
    async fn admits_owner_with_active_period() {
        let store = Arc::new(InMemoryMeteringStore::new());
        let period = active_period(&owner());
        store.insert_period(period.clone());

        let gate = gate_over(store);
        let admitted = gate.admit(&owner()).await.unwrap();
        assert_eq!(admitted.id, period.id);
        assert!(gate.is_admissible(&owner()).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_owner_without_period() {
        let store = Arc::new(InMemoryMeteringStore::new());
        let gate = gate_over(store);

        let err = gate.admit(&owner()).await.unwrap_err();
        assert!(matches!(err, MeteringError::NoActiveSubscription { .. }));
        assert!(!gate.is_admissible(&owner()).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_expired_period() {
        let store = Arc::new(InMemoryMeteringStore::new());
        let mut period = active_period(&owner());
        period.status = PeriodStatus::Expired;
        period.end_time = Timestamp::now().minus_days(1);
        store.insert_period(period);

        let gate = gate_over(store);
        let err = gate.admit(&owner()).await.unwrap_err();
        assert!(matches!(err, MeteringError::NoActiveSubscription { .. }));
    }

    #[tokio::test]
    async fn charge_converts_units_and_updates_ledger() {
        let store = Arc::new(InMemoryMeteringStore::new());
        let period = active_period(&owner());
        store.insert_period(period.clone());

        let gate = gate_over(store.clone());
        let entry = gate
            .charge(
                &period,
                &actor(),
                FeatureKind::TextScoring,
                500.0,
                UnitKind::Characters,
                Some("assignment-3".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(entry.points_charged, 50);
        assert_eq!(entry.quota_before, 0);
        assert_eq!(entry.quota_after, 50);

        let summary = store.summary(period.id).await.unwrap();
        assert_eq!(summary.quota_used, 50);
        assert_eq!(summary.entry_count, 1);
    }

    #[tokio::test]
    async fn charge_succeeds_past_the_plan_allowance() {
        let store = Arc::new(InMemoryMeteringStore::new());
        let mut period = active_period(&owner());
        period.quota_total = 30;
        period.quota_used = 30;
        store.insert_period(period.clone());

        let gate = gate_over(store.clone());
        let entry = gate
            .charge(
                &period,
                &actor(),
                FeatureKind::SpeechScoring,
                30.0,
                UnitKind::Seconds,
                None,
            )
            .await
            .unwrap();

        assert_eq!(entry.quota_after, 60);
        let summary = store.summary(period.id).await.unwrap();
        assert_eq!(summary.quota_used, 60);
        assert_eq!(summary.quota_remaining, 0);
    }

    #[tokio::test]
    async fn charge_against_cancelled_period_fails() {
        let store = Arc::new(InMemoryMeteringStore::new());
        let mut period = active_period(&owner());
        period.status = PeriodStatus::Cancelled;
        store.insert_period(period.clone());

        let gate = gate_over(store);
        let err = gate
            .charge(
                &period,
                &actor(),
                FeatureKind::TextScoring,
                10.0,
                UnitKind::Seconds,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MeteringError::NoActiveSubscription { .. }));
    }

    #[tokio::test]
    async fn concurrent_charges_on_one_period_reconcile() {
        let store = Arc::new(InMemoryMeteringStore::new());
        let period = active_period(&owner());
        store.insert_period(period.clone());

        let gate = Arc::new(gate_over(store.clone()));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let gate = Arc::clone(&gate);
            let period = period.clone();
            handles.push(tokio::spawn(async move {
                gate.charge(
                    &period,
                    &actor(),
                    FeatureKind::TextScoring,
                    10.0,
                    UnitKind::Seconds,
                    None,
                )
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let summary = store.summary(period.id).await.unwrap();
        assert_eq!(summary.quota_used, 500);
        assert_eq!(summary.entry_count, 50);

        let entries = store.entries(period.id).await.unwrap();
        let total: i64 = entries.iter().map(|e| e.points_charged).sum();
        assert_eq!(total, summary.quota_used);
    }
}
