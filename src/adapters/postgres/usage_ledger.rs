//! PostgreSQL implementation of UsageLedger.
//!
//! The charge path is one explicit transaction: an atomic
//! `UPDATE ... RETURNING` on the period row followed by the entry INSERT.
//! Concurrent charges against the same period serialize on the row lock;
//! charges against distinct periods touch distinct rows and never
//! contend. Dropping the transaction on any error path rolls it back, so
//! no partial write can survive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{ActorId, EntryId, PeriodId, Timestamp};
use crate::domain::metering::{FeatureKind, UnitKind, UsageEntry};
use crate::ports::{ChargeRequest, LedgerError, UsageLedger, UsageSummaryView};

/// PostgreSQL implementation of the UsageLedger port.
pub struct PostgresUsageLedger {
    pool: PgPool,
}

impl PostgresUsageLedger {
    /// Creates a new ledger over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a usage entry.
#[derive(Debug, sqlx::FromRow)]
struct UsageEntryRow {
    id: Uuid,
    period_id: Uuid,
    actor_id: String,
    resource_ref: Option<String>,
    feature: String,
    unit_count: f64,
    unit_kind: String,
    points_charged: i64,
    quota_before: i64,
    quota_after: i64,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<UsageEntryRow> for UsageEntry {
    type Error = LedgerError;

    fn try_from(row: UsageEntryRow) -> Result<Self, Self::Error> {
        Ok(UsageEntry {
            id: EntryId::from_uuid(row.id),
            period_id: PeriodId::from_uuid(row.period_id),
            actor_id: ActorId::new(row.actor_id)
                .map_err(|e| LedgerError::Database(format!("Invalid actor_id: {}", e)))?,
            resource_ref: row.resource_ref,
            feature: row
                .feature
                .parse::<FeatureKind>()
                .map_err(|e| LedgerError::Database(e.to_string()))?,
            unit_count: row.unit_count,
            unit_kind: row
                .unit_kind
                .parse::<UnitKind>()
                .map_err(|e| LedgerError::Database(e.to_string()))?,
            points_charged: row.points_charged,
            quota_before: row.quota_before,
            quota_after: row.quota_after,
            recorded_at: Timestamp::from_datetime(row.recorded_at),
        })
    }
}

fn db_err(e: sqlx::Error) -> LedgerError {
    LedgerError::Database(e.to_string())
}

#[async_trait]
impl UsageLedger for PostgresUsageLedger {
    async fn charge(&self, request: ChargeRequest) -> Result<UsageEntry, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The atomic increment doubles as the per-period serialization
        // point: the row lock is held until commit.
        let quota_after: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE periods
            SET quota_used = quota_used + $1
            WHERE id = $2 AND status = 'active'
            RETURNING quota_used
            "#,
        )
        .bind(request.points)
        .bind(request.period_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some((quota_after,)) = quota_after else {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM periods WHERE id = $1")
                .bind(request.period_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
            return Err(match exists {
                Some(_) => LedgerError::PeriodNotActive(request.period_id),
                None => LedgerError::PeriodNotFound(request.period_id),
            });
        };

        let quota_before = quota_after - request.points;
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

        sqlx::query(
            r#"
            INSERT INTO usage_entries (
                id, period_id, actor_id, resource_ref, feature, unit_count,
                unit_kind, points_charged, quota_before, quota_after, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.period_id.as_uuid())
        .bind(entry.actor_id.as_str())
        .bind(&entry.resource_ref)
        .bind(entry.feature.as_str())
        .bind(entry.unit_count)
        .bind(entry.unit_kind.as_str())
        .bind(entry.points_charged)
        .bind(entry.quota_before)
        .bind(entry.quota_after)
        .bind(entry.recorded_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(entry)
    }

    async fn summary(&self, period_id: PeriodId) -> Result<UsageSummaryView, LedgerError> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.quota_total,
                   p.quota_used,
                   (SELECT COUNT(*) FROM usage_entries e WHERE e.period_id = p.id)
            FROM periods p
            WHERE p.id = $1
            "#,
        )
        .bind(period_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let (quota_total, quota_used, entry_count) =
            row.ok_or(LedgerError::PeriodNotFound(period_id))?;

        Ok(UsageSummaryView {
            period_id,
            quota_total,
            quota_used,
            quota_remaining: (quota_total - quota_used).max(0),
            entry_count: entry_count as u64,
        })
    }

    async fn entries(&self, period_id: PeriodId) -> Result<Vec<UsageEntry>, LedgerError> {
        let rows: Vec<UsageEntryRow> = sqlx::query_as(
            r#"
            SELECT id, period_id, actor_id, resource_ref, feature, unit_count,
                   unit_kind, points_charged, quota_before, quota_after, recorded_at
            FROM usage_entries
            WHERE period_id = $1
            ORDER BY recorded_at, id
            "#,
        )
        .bind(period_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(UsageEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_entry_row_converts_to_domain() {
        let row = UsageEntryRow {
            id: Uuid::new_v4(),
            period_id: Uuid::new_v4(),
            actor_id: "student-1".to_string(),
            resource_ref: Some("assignment-4".to_string()),
            feature: "speech_scoring".to_string(),
            unit_count: 90.0,
            unit_kind: "seconds".to_string(),
            points_charged: 90,
            quota_before: 10,
            quota_after: 100,
            recorded_at: Utc::now(),
        };

        let entry = UsageEntry::try_from(row).unwrap();
        assert_eq!(entry.feature, FeatureKind::SpeechScoring);
        assert_eq!(entry.unit_kind, UnitKind::Seconds);
        assert_eq!(entry.quota_after, entry.quota_before + entry.points_charged);
    }

    #[test]
    fn usage_entry_row_with_unknown_feature_fails() {
        let row = UsageEntryRow {
            id: Uuid::new_v4(),
            period_id: Uuid::new_v4(),
            actor_id: "student-1".to_string(),
            resource_ref: None,
            feature: "palm_reading".to_string(),
            unit_count: 1.0,
            unit_kind: "seconds".to_string(),
            points_charged: 1,
            quota_before: 0,
            quota_after: 1,
            recorded_at: Utc::now(),
        };

        assert!(UsageEntry::try_from(row).is_err());
    }
}
