//! PostgreSQL implementation of PeriodReader.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{OwnerId, PeriodId, Timestamp};
use crate::domain::metering::{Period, PeriodStatus};
use crate::ports::{PeriodReadError, PeriodReader};

/// PostgreSQL implementation of the PeriodReader port.
///
/// Reads the billing service's `periods` table; the
/// at-most-one-active-period-per-owner guarantee is backed by a partial
/// unique index there.
pub struct PostgresPeriodReader {
    pool: PgPool,
}

impl PostgresPeriodReader {
    /// Creates a new reader over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a period.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PeriodRow {
    pub id: Uuid,
    pub owner_id: String,
    pub quota_total: i64,
    pub quota_used: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
}

impl TryFrom<PeriodRow> for Period {
    type Error = PeriodReadError;

    fn try_from(row: PeriodRow) -> Result<Self, Self::Error> {
        Ok(Period {
            id: PeriodId::from_uuid(row.id),
            owner_id: OwnerId::new(row.owner_id)
                .map_err(|e| PeriodReadError::Database(format!("Invalid owner_id: {}", e)))?,
            quota_total: row.quota_total,
            quota_used: row.quota_used,
            start_time: Timestamp::from_datetime(row.start_time),
            end_time: Timestamp::from_datetime(row.end_time),
            status: parse_status(&row.status)?,
        })
    }
}

pub(crate) fn parse_status(s: &str) -> Result<PeriodStatus, PeriodReadError> {
    match s {
        "active" => Ok(PeriodStatus::Active),
        "expired" => Ok(PeriodStatus::Expired),
        "cancelled" => Ok(PeriodStatus::Cancelled),
        other => Err(PeriodReadError::Database(format!(
            "Invalid status value: {}",
            other
        ))),
    }
}

#[async_trait]
impl PeriodReader for PostgresPeriodReader {
    async fn get_active_period(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Option<Period>, PeriodReadError> {
        let row: Option<PeriodRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, quota_total, quota_used, start_time, end_time, status
            FROM periods
            WHERE owner_id = $1 AND status = 'active'
            "#,
        )
        .bind(owner_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PeriodReadError::Database(e.to_string()))?;

        row.map(Period::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_accepts_known_values() {
        assert_eq!(parse_status("active").unwrap(), PeriodStatus::Active);
        assert_eq!(parse_status("expired").unwrap(), PeriodStatus::Expired);
        assert_eq!(parse_status("cancelled").unwrap(), PeriodStatus::Cancelled);
        assert!(parse_status("paused").is_err());
    }

    #[test]
    fn period_row_converts_to_domain() {
        let now = Utc::now();
        let row = PeriodRow {
            id: Uuid::new_v4(),
            owner_id: "school-1".to_string(),
            quota_total: 1000,
            quota_used: 250,
            start_time: now,
            end_time: now + chrono::Duration::days(30),
            status: "active".to_string(),
        };

        let period = Period::try_from(row).unwrap();
        assert_eq!(period.quota_total, 1000);
        assert_eq!(period.quota_used, 250);
        assert_eq!(period.status, PeriodStatus::Active);
        assert_eq!(period.quota_remaining(), 750);
    }

    #[test]
    fn period_row_with_empty_owner_fails() {
        let now = Utc::now();
        let row = PeriodRow {
            id: Uuid::new_v4(),
            owner_id: String::new(),
            quota_total: 1000,
            quota_used: 0,
            start_time: now,
            end_time: now,
            status: "active".to_string(),
        };

        assert!(Period::try_from(row).is_err());
    }
}
