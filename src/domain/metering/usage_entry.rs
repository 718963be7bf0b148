//! Usage ledger entry - the append-only audit row behind every charge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ActorId, EntryId, PeriodId, Timestamp, ValidationError};
use crate::domain::metering::UnitKind;

/// Billable feature a charge is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Written-answer and essay scoring.
    TextScoring,
    /// Spoken-answer assessment (audio submissions).
    SpeechScoring,
    /// Scoring of photographed or scanned work.
    ImageScoring,
}

impl FeatureKind {
    /// Returns the string representation used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::TextScoring => "text_scoring",
            FeatureKind::SpeechScoring => "speech_scoring",
            FeatureKind::ImageScoring => "image_scoring",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeatureKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text_scoring" => Ok(FeatureKind::TextScoring),
            "speech_scoring" => Ok(FeatureKind::SpeechScoring),
            "image_scoring" => Ok(FeatureKind::ImageScoring),
            other => Err(ValidationError::invalid_value(
                "feature",
                format!("unknown feature '{}'", other),
            )),
        }
    }
}

/// One charge against a quota period.
///
/// Created exactly once per successfully scored call, never mutated, and
/// deleted only by cascading administrative deletion of its period. For
/// every period the entries reconcile with the period itself:
/// `sum(points_charged) == quota_used`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEntry {
    pub id: EntryId,
    pub period_id: PeriodId,
    pub actor_id: ActorId,
    /// Assignment or submission the charge refers to, when known.
    pub resource_ref: Option<String>,
    pub feature: FeatureKind,
    pub unit_count: f64,
    pub unit_kind: UnitKind,
    /// Normalized points actually charged.
    pub points_charged: i64,
    /// Period consumption immediately before this charge.
    pub quota_before: i64,
    /// Period consumption immediately after this charge.
    pub quota_after: i64,
    pub recorded_at: Timestamp,
}

impl UsageEntry {
    /// Creates a new entry recording a charge of `points_charged` applied
    /// on top of `quota_before`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        period_id: PeriodId,
        actor_id: ActorId,
        resource_ref: Option<String>,
        feature: FeatureKind,
        unit_count: f64,
        unit_kind: UnitKind,
        points_charged: i64,
        quota_before: i64,
    ) -> Self {
        Self {
            id: EntryId::new(),
            period_id,
            actor_id,
            resource_ref,
            feature,
            unit_count,
            unit_kind,
            points_charged,
            quota_before,
            quota_after: quota_before + points_charged,
            recorded_at: Timestamp::now(),
        }
    }
}
