//! Request/response DTOs for the scoring endpoints.

use serde::{Deserialize, Serialize};

use crate::application::ScoreReceipt;
use crate::domain::metering::{FeatureKind, UnitKind, UsageEntry};
use crate::ports::UsageSummaryView;

/// POST /api/scoring request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitScoreRequest {
    /// Party actually triggering the request (a student).
    pub actor_id: String,
    /// Submission content or storage reference.
    pub submission: String,
    /// Optional rubric guiding the scoring model.
    pub rubric: Option<String>,
    pub feature: FeatureKind,
    pub unit_count: f64,
    pub unit_kind: UnitKind,
    /// Assignment or submission reference for the audit trail.
    pub resource_ref: Option<String>,
}

/// POST /api/scoring response body.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitScoreResponse {
    pub score: f64,
    pub confidence: Option<f64>,
    pub feedback: Option<String>,
    pub model: String,
    /// Absent when the score was produced but could not be charged; the
    /// gap is reconciled out of band.
    pub charge: Option<ChargeView>,
}

/// Ledger charge details echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeView {
    pub entry_id: String,
    pub points_charged: i64,
    pub quota_before: i64,
    pub quota_after: i64,
}

impl From<UsageEntry> for ChargeView {
    fn from(entry: UsageEntry) -> Self {
        Self {
            entry_id: entry.id.to_string(),
            points_charged: entry.points_charged,
            quota_before: entry.quota_before,
            quota_after: entry.quota_after,
        }
    }
}

impl From<ScoreReceipt> for SubmitScoreResponse {
    fn from(receipt: ScoreReceipt) -> Self {
        Self {
            score: receipt.score.score,
            confidence: receipt.score.confidence,
            feedback: receipt.score.feedback,
            model: receipt.score.model,
            charge: receipt.charge.map(ChargeView::from),
        }
    }
}

/// GET /api/scoring/usage/{period_id} response body.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummaryResponse {
    pub period_id: String,
    pub quota_total: i64,
    pub quota_used: i64,
    pub quota_remaining: i64,
    pub entry_count: u64,
}

impl From<UsageSummaryView> for UsageSummaryResponse {
    fn from(view: UsageSummaryView) -> Self {
        Self {
            period_id: view.period_id.to_string(),
            quota_total: view.quota_total,
            quota_used: view.quota_used,
            quota_remaining: view.quota_remaining,
            entry_count: view.entry_count,
        }
    }
}

/// Standard error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
