//! Axum router configuration for the scoring endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{get_usage_summary, submit_score, ScoringAppState};

/// Create the scoring API router.
///
/// # Routes
///
/// - `POST /` - submit one piece of work for metered scoring
/// - `GET /usage/:period_id` - consumption summary for billing dashboards
pub fn scoring_routes() -> Router<ScoringAppState> {
    Router::new()
        .route("/", post(submit_score))
        .route("/usage/:period_id", get(get_usage_summary))
}

/// Create the complete scoring module router, suitable for mounting at
/// `/api/scoring`.
pub fn scoring_router() -> Router<ScoringAppState> {
    Router::new().nest("/scoring", scoring_routes())
}
