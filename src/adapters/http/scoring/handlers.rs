//! HTTP handlers for the scoring endpoints.
//!
//! These handlers connect axum routes to the gateway pipeline and own the
//! mapping from the metering error taxonomy to externally visible
//! statuses: no subscription is payment-required, capacity problems are
//! retryable with a hint, provider faults are a bad gateway.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::{
    GetUsageSummaryHandler, GetUsageSummaryQuery, ScoreCommand, ScoringGateway,
};
use crate::domain::foundation::{ActorId, OwnerId, PeriodId, ValidationError};
use crate::domain::metering::MeteringError;
use crate::ports::{LedgerError, ScorePayload};

use super::dto::{ErrorResponse, SubmitScoreRequest, SubmitScoreResponse, UsageSummaryResponse};

/// Shared application state for the scoring routes.
#[derive(Clone)]
pub struct ScoringAppState {
    pub gateway: Arc<ScoringGateway>,
    pub usage_summary: Arc<GetUsageSummaryHandler>,
}

/// Authenticated owner context extracted from the request.
///
/// In production this comes from the identity collaborator's middleware;
/// for development and tests an `X-Owner-Id` header stands in.
#[derive(Debug, Clone)]
pub struct AuthenticatedOwner {
    pub owner_id: OwnerId,
}

/// Rejection type for AuthenticatedOwner extraction.
pub struct OwnerRequired;

impl IntoResponse for OwnerRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("OWNER_REQUIRED", "An authenticated owner is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedOwner
where
    S: Send + Sync,
{
    type Rejection = OwnerRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let owner_id = parts
                .headers
                .get("X-Owner-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| OwnerId::new(s).ok())
                .ok_or(OwnerRequired)?;

            Ok(AuthenticatedOwner { owner_id })
        })
    }
}

/// POST /api/scoring - run one submission through the metered pipeline.
pub async fn submit_score(
    State(state): State<ScoringAppState>,
    owner: AuthenticatedOwner,
    Json(body): Json<SubmitScoreRequest>,
) -> Result<Json<SubmitScoreResponse>, ScoringApiError> {
    let command = to_command(owner.owner_id, body)?;
    let receipt = state.gateway.process(command).await?;
    Ok(Json(SubmitScoreResponse::from(receipt)))
}

/// GET /api/scoring/usage/{period_id} - consumption summary for dashboards.
pub async fn get_usage_summary(
    State(state): State<ScoringAppState>,
    Path(period_id): Path<String>,
) -> Result<Json<UsageSummaryResponse>, ScoringApiError> {
    let period_id: PeriodId = period_id
        .parse()
        .map_err(|_| ScoringApiError::bad_request("period_id must be a UUID"))?;

    let view = state
        .usage_summary
        .handle(GetUsageSummaryQuery { period_id })
        .await?;
    Ok(Json(UsageSummaryResponse::from(view)))
}

fn to_command(owner_id: OwnerId, body: SubmitScoreRequest) -> Result<ScoreCommand, ScoringApiError> {
    if !body.unit_count.is_finite() || body.unit_count < 0.0 {
        return Err(ScoringApiError::bad_request(
            "unit_count must be a non-negative number",
        ));
    }

    let mut payload = ScorePayload::new(body.submission);
    if let Some(rubric) = body.rubric {
        payload = payload.with_rubric(rubric);
    }

    Ok(ScoreCommand {
        owner_id,
        actor_id: ActorId::new(body.actor_id)?,
        payload,
        feature: body.feature,
        unit_count: body.unit_count,
        unit_kind: body.unit_kind,
        resource_ref: body.resource_ref,
    })
}

/// API-facing error wrapper with the status mapping.
#[derive(Debug)]
pub enum ScoringApiError {
    BadRequest(String),
    Metering(MeteringError),
    Ledger(LedgerError),
}

impl ScoringApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl From<MeteringError> for ScoringApiError {
    fn from(err: MeteringError) -> Self {
        Self::Metering(err)
    }
}

impl From<LedgerError> for ScoringApiError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

impl From<ValidationError> for ScoringApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for ScoringApiError {
    fn into_response(self) -> Response {
        match self {
            ScoringApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("INVALID_REQUEST", message)),
            )
                .into_response(),

            ScoringApiError::Metering(err) => {
                let (status, code) = match &err {
                    MeteringError::NoActiveSubscription { .. } => {
                        (StatusCode::PAYMENT_REQUIRED, "NO_ACTIVE_SUBSCRIPTION")
                    }
                    MeteringError::Overloaded { .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "OVERLOADED")
                    }
                    MeteringError::Timeout { .. } => (StatusCode::SERVICE_UNAVAILABLE, "TIMEOUT"),
                    MeteringError::ProviderFailed { .. } => {
                        (StatusCode::BAD_GATEWAY, "PROVIDER_FAILED")
                    }
                    MeteringError::Ledger { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "LEDGER_ERROR")
                    }
                };
                let body = Json(ErrorResponse::new(code, err.to_string()));

                match err.retry_after_secs() {
                    Some(secs) => (
                        status,
                        [(header::RETRY_AFTER, secs.to_string())],
                        body,
                    )
                        .into_response(),
                    None => (status, body).into_response(),
                }
            }

            ScoringApiError::Ledger(err) => {
                let status = match err {
                    LedgerError::PeriodNotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    Json(ErrorResponse::new("LEDGER_ERROR", err.to_string())),
                )
                    .into_response()
            }
        }
    }
}
