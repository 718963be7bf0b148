//! ScoringGateway - the metered request pipeline.
//!
//! Every scoring request walks the same path: subscription admission,
//! then a ticket from the bounded pool, then the provider call under the
//! held ticket, and only after a successful score a ledger charge. One
//! deadline spans queueing and the in-flight call. The ticket is released
//! exactly once on every exit, and no failure path ever charges quota.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use uuid::Uuid;

use crate::application::{AcquireError, QuotaGate, Ticket, TicketPool};
use crate::domain::foundation::{ActorId, OwnerId};
use crate::domain::metering::{FeatureKind, MeteringError, UnitKind, UsageEntry};
use crate::ports::{ScorePayload, ScoreProvider, ScoreProviderError, ScoreRequest, ScoreResult};

/// Fallback client backoff when the provider rate-limits without a hint.
const DEFAULT_RATE_LIMIT_BACKOFF_SECS: u32 = 5;

/// Retry behavior for provider-side rate limits that slip past the pool.
///
/// Retries reuse the already-held ticket and back off exponentially with
/// jitter, capped at `max_attempts` calls in total.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Pause before the next attempt.
    ///
    /// A provider-supplied hint wins; otherwise exponential growth from
    /// `base_delay` with half-to-full jitter, capped at `max_delay`.
    fn backoff_for(&self, attempt: u32, provider_hint_secs: Option<u32>) -> Duration {
        if let Some(secs) = provider_hint_secs {
            return Duration::from_secs(secs as u64).min(self.max_delay);
        }
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16));
        let capped = exp.min(self.max_delay);
        let micros = capped.as_micros() as u64;
        if micros == 0 {
            return Duration::ZERO;
        }
        let jittered = rand::thread_rng().gen_range(micros / 2..=micros);
        Duration::from_micros(jittered)
    }
}

/// One scoring request as submitted by the HTTP layer.
#[derive(Debug, Clone)]
pub struct ScoreCommand {
    /// Paying party whose period funds the request.
    pub owner_id: OwnerId,
    /// Party actually triggering the request.
    pub actor_id: ActorId,
    pub payload: ScorePayload,
    pub feature: FeatureKind,
    pub unit_count: f64,
    pub unit_kind: UnitKind,
    pub resource_ref: Option<String>,
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct ScoreReceipt {
    pub score: ScoreResult,
    /// The ledger entry written for this score. `None` means the score
    /// was produced but the charge failed; the gap has already been
    /// logged for reconciliation and must not be retried.
    pub charge: Option<UsageEntry>,
}

/// Orchestrator for the quota-metered scoring pipeline.
pub struct ScoringGateway {
    gate: QuotaGate,
    tickets: Arc<TicketPool>,
    provider: Arc<dyn ScoreProvider>,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl ScoringGateway {
    /// Assembles the pipeline. The ticket pool is constructed by the
    /// caller and shared process-wide; the gateway never owns it alone.
    pub fn new(
        gate: QuotaGate,
        tickets: Arc<TicketPool>,
        provider: Arc<dyn ScoreProvider>,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gate,
            tickets,
            provider,
            request_timeout,
            retry,
        }
    }

    /// Runs one request through admission, queueing, scoring, and charge.
    ///
    /// Quota is charged if and only if the provider produced a score. A
    /// charge failure after a successful score does not discard the score:
    /// the caller already received the work, so the receipt carries the
    /// result with `charge: None` and the gap is logged for reconciliation.
    #[tracing::instrument(
        skip(self, command),
        fields(
            owner = %command.owner_id,
            actor = %command.actor_id,
            feature = %command.feature,
        )
    )]
    pub async fn process(&self, command: ScoreCommand) -> Result<ScoreReceipt, MeteringError> {
        let period = self.gate.admit(&command.owner_id).await?;
        tracing::debug!(period = %period.id, "admission granted");

        let deadline = Instant::now() + self.request_timeout;
        let ticket = match self.tickets.acquire(deadline).await {
            Ok(ticket) => ticket,
            Err(AcquireError::Overloaded { retry_after_secs }) => {
                tracing::debug!(retry_after_secs, "request shed at the admission queue");
                return Err(MeteringError::Overloaded { retry_after_secs });
            }
            Err(AcquireError::Timeout) => return Err(self.timeout()),
        };
        tracing::debug!(
            available = self.tickets.available(),
            "ticket acquired, submitting to provider"
        );

        let score = self.submit_on_ticket(ticket, &command, deadline).await?;

        match self
            .gate
            .charge(
                &period,
                &command.actor_id,
                command.feature,
                command.unit_count,
                command.unit_kind,
                command.resource_ref.clone(),
            )
            .await
        {
            Ok(entry) => {
                tracing::debug!(
                    entry = %entry.id,
                    points = entry.points_charged,
                    "quota charged"
                );
                Ok(ScoreReceipt {
                    score,
                    charge: Some(entry),
                })
            }
            Err(err) => {
                tracing::error!(
                    period = %period.id,
                    error = %err,
                    "score delivered but charge failed; ledger requires reconciliation"
                );
                Ok(ScoreReceipt {
                    score,
                    charge: None,
                })
            }
        }
    }

    /// Issues the provider call (and any rate-limit retries) on a task of
    /// its own, with the ticket moved in.
    ///
    /// A caller that is cancelled mid-flight drops only the handle: the
    /// spawned call runs to completion in the background, the ticket is
    /// released when the task ends, and the discarded result is never
    /// charged.
    async fn submit_on_ticket(
        &self,
        ticket: Ticket,
        command: &ScoreCommand,
        deadline: Instant,
    ) -> Result<ScoreResult, MeteringError> {
        let provider = Arc::clone(&self.provider);
        let retry = self.retry.clone();
        let timeout_secs = self.request_timeout.as_secs() as u32;
        let request = ScoreRequest {
            payload: command.payload.clone(),
            feature: command.feature,
            trace_id: Uuid::new_v4().to_string(),
        };

        let handle = tokio::spawn(async move {
            let _ticket = ticket;
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(MeteringError::Timeout { timeout_secs });
                }

                let outcome =
                    tokio::time::timeout(remaining, provider.submit(request.clone())).await;
                let err = match outcome {
                    Ok(Ok(result)) => return Ok(result),
                    Ok(Err(err)) => err,
                    Err(_) => return Err(MeteringError::Timeout { timeout_secs }),
                };

                match err {
                    ScoreProviderError::RateLimited { retry_after_secs }
                        if attempt < retry.max_attempts =>
                    {
                        let pause = retry.backoff_for(attempt, retry_after_secs);
                        if Instant::now() + pause >= deadline {
                            return Err(MeteringError::Timeout { timeout_secs });
                        }
                        tracing::warn!(
                            attempt,
                            pause_ms = pause.as_millis() as u64,
                            "provider rate limited despite gating, retrying on held ticket"
                        );
                        tokio::time::sleep(pause).await;
                    }
                    ScoreProviderError::RateLimited { retry_after_secs } => {
                        return Err(MeteringError::Overloaded {
                            retry_after_secs: retry_after_secs
                                .unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF_SECS),
                        });
                    }
                    ScoreProviderError::Timeout { .. } => {
                        return Err(MeteringError::Timeout { timeout_secs });
                    }
                    terminal => return Err(MeteringError::provider(terminal.to_string())),
                }
            }
        });

        match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(MeteringError::provider(format!(
                "scoring task aborted: {}",
                join_err
            ))),
        }
    }

    fn timeout(&self) -> MeteringError {
        MeteringError::Timeout {
            timeout_secs: self.request_timeout.as_secs() as u32,
        }
    }
}
