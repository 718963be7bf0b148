//! Integration tests for the metered scoring pipeline.
//!
//! These tests drive the full gateway (admission -> ticket pool ->
//! provider -> ledger charge) against in-memory collaborators and a
//! scripted provider, and verify the pipeline's load-bearing guarantees:
//! the pool bound holds under heavy concurrency, charges happen exactly
//! once per success, and the ledger reconciles with its entries at every
//! observation point.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use gradegate::adapters::memory::InMemoryMeteringStore;
use gradegate::adapters::provider::{MockFailure, MockScoreProvider};
use gradegate::application::{
    QuotaGate, RetryPolicy, ScoreCommand, ScoringGateway, TicketPool,
};
use gradegate::domain::foundation::{ActorId, OwnerId, Timestamp};
use gradegate::domain::metering::{FeatureKind, MeteringError, Period, PeriodStatus, UnitKind};
use gradegate::ports::{ScorePayload, ScoreProvider, UsageLedger};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn owner(n: usize) -> OwnerId {
    OwnerId::new(format!("school-{}", n)).unwrap()
}

fn seeded_period(store: &InMemoryMeteringStore, owner_id: OwnerId, quota_total: i64) -> Period {
    let now = Timestamp::now();
    let period = Period::new(owner_id, quota_total, now.minus_days(1), now.add_days(29));
    store.insert_period(period.clone());
    period
}

fn command_for(owner_id: OwnerId, unit_count: f64, unit_kind: UnitKind) -> ScoreCommand {
    ScoreCommand {
        owner_id,
        actor_id: ActorId::new("student-1").unwrap(),
        payload: ScorePayload::new("A short essay about tides"),
        feature: FeatureKind::TextScoring,
        unit_count,
        unit_kind,
        resource_ref: Some("assignment-7".to_string()),
    }
}

fn build_gateway(
    store: Arc<InMemoryMeteringStore>,
    provider: Arc<dyn ScoreProvider>,
    pool: Arc<TicketPool>,
    request_timeout: Duration,
) -> ScoringGateway {
    ScoringGateway::new(
        QuotaGate::new(store.clone(), store),
        pool,
        provider,
        request_timeout,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
        },
    )
}

// =============================================================================
// Pool Bound Under Load
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_hundred_concurrent_calls_respect_a_pool_of_eighteen() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let mut periods = Vec::new();
    for n in 0..10 {
        periods.push(seeded_period(&store, owner(n), 10_000));
    }

    let provider = Arc::new(MockScoreProvider::new().with_delay(Duration::from_millis(2)));
    let pool = Arc::new(TicketPool::new(18, 1000));
    let gateway = Arc::new(build_gateway(
        store.clone(),
        provider.clone(),
        pool.clone(),
        Duration::from_secs(30),
    ));

    let mut handles = Vec::new();
    for i in 0..500 {
        let gateway = Arc::clone(&gateway);
        let owner_id = owner(i % 10);
        handles.push(tokio::spawn(async move {
            gateway
                .process(command_for(owner_id, 10.0, UnitKind::Seconds))
                .await
        }));
    }

    let mut successes = 0;
    for outcome in join_all(handles).await {
        let receipt = outcome.unwrap().expect("every call should complete");
        assert!(receipt.charge.is_some());
        successes += 1;
    }
    assert_eq!(successes, 500);

    // The pool bound held: the provider never saw more than 18 calls at
    // once, and saw no rate-limit rejections to propagate.
    assert_eq!(provider.call_count(), 500);
    assert!(provider.max_in_flight() <= 18);
    assert_eq!(pool.available(), 18);
    assert_eq!(pool.queue_depth(), 0);

    // Every period reconciles: 50 calls x 10 points each.
    for period in &periods {
        let summary = store.summary(period.id).await.unwrap();
        assert_eq!(summary.quota_used, 500);
        assert_eq!(summary.entry_count, 50);

        let entries = store.entries(period.id).await.unwrap();
        let charged: i64 = entries.iter().map(|e| e.points_charged).sum();
        assert_eq!(charged, summary.quota_used);
    }
}

// =============================================================================
// Ledger-Log Consistency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_unit_load_reconciles_per_period() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let period = seeded_period(&store, owner(0), 1_000);

    let provider = Arc::new(MockScoreProvider::new().with_delay(Duration::from_millis(1)));
    let pool = Arc::new(TicketPool::new(8, 200));
    let gateway = Arc::new(build_gateway(
        store.clone(),
        provider,
        pool,
        Duration::from_secs(30),
    ));

    let workloads = [
        (30.0, UnitKind::Seconds, 30i64),
        (1.5, UnitKind::Minutes, 90),
        (500.0, UnitKind::Characters, 50),
        (2.0, UnitKind::Images, 20),
    ];

    let mut handles = Vec::new();
    for _ in 0..25 {
        for (unit_count, unit_kind, _) in workloads {
            let gateway = Arc::clone(&gateway);
            let owner_id = owner(0);
            handles.push(tokio::spawn(async move {
                gateway
                    .process(command_for(owner_id, unit_count, unit_kind))
                    .await
            }));
        }
    }
    for outcome in join_all(handles).await {
        outcome.unwrap().unwrap();
    }

    let per_round: i64 = workloads.iter().map(|(_, _, points)| points).sum();
    let summary = store.summary(period.id).await.unwrap();
    assert_eq!(summary.quota_used, per_round * 25);
    assert_eq!(summary.entry_count, 100);

    let entries = store.entries(period.id).await.unwrap();
    let charged: i64 = entries.iter().map(|e| e.points_charged).sum();
    assert_eq!(charged, summary.quota_used);

    // Entries individually chain onto the counter they observed.
    for entry in &entries {
        assert_eq!(entry.quota_after, entry.quota_before + entry.points_charged);
    }
}

#[tokio::test]
async fn charges_keep_succeeding_past_the_plan_allowance() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let period = seeded_period(&store, owner(0), 25);

    let provider = Arc::new(MockScoreProvider::new());
    let pool = Arc::new(TicketPool::new(2, 8));
    let gateway = build_gateway(store.clone(), provider, pool, Duration::from_secs(5));

    for _ in 0..3 {
        gateway
            .process(command_for(owner(0), 10.0, UnitKind::Seconds))
            .await
            .unwrap();
    }

    let summary = store.summary(period.id).await.unwrap();
    assert_eq!(summary.quota_used, 30);
    assert!(summary.quota_used > summary.quota_total);
    // Displayed remaining quota clamps at zero rather than going negative.
    assert_eq!(summary.quota_remaining, 0);
}

// =============================================================================
// Admission Ordering
// =============================================================================

#[tokio::test]
async fn expired_period_is_rejected_before_the_pool_is_touched() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let period = seeded_period(&store, owner(0), 1_000);
    store.set_status(period.id, PeriodStatus::Expired);

    let provider = Arc::new(MockScoreProvider::new());
    let pool = Arc::new(TicketPool::new(3, 8));
    let gateway = build_gateway(store.clone(), provider.clone(), pool.clone(), Duration::from_secs(5));

    let err = gateway
        .process(command_for(owner(0), 10.0, UnitKind::Seconds))
        .await
        .unwrap_err();

    assert!(matches!(err, MeteringError::NoActiveSubscription { .. }));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(pool.available(), 3);
    assert_eq!(pool.queue_depth(), 0);
}

// =============================================================================
// Failure Paths Never Charge
// =============================================================================

#[tokio::test]
async fn provider_failure_releases_the_ticket_and_writes_nothing() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let period = seeded_period(&store, owner(0), 1_000);

    let provider = Arc::new(MockScoreProvider::new().with_failure(MockFailure::ServerError {
        status: 500,
        message: "scoring backend crashed".to_string(),
    }));
    let pool = Arc::new(TicketPool::new(2, 8));
    let gateway = build_gateway(store.clone(), provider, pool.clone(), Duration::from_secs(5));

    let err = gateway
        .process(command_for(owner(0), 10.0, UnitKind::Seconds))
        .await
        .unwrap_err();

    assert!(matches!(err, MeteringError::ProviderFailed { .. }));
    assert_eq!(pool.available(), 2);

    let summary = store.summary(period.id).await.unwrap();
    assert_eq!(summary.quota_used, 0);
    assert_eq!(summary.entry_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_caller_lets_the_call_finish_without_charging() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let period = seeded_period(&store, owner(0), 1_000);

    let provider = Arc::new(MockScoreProvider::new().with_delay(Duration::from_millis(150)));
    let pool = Arc::new(TicketPool::new(1, 8));
    let gateway = Arc::new(build_gateway(
        store.clone(),
        provider.clone(),
        pool.clone(),
        Duration::from_secs(5),
    ));

    let caller = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            gateway
                .process(command_for(owner(0), 10.0, UnitKind::Seconds))
                .await
        })
    };

    // Let the request reach the provider, then abandon the caller.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.call_count(), 1);
    caller.abort();
    let _ = caller.await;

    // The in-flight call finishes in the background, the ticket comes
    // back, and the discarded result is never charged.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(pool.available(), 1);

    let summary = store.summary(period.id).await.unwrap();
    assert_eq!(summary.quota_used, 0);
    assert_eq!(summary.entry_count, 0);
}

// =============================================================================
// Rate Limits and Shedding
// =============================================================================

#[tokio::test]
async fn stray_rate_limit_is_retried_to_success_on_one_ticket() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let period = seeded_period(&store, owner(0), 1_000);

    let provider = Arc::new(
        MockScoreProvider::new()
            .with_failure(MockFailure::RateLimited {
                retry_after_secs: None,
            })
            .with_score(76.0),
    );
    let pool = Arc::new(TicketPool::new(4, 8));
    let gateway = build_gateway(store.clone(), provider.clone(), pool.clone(), Duration::from_secs(5));

    let receipt = gateway
        .process(command_for(owner(0), 10.0, UnitKind::Seconds))
        .await
        .unwrap();

    assert_eq!(receipt.score.score, 76.0);
    assert_eq!(provider.call_count(), 2);
    assert_eq!(provider.max_in_flight(), 1);
    assert_eq!(pool.available(), 4);

    // The retried success is still exactly one charge.
    let summary = store.summary(period.id).await.unwrap();
    assert_eq!(summary.entry_count, 1);
    assert_eq!(summary.quota_used, 10);
}

#[tokio::test]
async fn persistent_rate_limits_surface_as_overloaded_without_a_charge() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let period = seeded_period(&store, owner(0), 1_000);

    let provider = Arc::new(
        MockScoreProvider::new()
            .with_failure(MockFailure::RateLimited {
                retry_after_secs: None,
            })
            .with_failure(MockFailure::RateLimited {
                retry_after_secs: None,
            })
            .with_failure(MockFailure::RateLimited {
                retry_after_secs: Some(11),
            }),
    );
    let pool = Arc::new(TicketPool::new(1, 4));
    let gateway = build_gateway(store.clone(), provider.clone(), pool.clone(), Duration::from_secs(5));

    let err = gateway
        .process(command_for(owner(0), 10.0, UnitKind::Seconds))
        .await
        .unwrap_err();

    match err {
        MeteringError::Overloaded { retry_after_secs } => assert_eq!(retry_after_secs, 11),
        other => panic!("expected Overloaded, got {:?}", other),
    }
    assert_eq!(provider.call_count(), 3);
    assert_eq!(pool.available(), 1);

    let summary = store.summary(period.id).await.unwrap();
    assert_eq!(summary.quota_used, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn saturated_queue_sheds_with_a_retry_hint() {
    let store = Arc::new(InMemoryMeteringStore::new());
    seeded_period(&store, owner(0), 10_000);

    // One slot, one queue position: the third concurrent request is shed.
    let provider = Arc::new(MockScoreProvider::new().with_delay(Duration::from_millis(300)));
    let pool = Arc::new(TicketPool::new(1, 1));
    let gateway = Arc::new(build_gateway(
        store,
        provider,
        pool.clone(),
        Duration::from_secs(5),
    ));

    let mut background = Vec::new();
    for _ in 0..2 {
        let gateway = Arc::clone(&gateway);
        background.push(tokio::spawn(async move {
            gateway
                .process(command_for(owner(0), 10.0, UnitKind::Seconds))
                .await
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let err = gateway
        .process(command_for(owner(0), 10.0, UnitKind::Seconds))
        .await
        .unwrap_err();
    match err {
        MeteringError::Overloaded { retry_after_secs } => assert!(retry_after_secs >= 1),
        other => panic!("expected Overloaded, got {:?}", other),
    }

    for handle in background {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(pool.available(), 1);
}

// =============================================================================
// Deadline
// =============================================================================

#[tokio::test]
async fn one_deadline_spans_queueing_and_the_call() {
    let store = Arc::new(InMemoryMeteringStore::new());
    let period = seeded_period(&store, owner(0), 1_000);

    let provider = Arc::new(MockScoreProvider::new().with_delay(Duration::from_millis(100)));
    let pool = Arc::new(TicketPool::new(1, 8));
    let gateway = Arc::new(build_gateway(
        store.clone(),
        provider,
        pool.clone(),
        Duration::from_millis(150),
    ));

    // First request consumes ~100ms of the second request's budget while
    // it waits in the queue, leaving too little for its own call.
    let first = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            gateway
                .process(command_for(owner(0), 10.0, UnitKind::Seconds))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = gateway
        .process(command_for(owner(0), 10.0, UnitKind::Seconds))
        .await;

    first.await.unwrap().unwrap();
    assert!(matches!(second, Err(MeteringError::Timeout { .. })));

    // Only the completed request charged.
    let summary = store.summary(period.id).await.unwrap();
    assert_eq!(summary.entry_count, 1);
    assert_eq!(summary.quota_used, 10);
}
