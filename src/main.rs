//! Gradegate service entry point.
//!
//! Wires configuration, the PostgreSQL adapters, the scoring provider,
//! and the process-wide ticket pool into the gateway, then serves the
//! HTTP surface.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use gradegate::adapters::http::scoring::{scoring_router, ScoringAppState};
use gradegate::adapters::postgres::{PostgresPeriodReader, PostgresUsageLedger};
use gradegate::adapters::provider::{HttpScoreProvider, HttpScoreProviderConfig};
use gradegate::application::{GetUsageSummaryHandler, QuotaGate, ScoringGateway, TicketPool};
use gradegate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let periods = Arc::new(PostgresPeriodReader::new(pool.clone()));
    let ledger = Arc::new(PostgresUsageLedger::new(pool));

    let provider_config = HttpScoreProviderConfig::new(
        config
            .provider
            .api_key
            .clone()
            .expect("provider api_key validated at startup"),
    )
    .with_base_url(config.provider.base_url.clone())
    .with_model(config.provider.model.clone())
    .with_timeout(config.provider.call_timeout());
    let provider = Arc::new(HttpScoreProvider::new(provider_config));

    // One pool per provider, shared by every caller task.
    let tickets = Arc::new(TicketPool::new(
        config.metering.max_in_flight,
        config.metering.max_queue_depth,
    ));
    tracing::info!(
        capacity = config.metering.max_in_flight,
        max_queue_depth = config.metering.max_queue_depth,
        "ticket pool ready"
    );

    let gateway = ScoringGateway::new(
        QuotaGate::new(periods, ledger.clone()),
        tickets,
        provider,
        config.metering.request_timeout(),
        config.metering.retry_policy(),
    );

    let state = ScoringAppState {
        gateway: Arc::new(gateway),
        usage_summary: Arc::new(GetUsageSummaryHandler::new(ledger)),
    };

    let app = axum::Router::new()
        .nest("/api", scoring_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr();
    tracing::info!(%addr, "gradegate listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
