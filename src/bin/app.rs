use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use adapter::{database::connect_database_with, redis::RedisClient};
use anyhow::{Context, Result};
use api::handler::reservation::publish_events;
use api::route::v1;
use axum::Router;
use chrono::Utc;
use registry::AppRegistry;
use shared::config::AppConfig;
use shared::env::{which, Environment};
use tokio::net::TcpListener;
use tokio::time::sleep;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;
    bootstrap().await
}

fn init_logger() -> Result<()> {
    let log_level = match which() {
        Environment::Development => "debug",
        Environment::Production => "info",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into());

    let subscriber = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(subscriber)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

async fn bootstrap() -> Result<()> {
    let app_config = AppConfig::new()?;
    let pool = connect_database_with(&app_config.database);
    let kv = Arc::new(RedisClient::new(&app_config.redis)?);

    let registry = AppRegistry::new(pool, kv);

    let sweep_interval = Duration::from_secs(app_config.sweep.interval_secs);
    tokio::spawn(expiration_sweep(registry.clone(), sweep_interval));

    let app = Router::new().merge(v1::routes()).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
    )
    .with_state(registry);

    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 8080);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("Unexpected error happened in server")
        .inspect_err(|e| {
            tracing::error!(
                error.cause_chain = ?e, error.message = %e, "Unexpected error"
            )
        })
}

/// Periodically cancels `Reserved` reservations whose no-show window has
/// elapsed, freeing nothing (a reserved room was never occupied) but raising
/// the usual cancellation event for the surrounding platform.
async fn expiration_sweep(registry: AppRegistry, interval: Duration) {
    loop {
        sleep(interval).await;
        if let Err(e) = sweep_once(&registry).await {
            tracing::warn!(error.cause_chain = ?e, "expiration sweep failed");
        }
    }
}

async fn sweep_once(registry: &AppRegistry) -> shared::error::AppResult<()> {
    let now = Utc::now();
    let expired = registry
        .reservation_repository()
        .find_expired_reserved(now)
        .await?;
    for mut reservation in expired {
        reservation.cancel_due_to_expiration(now)?;
        registry
            .reservation_repository()
            .update(&reservation, None)
            .await?;
        publish_events(registry, &mut reservation).await;
        tracing::info!(
            reservation_id = %reservation.id(),
            "cancelled expired reservation"
        );
    }
    Ok(())
}
