use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use courier_dispatch::api;
use courier_dispatch::clock::SystemClock;
use courier_dispatch::config::Config;
use courier_dispatch::engine::events::run_event_loop;
use courier_dispatch::error::AppError;
use courier_dispatch::push::{HttpPushGateway, LogPushGateway, PushGateway};
use courier_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let policy = config.dispatch_policy()?;

    let gateway: Arc<dyn PushGateway> = match &config.push_gateway_url {
        Some(url) => {
            tracing::info!(url = %url, "using http push gateway");
            Arc::new(HttpPushGateway::new(url.clone()))
        }
        None => {
            tracing::warn!("PUSH_GATEWAY_URL not set; notifications are only logged");
            Arc::new(LogPushGateway)
        }
    };

    let (app_state, events_rx) =
        AppState::new(config.event_buffer_size, policy, gateway, Arc::new(SystemClock));
    let shared_state = Arc::new(app_state);

    tokio::spawn(run_event_loop(
        shared_state.engine.handlers(),
        events_rx,
        shared_state.metrics.clone(),
    ));

    let sweeper = shared_state.engine.sweeper();
    tokio::spawn(sweeper.run(Duration::from_millis(config.retry_sweep_interval_ms)));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        radius_km = config.search_radius_km,
        retry_after_secs = config.retry_after_secs,
        "dispatch service started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
