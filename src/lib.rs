pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod ingest;
pub mod readings;
pub mod state;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {error}");
    }
}

pub async fn run() -> Result<(), AppError> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = AppConfig::from_env()?;
    log::info!(
        "starting weatherhub; broker {}:{}, topic '{}', window +/-{}s",
        config.broker_host,
        config.broker_port,
        config.topic_filter,
        config.window_secs
    );

    let pool = db::initialize_pool(&config.db_path).await?;
    let state = Arc::new(AppState::new(pool.clone(), config.topic_filter.clone()));

    let cancel_token = CancellationToken::new();
    let ingest_handle = tokio::spawn(ingest::run_ingest(
        config.clone(),
        pool,
        Arc::clone(&state.ingest_status),
        cancel_token.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    log::info!("listening on http://{}", config.http_addr);
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    let _ = ingest_handle.await;
    log::info!("weatherhub stopped");

    Ok(())
}
