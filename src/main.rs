// =============================================================================
// Stock Analysis API - Main Entry Point
// =============================================================================
//
// Startup order: environment -> logging -> config -> market data client ->
// service -> HTTP server. The server runs until Ctrl+C, then drains in-flight
// requests before exiting.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod cache;
mod error;
mod indicators;
mod market_data;
mod output;
mod price_series;
mod runtime_config;
mod service;
mod statistics;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::YahooClient;
use crate::runtime_config::{AppConfig, LogFormat};
use crate::service::StockService;

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("STOCK_API_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    // A missing file falls back to defaults; a file that exists but does not
    // parse is fatal.
    let config_missing = !std::path::Path::new(&config_path).exists();
    let mut config = if config_missing {
        AppConfig::default()
    } else {
        AppConfig::load(&config_path)?
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;

    init_tracing(config.log_format);

    if config_missing {
        warn!(path = %config_path, "config file not found, using defaults");
    }
    config.validate().context("invalid configuration")?;

    info!(
        project = %config.project_name,
        api_prefix = %config.api_prefix,
        output_dir = %config.output_dir,
        export_outputs = config.export_outputs,
        cache_capacity = config.cache_capacity,
        "Starting up"
    );

    // ── 2. Market data client & service ──────────────────────────────────
    let provider = Arc::new(YahooClient::new(&config.yahoo)?);
    let service = Arc::new(StockService::new(provider, &config)?);

    // ── 3. HTTP server ───────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, service));
    let app = api::rest::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("Shut down complete.");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    warn!("Shutdown signal received - stopping gracefully");
}
