// =============================================================================
// Market Intelligence Engine — Main Entry Point
// =============================================================================
//
// Computes a periodic options/macro intelligence snapshot for one underlying
// and serves it over HTTP and WebSocket.  Nothing is published until the
// first cycle completes; until then the snapshot endpoint answers 503.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod engine;
mod error;
mod indicators;
mod provider;
mod runtime_config;
mod session;
mod signals;
mod snapshot;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::{AppState, ErrorLog};
use crate::engine::{Scheduler, SnapshotAssembler, SnapshotCache};
use crate::provider::{HttpProvider, MarketDataProvider};
use crate::runtime_config::EngineConfig;

const CONFIG_PATH: &str = "engine_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Market Intelligence Engine — Starting Up          ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = EngineConfig::load_or_init(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });
    config.apply_env_overrides();
    config.validate().context("invalid engine configuration")?;

    info!(
        symbol = %config.symbol,
        refresh_secs = config.refresh_interval_secs,
        staleness_secs = config.staleness_threshold().as_secs_f64(),
        provider = %config.provider.base_url,
        "Engine configured"
    );

    // ── 2. Provider, cache, scheduler ────────────────────────────────────
    let provider: Arc<dyn MarketDataProvider> = Arc::new(HttpProvider::new(&config.provider)?);
    let cache = Arc::new(SnapshotCache::new(config.staleness_threshold()));
    let errors = Arc::new(ErrorLog::new());
    let assembler = Arc::new(SnapshotAssembler::new(&config, provider));
    let scheduler = Arc::new(Scheduler::new(
        &config,
        assembler,
        cache.clone(),
        errors.clone(),
    ));

    let scheduler_task = tokio::spawn(scheduler.clone().run());

    // ── 3. API server ────────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, cache, scheduler.clone(), errors));
    let app = api::rest::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");
    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    let stop = scheduler.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            warn!("Shutdown signal received — stopping gracefully");
            stop.shutdown();
        })
        .await
        .context("API server failed")?;

    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Scheduler task ended abnormally");
    }

    info!("Market Intelligence Engine shut down complete.");
    Ok(())
}
