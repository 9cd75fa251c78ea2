// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  Reads are served from the snapshot
// cache and never wait on a compute cycle; only the refresh command waits,
// bounded by the force-refresh timeout.
//
// CORS is configured permissively; tighten `allow_origin` when the engine is
// exposed beyond a trusted network.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::engine::SnapshotSlot;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/snapshot/:symbol", get(snapshot))
        .route("/api/v1/snapshot/:symbol/refresh", post(refresh))
        .route("/api/v1/errors", get(errors))
        // ── WebSocket (handled in the ws module but mounted here) ────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Error bodies
// =============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: String) -> Response {
    (status, Json(ErrorBody { error, message })).into_response()
}

fn unknown_symbol(state: &AppState, symbol: &str) -> Response {
    warn!(requested = %symbol, "snapshot requested for unknown symbol");
    error_response(
        StatusCode::NOT_FOUND,
        "unknown_symbol",
        format!(
            "no snapshot for {symbol}; this engine serves {}",
            state.config.symbol
        ),
    )
}

fn snapshot_response(slot: SnapshotSlot) -> Response {
    match slot {
        Some(snap) => Json(snap.as_ref()).into_response(),
        None => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "pending",
            "no snapshot has been published yet".to_string(),
        ),
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}

/// Latest published snapshot; flagged stale past the staleness threshold.
async fn snapshot(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    if !state.serves(&symbol) {
        return unknown_symbol(&state, &symbol);
    }
    snapshot_response(state.cache.current())
}

/// Run a cycle now, or join the one in flight, and return the result.
async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    if !state.serves(&symbol) {
        return unknown_symbol(&state, &symbol);
    }
    info!(symbol = %symbol, "force refresh requested");
    snapshot_response(state.scheduler.force_refresh().await)
}

async fn errors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.errors.recent())
}
