// =============================================================================
// Central Application State — Market Intelligence Engine
// =============================================================================
//
// Ties the long-lived pieces together for the HTTP and WebSocket surface:
//   - the snapshot cache (read path, never blocks on computation)
//   - the scheduler (timer loop and force refresh)
//   - a bounded journal of cycle failures and skipped ticks
//
// Shared across tasks as `Arc<AppState>`.
// =============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::engine::{Scheduler, SnapshotCache};
use crate::error::EngineError;
use crate::runtime_config::EngineConfig;
use crate::types::LifecycleState;

// =============================================================================
// Error journal
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded error event for the error log endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Machine-readable code from [`EngineError::code`].
    pub code: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Ring buffer of recent cycle failures and skips.  Oldest entries are
/// evicted once [`MAX_RECENT_ERRORS`] is reached.
#[derive(Debug, Default)]
pub struct ErrorLog {
    records: RwLock<VecDeque<ErrorRecord>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn push_error(&self, msg: String) {
        self.push_error_with_code(msg, None);
    }

    pub fn push_error_with_code(&self, msg: String, code: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            code,
            at: Utc::now().to_rfc3339(),
        };
        let mut records = self.records.write();
        records.push_back(record);
        while records.len() > MAX_RECENT_ERRORS {
            records.pop_front();
        }
    }

    pub fn record(&self, err: &EngineError) {
        self.push_error_with_code(err.to_string(), Some(err.code().to_string()));
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<ErrorRecord> {
        self.records.read().iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn count_code(&self, code: &str) -> usize {
        self.records
            .read()
            .iter()
            .filter(|r| r.code.as_deref() == Some(code))
            .count()
    }
}

// =============================================================================
// AppState
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: LifecycleState,
    pub symbol: String,
    pub snapshot_age_secs: Option<f64>,
    /// Set while the served snapshot is past the staleness threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<EngineError>,
    pub refresh_interval_secs: u64,
    pub uptime_secs: u64,
    pub version: &'static str,
}

pub struct AppState {
    pub config: EngineConfig,
    pub cache: Arc<SnapshotCache>,
    pub scheduler: Arc<Scheduler>,
    pub errors: Arc<ErrorLog>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: EngineConfig,
        cache: Arc<SnapshotCache>,
        scheduler: Arc<Scheduler>,
        errors: Arc<ErrorLog>,
    ) -> Self {
        Self {
            config,
            cache,
            scheduler,
            errors,
            start_time: Instant::now(),
        }
    }

    /// True when `symbol` is the configured underlying (case-insensitive).
    pub fn serves(&self, symbol: &str) -> bool {
        self.config.symbol.eq_ignore_ascii_case(symbol)
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: self.cache.state(),
            symbol: self.config.symbol.clone(),
            snapshot_age_secs: self.cache.age().map(|a| a.as_secs_f64()),
            warning: self.cache.stale_error(),
            refresh_interval_secs: self.config.refresh_interval_secs,
            uptime_secs: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
