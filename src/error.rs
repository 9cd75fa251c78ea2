// =============================================================================
// Engine Error Taxonomy
// =============================================================================
//
// Signal computers never propagate these upward; they are carried as the
// reason code of an unavailable signal, or reported by the scheduler for a
// whole cycle.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum EngineError {
    /// Provider timeout, empty or partial response.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Inputs were present but no confident result could be produced.
    #[error("computation degraded: {0}")]
    ComputationDegraded(String),

    #[error("snapshot stale: age {age_secs}s exceeds {threshold_secs}s")]
    StaleSnapshot { age_secs: u64, threshold_secs: u64 },

    /// A timer tick overlapped an in-flight cycle.
    #[error("cycle skipped: a compute cycle is already in flight")]
    CycleSkipped,
}

impl EngineError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::DataUnavailable(detail.into())
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self::ComputationDegraded(detail.into())
    }

    /// Short machine-readable code, used in logs and the error journal.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DataUnavailable(_) => "data_unavailable",
            Self::ComputationDegraded(_) => "computation_degraded",
            Self::StaleSnapshot { .. } => "stale_snapshot",
            Self::CycleSkipped => "cycle_skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_with_code_and_detail() {
        let err = EngineError::unavailable("chain fetch timed out");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "data_unavailable");
        assert_eq!(json["detail"], "chain fetch timed out");
    }

    #[test]
    fn stale_message_names_both_ages() {
        let err = EngineError::StaleSnapshot {
            age_secs: 130,
            threshold_secs: 120,
        };
        assert_eq!(err.to_string(), "snapshot stale: age 130s exceeds 120s");
        assert_eq!(err.code(), "stale_snapshot");
    }
}
