// =============================================================================
// IntelligenceSnapshot — the published aggregate
// =============================================================================
//
// Built once per cycle by the assembler and never mutated after publication.
// A stale read gets a modified copy; the published value is left untouched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::signals::{
    ExpectedMoveResult, GexResult, IvSkewResult, MacroResult, MomentumResult, PcrResult,
    SignalKind, SignalOutcome, SignalPayload, UnifiedScoreResult, VixRegimeResult,
    VolumeDeltaResult, VwapBandResult,
};
use crate::types::SnapshotQuality;

fn unavailable<T>(reason: &EngineError) -> SignalOutcome<T> {
    SignalOutcome::Unavailable(reason.clone())
}

/// One outcome per signal.
#[derive(Debug, Clone, Serialize)]
pub struct SignalSet {
    pub pcr: SignalOutcome<PcrResult>,
    pub gex: SignalOutcome<GexResult>,
    pub iv_skew: SignalOutcome<IvSkewResult>,
    pub vix_regime: SignalOutcome<VixRegimeResult>,
    pub macro_regime: SignalOutcome<MacroResult>,
    pub vwap_bands: SignalOutcome<VwapBandResult>,
    pub volume_delta: SignalOutcome<VolumeDeltaResult>,
    pub expected_move: SignalOutcome<ExpectedMoveResult>,
    pub momentum: SignalOutcome<MomentumResult>,
}

impl SignalSet {
    /// Every signal unavailable for the same reason.
    pub fn unavailable(reason: EngineError) -> Self {
        Self {
            pcr: unavailable(&reason),
            gex: unavailable(&reason),
            iv_skew: unavailable(&reason),
            vix_regime: unavailable(&reason),
            macro_regime: unavailable(&reason),
            vwap_bands: unavailable(&reason),
            volume_delta: unavailable(&reason),
            expected_move: unavailable(&reason),
            momentum: unavailable(&reason),
        }
    }

    /// Store one computer's outcome in its slot.  A payload whose variant
    /// does not match `kind` is stored as degraded.
    pub fn place(&mut self, kind: SignalKind, outcome: SignalOutcome<SignalPayload>) {
        let payload = match outcome {
            SignalOutcome::Available(p) if p.kind() == kind => p,
            SignalOutcome::Available(p) => {
                self.mark_unavailable(
                    kind,
                    EngineError::degraded(format!("computer returned a {} payload", p.kind())),
                );
                return;
            }
            SignalOutcome::Unavailable(e) => {
                self.mark_unavailable(kind, e);
                return;
            }
        };
        match payload {
            SignalPayload::Pcr(r) => self.pcr = SignalOutcome::Available(r),
            SignalPayload::Gex(r) => self.gex = SignalOutcome::Available(r),
            SignalPayload::IvSkew(r) => self.iv_skew = SignalOutcome::Available(r),
            SignalPayload::VixRegime(r) => self.vix_regime = SignalOutcome::Available(r),
            SignalPayload::MacroRegime(r) => self.macro_regime = SignalOutcome::Available(r),
            SignalPayload::VwapBands(r) => self.vwap_bands = SignalOutcome::Available(r),
            SignalPayload::VolumeDelta(r) => self.volume_delta = SignalOutcome::Available(r),
            SignalPayload::ExpectedMove(r) => self.expected_move = SignalOutcome::Available(r),
            SignalPayload::Momentum(r) => self.momentum = SignalOutcome::Available(r),
        }
    }

    pub fn mark_unavailable(&mut self, kind: SignalKind, reason: EngineError) {
        match kind {
            SignalKind::Pcr => self.pcr = unavailable(&reason),
            SignalKind::Gex => self.gex = unavailable(&reason),
            SignalKind::IvSkew => self.iv_skew = unavailable(&reason),
            SignalKind::VixRegime => self.vix_regime = unavailable(&reason),
            SignalKind::MacroRegime => self.macro_regime = unavailable(&reason),
            SignalKind::VwapBands => self.vwap_bands = unavailable(&reason),
            SignalKind::VolumeDelta => self.volume_delta = unavailable(&reason),
            SignalKind::ExpectedMove => self.expected_move = unavailable(&reason),
            SignalKind::Momentum => self.momentum = unavailable(&reason),
        }
    }

    /// Unavailability reason for `kind`, or `None` when it is available.
    pub fn reason(&self, kind: SignalKind) -> Option<&EngineError> {
        match kind {
            SignalKind::Pcr => self.pcr.reason(),
            SignalKind::Gex => self.gex.reason(),
            SignalKind::IvSkew => self.iv_skew.reason(),
            SignalKind::VixRegime => self.vix_regime.reason(),
            SignalKind::MacroRegime => self.macro_regime.reason(),
            SignalKind::VwapBands => self.vwap_bands.reason(),
            SignalKind::VolumeDelta => self.volume_delta.reason(),
            SignalKind::ExpectedMove => self.expected_move.reason(),
            SignalKind::Momentum => self.momentum.reason(),
        }
    }

    pub fn is_available(&self, kind: SignalKind) -> bool {
        self.reason(kind).is_none()
    }

    pub fn available_count(&self) -> usize {
        SignalKind::ALL
            .iter()
            .filter(|k| self.is_available(**k))
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntelligenceSnapshot {
    pub cycle_id: Uuid,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Spot price every signal in this snapshot was computed against.
    pub as_of_spot: f64,
    pub market_open: bool,
    pub quality: SnapshotQuality,
    pub signals: SignalSet,
    pub unified: UnifiedScoreResult,
    pub compute_ms: u64,
}

impl IntelligenceSnapshot {
    /// Copy of this snapshot carrying a different quality flag.
    pub fn with_quality(&self, quality: SnapshotQuality) -> Self {
        Self {
            quality,
            ..self.clone()
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_config::PcrThresholds;
    use crate::signals::pcr::compute_pcr;
    use crate::types::{OptionKind, OptionsChainEntry};

    fn pcr_payload() -> SignalPayload {
        let chain = vec![OptionsChainEntry {
            strike: 100.0,
            kind: OptionKind::Call,
            volume: 10,
            open_interest: 10,
            delta: 0.5,
            gamma: 0.01,
            theta: 0.0,
            vega: 0.0,
            implied_volatility: 20.0,
        }];
        SignalPayload::Pcr(compute_pcr(&chain, &PcrThresholds::default()).unwrap())
    }

    #[test]
    fn place_fills_matching_slot() {
        let mut set = SignalSet::unavailable(EngineError::unavailable("pending"));
        assert_eq!(set.available_count(), 0);
        set.place(SignalKind::Pcr, SignalOutcome::Available(pcr_payload()));
        assert!(set.is_available(SignalKind::Pcr));
        assert_eq!(set.available_count(), 1);
    }

    #[test]
    fn mismatched_payload_is_degraded() {
        let mut set = SignalSet::unavailable(EngineError::unavailable("pending"));
        set.place(SignalKind::Gex, SignalOutcome::Available(pcr_payload()));
        assert!(matches!(
            set.reason(SignalKind::Gex),
            Some(EngineError::ComputationDegraded(_))
        ));
        assert!(!set.is_available(SignalKind::Pcr));
    }

    #[test]
    fn every_slot_can_be_marked_unavailable() {
        let mut set = SignalSet::unavailable(EngineError::unavailable("pending"));
        for kind in SignalKind::ALL {
            assert_eq!(set.reason(kind), Some(&EngineError::unavailable("pending")));
            set.mark_unavailable(kind, EngineError::degraded(kind.as_str()));
            assert_eq!(set.reason(kind), Some(&EngineError::degraded(kind.as_str())));
        }
        assert_eq!(set.available_count(), 0);
    }

    #[test]
    fn unavailable_outcome_keeps_reason() {
        let mut set = SignalSet::unavailable(EngineError::unavailable("pending"));
        set.place(
            SignalKind::Momentum,
            SignalOutcome::Unavailable(EngineError::unavailable("closes timed out")),
        );
        assert_eq!(
            set.reason(SignalKind::Momentum),
            Some(&EngineError::unavailable("closes timed out"))
        );
    }
}
