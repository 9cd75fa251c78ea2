// =============================================================================
// Numeric Helpers
// =============================================================================
//
// Pure, side-effect-free building blocks shared by the signal computers.
// Every public function returns `Option` (or an empty series) so callers must
// handle short inputs and non-finite arithmetic explicitly.

pub mod ema;
pub mod rsi;
pub mod stats;

pub use ema::last_ema;
pub use rsi::wilder_rsi;
pub use stats::{percentile_rank, regression_slope, weighted_mean_and_std};
