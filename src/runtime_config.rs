// =============================================================================
// Engine Configuration — Loaded once at start, atomic save
// =============================================================================
//
// Every tunable the engine uses lives here: cadence, staleness, proxy symbol
// lists, the fusion weight table and all classification thresholds.  Nothing
// in the signal computers hardcodes a band or cutoff.
//
// Persistence uses an atomic tmp + rename pattern.  All fields carry serde
// defaults so a partial JSON file still loads.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::signals::SignalKind;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "SPX".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_staleness_multiplier() -> f64 {
    2.0
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_force_refresh_timeout_secs() -> u64 {
    30
}

fn default_provider_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// Longest accepted cycle cadence (one day).
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;
/// Largest accepted staleness multiplier.
pub const MAX_STALENESS_MULTIPLIER: f64 = 100.0;

// =============================================================================
// Symbols & session
// =============================================================================

/// Cross-asset proxies consumed by the macro classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroSymbols {
    pub equity: String,
    pub long_bond: String,
    pub dollar: String,
    pub gold: String,
}

impl Default for MacroSymbols {
    fn default() -> Self {
        Self {
            equity: "SPY".to_string(),
            long_bond: "TLT".to_string(),
            dollar: "UUP".to_string(),
            gold: "GLD".to_string(),
        }
    }
}

impl MacroSymbols {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.equity.clone(),
            self.long_bond.clone(),
            self.dollar.clone(),
            self.gold.clone(),
        ]
    }
}

/// Front-month and longer-dated volatility index symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilitySymbols {
    pub front: String,
    pub term: String,
}

impl Default for VolatilitySymbols {
    fn default() -> Self {
        Self {
            front: "^VIX".to_string(),
            term: "^VIX3M".to_string(),
        }
    }
}

/// Regular session in US/Eastern, as minutes after midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionHours {
    pub open_minute: u32,
    pub close_minute: u32,
}

impl Default for SessionHours {
    fn default() -> Self {
        Self {
            open_minute: 9 * 60 + 30,
            close_minute: 16 * 60,
        }
    }
}

/// Upstream REST gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Never written back to disk.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            api_key: None,
        }
    }
}

// =============================================================================
// Fusion weights
// =============================================================================

/// Maximum influence of each signal on the unified score.  Renormalised over
/// the signals that are available in a given snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub pcr: f64,
    pub gex: f64,
    pub iv_skew: f64,
    pub vix_regime: f64,
    pub macro_regime: f64,
    pub vwap_bands: f64,
    pub volume_delta: f64,
    pub expected_move: f64,
    pub momentum: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            pcr: 0.10,
            gex: 0.20,
            iv_skew: 0.10,
            vix_regime: 0.15,
            macro_regime: 0.10,
            vwap_bands: 0.10,
            volume_delta: 0.10,
            expected_move: 0.0,
            momentum: 0.15,
        }
    }
}

impl SignalWeights {
    pub fn get(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Pcr => self.pcr,
            SignalKind::Gex => self.gex,
            SignalKind::IvSkew => self.iv_skew,
            SignalKind::VixRegime => self.vix_regime,
            SignalKind::MacroRegime => self.macro_regime,
            SignalKind::VwapBands => self.vwap_bands,
            SignalKind::VolumeDelta => self.volume_delta,
            SignalKind::ExpectedMove => self.expected_move,
            SignalKind::Momentum => self.momentum,
        }
    }
}

// =============================================================================
// Classification thresholds
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PcrThresholds {
    /// PCR strictly below this reads bullish.
    pub bullish_below: f64,
    /// PCR at or above this reads bearish.
    pub bearish_at_or_above: f64,
}

impl Default for PcrThresholds {
    fn default() -> Self {
        Self {
            bullish_below: 0.7,
            bearish_at_or_above: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GexThresholds {
    /// A level is "strong" when |netGEX| >= this fraction of the largest |netGEX|.
    pub strong_level_fraction: f64,
    pub top_levels: usize,
}

impl Default for GexThresholds {
    fn default() -> Self {
        Self {
            strong_level_fraction: 0.25,
            top_levels: 5,
        }
    }
}

/// One row of the skew interpretation table; matches when skew > `above`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkewBucket {
    pub label: String,
    pub above: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewThresholds {
    /// Evaluated top to bottom, first match wins.
    pub buckets: Vec<SkewBucket>,
    pub fallback_label: String,
}

impl Default for SkewThresholds {
    fn default() -> Self {
        Self {
            buckets: vec![
                SkewBucket {
                    label: "extreme fear skew".to_string(),
                    above: 10.0,
                },
                SkewBucket {
                    label: "fear skew".to_string(),
                    above: 5.0,
                },
                SkewBucket {
                    label: "normal".to_string(),
                    above: -2.0,
                },
            ],
            fallback_label: "call skew".to_string(),
        }
    }
}

impl SkewThresholds {
    /// Lowest cutoff above the call-skew cutoff, where fear territory starts.
    pub fn fear_cutoff(&self) -> f64 {
        let call = self.call_cutoff();
        self.buckets
            .iter()
            .map(|b| b.above)
            .filter(|above| *above > call)
            .fold(f64::INFINITY, f64::min)
    }

    /// Lowest cutoff in the table: below it the fallback (call skew) label applies.
    pub fn call_cutoff(&self) -> f64 {
        self.buckets
            .iter()
            .map(|b| b.above)
            .fold(f64::INFINITY, f64::min)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VixThresholds {
    pub complacent_below: f64,
    pub normal_below: f64,
    pub elevated_below: f64,
    /// |term - front| within this band reads flat.
    pub term_flat_band: f64,
    pub average_window: usize,
    pub percentile_window: usize,
}

impl Default for VixThresholds {
    fn default() -> Self {
        Self {
            complacent_below: 15.0,
            normal_below: 20.0,
            elevated_below: 30.0,
            term_flat_band: 0.5,
            average_window: 20,
            percentile_window: 252,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroThresholds {
    /// Day change (percent) beyond which a proxy counts as up or down.
    pub move_pct: f64,
}

impl Default for MacroThresholds {
    fn default() -> Self {
        Self { move_pct: 0.25 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VwapThresholds {
    /// Within this many sigma of VWAP the price is "at_vwap".
    pub at_vwap_sigma: f64,
}

impl Default for VwapThresholds {
    fn default() -> Self {
        Self { at_vwap_sigma: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeDeltaThresholds {
    pub divergence_lookback: usize,
    /// Cumulative delta share of total volume needed for a buying/selling tag.
    pub direction_band: f64,
}

impl Default for VolumeDeltaThresholds {
    fn default() -> Self {
        Self {
            divergence_lookback: 10,
            direction_band: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumThresholds {
    pub history_days: usize,
    pub rsi_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub slope_window: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_bull_vote: f64,
    pub rsi_bear_vote: f64,
    /// Slope (percent of mean per bar) needed for a directional vote.
    pub slope_vote_pct: f64,
}

impl Default for MomentumThresholds {
    fn default() -> Self {
        Self {
            history_days: 120,
            rsi_period: 14,
            ema_fast: 9,
            ema_slow: 21,
            slope_window: 5,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_bull_vote: 55.0,
            rsi_bear_vote: 45.0,
            slope_vote_pct: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedMoveParams {
    pub annualization_days: f64,
    pub weekly_days: f64,
}

impl Default for ExpectedMoveParams {
    fn default() -> Self {
        Self {
            annualization_days: 252.0,
            weekly_days: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreThresholds {
    pub bullish_above: f64,
    pub bearish_below: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            bullish_above: 5.0,
            bearish_below: -5.0,
        }
    }
}

/// Every classification cutoff, grouped by signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub pcr: PcrThresholds,
    pub gex: GexThresholds,
    pub skew: SkewThresholds,
    pub vix: VixThresholds,
    pub macro_rules: MacroThresholds,
    pub vwap: VwapThresholds,
    pub volume_delta: VolumeDeltaThresholds,
    pub momentum: MomentumThresholds,
    pub expected_move: ExpectedMoveParams,
    pub score: ScoreThresholds,
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Underlying whose chain is analysed.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Snapshot is stale once older than this many refresh intervals.
    #[serde(default = "default_staleness_multiplier")]
    pub staleness_multiplier: f64,

    /// Per provider call; expiry marks the dependent signals unavailable.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// How long a force refresh waits before returning the previous snapshot.
    #[serde(default = "default_force_refresh_timeout_secs")]
    pub force_refresh_timeout_secs: u64,

    #[serde(default)]
    pub macro_symbols: MacroSymbols,

    #[serde(default)]
    pub volatility_symbols: VolatilitySymbols,

    #[serde(default)]
    pub session: SessionHours,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub weights: SignalWeights,

    #[serde(default)]
    pub thresholds: Thresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            bind_addr: default_bind_addr(),
            refresh_interval_secs: default_refresh_interval_secs(),
            staleness_multiplier: default_staleness_multiplier(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            force_refresh_timeout_secs: default_force_refresh_timeout_secs(),
            macro_symbols: MacroSymbols::default(),
            volatility_symbols: VolatilitySymbols::default(),
            session: SessionHours::default(),
            provider: ProviderConfig::default(),
            weights: SignalWeights::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            refresh_secs = config.refresh_interval_secs,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Load `path`, or write the defaults there if no file exists yet so the
    /// operator has a complete template to edit.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        info!(path = %path.display(), "no engine config found, wrote defaults");
        Ok(config)
    }

    /// Persist the configuration using an atomic write (tmp, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// Apply `INTEL_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(sym) = std::env::var("INTEL_SYMBOL") {
            let sym = sym.trim().to_uppercase();
            if !sym.is_empty() {
                self.symbol = sym;
            }
        }
        if let Ok(addr) = std::env::var("INTEL_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(url) = std::env::var("INTEL_PROVIDER_URL") {
            self.provider.base_url = url;
        }
        if let Ok(key) = std::env::var("INTEL_PROVIDER_API_KEY") {
            if !key.is_empty() {
                self.provider.api_key = Some(key);
            }
        }
        if let Some(secs) = std::env::var("INTEL_REFRESH_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.refresh_interval_secs = secs;
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            bail!("symbol must not be empty");
        }
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be positive");
        }
        if self.refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS {
            bail!(
                "refresh_interval_secs must be at most {MAX_REFRESH_INTERVAL_SECS}, got {}",
                self.refresh_interval_secs
            );
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be positive");
        }
        if !(1.0..=MAX_STALENESS_MULTIPLIER).contains(&self.staleness_multiplier) {
            bail!(
                "staleness_multiplier must be within 1.0..={MAX_STALENESS_MULTIPLIER}, got {}",
                self.staleness_multiplier
            );
        }
        let threshold_secs = self.refresh_interval_secs as f64 * self.staleness_multiplier;
        if Duration::try_from_secs_f64(threshold_secs).is_err() {
            bail!("staleness threshold of {threshold_secs}s is not a representable duration");
        }

        let mut total = 0.0;
        for kind in SignalKind::ALL {
            let w = self.weights.get(kind);
            if !w.is_finite() || w < 0.0 {
                bail!("weight for {kind} must be a non-negative number, got {w}");
            }
            total += w;
        }
        if total <= 0.0 {
            bail!("at least one signal weight must be positive");
        }

        let t = &self.thresholds;
        if t.pcr.bullish_below >= t.pcr.bearish_at_or_above {
            bail!("pcr.bullish_below must be below pcr.bearish_at_or_above");
        }
        if !(t.vix.complacent_below < t.vix.normal_below
            && t.vix.normal_below < t.vix.elevated_below)
        {
            bail!("vix bands must be strictly increasing");
        }
        if t.score.bearish_below > t.score.bullish_above {
            bail!("score.bearish_below must not exceed score.bullish_above");
        }
        if t.momentum.ema_fast >= t.momentum.ema_slow {
            bail!("momentum.ema_fast must be shorter than momentum.ema_slow");
        }
        if t.skew.buckets.len() < 2 {
            bail!("skew table needs at least two buckets");
        }
        if t.skew.buckets.windows(2).any(|w| w[0].above <= w[1].above) {
            bail!("skew buckets must be ordered by strictly decreasing cutoff");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Refresh interval times the staleness multiplier.  Saturates rather
    /// than panicking on an unvalidated config.
    pub fn staleness_threshold(&self) -> Duration {
        let secs = self.refresh_interval_secs as f64 * self.staleness_multiplier;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn force_refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.force_refresh_timeout_secs)
    }
}
