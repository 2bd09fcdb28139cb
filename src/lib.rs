//! # candlescore - candlestick pattern detection with confidence scoring
//!
//! Detects 19 classic candlestick formations at the most recent bar of a window,
//! scores each one from independent factors (geometry, volume, trend, position,
//! regime) on a 0-10 scale, and attaches an entry price, an ATR-scaled target and a
//! structural stop-loss.
//!
//! ## Quick Start
//!
//! ```rust
//! use candlescore::prelude::*;
//!
//! // Any type exposing OHLCV works; `Bar` is the bundled one.
//! let bars: Vec<Bar> = (0..20)
//!     .map(|i| {
//!         let base = 100.0 + i as f64;
//!         Bar::new(base, base + 1.5, base - 1.5, base + 0.5, 1_000.0)
//!     })
//!     .collect();
//!
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .min_confidence(6.5)
//!     .build()
//!     .unwrap();
//!
//! let result = engine
//!     .detect_patterns("ACME", &bars, MarketRegime::Bullish, 119.5, 1_000.0)
//!     .unwrap();
//! for name in &result.patterns_found {
//!     println!("{name}");
//! }
//! ```

pub mod config;
pub mod detectors;
pub mod scoring;
pub mod volatility;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{EngineConfig, ParamMeta, ParamType, CONFIG_PARAMS},
        // Detectors
        detectors::*,
        // Parallel
        detect_parallel,
        // Scoring
        scoring::{Confidence, Factor},
        // Volatility
        volatility::{atr, average_volume, true_range},
        // Types
        Bar,
        BarDetection,
        // Engine
        BuiltinDetector,
        DetectionResult,
        Direction,
        EngineBuilder,
        InstrumentWindow,
        MarketContext,
        MarketRegime,
        OHLCVExt,
        PatternCategory,
        PatternDetector,
        PatternEngine,
        // Errors
        PatternError,
        PatternKind,
        PatternMatch,
        ReplayIterator,
        Result,
        ScanError,
        OHLCV,
    };
}

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{config::EngineConfig, scoring::Factor};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during pattern detection
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Detector fault in {pattern}: {reason}")]
    DetectorFault {
        pattern: &'static str,
        reason: &'static str,
    },

    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with the shared candle geometry
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn body_top(&self) -> f64 {
        self.open().max(self.close())
    }

    #[inline]
    fn body_bottom(&self) -> f64 {
        self.open().min(self.close())
    }

    #[inline]
    fn body_mid(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    #[inline]
    fn upper_wick(&self) -> f64 {
        self.high() - self.body_top()
    }

    #[inline]
    fn lower_wick(&self) -> f64 {
        self.body_bottom() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as ratio of range. Returns None if range ≈ 0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    /// Where the body midpoint sits inside the range: 0.0 at the low, 1.0 at the high.
    #[inline]
    fn body_position(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| (self.body_mid() - self.low()) / range)
    }

    #[inline]
    fn upper_wick_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.upper_wick() / range)
    }

    #[inline]
    fn lower_wick_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.lower_wick() / range)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) || self.volume().is_nan() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) || self.volume().is_infinite() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if prices.iter().any(|p| *p < 0.0) || self.volume() < 0.0 {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "negative value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.body_top() > self.high() || self.body_bottom() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "open/close outside high-low range",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Owned OHLCV bar, used for the formation bars attached to a match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn from_ohlcv<T: OHLCV>(bar: &T) -> Self {
        Self::new(bar.open(), bar.high(), bar.low(), bar.close(), bar.volume())
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// DIRECTION & REGIME
// ============================================================

/// Direction/bias of a detected pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Neutral => "neutral",
            Direction::Bearish => "bearish",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional bias of the broader market, supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketRegime {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl MarketRegime {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketRegime::Bullish => "BULLISH",
            MarketRegime::Bearish => "BEARISH",
            MarketRegime::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketRegime {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BULLISH" => Ok(MarketRegime::Bullish),
            "BEARISH" => Ok(MarketRegime::Bearish),
            "NEUTRAL" => Ok(MarketRegime::Neutral),
            _ => Err(PatternError::InvalidValue(
                "market regime must be BULLISH, BEARISH or NEUTRAL",
            )),
        }
    }
}

// ============================================================
// PATTERN KINDS - generated via macro
// ============================================================

/// Category of pattern by number of bars in the formation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCategory {
    SingleBar,
    TwoBar,
    ThreeBar,
    MultiBar,
}

/// Lower-case a display name and replace spaces with underscores.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

macro_rules! define_pattern_kinds {
    (
        $(
            $variant:ident => $name:literal, $key:literal, $direction:ident, $category:ident
        );* $(;)?
    ) => {
        /// The fixed set of detectable formations
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum PatternKind {
            $($variant),*
        }

        impl PatternKind {
            /// Every pattern, in registry order
            pub const ALL: &'static [PatternKind] = &[$(PatternKind::$variant),*];

            /// Display name, e.g. "Bullish Engulfing"
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),*
                }
            }

            /// Normalized key, e.g. "bullish_engulfing"
            pub fn key(self) -> &'static str {
                match self {
                    $(Self::$variant => $key),*
                }
            }

            /// Direction the pattern signals when it has no context to decide otherwise.
            /// Indecision patterns report `Neutral`; their match carries the trend-derived signal.
            pub fn typical_direction(self) -> Direction {
                match self {
                    $(Self::$variant => Direction::$direction),*
                }
            }

            pub fn category(self) -> PatternCategory {
                match self {
                    $(Self::$variant => PatternCategory::$category),*
                }
            }
        }
    };
}

define_pattern_kinds! {
    BullishEngulfing => "Bullish Engulfing", "bullish_engulfing", Bullish, TwoBar;
    BearishEngulfing => "Bearish Engulfing", "bearish_engulfing", Bearish, TwoBar;
    PiercingPattern => "Piercing Pattern", "piercing_pattern", Bullish, TwoBar;
    DarkCloudCover => "Dark Cloud Cover", "dark_cloud_cover", Bearish, TwoBar;
    Hammer => "Hammer", "hammer", Bullish, SingleBar;
    ShootingStar => "Shooting Star", "shooting_star", Bearish, SingleBar;
    InvertedHammer => "Inverted Hammer", "inverted_hammer", Bullish, SingleBar;
    HangingMan => "Hanging Man", "hanging_man", Bearish, SingleBar;
    Doji => "Doji", "doji", Neutral, SingleBar;
    SpinningTop => "Spinning Top", "spinning_top", Neutral, SingleBar;
    LongLeggedDoji => "Long-Legged Doji", "long-legged_doji", Neutral, SingleBar;
    BullishMarubozu => "Bullish Marubozu", "bullish_marubozu", Bullish, SingleBar;
    BearishMarubozu => "Bearish Marubozu", "bearish_marubozu", Bearish, SingleBar;
    RisingThreeMethods => "Rising Three Methods", "rising_three_methods", Bullish, MultiBar;
    FallingThreeMethods => "Falling Three Methods", "falling_three_methods", Bearish, MultiBar;
    MorningStar => "Morning Star", "morning_star", Bullish, ThreeBar;
    EveningStar => "Evening Star", "evening_star", Bearish, ThreeBar;
    ThreeWhiteSoldiers => "Three White Soldiers", "three_white_soldiers", Bullish, ThreeBar;
    ThreeBlackCrows => "Three Black Crows", "three_black_crows", Bearish, ThreeBar;
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PatternKind {
    type Err = PatternError;

    /// Accepts the display name or the normalized key, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let key = normalize_name(s);
        PatternKind::ALL
            .iter()
            .copied()
            .find(|k| k.key() == key)
            .ok_or_else(|| PatternError::UnknownPattern(s.to_string()))
    }
}

impl Serialize for PatternKind {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for PatternKind {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================
// PATTERN MATCH
// ============================================================

/// One detected formation with its score and trade levels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternMatch {
    #[serde(rename = "pattern_name")]
    pub pattern: PatternKind,
    #[serde(rename = "type")]
    pub signal: Direction,
    /// Composite quality score, 0.0..=10.0 rounded to one decimal
    pub confidence_score: f64,
    pub entry_price: f64,
    pub target: Option<f64>,
    pub stop_loss: Option<f64>,
    /// Current bar volume over the supplied average volume
    pub volume_ratio: f64,
    pub description: String,
    /// Bars making up the formation, oldest first
    pub bars: Vec<Bar>,
    /// Points contributed by each factor, before capping and rounding
    pub confidence_breakdown: BTreeMap<Factor, f64>,
    pub start_index: usize,
    pub end_index: usize,
}

impl PatternMatch {
    #[inline]
    pub fn pattern_name(&self) -> &'static str {
        self.pattern.name()
    }

    /// Reward over risk from the entry, when both levels are present.
    pub fn risk_reward(&self) -> Option<f64> {
        let target = self.target?;
        let stop = self.stop_loss?;
        let risk = (self.entry_price - stop).abs();
        (risk > f64::EPSILON).then(|| (target - self.entry_price).abs() / risk)
    }

    fn shift(mut self, offset: usize) -> Self {
        self.start_index += offset;
        self.end_index += offset;
        self
    }
}

// ============================================================
// MARKET CONTEXT
// ============================================================

/// Per-call inputs shared by every detector
#[derive(Debug, Clone, Copy)]
pub struct MarketContext {
    pub regime: MarketRegime,
    pub avg_volume: f64,
    /// Latest bar volume over `avg_volume`, 1.0 when the average is unusable
    pub volume_ratio: f64,
    /// Average True Range of the window
    pub atr: f64,
    pub target_multiplier: f64,
    /// Scales the structural stop buffer
    pub stop_multiplier: f64,
    pub min_confidence: f64,
}

impl Default for MarketContext {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            regime: MarketRegime::Neutral,
            avg_volume: 0.0,
            volume_ratio: 1.0,
            atr: 0.0,
            target_multiplier: config.target_multiplier,
            stop_multiplier: config.stop_multiplier,
            min_confidence: config.min_confidence,
        }
    }
}

impl MarketContext {
    pub fn new<T: OHLCV>(
        bars: &[T],
        regime: MarketRegime,
        avg_volume: f64,
        config: &EngineConfig,
    ) -> Self {
        let current_volume = bars.last().map_or(0.0, |b| b.volume());
        Self {
            regime,
            avg_volume,
            volume_ratio: scoring::volume_ratio(current_volume, avg_volume),
            atr: volatility::atr(bars, config.atr_period),
            target_multiplier: config.target_multiplier,
            stop_multiplier: config.stop_multiplier,
            min_confidence: config.min_confidence,
        }
    }

    /// Distance from entry to target for a given multiplier scale
    #[inline]
    pub fn target_distance(&self, scale: f64) -> f64 {
        self.atr * self.target_multiplier * scale
    }
}

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

/// A detector evaluates the formation ending at the last bar of `bars`.
///
/// `Ok(None)` covers short history, degenerate bars and failed gates.
/// `Err` is reserved for faults the engine isolates and logs.
pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> PatternKind;
    fn min_bars(&self) -> usize;
    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - closed registry, enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(
                &self,
                bars: &[T],
                ctx: &MarketContext,
            ) -> Result<Option<PatternMatch>> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, ctx)),*
                }
            }

            #[inline]
            pub fn kind(&self) -> PatternKind {
                match self {
                    $(Self::$variant(d) => PatternDetector::kind(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Two bar reversal (4)
    BullishEngulfing(BullishEngulfingDetector),
    BearishEngulfing(BearishEngulfingDetector),
    PiercingPattern(PiercingPatternDetector),
    DarkCloudCover(DarkCloudCoverDetector),

    // Single bar (9)
    Hammer(HammerDetector),
    ShootingStar(ShootingStarDetector),
    InvertedHammer(InvertedHammerDetector),
    HangingMan(HangingManDetector),
    Doji(DojiDetector),
    SpinningTop(SpinningTopDetector),
    LongLeggedDoji(LongLeggedDojiDetector),
    BullishMarubozu(BullishMarubozuDetector),
    BearishMarubozu(BearishMarubozuDetector),

    // Multi bar continuation (2)
    RisingThreeMethods(RisingThreeMethodsDetector),
    FallingThreeMethods(FallingThreeMethodsDetector),

    // Three bar (4)
    MorningStar(MorningStarDetector),
    EveningStar(EveningStarDetector),
    ThreeWhiteSoldiers(ThreeWhiteSoldiersDetector),
    ThreeBlackCrows(ThreeBlackCrowsDetector),
}

// ============================================================
// DETECTION RESULT
// ============================================================

/// Everything found for one instrument in one call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub instrument_id: String,
    pub has_patterns: bool,
    /// Display names, in registry order
    pub patterns_found: Vec<String>,
    pub market_regime: MarketRegime,
    pub current_price: f64,
    /// Keyed by normalized pattern name
    pub pattern_details: BTreeMap<String, PatternMatch>,
}

impl DetectionResult {
    pub fn empty(instrument_id: &str, market_regime: MarketRegime, current_price: f64) -> Self {
        Self {
            instrument_id: instrument_id.to_string(),
            has_patterns: false,
            patterns_found: Vec::new(),
            market_regime,
            current_price,
            pattern_details: BTreeMap::new(),
        }
    }

    fn insert(&mut self, m: PatternMatch) {
        self.patterns_found.push(m.pattern.name().to_string());
        self.pattern_details.insert(m.pattern.key().to_string(), m);
        self.has_patterns = true;
    }

    pub fn get(&self, kind: PatternKind) -> Option<&PatternMatch> {
        self.pattern_details.get(kind.key())
    }

    pub fn contains(&self, kind: PatternKind) -> bool {
        self.pattern_details.contains_key(kind.key())
    }

    /// Highest-confidence match, earliest in registry order on ties
    pub fn best(&self) -> Option<&PatternMatch> {
        self.patterns_found
            .iter()
            .filter_map(|name| self.pattern_details.get(&normalize_name(name)))
            .fold(None, |best: Option<&PatternMatch>, m| match best {
                Some(b) if b.confidence_score >= m.confidence_score => Some(b),
                _ => Some(m),
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pattern_details.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pattern_details.is_empty()
    }
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Shortest window the engine will evaluate
pub const MIN_WINDOW: usize = 12;

/// Trailing bars averaged for volume when replaying history
pub const REPLAY_VOLUME_PERIOD: usize = 20;

/// Main pattern detection engine
#[derive(Debug, Clone)]
pub struct PatternEngine {
    builtin: Vec<BuiltinDetector>,
    config: EngineConfig,
}

impl PatternEngine {
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.builtin
    }

    /// Detect every enabled pattern at the most recent bar of `bars`.
    ///
    /// Returns `Err` only when data validation is on and a bar is malformed.
    pub fn detect_patterns<T: OHLCV>(
        &self,
        instrument_id: &str,
        bars: &[T],
        market_regime: MarketRegime,
        current_price: f64,
        avg_volume: f64,
    ) -> Result<DetectionResult> {
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }
        Ok(self.run(instrument_id, bars, market_regime, current_price, avg_volume))
    }

    /// Detect at a historical bar, as if `bars[index]` were the latest one.
    pub fn detect_at<T: OHLCV>(
        &self,
        instrument_id: &str,
        bars: &[T],
        index: usize,
        market_regime: MarketRegime,
        avg_volume: f64,
    ) -> Result<DetectionResult> {
        let bar = bars.get(index).ok_or(PatternError::InsufficientData {
            need: index + 1,
            got: bars.len(),
        })?;
        self.detect_patterns(
            instrument_id,
            &bars[..=index],
            market_regime,
            bar.close(),
            avg_volume,
        )
    }

    /// Run every enabled detector on `bars` and return each outcome unfiltered.
    pub fn evaluate<T: OHLCV>(
        &self,
        bars: &[T],
        ctx: &MarketContext,
    ) -> Vec<(PatternKind, Result<Option<PatternMatch>>)> {
        self.builtin
            .iter()
            .filter(|d| !self.config.is_disabled(d.kind()))
            .map(|d| {
                let outcome = if bars.len() < d.min_bars() {
                    Ok(None)
                } else {
                    d.detect(bars, ctx)
                };
                (d.kind(), outcome)
            })
            .collect()
    }

    /// Replay history bar by bar, the way a backtest walks a series.
    pub fn replay<'a, T: OHLCV>(
        &'a self,
        instrument_id: &'a str,
        bars: &'a [T],
        market_regime: MarketRegime,
    ) -> Result<ReplayIterator<'a, T>> {
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }
        Ok(ReplayIterator::new(self, instrument_id, bars, market_regime))
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn run<T: OHLCV>(
        &self,
        instrument_id: &str,
        bars: &[T],
        market_regime: MarketRegime,
        current_price: f64,
        avg_volume: f64,
    ) -> DetectionResult {
        let empty = DetectionResult::empty(instrument_id, market_regime, current_price);
        if bars.len() < MIN_WINDOW {
            debug!(
                instrument = instrument_id,
                bars = bars.len(),
                need = MIN_WINDOW,
                "insufficient history, skipping detection"
            );
            return empty;
        }

        let offset = bars
            .len()
            .saturating_sub(self.config.lookback_candles.max(MIN_WINDOW));
        let window = &bars[offset..];
        let ctx = MarketContext::new(window, market_regime, avg_volume, &self.config);

        self.evaluate(window, &ctx)
            .into_iter()
            .fold(empty, |mut result, (kind, outcome)| {
                match outcome {
                    Ok(Some(m)) if self.should_include(&m) => {
                        debug!(
                            instrument = instrument_id,
                            pattern = kind.name(),
                            signal = %m.signal,
                            confidence = m.confidence_score,
                            "pattern detected"
                        );
                        result.insert(m.shift(offset));
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(
                            instrument = instrument_id,
                            pattern = kind.name(),
                            %error,
                            "detector failed, pattern skipped"
                        );
                    }
                }
                result
            })
    }

    fn should_include(&self, m: &PatternMatch) -> bool {
        m.confidence_score >= self.config.min_confidence && !self.config.is_disabled(m.pattern)
    }

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                PatternError::InvalidOHLCV { reason, .. } => {
                    PatternError::InvalidOHLCV { index: i, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        for (i, d) in self.builtin.iter().enumerate() {
            d.validate_config()?;
            if self.builtin[..i].iter().any(|other| other.kind() == d.kind()) {
                return Err(PatternError::InvalidConfig(format!(
                    "detector registered twice: {}",
                    d.kind()
                )));
            }
        }
        Ok(())
    }
}

// ============================================================
// REPLAY ITERATOR
// ============================================================

/// Detection result for the window ending at `index`
#[derive(Debug, Clone)]
pub struct BarDetection {
    pub index: usize,
    pub result: DetectionResult,
}

/// Walks a series, detecting at every bar once the window is long enough
pub struct ReplayIterator<'a, T: OHLCV> {
    engine: &'a PatternEngine,
    instrument_id: &'a str,
    bars: &'a [T],
    regime: MarketRegime,
    current: usize,
}

impl<'a, T: OHLCV> ReplayIterator<'a, T> {
    fn new(
        engine: &'a PatternEngine,
        instrument_id: &'a str,
        bars: &'a [T],
        regime: MarketRegime,
    ) -> Self {
        Self {
            engine,
            instrument_id,
            bars,
            regime,
            current: MIN_WINDOW - 1,
        }
    }
}

impl<'a, T: OHLCV> Iterator for ReplayIterator<'a, T> {
    type Item = BarDetection;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current;
        let bar = self.bars.get(index)?;
        let window = &self.bars[..=index];
        let avg_volume = volatility::average_volume(window, REPLAY_VOLUME_PERIOD);
        let result = self
            .engine
            .run(self.instrument_id, window, self.regime, bar.close(), avg_volume);

        self.current += 1;

        Some(BarDetection { index, result })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bars.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl<'a, T: OHLCV> ExactSizeIterator for ReplayIterator<'a, T> {}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    builtin: Vec<BuiltinDetector>,
    config: EngineConfig,
}

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
    ($($variant:ident),* $(,)?) => {
        [$(BuiltinDetector::$variant(Default::default())),*]
    };
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all 19 builtin patterns with default thresholds
    pub fn with_all_defaults(self) -> Self {
        self.with_two_bar_defaults()
            .with_single_bar_defaults()
            .with_multi_bar_defaults()
            .with_three_bar_defaults()
    }

    /// Add single-bar patterns with defaults (9)
    pub fn with_single_bar_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            Hammer,
            ShootingStar,
            InvertedHammer,
            HangingMan,
            Doji,
            SpinningTop,
            LongLeggedDoji,
            BullishMarubozu,
            BearishMarubozu,
        ]);
        self
    }

    /// Add two-bar patterns with defaults (4)
    pub fn with_two_bar_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            BullishEngulfing,
            BearishEngulfing,
            PiercingPattern,
            DarkCloudCover,
        ]);
        self
    }

    /// Add three-bar patterns with defaults (4)
    pub fn with_three_bar_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            MorningStar,
            EveningStar,
            ThreeWhiteSoldiers,
            ThreeBlackCrows,
        ]);
        self
    }

    /// Add five-bar continuation patterns with defaults (2)
    pub fn with_multi_bar_defaults(mut self) -> Self {
        self.builtin
            .extend(builtin_defaults![RisingThreeMethods, FallingThreeMethods]);
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn min_confidence(mut self, score: f64) -> Self {
        self.config.min_confidence = score;
        self
    }

    pub fn lookback_candles(mut self, bars: usize) -> Self {
        self.config.lookback_candles = bars;
        self
    }

    pub fn atr_period(mut self, period: usize) -> Self {
        self.config.atr_period = period;
        self
    }

    pub fn target_multiplier(mut self, multiplier: f64) -> Self {
        self.config.target_multiplier = multiplier;
        self
    }

    pub fn stop_multiplier(mut self, multiplier: f64) -> Self {
        self.config.stop_multiplier = multiplier;
        self
    }

    /// Add patterns to the disabled list
    pub fn disable(mut self, kinds: impl IntoIterator<Item = PatternKind>) -> Self {
        for kind in kinds {
            if !self.config.disabled_patterns.contains(&kind) {
                self.config.disabled_patterns.push(kind);
            }
        }
        self
    }

    /// Clear the disabled list, including the defaults
    pub fn enable_all(mut self) -> Self {
        self.config.disabled_patterns.clear();
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine> {
        let engine = PatternEngine {
            builtin: self.builtin,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// One instrument's inputs for a batch scan
#[derive(Debug)]
pub struct InstrumentWindow<'a, T> {
    pub instrument_id: &'a str,
    pub bars: &'a [T],
    pub regime: MarketRegime,
    pub current_price: f64,
    pub avg_volume: f64,
}

impl<T> Clone for InstrumentWindow<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for InstrumentWindow<'_, T> {}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub instrument_id: String,
    pub error: PatternError,
}

/// Parallel detection over many instruments, one independent call each
pub fn detect_parallel<'a, T, I>(
    engine: &PatternEngine,
    instruments: I,
) -> (Vec<DetectionResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = InstrumentWindow<'a, T>>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|w| {
            engine
                .detect_patterns(
                    w.instrument_id,
                    w.bars,
                    w.regime,
                    w.current_price,
                    w.avg_volume,
                )
                .map_err(|error| ScanError {
                    instrument_id: w.instrument_id.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
