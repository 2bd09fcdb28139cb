//! Common measurements, scoring shortcuts and trade-level construction
//! shared across all detector modules.

use crate::{
    scoring::{self, Confidence, Factor},
    Bar, Direction, MarketContext, OHLCVExt, PatternError, PatternKind, PatternMatch, Result,
    OHLCV,
};

// ============================================================
// SHARED THRESHOLDS
// ============================================================

/// Bars averaged for trailing body/range comparisons
pub const AVG_PERIOD: usize = 10;

/// Tiers for "how many times larger" comparisons: `(minimum multiple, points)`
pub const SIZE_TIERS: &[(f64, f64)] = &[(2.0, 2.5), (1.5, 2.0), (1.2, 1.5)];
pub const GEOMETRY_FLOOR: f64 = 1.0;

// ============================================================
// MEASUREMENTS
// ============================================================

/// Percent change in close over the `lookback` bars preceding `start`.
///
/// Measured from `bars[start - lookback]` to `bars[start - 1]`, the bar just before the
/// formation. None when the history is too short or the base close is not positive.
#[inline]
pub fn trend_before<T: OHLCV>(bars: &[T], start: usize, lookback: usize) -> Option<f64> {
    if lookback < 2 || start < lookback {
        return None;
    }
    let from = bars.get(start - lookback)?.close();
    let to = bars.get(start - 1)?.close();
    (from > f64::EPSILON).then(|| (to - from) / from * 100.0)
}

/// A prior move expressed in the signal's direction: positive when price already
/// moved the way the signal points.
#[inline]
pub fn prior_move_with(signal: Direction, move_pct: f64) -> f64 {
    match signal {
        Direction::Bullish => move_pct,
        Direction::Bearish => -move_pct,
        Direction::Neutral => move_pct.abs(),
    }
}

/// A prior move expressed against the signal: positive when price moved the opposite
/// way, which is what a reversal needs.
#[inline]
pub fn prior_move_against(signal: Direction, move_pct: f64) -> f64 {
    match signal {
        Direction::Neutral => move_pct.abs(),
        _ => -prior_move_with(signal, move_pct),
    }
}

#[inline]
pub fn lowest_low<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min)
}

#[inline]
pub fn highest_high<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max)
}

/// Position points from how close the formation's extreme sits to the window's swing
/// extreme: the low for bullish signals, the high for bearish ones.
pub fn swing_position<T: OHLCV>(signal: Direction, window: &[T], formation: &[T]) -> f64 {
    let distance_pct = match signal {
        Direction::Bullish => {
            let floor = lowest_low(window);
            (lowest_low(formation) - floor) / floor.max(f64::EPSILON) * 100.0
        },
        Direction::Bearish | Direction::Neutral => {
            let ceiling = highest_high(window);
            (ceiling - highest_high(formation)) / ceiling.max(f64::EPSILON) * 100.0
        },
    };
    scoring::swing_points(distance_pct.max(0.0))
}

/// Compute trailing average body at a specific bar index.
#[inline]
pub fn trailing_avg_body<T: OHLCV>(bars: &[T], at: usize, period: usize) -> f64 {
    if at == 0 {
        return OHLCVExt::body(&bars[0]);
    }
    let s = at.saturating_sub(period);
    let slice = &bars[s..at];
    let sum: f64 = slice.iter().map(|b| OHLCVExt::body(b)).sum();
    sum / slice.len() as f64
}

/// Compute trailing average range at a specific bar index.
#[inline]
pub fn trailing_avg_range<T: OHLCV>(bars: &[T], at: usize, period: usize) -> f64 {
    if at == 0 {
        return OHLCVExt::range(&bars[0]);
    }
    let s = at.saturating_sub(period);
    let slice = &bars[s..at];
    let sum: f64 = slice.iter().map(|b| OHLCVExt::range(b)).sum();
    sum / slice.len() as f64
}

/// Volume and regime points, which every detector scores the same way
#[inline]
pub fn base_confidence(signal: Direction, ctx: &MarketContext) -> Confidence {
    Confidence::new()
        .with(Factor::Volume, scoring::volume_points(ctx.volume_ratio))
        .with(Factor::Regime, scoring::regime_points(signal, ctx.regime))
}

/// Reject a detector threshold outside `[min, max]`
pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_nan() || value < min || value > max {
        return Err(PatternError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

// ============================================================
// TRADE LEVELS
// ============================================================

/// Entry, target and stop for one match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub entry: f64,
    pub target: Option<f64>,
    pub stop: Option<f64>,
}

impl Levels {
    /// Levels for a neutral match: watch from the close, no target or stop
    pub fn watch(close: f64) -> Self {
        Self {
            entry: close,
            target: None,
            stop: None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.entry.is_finite()
            && self.target.map_or(true, f64::is_finite)
            && self.stop.map_or(true, f64::is_finite)
    }
}

/// How a detector places its levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelRule {
    /// Fraction beyond the trigger bar's extreme where entry sits
    pub entry_offset: f64,
    /// Fraction beyond the anchor extreme where the stop sits, before `stop_multiplier`
    pub stop_buffer: f64,
    /// Scale on `target_multiplier`
    pub target_scale: f64,
}

impl LevelRule {
    pub const fn new(entry_offset: f64, stop_buffer: f64) -> Self {
        Self {
            entry_offset,
            stop_buffer,
            target_scale: 1.0,
        }
    }

    pub const fn scaled(self, target_scale: f64) -> Self {
        Self {
            target_scale,
            ..self
        }
    }

    /// Entry beyond `trigger`'s extreme in the signal direction, target one ATR multiple
    /// further, stop beyond the opposite extreme of `anchor`.
    pub fn levels<T: OHLCV>(
        &self,
        signal: Direction,
        trigger: &T,
        anchor: &[T],
        ctx: &MarketContext,
    ) -> Levels {
        let buffer = self.stop_buffer * ctx.stop_multiplier;
        let distance = ctx.target_distance(self.target_scale);
        match signal {
            Direction::Bullish => {
                let entry = trigger.high() * (1.0 + self.entry_offset);
                Levels {
                    entry,
                    target: Some(entry + distance),
                    stop: Some(lowest_low(anchor) * (1.0 - buffer)),
                }
            },
            Direction::Bearish => {
                let entry = trigger.low() * (1.0 - self.entry_offset);
                Levels {
                    entry,
                    target: Some((entry - distance).max(0.0)),
                    stop: Some(highest_high(anchor) * (1.0 + buffer)),
                }
            },
            Direction::Neutral => Levels::watch(trigger.close()),
        }
    }
}

// ============================================================
// FORMATION
// ============================================================

/// A formation that passed its structural gate, ready to be scored and emitted
#[derive(Debug, Clone)]
pub struct Formation {
    pub kind: PatternKind,
    pub signal: Direction,
    /// Index of the formation's first bar
    pub start: usize,
    pub levels: Levels,
    pub confidence: Confidence,
    pub description: String,
}

impl Formation {
    /// Turn into a match, or None when the score misses `ctx.min_confidence`.
    ///
    /// Non-finite scores or levels are faults rather than misses.
    pub fn finish<T: OHLCV>(
        self,
        bars: &[T],
        ctx: &MarketContext,
    ) -> Result<Option<PatternMatch>> {
        let score = self.confidence.score();
        if !score.is_finite() {
            return Err(PatternError::DetectorFault {
                pattern: self.kind.name(),
                reason: "non-finite confidence score",
            });
        }
        if !self.levels.is_finite() {
            return Err(PatternError::DetectorFault {
                pattern: self.kind.name(),
                reason: "non-finite trade levels",
            });
        }
        if score < ctx.min_confidence {
            return Ok(None);
        }

        let end = bars.len() - 1;
        Ok(Some(PatternMatch {
            pattern: self.kind,
            signal: self.signal,
            confidence_score: score,
            entry_price: self.levels.entry,
            target: self.levels.target,
            stop_loss: self.levels.stop,
            volume_ratio: ctx.volume_ratio,
            description: self.description,
            bars: bars[self.start..].iter().map(Bar::from_ohlcv).collect(),
            confidence_breakdown: self.confidence.into_breakdown(),
            start_index: self.start,
            end_index: end,
        }))
    }
}
