//! Two-bar reversal detectors
//!
//! Patterns: Bullish/Bearish Engulfing, Piercing Pattern, Dark Cloud Cover.
//!
//! The second body either engulfs the first or, without engulfing it, closes at least
//! half way back into it. Trend points come from the move the pattern reverses.

use super::helpers::{
    self, base_confidence, check_range, swing_position, trend_before, Formation, LevelRule,
    GEOMETRY_FLOOR, SIZE_TIERS,
};
use crate::{
    scoring::{tier, trend_points, Factor},
    Direction, MarketContext, OHLCVExt, PatternDetector, PatternKind, PatternMatch, Result,
    OHLCV,
};

impl_with_defaults!(
    BullishEngulfingDetector,
    BearishEngulfingDetector,
    PiercingPatternDetector,
    DarkCloudCoverDetector,
);

/// Formation plus trend lookback
const MIN_BARS: usize = 12;
const TREND_LOOKBACK: usize = MIN_BARS - 2;

const LEVELS: LevelRule = LevelRule::new(0.001, 0.003);

/// Penetration depth tiers: `(minimum fraction of the first body, points)`
const PENETRATION_TIERS: &[(f64, f64)] = &[(0.8, 2.5), (0.7, 2.0), (0.6, 1.5)];

// ============================================================
// ENGULFING PATTERNS
// ============================================================

/// Bullish Engulfing: a bullish body that swallows the prior bearish body
#[derive(Debug, Clone)]
pub struct BullishEngulfingDetector {
    /// Second body must exceed the first by more than this multiple
    pub min_body_multiple: f64,
}

impl Default for BullishEngulfingDetector {
    fn default() -> Self {
        Self {
            min_body_multiple: 1.0,
        }
    }
}

impl PatternDetector for BullishEngulfingDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::BullishEngulfing
    }

    fn min_bars(&self) -> usize {
        MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        engulfing(self.kind(), Direction::Bullish, self.min_body_multiple, bars, ctx)
    }

    fn validate_config(&self) -> Result<()> {
        check_range("min_body_multiple", self.min_body_multiple, 1.0, 5.0)
    }
}

/// Bearish Engulfing: a bearish body that swallows the prior bullish body
#[derive(Debug, Clone)]
pub struct BearishEngulfingDetector {
    pub min_body_multiple: f64,
}

impl Default for BearishEngulfingDetector {
    fn default() -> Self {
        Self {
            min_body_multiple: 1.0,
        }
    }
}

impl PatternDetector for BearishEngulfingDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::BearishEngulfing
    }

    fn min_bars(&self) -> usize {
        MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        engulfing(self.kind(), Direction::Bearish, self.min_body_multiple, bars, ctx)
    }

    fn validate_config(&self) -> Result<()> {
        check_range("min_body_multiple", self.min_body_multiple, 1.0, 5.0)
    }
}

fn engulfing<T: OHLCV>(
    kind: PatternKind,
    signal: Direction,
    min_body_multiple: f64,
    bars: &[T],
    ctx: &MarketContext,
) -> Result<Option<PatternMatch>> {
    let n = bars.len();
    if n < MIN_BARS {
        return Ok(None);
    }
    let (prev, curr) = (&bars[n - 2], &bars[n - 1]);
    let prev_body = prev.body();
    if prev_body <= f64::EPSILON || curr.range() <= f64::EPSILON {
        return Ok(None);
    }

    let engulfs = if signal.is_bullish() {
        prev.is_bearish()
            && curr.is_bullish()
            && curr.open() <= prev.close()
            && curr.close() >= prev.open()
    } else {
        prev.is_bullish()
            && curr.is_bearish()
            && curr.open() >= prev.close()
            && curr.close() <= prev.open()
    };
    let size = curr.body() / prev_body;
    if !engulfs || size <= min_body_multiple {
        return Ok(None);
    }

    let trend = trend_before(bars, n - 2, TREND_LOOKBACK).unwrap_or(0.0);
    let confidence = base_confidence(signal, ctx)
        .with(Factor::Geometry, tier(size, SIZE_TIERS, GEOMETRY_FLOOR))
        .with(
            Factor::Trend,
            trend_points(helpers::prior_move_against(signal, trend)),
        )
        .with(Factor::Position, swing_position(signal, bars, &bars[n - 2..]));

    Formation {
        kind,
        signal,
        start: n - 2,
        levels: LEVELS.levels(signal, curr, &bars[n - 2..], ctx),
        confidence,
        description: format!(
            "{} ({:.1}x prior body) after {:+.1}% move",
            kind.name(),
            size,
            trend
        ),
    }
    .finish(bars, ctx)
}

// ============================================================
// PIERCING PATTERN / DARK CLOUD COVER
// ============================================================

/// Piercing Pattern: opens below a long bearish close and recovers past its midpoint
#[derive(Debug, Clone)]
pub struct PiercingPatternDetector {
    /// First body as a fraction of its range
    pub min_first_body_ratio: f64,
    /// Fraction of the first body the second close must retrace
    pub min_penetration: f64,
}

impl Default for PiercingPatternDetector {
    fn default() -> Self {
        Self {
            min_first_body_ratio: 0.5,
            min_penetration: 0.5,
        }
    }
}

impl PatternDetector for PiercingPatternDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::PiercingPattern
    }

    fn min_bars(&self) -> usize {
        MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        penetration(
            self.kind(),
            Direction::Bullish,
            self.min_first_body_ratio,
            self.min_penetration,
            bars,
            ctx,
        )
    }

    fn validate_config(&self) -> Result<()> {
        check_range("min_first_body_ratio", self.min_first_body_ratio, 0.0, 1.0)?;
        check_range("min_penetration", self.min_penetration, 0.5, 1.0)
    }
}

/// Dark Cloud Cover: opens above a long bullish close and falls past its midpoint
#[derive(Debug, Clone)]
pub struct DarkCloudCoverDetector {
    pub min_first_body_ratio: f64,
    pub min_penetration: f64,
}

impl Default for DarkCloudCoverDetector {
    fn default() -> Self {
        Self {
            min_first_body_ratio: 0.5,
            min_penetration: 0.5,
        }
    }
}

impl PatternDetector for DarkCloudCoverDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::DarkCloudCover
    }

    fn min_bars(&self) -> usize {
        MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        penetration(
            self.kind(),
            Direction::Bearish,
            self.min_first_body_ratio,
            self.min_penetration,
            bars,
            ctx,
        )
    }

    fn validate_config(&self) -> Result<()> {
        check_range("min_first_body_ratio", self.min_first_body_ratio, 0.0, 1.0)?;
        check_range("min_penetration", self.min_penetration, 0.5, 1.0)
    }
}

fn penetration<T: OHLCV>(
    kind: PatternKind,
    signal: Direction,
    min_first_body_ratio: f64,
    min_penetration: f64,
    bars: &[T],
    ctx: &MarketContext,
) -> Result<Option<PatternMatch>> {
    let n = bars.len();
    if n < MIN_BARS {
        return Ok(None);
    }
    let (prev, curr) = (&bars[n - 2], &bars[n - 1]);
    let prev_body = prev.body();
    let Some(first_ratio) = prev.body_ratio() else {
        return Ok(None);
    };
    if prev_body <= f64::EPSILON || first_ratio < min_first_body_ratio {
        return Ok(None);
    }

    // Opens beyond the first close, closes inside the first body
    let (shape, depth) = if signal.is_bullish() {
        (
            prev.is_bearish()
                && curr.is_bullish()
                && curr.open() < prev.close()
                && curr.close() < prev.open(),
            (curr.close() - prev.close()) / prev_body,
        )
    } else {
        (
            prev.is_bullish()
                && curr.is_bearish()
                && curr.open() > prev.close()
                && curr.close() > prev.open(),
            (prev.close() - curr.close()) / prev_body,
        )
    };
    if !shape || depth < min_penetration {
        return Ok(None);
    }

    let trend = trend_before(bars, n - 2, TREND_LOOKBACK).unwrap_or(0.0);
    let confidence = base_confidence(signal, ctx)
        .with(
            Factor::Geometry,
            tier(depth, PENETRATION_TIERS, GEOMETRY_FLOOR),
        )
        .with(
            Factor::Trend,
            trend_points(helpers::prior_move_against(signal, trend)),
        )
        .with(Factor::Position, swing_position(signal, bars, &bars[n - 2..]));

    Formation {
        kind,
        signal,
        start: n - 2,
        levels: LEVELS.levels(signal, curr, &bars[n - 2..], ctx),
        confidence,
        description: format!(
            "{} ({:.0}% penetration) after {:+.1}% move",
            kind.name(),
            depth * 100.0,
            trend
        ),
    }
    .finish(bars, ctx)
}
