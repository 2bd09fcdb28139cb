//! Five-bar continuation detectors
//!
//! Patterns: Rising Three Methods, Falling Three Methods.

use super::helpers::{
    self, base_confidence, check_range, highest_high, lowest_low, trailing_avg_body,
    trend_before, Formation, LevelRule, AVG_PERIOD, GEOMETRY_FLOOR, SIZE_TIERS,
};
use crate::{
    scoring::{tier, tier_at_most, trend_points, Factor},
    Direction, MarketContext, OHLCVExt, PatternDetector, PatternKind, PatternMatch, Result,
    OHLCV,
};

impl_with_defaults!(RisingThreeMethodsDetector, FallingThreeMethodsDetector);

const FORMATION_BARS: usize = 5;
const MIN_BARS: usize = 12;
const TREND_LOOKBACK: usize = MIN_BARS - FORMATION_BARS;

/// Entry off the final bar, stop beyond the first (large) bar
const LEVELS: LevelRule = LevelRule::new(0.001, 0.005);

/// Consolidation span over the first bar's range: `(maximum share, points)`
const TIGHTNESS_TIERS: &[(f64, f64)] = &[(0.5, 2.0), (0.75, 1.5)];
const TIGHTNESS_FLOOR: f64 = 1.0;

/// Thresholds shared by both directions
#[derive(Debug, Clone, Copy)]
struct MethodsRules {
    min_first_body_ratio: f64,
    max_pullback_body: f64,
}

// ============================================================
// RISING / FALLING THREE METHODS
// ============================================================

/// Rising Three Methods: long bullish bar, three small bars held inside its range,
/// then a bullish bar closing above the first close
#[derive(Debug, Clone)]
pub struct RisingThreeMethodsDetector {
    /// First body as a fraction of its range
    pub min_first_body_ratio: f64,
    /// Each middle body as a fraction of the first body
    pub max_pullback_body: f64,
}

impl Default for RisingThreeMethodsDetector {
    fn default() -> Self {
        Self {
            min_first_body_ratio: 0.6,
            max_pullback_body: 0.5,
        }
    }
}

impl PatternDetector for RisingThreeMethodsDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::RisingThreeMethods
    }

    fn min_bars(&self) -> usize {
        MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        let rules = MethodsRules {
            min_first_body_ratio: self.min_first_body_ratio,
            max_pullback_body: self.max_pullback_body,
        };
        three_methods(self.kind(), Direction::Bullish, rules, bars, ctx)
    }

    fn validate_config(&self) -> Result<()> {
        check_range("min_first_body_ratio", self.min_first_body_ratio, 0.3, 1.0)?;
        check_range("max_pullback_body", self.max_pullback_body, 0.1, 1.0)
    }
}

/// Falling Three Methods: long bearish bar, three small bars held inside its range,
/// then a bearish bar closing below the first close
#[derive(Debug, Clone)]
pub struct FallingThreeMethodsDetector {
    pub min_first_body_ratio: f64,
    pub max_pullback_body: f64,
}

impl Default for FallingThreeMethodsDetector {
    fn default() -> Self {
        Self {
            min_first_body_ratio: 0.6,
            max_pullback_body: 0.5,
        }
    }
}

impl PatternDetector for FallingThreeMethodsDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::FallingThreeMethods
    }

    fn min_bars(&self) -> usize {
        MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        let rules = MethodsRules {
            min_first_body_ratio: self.min_first_body_ratio,
            max_pullback_body: self.max_pullback_body,
        };
        three_methods(self.kind(), Direction::Bearish, rules, bars, ctx)
    }

    fn validate_config(&self) -> Result<()> {
        check_range("min_first_body_ratio", self.min_first_body_ratio, 0.3, 1.0)?;
        check_range("max_pullback_body", self.max_pullback_body, 0.1, 1.0)
    }
}

fn three_methods<T: OHLCV>(
    kind: PatternKind,
    signal: Direction,
    rules: MethodsRules,
    bars: &[T],
    ctx: &MarketContext,
) -> Result<Option<PatternMatch>> {
    let n = bars.len();
    if n < MIN_BARS {
        return Ok(None);
    }
    let start = n - FORMATION_BARS;
    let first = &bars[start];
    let middle = &bars[start + 1..n - 1];
    let last = &bars[n - 1];

    let Some(first_ratio) = first.body_ratio() else {
        return Ok(None);
    };
    let first_body = first.body();
    let avg_body = trailing_avg_body(bars, start, AVG_PERIOD);
    if first_ratio < rules.min_first_body_ratio || first_body <= avg_body {
        return Ok(None);
    }

    let directional = |b: &T| {
        if signal.is_bullish() {
            b.is_bullish()
        } else {
            b.is_bearish()
        }
    };
    let beyond_first = if signal.is_bullish() {
        last.close() > first.close()
    } else {
        last.close() < first.close()
    };
    if !directional(first) || !directional(last) || !beyond_first {
        return Ok(None);
    }

    // Pullback bars stay inside the first range with small bodies
    let contained = middle.iter().all(|b| {
        b.high() <= first.high()
            && b.low() >= first.low()
            && b.body() <= rules.max_pullback_body * first_body
    });
    if !contained {
        return Ok(None);
    }

    let trend = trend_before(bars, start, TREND_LOOKBACK).unwrap_or(0.0);
    let dominance = if avg_body > f64::EPSILON {
        first_body / avg_body
    } else {
        SIZE_TIERS[0].0
    };
    let tightness = (highest_high(middle) - lowest_low(middle)) / first.range();
    let confidence = base_confidence(signal, ctx)
        .with(Factor::Geometry, tier(dominance, SIZE_TIERS, GEOMETRY_FLOOR))
        .with(
            Factor::Trend,
            trend_points(helpers::prior_move_with(signal, trend)),
        )
        .with(
            Factor::Position,
            tier_at_most(tightness, TIGHTNESS_TIERS, TIGHTNESS_FLOOR),
        );

    Formation {
        kind,
        signal,
        start,
        levels: LEVELS.levels(signal, last, &bars[start..=start], ctx),
        confidence,
        description: format!(
            "{} (pullback spans {:.0}% of the first bar) extending a {:+.1}% move",
            kind.name(),
            tightness * 100.0,
            trend
        ),
    }
    .finish(bars, ctx)
}
