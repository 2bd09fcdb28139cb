//! Single-bar detectors
//!
//! Patterns: Hammer, Shooting Star, Inverted Hammer, Hanging Man (wick-dominant);
//! Doji, Spinning Top, Long-Legged Doji (indecision); Bullish/Bearish Marubozu.
//!
//! A single bar says little on its own, so each family leans on the trend before it:
//! wick shapes need a measured move to reverse, indecision takes its bias from the prior
//! move, and a marubozu must continue one.

use super::helpers::{
    self, base_confidence, check_range, trailing_avg_range, trend_before, Formation, LevelRule,
    AVG_PERIOD, GEOMETRY_FLOOR,
};
use crate::{
    scoring::{balance_points, tier, tier_at_most, trend_points, Factor},
    Direction, MarketContext, OHLCVExt, PatternDetector, PatternKind, PatternMatch, Result,
    OHLCV,
};

impl_with_defaults!(
    HammerDetector,
    ShootingStarDetector,
    InvertedHammerDetector,
    HangingManDetector,
    DojiDetector,
    SpinningTopDetector,
    LongLeggedDojiDetector,
    BullishMarubozuDetector,
    BearishMarubozuDetector,
);

// ============================================================
// HAMMER FAMILY
// ============================================================

const WICK_MIN_BARS: usize = 9;
const WICK_TREND_LOOKBACK: usize = WICK_MIN_BARS - 1;
const WICK_LEVELS: LevelRule = LevelRule::new(0.002, 0.003);

/// Dominant wick over body: `(minimum multiple, points)`
const WICK_TIERS: &[(f64, f64)] = &[(4.0, 2.5), (3.0, 2.0), (2.5, 1.5)];
/// Body placement at the far end of the range: `(minimum placement, points)`
const PLACEMENT_TIERS: &[(f64, f64)] = &[(0.9, 2.0), (0.8, 1.5)];
const PLACEMENT_FLOOR: f64 = 1.0;

/// Body must sit in the outer third, away from the dominant wick
const OUTER_THIRD: f64 = 2.0 / 3.0;

#[derive(Debug, Clone, Copy)]
enum Wick {
    Lower,
    Upper,
}

macro_rules! wick_detector {
    ($(#[$doc:meta])* $name:ident => $kind:ident, $signal:ident, $wick:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            /// Dominant wick as a multiple of the body
            pub min_wick_body_ratio: f64,
            /// Opposite wick as a multiple of the body
            pub max_opposite_wick_ratio: f64,
            /// Prior move (%) the bar must be reversing
            pub min_trend_pct: f64,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    min_wick_body_ratio: 2.0,
                    max_opposite_wick_ratio: 0.3,
                    min_trend_pct: 1.0,
                }
            }
        }

        impl PatternDetector for $name {
            fn kind(&self) -> PatternKind {
                PatternKind::$kind
            }

            fn min_bars(&self) -> usize {
                WICK_MIN_BARS
            }

            fn detect<T: OHLCV>(
                &self,
                bars: &[T],
                ctx: &MarketContext,
            ) -> Result<Option<PatternMatch>> {
                let shape = WickShape {
                    kind: PatternKind::$kind,
                    signal: Direction::$signal,
                    wick: Wick::$wick,
                };
                wick_reversal(
                    shape,
                    self.min_wick_body_ratio,
                    self.max_opposite_wick_ratio,
                    self.min_trend_pct,
                    bars,
                    ctx,
                )
            }

            fn validate_config(&self) -> Result<()> {
                check_range("min_wick_body_ratio", self.min_wick_body_ratio, 1.0, 10.0)?;
                check_range("max_opposite_wick_ratio", self.max_opposite_wick_ratio, 0.0, 1.0)?;
                check_range("min_trend_pct", self.min_trend_pct, 0.0, 20.0)
            }
        }
    };
}

wick_detector! {
    /// Hammer: long lower wick, body near the high, after a decline
    HammerDetector => Hammer, Bullish, Lower
}

wick_detector! {
    /// Shooting Star: long upper wick, body near the low, after a rise
    ShootingStarDetector => ShootingStar, Bearish, Upper
}

wick_detector! {
    /// Inverted Hammer: long upper wick, body near the low, after a decline
    InvertedHammerDetector => InvertedHammer, Bullish, Upper
}

wick_detector! {
    /// Hanging Man: long lower wick, body near the high, after a rise
    HangingManDetector => HangingMan, Bearish, Lower
}

#[derive(Debug, Clone, Copy)]
struct WickShape {
    kind: PatternKind,
    signal: Direction,
    wick: Wick,
}

fn wick_reversal<T: OHLCV>(
    shape: WickShape,
    min_wick_body_ratio: f64,
    max_opposite_wick_ratio: f64,
    min_trend_pct: f64,
    bars: &[T],
    ctx: &MarketContext,
) -> Result<Option<PatternMatch>> {
    let n = bars.len();
    if n < WICK_MIN_BARS {
        return Ok(None);
    }
    let bar = &bars[n - 1];
    let body = bar.body();
    let Some(position) = bar.body_position() else {
        return Ok(None);
    };
    if body <= f64::EPSILON {
        return Ok(None);
    }

    let (dominant, opposite, placement) = match shape.wick {
        Wick::Lower => (bar.lower_wick(), bar.upper_wick(), position),
        Wick::Upper => (bar.upper_wick(), bar.lower_wick(), 1.0 - position),
    };
    if dominant < min_wick_body_ratio * body
        || opposite > max_opposite_wick_ratio * body
        || placement < OUTER_THIRD
    {
        return Ok(None);
    }

    let Some(trend) = trend_before(bars, n - 1, WICK_TREND_LOOKBACK) else {
        return Ok(None);
    };
    let reversed = helpers::prior_move_against(shape.signal, trend);
    if reversed < min_trend_pct {
        return Ok(None);
    }

    let wick_multiple = dominant / body;
    let confidence = base_confidence(shape.signal, ctx)
        .with(
            Factor::Geometry,
            tier(wick_multiple, WICK_TIERS, GEOMETRY_FLOOR),
        )
        .with(Factor::Trend, trend_points(reversed))
        .with(
            Factor::Position,
            tier(placement, PLACEMENT_TIERS, PLACEMENT_FLOOR),
        );

    Formation {
        kind: shape.kind,
        signal: shape.signal,
        start: n - 1,
        levels: WICK_LEVELS.levels(shape.signal, bar, &bars[n - 1..], ctx),
        confidence,
        description: format!(
            "{} (wick {:.1}x body) after {:+.1}% move",
            shape.kind.name(),
            wick_multiple,
            trend
        ),
    }
    .finish(bars, ctx)
}

// ============================================================
// INDECISION
// ============================================================

const INDECISION_MIN_BARS: usize = 11;
const INDECISION_TREND_LOOKBACK: usize = INDECISION_MIN_BARS - 1;
const INDECISION_LEVELS: LevelRule = LevelRule::new(0.001, 0.003);

/// Both wicks at least this share of the range make a doji long-legged
pub const LONG_LEG_RATIO: f64 = 0.4;
/// Long-Legged Doji targets reach further than the other indecision bars
pub const LONG_LEGGED_TARGET_SCALE: f64 = 1.5;

/// Body ratio tiers: `(maximum body/range, points)`
const DOJI_BODY_TIERS: &[(f64, f64)] = &[(0.01, 2.5), (0.03, 2.0)];
const DOJI_BODY_FLOOR: f64 = 1.5;
/// Long-Legged Doji range over the trailing average range that earns the bonus
const MIN_RANGE_EXPANSION: f64 = 1.2;
const RANGE_EXPANSION_BONUS: f64 = 0.5;
const SPINNING_BODY_TIERS: &[(f64, f64)] = &[(0.07, 2.0)];
const SPINNING_BODY_FLOOR: f64 = 1.5;

/// Doji: body ≤5% of range with balanced wicks, short of long-legged
#[derive(Debug, Clone)]
pub struct DojiDetector {
    pub max_body_ratio: f64,
    /// Shorter wick over longer wick
    pub min_wick_balance: f64,
    /// Range as % of the close
    pub min_range_pct: f64,
    /// Prior move (%) that gives the bar a directional bias
    pub reversal_trend_pct: f64,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: 0.05,
            min_wick_balance: 0.3,
            min_range_pct: 0.3,
            reversal_trend_pct: 2.0,
        }
    }
}

impl PatternDetector for DojiDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Doji
    }

    fn min_bars(&self) -> usize {
        INDECISION_MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        let Some(bar) = IndecisionBar::last(bars, self.min_range_pct) else {
            return Ok(None);
        };
        let long_legged = bar.upper_ratio >= LONG_LEG_RATIO && bar.lower_ratio >= LONG_LEG_RATIO;
        if bar.body_ratio > self.max_body_ratio
            || bar.balance() < self.min_wick_balance
            || long_legged
        {
            return Ok(None);
        }
        let geometry = tier_at_most(bar.body_ratio, DOJI_BODY_TIERS, DOJI_BODY_FLOOR);
        indecision(self.kind(), geometry, 1.0, self.reversal_trend_pct, bars, ctx)
    }

    fn validate_config(&self) -> Result<()> {
        check_range("max_body_ratio", self.max_body_ratio, 0.0, 0.1)?;
        check_range("min_wick_balance", self.min_wick_balance, 0.0, 1.0)?;
        check_range("reversal_trend_pct", self.reversal_trend_pct, 0.0, 20.0)
    }
}

/// Spinning Top: small body in (5%, 10%] of range with balanced wicks
#[derive(Debug, Clone)]
pub struct SpinningTopDetector {
    /// Exclusive lower bound, keeping dojis out
    pub min_body_ratio: f64,
    pub max_body_ratio: f64,
    pub min_wick_balance: f64,
    pub min_range_pct: f64,
    pub reversal_trend_pct: f64,
}

impl Default for SpinningTopDetector {
    fn default() -> Self {
        Self {
            min_body_ratio: 0.05,
            max_body_ratio: 0.10,
            min_wick_balance: 0.3,
            min_range_pct: 0.3,
            reversal_trend_pct: 2.0,
        }
    }
}

impl PatternDetector for SpinningTopDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::SpinningTop
    }

    fn min_bars(&self) -> usize {
        INDECISION_MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        let Some(bar) = IndecisionBar::last(bars, self.min_range_pct) else {
            return Ok(None);
        };
        if bar.body_ratio <= self.min_body_ratio
            || bar.body_ratio > self.max_body_ratio
            || bar.balance() < self.min_wick_balance
        {
            return Ok(None);
        }
        let geometry = tier_at_most(bar.body_ratio, SPINNING_BODY_TIERS, SPINNING_BODY_FLOOR);
        indecision(self.kind(), geometry, 1.0, self.reversal_trend_pct, bars, ctx)
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_body_ratio >= self.max_body_ratio {
            return Err(crate::PatternError::InvalidConfig(
                "spinning top body bounds are inverted".into(),
            ));
        }
        check_range("max_body_ratio", self.max_body_ratio, 0.0, 0.3)?;
        check_range("min_wick_balance", self.min_wick_balance, 0.0, 1.0)
    }
}

/// Long-Legged Doji: doji body with both wicks at least 40% of the range
#[derive(Debug, Clone)]
pub struct LongLeggedDojiDetector {
    pub max_body_ratio: f64,
    /// Each wick as a share of the range
    pub min_leg_ratio: f64,
    pub min_range_pct: f64,
    pub reversal_trend_pct: f64,
}

impl Default for LongLeggedDojiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: 0.05,
            min_leg_ratio: LONG_LEG_RATIO,
            min_range_pct: 0.3,
            reversal_trend_pct: 2.0,
        }
    }
}

impl PatternDetector for LongLeggedDojiDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::LongLeggedDoji
    }

    fn min_bars(&self) -> usize {
        INDECISION_MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        let Some(bar) = IndecisionBar::last(bars, self.min_range_pct) else {
            return Ok(None);
        };
        if bar.body_ratio > self.max_body_ratio
            || bar.upper_ratio < self.min_leg_ratio
            || bar.lower_ratio < self.min_leg_ratio
        {
            return Ok(None);
        }

        // Doji body tiers, plus a bonus when the range stretches past the bars before it
        let n = bars.len();
        let avg_range = trailing_avg_range(bars, n - 1, AVG_PERIOD);
        let expanded =
            avg_range > f64::EPSILON && bars[n - 1].range() / avg_range >= MIN_RANGE_EXPANSION;
        let geometry = tier_at_most(bar.body_ratio, DOJI_BODY_TIERS, DOJI_BODY_FLOOR)
            + if expanded { RANGE_EXPANSION_BONUS } else { 0.0 };
        indecision(
            self.kind(),
            geometry,
            LONG_LEGGED_TARGET_SCALE,
            self.reversal_trend_pct,
            bars,
            ctx,
        )
    }

    fn validate_config(&self) -> Result<()> {
        check_range("max_body_ratio", self.max_body_ratio, 0.0, 0.1)?;
        check_range("min_leg_ratio", self.min_leg_ratio, 0.0, 0.5)?;
        check_range("reversal_trend_pct", self.reversal_trend_pct, 0.0, 20.0)
    }
}

/// Shape ratios of the last bar, once it passes the shared range gates
struct IndecisionBar {
    body_ratio: f64,
    upper_ratio: f64,
    lower_ratio: f64,
}

impl IndecisionBar {
    fn last<T: OHLCV>(bars: &[T], min_range_pct: f64) -> Option<Self> {
        if bars.len() < INDECISION_MIN_BARS {
            return None;
        }
        let bar = bars.last()?;
        let close = bar.close();
        if close <= f64::EPSILON || bar.range() / close * 100.0 < min_range_pct {
            return None;
        }
        let shape = Self {
            body_ratio: bar.body_ratio()?,
            upper_ratio: bar.upper_wick_ratio()?,
            lower_ratio: bar.lower_wick_ratio()?,
        };
        // Both wicks present
        (shape.upper_ratio > 0.0 && shape.lower_ratio > 0.0).then_some(shape)
    }

    fn balance(&self) -> f64 {
        self.upper_ratio.min(self.lower_ratio) / self.upper_ratio.max(self.lower_ratio)
    }
}

/// Score an indecision bar, taking its bias from the prior move
fn indecision<T: OHLCV>(
    kind: PatternKind,
    geometry: f64,
    target_scale: f64,
    reversal_trend_pct: f64,
    bars: &[T],
    ctx: &MarketContext,
) -> Result<Option<PatternMatch>> {
    let n = bars.len();
    let bar = &bars[n - 1];
    let trend = trend_before(bars, n - 1, INDECISION_TREND_LOOKBACK).unwrap_or(0.0);
    let signal = if trend >= reversal_trend_pct {
        Direction::Bearish
    } else if trend <= -reversal_trend_pct {
        Direction::Bullish
    } else {
        Direction::Neutral
    };

    let confidence = base_confidence(signal, ctx)
        .with(Factor::Geometry, geometry)
        .with(Factor::Trend, trend_points(trend.abs()))
        .with(
            Factor::Position,
            balance_points(bar.upper_wick(), bar.lower_wick()),
        );

    Formation {
        kind,
        signal,
        start: n - 1,
        levels: INDECISION_LEVELS.scaled(target_scale).levels(signal, bar, &bars[n - 1..], ctx),
        confidence,
        description: format!("{} ({} bias) after {:+.1}% move", kind.name(), signal, trend),
    }
    .finish(bars, ctx)
}

// ============================================================
// MARUBOZU
// ============================================================

const MARUBOZU_MIN_BARS: usize = 11;
const MARUBOZU_TREND_LOOKBACK: usize = MARUBOZU_MIN_BARS - 1;
const MARUBOZU_LEVELS: LevelRule = LevelRule::new(0.001, 0.003);

/// Body as % of the open: `(minimum %, points)`
const MARUBOZU_SIZE_TIERS: &[(f64, f64)] = &[(3.0, 2.5), (2.0, 2.0), (1.0, 1.5)];
/// Body/range cleanliness: `(minimum ratio, points)`
const CLEAN_BODY_TIERS: &[(f64, f64)] = &[(0.99, 2.0), (0.97, 1.5)];
const CLEAN_BODY_FLOOR: f64 = 1.0;

/// Bullish Marubozu: near wickless bullish bar continuing a rise
#[derive(Debug, Clone)]
pub struct BullishMarubozuDetector {
    pub min_body_ratio: f64,
    /// Prior move (%) in the bar's direction
    pub min_trend_pct: f64,
}

impl Default for BullishMarubozuDetector {
    fn default() -> Self {
        Self {
            min_body_ratio: 0.95,
            min_trend_pct: 1.0,
        }
    }
}

impl PatternDetector for BullishMarubozuDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::BullishMarubozu
    }

    fn min_bars(&self) -> usize {
        MARUBOZU_MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        marubozu(
            self.kind(),
            Direction::Bullish,
            self.min_body_ratio,
            self.min_trend_pct,
            bars,
            ctx,
        )
    }

    fn validate_config(&self) -> Result<()> {
        check_range("min_body_ratio", self.min_body_ratio, 0.8, 1.0)?;
        check_range("min_trend_pct", self.min_trend_pct, 0.0, 20.0)
    }
}

/// Bearish Marubozu: near wickless bearish bar continuing a decline
#[derive(Debug, Clone)]
pub struct BearishMarubozuDetector {
    pub min_body_ratio: f64,
    pub min_trend_pct: f64,
}

impl Default for BearishMarubozuDetector {
    fn default() -> Self {
        Self {
            min_body_ratio: 0.95,
            min_trend_pct: 1.0,
        }
    }
}

impl PatternDetector for BearishMarubozuDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::BearishMarubozu
    }

    fn min_bars(&self) -> usize {
        MARUBOZU_MIN_BARS
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
        marubozu(
            self.kind(),
            Direction::Bearish,
            self.min_body_ratio,
            self.min_trend_pct,
            bars,
            ctx,
        )
    }

    fn validate_config(&self) -> Result<()> {
        check_range("min_body_ratio", self.min_body_ratio, 0.8, 1.0)?;
        check_range("min_trend_pct", self.min_trend_pct, 0.0, 20.0)
    }
}

fn marubozu<T: OHLCV>(
    kind: PatternKind,
    signal: Direction,
    min_body_ratio: f64,
    min_trend_pct: f64,
    bars: &[T],
    ctx: &MarketContext,
) -> Result<Option<PatternMatch>> {
    let n = bars.len();
    if n < MARUBOZU_MIN_BARS {
        return Ok(None);
    }
    let bar = &bars[n - 1];
    let Some(body_ratio) = bar.body_ratio() else {
        return Ok(None);
    };
    let coloured = if signal.is_bullish() {
        bar.is_bullish()
    } else {
        bar.is_bearish()
    };
    if !coloured || body_ratio < min_body_ratio || bar.open() <= f64::EPSILON {
        return Ok(None);
    }

    let Some(trend) = trend_before(bars, n - 1, MARUBOZU_TREND_LOOKBACK) else {
        return Ok(None);
    };
    let continued = helpers::prior_move_with(signal, trend);
    if continued < min_trend_pct {
        return Ok(None);
    }

    let body_pct = bar.body() / bar.open() * 100.0;
    let confidence = base_confidence(signal, ctx)
        .with(
            Factor::Geometry,
            tier(body_pct, MARUBOZU_SIZE_TIERS, GEOMETRY_FLOOR),
        )
        .with(Factor::Trend, trend_points(continued))
        .with(
            Factor::Position,
            tier(body_ratio, CLEAN_BODY_TIERS, CLEAN_BODY_FLOOR),
        );

    Formation {
        kind,
        signal,
        start: n - 1,
        levels: MARUBOZU_LEVELS.levels(signal, bar, &bars[n - 1..], ctx),
        confidence,
        description: format!(
            "{} ({:.1}% body) extending a {:+.1}% move",
            kind.name(),
            body_pct,
            trend
        ),
    }
    .finish(bars, ctx)
}
