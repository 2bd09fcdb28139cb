//! Three-bar detectors
//!
//! Patterns: Morning Star, Evening Star, Three White Soldiers, Three Black Crows.

use super::helpers::{
  self, base_confidence, check_range, swing_position, trend_before, Formation, LevelRule,
  GEOMETRY_FLOOR,
};
use crate::{
  scoring::{tier, tier_at_most, trend_points, Factor},
  Direction, MarketContext, OHLCVExt, PatternDetector, PatternKind, PatternMatch, Result, OHLCV,
};

impl_with_defaults!(
  MorningStarDetector,
  EveningStarDetector,
  ThreeWhiteSoldiersDetector,
  ThreeBlackCrowsDetector,
);

const MIN_BARS: usize = 12;
const TREND_LOOKBACK: usize = MIN_BARS - 3;

const STAR_LEVELS: LevelRule = LevelRule::new(0.001, 0.005);
const SOLDIER_LEVELS: LevelRule = LevelRule::new(0.001, 0.005);

/// Third close into the first body: `(minimum fraction, points)`
const STAR_PENETRATION_TIERS: &[(f64, f64)] = &[(1.0, 2.5), (0.75, 2.0), (0.6, 1.5)];
/// Average body as % of price: `(minimum %, points)`
const SOLDIER_SIZE_TIERS: &[(f64, f64)] = &[(2.0, 2.5), (1.25, 2.0), (0.75, 1.5)];
/// Worst closing wick over body: `(maximum ratio, points)`
const CLEAN_CLOSE_TIERS: &[(f64, f64)] = &[(0.1, 2.0), (0.25, 1.5)];
const CLEAN_CLOSE_FLOOR: f64 = 1.0;

// ============================================================
// MORNING STAR / EVENING STAR
// ============================================================

#[derive(Debug, Clone, Copy)]
struct StarRules {
  min_first_body_ratio: f64,
  max_star_body: f64,
  min_penetration: f64,
}

/// Morning Star: long bearish bar, small star below its midpoint, bullish bar closing
/// at least half way back into the first body
#[derive(Debug, Clone)]
pub struct MorningStarDetector {
  /// First body as a fraction of its range
  pub min_first_body_ratio: f64,
  /// Star body as a fraction of the first body
  pub max_star_body: f64,
  /// Third close into the first body, as a fraction of it
  pub min_penetration: f64,
}

impl Default for MorningStarDetector {
  fn default() -> Self {
    Self { min_first_body_ratio: 0.6, max_star_body: 0.3, min_penetration: 0.5 }
  }
}

impl PatternDetector for MorningStarDetector {
  fn kind(&self) -> PatternKind {
    PatternKind::MorningStar
  }

  fn min_bars(&self) -> usize {
    MIN_BARS
  }

  fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
    let rules = StarRules {
      min_first_body_ratio: self.min_first_body_ratio,
      max_star_body: self.max_star_body,
      min_penetration: self.min_penetration,
    };
    star(self.kind(), Direction::Bullish, rules, bars, ctx)
  }

  fn validate_config(&self) -> Result<()> {
    check_range("min_first_body_ratio", self.min_first_body_ratio, 0.3, 1.0)?;
    check_range("max_star_body", self.max_star_body, 0.0, 0.5)?;
    check_range("min_penetration", self.min_penetration, 0.5, 1.0)
  }
}

/// Evening Star: long bullish bar, small star above its midpoint, bearish bar closing
/// at least half way back into the first body
#[derive(Debug, Clone)]
pub struct EveningStarDetector {
  pub min_first_body_ratio: f64,
  pub max_star_body: f64,
  pub min_penetration: f64,
}

impl Default for EveningStarDetector {
  fn default() -> Self {
    Self { min_first_body_ratio: 0.6, max_star_body: 0.3, min_penetration: 0.5 }
  }
}

impl PatternDetector for EveningStarDetector {
  fn kind(&self) -> PatternKind {
    PatternKind::EveningStar
  }

  fn min_bars(&self) -> usize {
    MIN_BARS
  }

  fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
    let rules = StarRules {
      min_first_body_ratio: self.min_first_body_ratio,
      max_star_body: self.max_star_body,
      min_penetration: self.min_penetration,
    };
    star(self.kind(), Direction::Bearish, rules, bars, ctx)
  }

  fn validate_config(&self) -> Result<()> {
    check_range("min_first_body_ratio", self.min_first_body_ratio, 0.3, 1.0)?;
    check_range("max_star_body", self.max_star_body, 0.0, 0.5)?;
    check_range("min_penetration", self.min_penetration, 0.5, 1.0)
  }
}

fn star<T: OHLCV>(
  kind: PatternKind,
  signal: Direction,
  rules: StarRules,
  bars: &[T],
  ctx: &MarketContext,
) -> Result<Option<PatternMatch>> {
  let n = bars.len();
  if n < MIN_BARS {
    return Ok(None);
  }
  let start = n - 3;
  let (first, star_bar, third) = (&bars[start], &bars[start + 1], &bars[n - 1]);
  let first_body = first.body();
  let Some(first_ratio) = first.body_ratio() else {
    return Ok(None);
  };
  if first_ratio < rules.min_first_body_ratio || first_body <= f64::EPSILON {
    return Ok(None);
  }
  if star_bar.body() > rules.max_star_body * first_body {
    return Ok(None);
  }

  // Star beyond the first midpoint, third bar turning back
  let (shape, depth) = if signal.is_bullish() {
    (
      first.is_bearish() && third.is_bullish() && star_bar.body_top() <= first.body_mid(),
      (third.close() - first.close()) / first_body,
    )
  } else {
    (
      first.is_bullish() && third.is_bearish() && star_bar.body_bottom() >= first.body_mid(),
      (first.close() - third.close()) / first_body,
    )
  };
  if !shape || depth < rules.min_penetration {
    return Ok(None);
  }

  let trend = trend_before(bars, start, TREND_LOOKBACK).unwrap_or(0.0);
  let confidence = base_confidence(signal, ctx)
    .with(Factor::Geometry, tier(depth, STAR_PENETRATION_TIERS, GEOMETRY_FLOOR))
    .with(Factor::Trend, trend_points(helpers::prior_move_against(signal, trend)))
    .with(Factor::Position, swing_position(signal, bars, &bars[start..]));

  Formation {
    kind,
    signal,
    start,
    levels: STAR_LEVELS.levels(signal, third, &bars[start + 1..start + 2], ctx),
    confidence,
    description: format!(
      "{} ({:.0}% recovery of the first body) after {:+.1}% move",
      kind.name(),
      depth * 100.0,
      trend
    ),
  }
  .finish(bars, ctx)
}

// ============================================================
// THREE WHITE SOLDIERS / THREE BLACK CROWS
// ============================================================

/// Three White Soldiers: three long bullish bars, each opening inside the prior body and
/// closing above the prior close
#[derive(Debug, Clone)]
pub struct ThreeWhiteSoldiersDetector {
  /// Each body as a fraction of its range
  pub min_body_ratio: f64,
}

impl Default for ThreeWhiteSoldiersDetector {
  fn default() -> Self {
    Self { min_body_ratio: 0.6 }
  }
}

impl PatternDetector for ThreeWhiteSoldiersDetector {
  fn kind(&self) -> PatternKind {
    PatternKind::ThreeWhiteSoldiers
  }

  fn min_bars(&self) -> usize {
    MIN_BARS
  }

  fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
    three_line(self.kind(), Direction::Bullish, self.min_body_ratio, bars, ctx)
  }

  fn validate_config(&self) -> Result<()> {
    check_range("min_body_ratio", self.min_body_ratio, 0.3, 1.0)
  }
}

/// Three Black Crows: three long bearish bars, each opening inside the prior body and
/// closing below the prior close
#[derive(Debug, Clone)]
pub struct ThreeBlackCrowsDetector {
  pub min_body_ratio: f64,
}

impl Default for ThreeBlackCrowsDetector {
  fn default() -> Self {
    Self { min_body_ratio: 0.6 }
  }
}

impl PatternDetector for ThreeBlackCrowsDetector {
  fn kind(&self) -> PatternKind {
    PatternKind::ThreeBlackCrows
  }

  fn min_bars(&self) -> usize {
    MIN_BARS
  }

  fn detect<T: OHLCV>(&self, bars: &[T], ctx: &MarketContext) -> Result<Option<PatternMatch>> {
    three_line(self.kind(), Direction::Bearish, self.min_body_ratio, bars, ctx)
  }

  fn validate_config(&self) -> Result<()> {
    check_range("min_body_ratio", self.min_body_ratio, 0.3, 1.0)
  }
}

fn three_line<T: OHLCV>(
  kind: PatternKind,
  signal: Direction,
  min_body_ratio: f64,
  bars: &[T],
  ctx: &MarketContext,
) -> Result<Option<PatternMatch>> {
  let n = bars.len();
  if n < MIN_BARS {
    return Ok(None);
  }
  let start = n - 3;
  let line = &bars[start..];

  for b in line {
    let coloured = if signal.is_bullish() { b.is_bullish() } else { b.is_bearish() };
    match b.body_ratio() {
      Some(ratio) if coloured && ratio >= min_body_ratio => {},
      _ => return Ok(None),
    }
  }
  // Open inside the prior body, close beyond the prior close
  let stepped = line.windows(2).all(|w| {
    let (prev, curr) = (&w[0], &w[1]);
    let opens_inside = curr.open() >= prev.body_bottom() && curr.open() <= prev.body_top();
    let advances = if signal.is_bullish() {
      curr.close() > prev.close()
    } else {
      curr.close() < prev.close()
    };
    opens_inside && advances
  });
  if !stepped {
    return Ok(None);
  }

  let avg_body_pct = line
    .iter()
    .map(|b| if b.open() > f64::EPSILON { b.body() / b.open() * 100.0 } else { 0.0 })
    .sum::<f64>()
    / line.len() as f64;
  // Wick left beyond the close in the direction of travel
  let worst_wick = line
    .iter()
    .map(|b| {
      let wick = if signal.is_bullish() { b.upper_wick() } else { b.lower_wick() };
      wick / b.body()
    })
    .fold(0.0, f64::max);

  let trend = trend_before(bars, start, TREND_LOOKBACK).unwrap_or(0.0);
  let confidence = base_confidence(signal, ctx)
    .with(Factor::Geometry, tier(avg_body_pct, SOLDIER_SIZE_TIERS, GEOMETRY_FLOOR))
    .with(Factor::Trend, trend_points(helpers::prior_move_against(signal, trend)))
    .with(Factor::Position, tier_at_most(worst_wick, CLEAN_CLOSE_TIERS, CLEAN_CLOSE_FLOOR));

  Formation {
    kind,
    signal,
    start,
    levels: SOLDIER_LEVELS.levels(signal, &bars[n - 1], &bars[start..=start], ctx),
    confidence,
    description: format!(
      "{} (avg body {:.1}% of price) after {:+.1}% move",
      kind.name(),
      avg_body_pct,
      trend
    ),
  }
  .finish(bars, ctx)
}
