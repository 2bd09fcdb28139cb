//! Confidence scoring shared by every detector
//!
//! A score is the sum of five independently bucketed factors:
//!
//! | Factor   | Points  | Measures                                           |
//! |----------|---------|----------------------------------------------------|
//! | Geometry | 0-2.5   | body/wick ratio, penetration depth or candle size  |
//! | Volume   | 0-2.5   | current volume over average volume                 |
//! | Trend    | 0-3.0   | % move over the bars preceding the formation       |
//! | Position | 0-2.0   | swing proximity, body placement, tightness         |
//! | Regime   | 0-1.0   | agreement with the supplied market regime          |
//!
//! The sum is capped at [`MAX_SCORE`] and rounded to one decimal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Direction, MarketRegime};

/// Upper bound of a confidence score
pub const MAX_SCORE: f64 = 10.0;

/// Volume ratio tiers: `(minimum ratio, points)`
pub const VOLUME_TIERS: &[(f64, f64)] = &[(2.0, 2.5), (1.5, 2.0), (1.2, 1.5)];
/// Points when volume does not reach the lowest tier
pub const VOLUME_FLOOR: f64 = 1.0;

/// Antecedent trend tiers: `(minimum % move, points)`
pub const TREND_TIERS: &[(f64, f64)] = &[(5.0, 3.0), (3.0, 2.5), (2.0, 2.0), (1.0, 1.5), (0.5, 1.0)];

/// Swing proximity tiers: `(maximum % distance from the swing extreme, points)`
pub const SWING_TIERS: &[(f64, f64)] = &[(0.0, 2.0), (0.5, 1.5), (1.5, 1.0)];
pub const SWING_FLOOR: f64 = 0.5;

/// Wick balance tiers: `(minimum shorter/longer wick ratio, points)`
pub const BALANCE_TIERS: &[(f64, f64)] = &[(0.8, 2.0), (0.6, 1.5)];
pub const BALANCE_FLOOR: f64 = 1.0;

/// One component of a confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Geometry,
    Volume,
    Trend,
    Position,
    Regime,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::Geometry,
        Factor::Volume,
        Factor::Trend,
        Factor::Position,
        Factor::Regime,
    ];

    /// Most points this factor can contribute
    pub const fn max_points(self) -> f64 {
        match self {
            Factor::Geometry | Factor::Volume => 2.5,
            Factor::Trend => 3.0,
            Factor::Position => 2.0,
            Factor::Regime => 1.0,
        }
    }
}

/// First tier whose threshold `value` reaches, else `floor`.
/// Tiers must be ordered from the highest threshold down.
#[inline]
pub fn tier(value: f64, tiers: &[(f64, f64)], floor: f64) -> f64 {
    tiers
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map_or(floor, |(_, points)| *points)
}

/// First tier whose threshold `value` stays at or under, else `floor`.
/// Tiers must be ordered from the lowest threshold up.
#[inline]
pub fn tier_at_most(value: f64, tiers: &[(f64, f64)], floor: f64) -> f64 {
    tiers
        .iter()
        .find(|(threshold, _)| value <= *threshold)
        .map_or(floor, |(_, points)| *points)
}

/// Current over average volume. Falls back to 1.0 when the average is unusable.
pub fn volume_ratio(current: f64, avg_volume: f64) -> f64 {
    if avg_volume > 0.0 && avg_volume.is_finite() && current.is_finite() {
        current / avg_volume
    } else {
        1.0
    }
}

#[inline]
pub fn volume_points(ratio: f64) -> f64 {
    tier(ratio, VOLUME_TIERS, VOLUME_FLOOR)
}

/// Points for a favourable % move; zero or adverse moves score nothing.
#[inline]
pub fn trend_points(move_pct: f64) -> f64 {
    tier(move_pct, TREND_TIERS, 0.0)
}

/// Points for how close a formation extreme sits to the window's swing extreme
#[inline]
pub fn swing_points(distance_pct: f64) -> f64 {
    tier_at_most(distance_pct, SWING_TIERS, SWING_FLOOR)
}

/// Points for how evenly the two wicks split the range
pub fn balance_points(upper_wick: f64, lower_wick: f64) -> f64 {
    let longer = upper_wick.max(lower_wick);
    if longer <= f64::EPSILON {
        return BALANCE_FLOOR;
    }
    tier(upper_wick.min(lower_wick) / longer, BALANCE_TIERS, BALANCE_FLOOR)
}

pub fn regime_points(signal: Direction, regime: MarketRegime) -> f64 {
    match (signal, regime) {
        (Direction::Bullish, MarketRegime::Bullish) | (Direction::Bearish, MarketRegime::Bearish) => {
            1.0
        },
        (_, MarketRegime::Neutral) | (Direction::Neutral, _) => 0.5,
        _ => 0.0,
    }
}

#[inline]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Accumulates factor points for one candidate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Confidence {
    points: BTreeMap<Factor, f64>,
}

impl Confidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record points for a factor, clamped to that factor's range
    pub fn with(mut self, factor: Factor, points: f64) -> Self {
        self.points.insert(factor, points.clamp(0.0, factor.max_points()));
        self
    }

    #[inline]
    pub fn points(&self, factor: Factor) -> f64 {
        self.points.get(&factor).copied().unwrap_or(0.0)
    }

    /// Sum of all factors before capping and rounding
    pub fn raw(&self) -> f64 {
        self.points.values().sum()
    }

    /// Final score: capped at [`MAX_SCORE`], rounded to one decimal
    pub fn score(&self) -> f64 {
        round1(self.raw().clamp(0.0, MAX_SCORE))
    }

    pub fn breakdown(&self) -> &BTreeMap<Factor, f64> {
        &self.points
    }

    pub fn into_breakdown(self) -> BTreeMap<Factor, f64> {
        self.points
    }
}
