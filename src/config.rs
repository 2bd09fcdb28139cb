//! Engine configuration and parameter metadata
//!
//! [`EngineConfig`] is fixed at construction time. Its numeric fields are described by
//! [`CONFIG_PARAMS`], which enables:
//! - Range validation when the engine is built
//! - Grid search over settings from a backtesting harness
//! - Parameter documentation
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use candlescore::config::{EngineConfig, CONFIG_PARAMS};
//!
//! for param in CONFIG_PARAMS {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let mut params = HashMap::new();
//! params.insert("min_confidence", 6.0);
//! let config = EngineConfig::with_params(&params).unwrap();
//! assert_eq!(config.min_confidence, 6.0);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{volatility::DEFAULT_ATR_PERIOD, PatternError, PatternKind, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Confidence score on the 0-10 scale
  Score,
  /// Bar count (positive integer)
  Period,
  /// Scale factor applied to ATR or a price buffer
  Multiplier,
}

/// Metadata for a single configuration parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "min_confidence")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for validation and optimization: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn score(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Score, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  pub const fn multiplier(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Multiplier, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if value.is_nan() || value.is_infinite() {
      return Err(PatternError::InvalidValue("parameter cannot be NaN or infinite"));
    }
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Period if value.fract() != 0.0 => {
        Err(PatternError::InvalidValue("Period must be a positive integer"))
      },
      _ => Ok(()),
    }
  }
}

/// Metadata for every numeric field of [`EngineConfig`]
pub const CONFIG_PARAMS: &[ParamMeta] = &[
  ParamMeta::score(
    "min_confidence",
    7.0,
    (0.0, 10.0, 0.5),
    "Matches scoring below this are dropped",
  ),
  ParamMeta::period(
    "lookback_candles",
    50.0,
    (12.0, 500.0, 10.0),
    "Most recent bars considered per call",
  ),
  ParamMeta::period("atr_period", 14.0, (1.0, 100.0, 1.0), "ATR lookback in bars"),
  ParamMeta::multiplier(
    "target_multiplier",
    2.0,
    (0.1, 10.0, 0.5),
    "Target distance from entry in ATRs",
  ),
  ParamMeta::multiplier(
    "stop_multiplier",
    1.0,
    (0.0, 10.0, 0.5),
    "Scale on the structural stop buffer",
  ),
];

/// Metadata for a named setting
pub fn param(name: &str) -> Option<&'static ParamMeta> {
  CONFIG_PARAMS.iter().find(|p| p.name == name)
}

fn known_param(name: &str) -> Result<&'static ParamMeta> {
  param(name).ok_or_else(|| PatternError::InvalidConfig(format!("unknown parameter: {name}")))
}

// ============================================================
// ENGINE CONFIG
// ============================================================

/// Patterns that historically underperform and are off unless re-enabled
pub const DEFAULT_DISABLED: [PatternKind; 3] =
  [PatternKind::SpinningTop, PatternKind::HangingMan, PatternKind::InvertedHammer];

/// Construction-time engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub min_confidence: f64,
  pub lookback_candles: usize,
  pub atr_period: usize,
  pub target_multiplier: f64,
  pub stop_multiplier: f64,
  pub disabled_patterns: Vec<PatternKind>,
  /// Reject malformed bars with an error instead of evaluating them
  pub validate_data: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      min_confidence: 7.0,
      lookback_candles: 50,
      atr_period: DEFAULT_ATR_PERIOD,
      target_multiplier: 2.0,
      stop_multiplier: 1.0,
      disabled_patterns: DEFAULT_DISABLED.to_vec(),
      validate_data: true,
    }
  }
}

impl EngineConfig {
  /// Build from a name -> value map; missing names keep their defaults.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    for name in params.keys() {
      known_param(name)?;
    }
    let get = |name: &str| -> Result<f64> {
      let meta = known_param(name)?;
      let value = params.get(name).copied().unwrap_or(meta.default);
      meta.validate(value)?;
      Ok(value)
    };

    Ok(Self {
      min_confidence: get("min_confidence")?,
      lookback_candles: get("lookback_candles")? as usize,
      atr_period: get("atr_period")? as usize,
      target_multiplier: get("target_multiplier")?,
      stop_multiplier: get("stop_multiplier")?,
      ..Self::default()
    })
  }

  #[inline]
  pub fn is_disabled(&self, kind: PatternKind) -> bool {
    self.disabled_patterns.contains(&kind)
  }

  pub fn validate(&self) -> Result<()> {
    known_param("min_confidence")?.validate(self.min_confidence)?;
    known_param("lookback_candles")?.validate(self.lookback_candles as f64)?;
    known_param("atr_period")?.validate(self.atr_period as f64)?;
    known_param("target_multiplier")?.validate(self.target_multiplier)?;
    known_param("stop_multiplier")?.validate(self.stop_multiplier)?;
    Ok(())
  }
}

// ============================================================
// TESTS
// ============================================================
