//! Candlestick pattern detectors
//!
//! Every detector looks only at the formation ending at the last bar it is given and
//! measures the antecedent trend over the bars before that formation.
//!
//! # Pattern Categories
//!
//! - **Single-bar (9)**: Hammer family, Doji/Spinning Top/Long-Legged Doji, Marubozu
//! - **Two-bar (4)**: Engulfing, Piercing Pattern, Dark Cloud Cover
//! - **Three-bar (4)**: Morning/Evening Star, Three White Soldiers/Black Crows
//! - **Multi-bar (2)**: Rising/Falling Three Methods

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod multi_bar;
pub mod single_bar;
pub mod three_bar;
pub mod two_bar;

// Re-export all detectors for convenience
pub use helpers::{LevelRule, Levels};
pub use multi_bar::*;
pub use single_bar::*;
pub use three_bar::*;
pub use two_bar::*;
