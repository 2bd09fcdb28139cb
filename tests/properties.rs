//! Property tests over randomly generated bar series.

use candlescore::prelude::*;
use proptest::prelude::*;

/// Valid bar series: positive prices, high/low enclosing open/close
fn bar_series() -> impl Strategy<Value = Vec<Bar>> {
  prop::collection::vec(
    (-3.0f64..3.0, -2.5f64..2.5, 0.0f64..2.0, 0.0f64..2.0, 100.0f64..5000.0),
    12..80,
  )
  .prop_map(|steps| {
    let mut price = 100.0;
    steps
      .into_iter()
      .map(|(drift, body, up, down, volume)| {
        let open = price;
        let close = (open + body).max(1.0);
        let high = open.max(close) + up;
        let low = (open.min(close) - down).max(0.5);
        price = (close + drift).max(1.0);
        Bar::new(open, high, low, close, volume)
      })
      .collect()
  })
}

fn regime() -> impl Strategy<Value = MarketRegime> {
  prop_oneof![Just(MarketRegime::Bullish), Just(MarketRegime::Bearish), Just(MarketRegime::Neutral)]
}

fn permissive_engine() -> PatternEngine {
  EngineBuilder::new().with_all_defaults().enable_all().min_confidence(0.0).build().unwrap()
}

proptest! {
  #[test]
  fn scores_stay_in_bounds(bars in bar_series(), regime in regime(), avg in 0.0f64..4000.0) {
    let engine = permissive_engine();
    let price = bars.last().unwrap().close;
    let result = engine.detect_patterns("P", &bars, regime, price, avg).unwrap();

    for m in result.pattern_details.values() {
      prop_assert!((0.0..=10.0).contains(&m.confidence_score));
      let tenths = m.confidence_score * 10.0;
      prop_assert!((tenths - tenths.round()).abs() < 1e-9);
      for (factor, points) in &m.confidence_breakdown {
        prop_assert!(*points >= 0.0 && *points <= factor.max_points());
      }
    }
  }

  #[test]
  fn levels_follow_signal_direction(bars in bar_series(), regime in regime()) {
    let engine = permissive_engine();
    let price = bars.last().unwrap().close;
    let result = engine.detect_patterns("P", &bars, regime, price, 1000.0).unwrap();

    for m in result.pattern_details.values() {
      match m.signal {
        Direction::Bullish => {
          prop_assert!(m.stop_loss.unwrap() < m.entry_price);
          prop_assert!(m.entry_price <= m.target.unwrap());
        },
        Direction::Bearish => {
          prop_assert!(m.stop_loss.unwrap() > m.entry_price);
          prop_assert!(m.entry_price >= m.target.unwrap());
        },
        Direction::Neutral => {
          prop_assert!(m.target.is_none() && m.stop_loss.is_none());
          prop_assert_eq!(m.entry_price, price);
        },
      }
    }
  }

  #[test]
  fn detection_is_idempotent(bars in bar_series(), regime in regime()) {
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let price = bars.last().unwrap().close;
    let first = engine.detect_patterns("P", &bars, regime, price, 1000.0).unwrap();
    let second = engine.detect_patterns("P", &bars, regime, price, 1000.0).unwrap();
    prop_assert_eq!(first, second);
  }

  #[test]
  fn results_respect_threshold_and_disabled_list(bars in bar_series(), min in 0.0f64..10.0) {
    let engine = EngineBuilder::new().with_all_defaults().min_confidence(min).build().unwrap();
    let price = bars.last().unwrap().close;
    let result = engine.detect_patterns("P", &bars, MarketRegime::Neutral, price, 1000.0).unwrap();

    prop_assert_eq!(result.has_patterns, !result.pattern_details.is_empty());
    prop_assert_eq!(result.patterns_found.len(), result.pattern_details.len());
    for (key, m) in &result.pattern_details {
      prop_assert!(m.confidence_score >= min);
      prop_assert!(!engine.config().is_disabled(m.pattern));
      prop_assert_eq!(key.as_str(), m.pattern.key());
      prop_assert_eq!(m.end_index, bars.len() - 1);
    }
  }

  #[test]
  fn atr_is_never_negative(bars in bar_series(), period in 1usize..30) {
    let value = atr(&bars, period);
    prop_assert!(value.is_finite() && value >= 0.0);
  }
}
