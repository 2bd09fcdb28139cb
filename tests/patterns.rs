//! Integration tests for candlescore pattern detection.
//!
//! Each scenario builds a short trend followed by a hand-shaped formation and checks
//! the match, its score and its trade levels through the public engine API.

use candlescore::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64, v: f64) -> Self {
        Self { o, h, l, c, v }
    }
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        self.v
    }
}

/// Bars whose closes step by `step` from `start`, each with a body 0.6 of the step
fn trend_bars(n: usize, start: f64, step: f64) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            let close = start + step * i as f64;
            let open = close - step * 0.6;
            TestBar::new(open, open.max(close) + 0.1, open.min(close) - 0.1, close, 1000.0)
        })
        .collect()
}

fn with_formation(mut bars: Vec<TestBar>, formation: &[TestBar]) -> Vec<TestBar> {
    bars.extend_from_slice(formation);
    bars
}

/// ~4.3% decline, then a 10 point bearish body swallowed by a 12 point bullish body,
/// both on double volume
fn bullish_engulfing_bars() -> Vec<TestBar> {
    with_formation(
        trend_bars(10, 104.5, -0.5),
        &[
            TestBar::new(100.0, 101.0, 89.0, 90.0, 2000.0),
            TestBar::new(89.0, 101.2, 89.0, 101.0, 2000.0),
        ],
    )
}

fn default_engine() -> PatternEngine {
    EngineBuilder::new().with_all_defaults().build().unwrap()
}

fn detect(engine: &PatternEngine, bars: &[TestBar], regime: MarketRegime) -> DetectionResult {
    let price = bars.last().map_or(0.0, |b| b.close());
    engine
        .detect_patterns("TEST", bars, regime, price, 1000.0)
        .unwrap()
}

fn assert_levels_consistent(m: &PatternMatch) {
    match m.signal {
        Direction::Bullish => {
            let stop = m.stop_loss.unwrap();
            let target = m.target.unwrap();
            assert!(stop < m.entry_price, "{}: stop {stop} >= entry", m.pattern);
            assert!(m.entry_price <= target, "{}: target {target} < entry", m.pattern);
        },
        Direction::Bearish => {
            let stop = m.stop_loss.unwrap();
            let target = m.target.unwrap();
            assert!(stop > m.entry_price, "{}: stop {stop} <= entry", m.pattern);
            assert!(m.entry_price >= target, "{}: target {target} > entry", m.pattern);
        },
        Direction::Neutral => {
            assert!(m.target.is_none() && m.stop_loss.is_none());
        },
    }
}

// ============================================================
// TWO BAR PATTERN TESTS
// ============================================================

#[test]
fn test_bullish_engulfing_scenario() {
    let bars = bullish_engulfing_bars();
    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);

    assert!(result.has_patterns);
    assert!(result.patterns_found.iter().any(|p| p == "Bullish Engulfing"));
    let m = &result.pattern_details["bullish_engulfing"];

    // 1.5 geometry + 2.5 volume + 2.5 trend + 2.0 swing low + 1.0 regime
    assert_eq!(m.confidence_score, 9.5);
    assert!(m.confidence_score >= 8.0);
    assert_eq!(m.signal, Direction::Bullish);
    assert!(m.stop_loss.unwrap() < 89.0);
    assert!(m.entry_price > 101.2);
    assert_eq!(m.volume_ratio, 2.0);
    assert_eq!((m.start_index, m.end_index), (10, 11));
    assert_eq!(m.bars.len(), 2);
    assert_eq!(m.confidence_breakdown.len(), 5);
    assert_eq!(m.confidence_breakdown[&Factor::Geometry], 1.5);
    assert_levels_consistent(m);
}

#[test]
fn test_bearish_engulfing() {
    let bars = with_formation(
        trend_bars(10, 95.5, 0.5),
        &[
            TestBar::new(100.0, 101.0, 99.8, 100.8, 1000.0),
            TestBar::new(101.0, 101.2, 99.0, 99.2, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bearish);

    let m = result.get(PatternKind::BearishEngulfing).expect("bearish engulfing");
    assert_eq!(m.confidence_score, 9.0);
    assert!(m.stop_loss.unwrap() > 101.2);
    assert_levels_consistent(m);
    assert!(!result.contains(PatternKind::BullishEngulfing));
}

#[test]
fn test_piercing_pattern() {
    let bars = with_formation(
        trend_bars(10, 104.5, -0.5),
        &[
            TestBar::new(100.2, 100.4, 96.0, 96.2, 1000.0),
            TestBar::new(95.8, 99.4, 95.6, 99.2, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);

    let m = result.get(PatternKind::PiercingPattern).expect("piercing pattern");
    assert_eq!(m.confidence_score, 8.5);
    assert!(!result.contains(PatternKind::BullishEngulfing));
    assert_levels_consistent(m);
}

#[test]
fn test_dark_cloud_cover() {
    let bars = with_formation(
        trend_bars(10, 95.5, 0.5),
        &[
            TestBar::new(99.8, 104.0, 99.6, 103.8, 1000.0),
            TestBar::new(104.2, 104.4, 100.6, 100.8, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bearish);

    let m = result.get(PatternKind::DarkCloudCover).expect("dark cloud cover");
    assert_eq!(m.signal, Direction::Bearish);
    assert_eq!(m.confidence_score, 8.5);
    assert_levels_consistent(m);
}

// ============================================================
// SINGLE BAR PATTERN TESTS
// ============================================================

#[test]
fn test_hammer_after_decline() {
    let bars = with_formation(
        trend_bars(11, 100.0, -0.5),
        &[TestBar::new(94.6, 95.2, 92.4, 95.1, 1000.0)],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);

    let m = result.get(PatternKind::Hammer).expect("hammer");
    assert_eq!(m.confidence_score, 8.5);
    assert_eq!(m.bars.len(), 1);
    assert!(m.stop_loss.unwrap() < 92.4);
    assert_levels_consistent(m);
}

#[test]
fn test_hammer_shape_without_decline_is_not_a_hammer() {
    let bars = with_formation(
        trend_bars(11, 100.0, 0.0),
        &[TestBar::new(99.6, 100.2, 97.4, 100.1, 1000.0)],
    );
    let engine = EngineBuilder::new().with_all_defaults().min_confidence(0.0).build().unwrap();
    let result = detect(&engine, &bars, MarketRegime::Bullish);
    assert!(!result.contains(PatternKind::Hammer));
}

#[test]
fn test_shooting_star_after_rise() {
    let bars = with_formation(
        trend_bars(11, 100.0, 0.5),
        &[TestBar::new(105.4, 107.6, 104.8, 104.9, 1000.0)],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bearish);

    let m = result.get(PatternKind::ShootingStar).expect("shooting star");
    assert_eq!(m.signal, Direction::Bearish);
    assert_eq!(m.confidence_score, 8.5);
    assert_levels_consistent(m);
}

#[test]
fn test_inverted_hammer_after_decline() {
    let bars = with_formation(
        trend_bars(11, 100.0, -0.5),
        &[TestBar::new(94.6, 96.8, 94.55, 94.9, 1000.0)],
    );

    // Disabled by default
    assert!(!detect(&default_engine(), &bars, MarketRegime::Bullish)
        .contains(PatternKind::InvertedHammer));

    let engine = EngineBuilder::new().with_all_defaults().enable_all().build().unwrap();
    let result = detect(&engine, &bars, MarketRegime::Bullish);
    let m = result.get(PatternKind::InvertedHammer).expect("inverted hammer");
    assert_eq!(m.signal, Direction::Bullish);
    // 2.5 wick + 1.0 volume + 2.5 trend + 2.0 placement + 1.0 regime
    assert_eq!(m.confidence_score, 9.0);
    assert!(m.entry_price > 96.8);
    assert!(m.stop_loss.unwrap() < 94.55);
    assert!(!result.contains(PatternKind::Hammer));
    assert_levels_consistent(m);
}

#[test]
fn test_doji_after_rise_is_bearish() {
    let bars = with_formation(
        trend_bars(11, 100.0, 0.4),
        &[TestBar::new(104.0, 104.5, 102.5, 104.01, 1000.0)],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Neutral);

    let m = result.get(PatternKind::Doji).expect("doji");
    assert_eq!(m.signal, Direction::Bearish);
    assert_eq!(m.confidence_score, 7.5);
    assert!(!result.contains(PatternKind::LongLeggedDoji));
    assert_levels_consistent(m);
}

#[test]
fn test_long_legged_doji_after_rise() {
    let bars = with_formation(
        trend_bars(11, 100.0, 0.4),
        &[TestBar::new(104.0, 105.0, 103.0, 104.02, 1000.0)],
    );
    let engine = default_engine();
    let result = detect(&engine, &bars, MarketRegime::Neutral);

    let m = result.get(PatternKind::LongLeggedDoji).expect("long-legged doji");
    assert_eq!(m.signal, Direction::Bearish);
    assert_eq!(m.confidence_score, 8.5);
    assert!(!result.contains(PatternKind::Doji));
    assert_levels_consistent(m);

    // Target reaches 1.5x the configured ATR multiple
    let atr = atr(&bars[bars.len() - 50.min(bars.len())..], engine.config().atr_period);
    let expected = m.entry_price - atr * engine.config().target_multiplier * 1.5;
    assert!((m.target.unwrap() - expected).abs() < 1e-9);
}

#[test]
fn test_long_legged_doji_scores_at_least_as_doji_against_regime() {
    // Ranges of 1.0 before the bar, so no range expansion
    let mut bars: Vec<TestBar> = (0..11)
        .map(|i| {
            let close = 100.0 + 0.34 * i as f64;
            let open = close - 0.2;
            TestBar::new(open, close + 0.5, open - 0.3, close, 1000.0)
        })
        .collect();
    bars.push(TestBar::new(103.4, 103.9, 102.88, 103.42, 1000.0));

    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);

    let m = result.get(PatternKind::LongLeggedDoji).expect("long-legged doji");
    assert_eq!(m.signal, Direction::Bearish);
    assert_eq!(m.confidence_breakdown[&Factor::Geometry], 2.0);
    assert_eq!(m.confidence_breakdown[&Factor::Regime], 0.0);
    // 2.0 body + 1.0 volume + 2.5 trend + 2.0 balance
    assert_eq!(m.confidence_score, 7.5);
    assert!(!result.contains(PatternKind::Doji));
    assert_levels_consistent(m);
}

#[test]
fn test_neutral_doji_has_no_levels() {
    let bars = with_formation(
        trend_bars(11, 100.0, 0.1),
        &[TestBar::new(101.0, 101.555, 100.0, 101.005, 2000.0)],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);

    let m = result.get(PatternKind::Doji).expect("doji");
    assert_eq!(m.signal, Direction::Neutral);
    assert_eq!(m.entry_price, 101.005);
    assert!(m.target.is_none());
    assert!(m.stop_loss.is_none());
    assert!(m.risk_reward().is_none());
}

#[test]
fn test_spinning_top_after_rise() {
    let bars = with_formation(
        trend_bars(11, 100.0, 0.4),
        &[TestBar::new(104.0, 104.9, 103.1, 104.12, 1000.0)],
    );

    // Disabled by default
    assert!(!detect(&default_engine(), &bars, MarketRegime::Bearish)
        .contains(PatternKind::SpinningTop));

    let engine = EngineBuilder::new().with_all_defaults().enable_all().build().unwrap();
    let result = detect(&engine, &bars, MarketRegime::Bearish);
    let m = result.get(PatternKind::SpinningTop).expect("spinning top");
    assert_eq!(m.signal, Direction::Bearish);
    // 2.0 body + 1.0 volume + 2.5 trend + 2.0 balance + 1.0 regime
    assert_eq!(m.confidence_score, 8.5);
    assert!(!result.contains(PatternKind::Doji));
    assert!(!result.contains(PatternKind::LongLeggedDoji));
    assert_levels_consistent(m);
}

#[test]
fn test_bullish_marubozu_continues_rise() {
    let bars = with_formation(
        trend_bars(11, 100.0, 0.3),
        &[TestBar::new(103.0, 106.02, 102.99, 106.0, 1000.0)],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);

    let m = result.get(PatternKind::BullishMarubozu).expect("bullish marubozu");
    assert_eq!(m.confidence_score, 8.0);
    assert_levels_consistent(m);
}

#[test]
fn test_bearish_marubozu_continues_decline() {
    let bars = with_formation(
        trend_bars(11, 100.0, -0.3),
        &[TestBar::new(97.0, 97.01, 93.98, 94.0, 1000.0)],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bearish);

    let m = result.get(PatternKind::BearishMarubozu).expect("bearish marubozu");
    assert_eq!(m.signal, Direction::Bearish);
    // 2.5 body size + 1.0 volume + 2.0 trend + 2.0 clean body + 1.0 regime
    assert_eq!(m.confidence_score, 8.5);
    assert!(m.entry_price < 93.98);
    assert!(m.stop_loss.unwrap() > 97.01);
    assert!(!result.contains(PatternKind::BullishMarubozu));
    assert_levels_consistent(m);
}

// ============================================================
// MULTI BAR PATTERN TESTS
// ============================================================

#[test]
fn test_morning_star() {
    let bars = with_formation(
        trend_bars(9, 110.0, -1.0),
        &[
            TestBar::new(102.0, 102.3, 95.8, 96.0, 1000.0),
            TestBar::new(95.5, 96.0, 95.0, 95.7, 1000.0),
            TestBar::new(96.0, 101.2, 95.9, 101.0, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Neutral);

    let m = result.get(PatternKind::MorningStar).expect("morning star");
    assert_eq!(m.confidence_score, 8.5);
    assert_eq!(m.bars.len(), 3);
    // Stop sits under the star
    assert!(m.stop_loss.unwrap() < 95.0);
    assert_levels_consistent(m);
}

#[test]
fn test_evening_star() {
    let bars = with_formation(
        trend_bars(9, 90.0, 1.0),
        &[
            TestBar::new(98.0, 104.2, 97.7, 104.0, 1000.0),
            TestBar::new(104.3, 105.0, 104.0, 104.5, 1000.0),
            TestBar::new(104.0, 104.1, 98.8, 99.0, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Neutral);

    let m = result.get(PatternKind::EveningStar).expect("evening star");
    assert_eq!(m.signal, Direction::Bearish);
    assert_eq!(m.confidence_score, 8.5);
    assert_eq!(m.bars.len(), 3);
    // Stop sits over the star
    assert!(m.stop_loss.unwrap() > 105.0);
    assert!(!result.contains(PatternKind::MorningStar));
    assert_levels_consistent(m);
}

#[test]
fn test_three_white_soldiers() {
    let bars = with_formation(
        trend_bars(9, 104.0, -0.5),
        &[
            TestBar::new(100.0, 101.6, 99.9, 101.5, 1000.0),
            TestBar::new(101.0, 102.9, 100.9, 102.8, 1000.0),
            TestBar::new(102.3, 104.1, 102.2, 104.0, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);

    let m = result.get(PatternKind::ThreeWhiteSoldiers).expect("three white soldiers");
    assert_eq!(m.confidence_score, 8.5);
    assert!(m.stop_loss.unwrap() < 99.9);
    assert_levels_consistent(m);
}

#[test]
fn test_three_black_crows() {
    let bars = with_formation(
        trend_bars(9, 96.0, 0.5),
        &[
            TestBar::new(100.0, 100.1, 98.4, 98.5, 1000.0),
            TestBar::new(99.0, 99.1, 97.1, 97.2, 1000.0),
            TestBar::new(97.7, 97.8, 95.9, 96.0, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bearish);

    let m = result.get(PatternKind::ThreeBlackCrows).expect("three black crows");
    assert_eq!(m.signal, Direction::Bearish);
    assert_eq!(m.confidence_score, 8.5);
    // Stop anchored on the first crow
    let stop = m.stop_loss.unwrap();
    assert!(stop > 100.1 && stop < 101.0);
    assert_levels_consistent(m);
}

#[test]
fn test_rising_three_methods_anchors_stop_on_first_bar() {
    let bars = with_formation(
        trend_bars(7, 100.0, 0.6),
        &[
            TestBar::new(103.6, 106.8, 103.5, 106.6, 1000.0),
            TestBar::new(106.3, 106.4, 105.6, 105.8, 1000.0),
            TestBar::new(105.8, 105.9, 105.1, 105.3, 1000.0),
            TestBar::new(105.3, 105.8, 105.0, 105.6, 1000.0),
            TestBar::new(105.7, 107.6, 105.6, 107.5, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);

    let m = result.get(PatternKind::RisingThreeMethods).expect("rising three methods");
    assert_eq!(m.confidence_score, 9.0);
    assert_eq!(m.bars.len(), 5);
    assert!(m.entry_price > 107.6);
    let stop = m.stop_loss.unwrap();
    assert!(stop < 103.5 && stop > 102.0);
    assert_levels_consistent(m);
}

#[test]
fn test_falling_three_methods_anchors_stop_on_first_bar() {
    let bars = with_formation(
        trend_bars(7, 110.0, -0.6),
        &[
            TestBar::new(106.4, 106.5, 103.2, 103.4, 1000.0),
            TestBar::new(103.7, 104.4, 103.6, 104.2, 1000.0),
            TestBar::new(104.2, 104.9, 104.1, 104.7, 1000.0),
            TestBar::new(104.4, 104.6, 103.9, 104.1, 1000.0),
            TestBar::new(104.0, 104.1, 102.3, 102.4, 1000.0),
        ],
    );
    let result = detect(&default_engine(), &bars, MarketRegime::Bearish);

    let m = result.get(PatternKind::FallingThreeMethods).expect("falling three methods");
    assert_eq!(m.signal, Direction::Bearish);
    assert_eq!(m.confidence_score, 9.0);
    assert_eq!(m.bars.len(), 5);
    assert!(m.entry_price < 102.3);
    let stop = m.stop_loss.unwrap();
    assert!(stop > 106.5 && stop < 108.0);
    assert_levels_consistent(m);
}

// ============================================================
// ENGINE BEHAVIOUR
// ============================================================

#[test]
fn test_disabled_patterns_are_filtered() {
    let bars = with_formation(
        trend_bars(11, 100.0, 0.5),
        &[TestBar::new(105.6, 106.2, 103.4, 106.1, 1000.0)],
    );

    // Hanging Man is disabled by default
    let result = detect(&default_engine(), &bars, MarketRegime::Bearish);
    assert!(!result.contains(PatternKind::HangingMan));

    let engine = EngineBuilder::new().with_all_defaults().enable_all().build().unwrap();
    let result = detect(&engine, &bars, MarketRegime::Bearish);
    let m = result.get(PatternKind::HangingMan).expect("hanging man once enabled");
    assert_eq!(m.signal, Direction::Bearish);

    let engine = EngineBuilder::new()
        .with_all_defaults()
        .disable([PatternKind::BullishEngulfing])
        .build()
        .unwrap();
    let result = detect(&engine, &bullish_engulfing_bars(), MarketRegime::Bullish);
    assert!(!result.contains(PatternKind::BullishEngulfing));
}

#[test]
fn test_min_confidence_threshold() {
    let bars = bullish_engulfing_bars();

    let engine = EngineBuilder::new().with_all_defaults().min_confidence(9.5).build().unwrap();
    assert!(detect(&engine, &bars, MarketRegime::Bullish).contains(PatternKind::BullishEngulfing));

    let engine = EngineBuilder::new().with_all_defaults().min_confidence(9.6).build().unwrap();
    assert!(!detect(&engine, &bars, MarketRegime::Bullish).contains(PatternKind::BullishEngulfing));

    // Opposed regime costs the regime point
    let result = detect(&default_engine(), &bars, MarketRegime::Bearish);
    assert_eq!(result.get(PatternKind::BullishEngulfing).unwrap().confidence_score, 8.5);
}

#[test]
fn test_detection_is_idempotent() {
    let engine = default_engine();
    let bars = bullish_engulfing_bars();
    let first = detect(&engine, &bars, MarketRegime::Bullish);
    let second = detect(&engine, &bars, MarketRegime::Bullish);
    assert_eq!(first, second);
}

#[test]
fn test_flat_series_has_no_patterns() {
    let bars: Vec<TestBar> = (0..60)
        .map(|_| TestBar::new(100.0, 100.0, 100.0, 100.0, 1000.0))
        .collect();
    let engine = EngineBuilder::new().with_all_defaults().enable_all().min_confidence(0.0).build().unwrap();
    let result = detect(&engine, &bars, MarketRegime::Neutral);
    assert!(!result.has_patterns);
    assert!(result.best().is_none());
}

#[test]
fn test_atr_three_bar_fallback() {
    let bars = vec![
        TestBar::new(100.0, 104.0, 98.0, 102.0, 1.0),
        TestBar::new(102.0, 103.0, 101.0, 102.5, 1.0),
        TestBar::new(102.5, 106.0, 102.0, 105.0, 1.0),
    ];
    // (6 + 2 + 4) / 3
    assert!((atr(&bars, 14) - 4.0).abs() < 1e-12);
}

#[test]
fn test_lookback_trim_keeps_absolute_indices() {
    let bars = with_formation(trend_bars(48, 110.0, 0.0), &bullish_engulfing_bars());
    assert_eq!(bars.len(), 60);

    let result = detect(&default_engine(), &bars, MarketRegime::Bullish);
    let m = result.get(PatternKind::BullishEngulfing).expect("bullish engulfing");
    assert_eq!((m.start_index, m.end_index), (58, 59));
}

#[test]
fn test_invalid_data_rejected() {
    let mut bars = bullish_engulfing_bars();
    bars[4].l = -1.0;
    let err = default_engine()
        .detect_patterns("TEST", &bars, MarketRegime::Neutral, 101.5, 1000.0)
        .unwrap_err();
    assert!(matches!(err, PatternError::InvalidOHLCV { index: 4, .. }));
}

#[test]
fn test_detector_fault_is_isolated() {
    // NaN high inside the ATR window poisons the target, not the gates
    let mut bars = bullish_engulfing_bars();
    bars[8].h = f64::NAN;
    let engine = EngineBuilder::new().with_all_defaults().validate_data(false).build().unwrap();

    let ctx = MarketContext::new(&bars, MarketRegime::Bullish, 1000.0, engine.config());
    let outcome = engine
        .evaluate(&bars, &ctx)
        .into_iter()
        .find(|(kind, _)| *kind == PatternKind::BullishEngulfing)
        .map(|(_, outcome)| outcome)
        .unwrap();
    assert!(matches!(outcome, Err(PatternError::DetectorFault { .. })));

    let result = detect(&engine, &bars, MarketRegime::Bullish);
    assert!(!result.contains(PatternKind::BullishEngulfing));
}

#[test]
fn test_volume_ratio_falls_back_without_average() {
    let bars = bullish_engulfing_bars();
    let result = default_engine()
        .detect_patterns("TEST", &bars, MarketRegime::Bullish, 101.0, 0.0)
        .unwrap();
    let m = result.get(PatternKind::BullishEngulfing).unwrap();
    assert_eq!(m.volume_ratio, 1.0);
    assert_eq!(m.confidence_breakdown[&Factor::Volume], 1.0);
}

#[test]
fn test_detect_at_history() {
    let mut bars = bullish_engulfing_bars();
    bars.extend(trend_bars(3, 101.0, 0.2));
    let result = default_engine()
        .detect_at("TEST", &bars, 11, MarketRegime::Bullish, 1000.0)
        .unwrap();
    assert_eq!(result.current_price, 101.0);
    assert!(result.contains(PatternKind::BullishEngulfing));
}

#[test]
fn test_replay_finds_formation_at_its_bar() {
    let bars = bullish_engulfing_bars();
    let engine = default_engine();
    let detections: Vec<BarDetection> = engine
        .replay("TEST", &bars, MarketRegime::Bullish)
        .unwrap()
        .collect();

    assert_eq!(detections.len(), 1);
    let last = &detections[0];
    assert_eq!(last.index, 11);
    // The first engulfing bar lifts the trailing average to 12000 / 11
    let m = last.result.get(PatternKind::BullishEngulfing).unwrap();
    assert!((m.volume_ratio - 2000.0 * 11.0 / 12000.0).abs() < 1e-9);
    assert_eq!(m.confidence_breakdown[&Factor::Volume], 2.0);
}

#[test]
fn test_best_match() {
    let result = detect(&default_engine(), &bullish_engulfing_bars(), MarketRegime::Bullish);
    let best = result.best().unwrap();
    assert!(result.pattern_details.values().all(|m| m.confidence_score <= best.confidence_score));
}

// ============================================================
// SERIALIZATION
// ============================================================

#[test]
fn test_result_serializes_to_json() {
    let result = detect(&default_engine(), &bullish_engulfing_bars(), MarketRegime::Bullish);
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["instrument_id"], "TEST");
    assert_eq!(json["has_patterns"], true);
    assert_eq!(json["market_regime"], "BULLISH");

    let m = &json["pattern_details"]["bullish_engulfing"];
    assert_eq!(m["pattern_name"], "Bullish Engulfing");
    assert!(m.get("pattern").is_none());
    assert_eq!(m["type"], "bullish");
    assert_eq!(m["confidence_score"], 9.5);
    assert_eq!(m["confidence_breakdown"]["volume"], 2.5);
    assert!(m["stop_loss"].as_f64().unwrap() < 89.0);
}

#[test]
fn test_config_from_json() {
    let config: EngineConfig = serde_json::from_str(
        r#"{"min_confidence": 6.0, "disabled_patterns": ["Bullish Engulfing"]}"#,
    )
    .unwrap();
    let engine = EngineBuilder::new().with_all_defaults().config(config).build().unwrap();
    assert!(engine.config().is_disabled(PatternKind::BullishEngulfing));
    assert!(!engine.config().is_disabled(PatternKind::HangingMan));

    let result = detect(&engine, &bullish_engulfing_bars(), MarketRegime::Bullish);
    assert!(!result.contains(PatternKind::BullishEngulfing));
}
