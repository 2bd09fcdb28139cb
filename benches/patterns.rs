//! Benchmarks for candlestick pattern detection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use candlescore::prelude::*;

/// Generate realistic random bars
fn generate_bars(n: usize) -> Vec<Bar> {
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;
    let volume = 1000.0 + ((i * 11) % 17) as f64 * 100.0;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;

    bars.push(Bar::new(o, h, l, c, volume));
    price = c;
  }

  bars
}

fn bench_detect_patterns(c: &mut Criterion) {
  let bars = generate_bars(50);
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
  let price = bars[49].close;

  c.bench_function("detect_patterns_50_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.detect_patterns(
        "BENCH",
        black_box(&bars),
        MarketRegime::Neutral,
        price,
        1500.0,
      ));
    })
  });
}

fn bench_all_detectors(c: &mut Criterion) {
  let bars = generate_bars(50);
  let engine =
    EngineBuilder::new().with_all_defaults().enable_all().min_confidence(0.0).build().unwrap();
  let ctx = MarketContext::new(&bars, MarketRegime::Bullish, 1500.0, engine.config());

  c.bench_function("evaluate_all_19_detectors", |b| {
    b.iter(|| {
      let _ = black_box(engine.evaluate(black_box(&bars), black_box(&ctx)));
    })
  });
}

fn bench_lookback_scaling(c: &mut Criterion) {
  let bars = generate_bars(500);

  let mut group = c.benchmark_group("lookback");

  for lookback in [12usize, 50, 200, 500].iter() {
    let engine =
      EngineBuilder::new().with_all_defaults().lookback_candles(*lookback).build().unwrap();

    group.bench_with_input(BenchmarkId::new("detect", lookback), lookback, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.detect_patterns(
          "BENCH",
          black_box(&bars),
          MarketRegime::Neutral,
          100.0,
          1500.0,
        ));
      })
    });
  }

  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let series: Vec<Vec<Bar>> = (0..64).map(|i| generate_bars(50 + i)).collect();
  let ids: Vec<String> = (0..series.len()).map(|i| format!("SYM{i}")).collect();

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let instruments: Vec<InstrumentWindow<'_, Bar>> = series
    .iter()
    .zip(&ids)
    .map(|(bars, id)| InstrumentWindow {
      instrument_id: id,
      bars,
      regime: MarketRegime::Neutral,
      current_price: bars[bars.len() - 1].close,
      avg_volume: 1500.0,
    })
    .collect();

  c.bench_function("detect_parallel_64_instruments", |b| {
    b.iter(|| {
      let _ = black_box(detect_parallel(black_box(&engine), black_box(instruments.clone())));
    })
  });
}

fn bench_replay(c: &mut Criterion) {
  let bars = generate_bars(1000);
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("replay_1000_bars", |b| {
    b.iter(|| {
      let hits = engine
        .replay("BENCH", black_box(&bars), MarketRegime::Neutral)
        .unwrap()
        .filter(|d| d.result.has_patterns)
        .count();
      black_box(hits)
    })
  });
}

fn bench_atr(c: &mut Criterion) {
  let bars = generate_bars(1000);

  c.bench_function("atr_14_1000_bars", |b| {
    b.iter(|| black_box(atr(black_box(&bars), 14)))
  });
}

criterion_group!(
  benches,
  bench_detect_patterns,
  bench_all_detectors,
  bench_lookback_scaling,
  bench_parallel_scan,
  bench_replay,
  bench_atr,
);

criterion_main!(benches);
