//! Average True Range and trailing volume averages.

use crate::{OHLCVExt, OHLCV};

/// Default ATR lookback
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// Bars averaged by the short-history fallback
pub const FALLBACK_BARS: usize = 5;

/// True Range of a bar: the widest of its own range and the gaps to the previous close.
#[inline]
pub fn true_range<T: OHLCV>(bar: &T, prev_close: Option<f64>) -> f64 {
    match prev_close {
        Some(prev) => {
            let high_gap = (bar.high() - prev).abs();
            let low_gap = (bar.low() - prev).abs();
            bar.range().max(high_gap).max(low_gap)
        },
        None => bar.range(),
    }
}

/// Mean True Range over the last `period` bars.
///
/// With fewer than `period + 1` bars there is no previous close for every bar, so
/// the mean high-low range of the last `min(5, n)` bars is returned instead.
/// Never fails: an empty slice gives 0.0.
pub fn atr<T: OHLCV>(bars: &[T], period: usize) -> f64 {
    let n = bars.len();
    if n == 0 {
        return 0.0;
    }
    if period == 0 || n < period + 1 {
        let tail = &bars[n - n.min(FALLBACK_BARS)..];
        return tail.iter().map(|b| b.range()).sum::<f64>() / tail.len() as f64;
    }

    let start = n - period;
    let total: f64 = (start..n)
        .map(|i| true_range(&bars[i], Some(bars[i - 1].close())))
        .sum();
    total / period as f64
}

/// Mean volume of up to `period` bars preceding the last one.
///
/// The last bar is excluded so it can be compared against the result.
pub fn average_volume<T: OHLCV>(bars: &[T], period: usize) -> f64 {
    let n = bars.len();
    if n < 2 || period == 0 {
        return bars.last().map_or(0.0, |b| b.volume());
    }
    let start = (n - 1).saturating_sub(period);
    let slice = &bars[start..n - 1];
    slice.iter().map(|b| b.volume()).sum::<f64>() / slice.len() as f64
}
