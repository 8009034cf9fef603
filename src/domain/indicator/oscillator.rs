//! Trend oscillator and support/resistance lines.
//!
//! Reference lines come from the previous bar's range:
//! H1 = max(prevC, prevH), L1 = min(prevC, prevL), P1 = H1 - L1,
//! resistance = L1 + P1*7/8, support = L1 + P1*0.5/8.
//!
//! The oscillator is a stochastic ratio smoothed twice and de-lagged:
//! ratio = (C - LLV(L,N)) / (HHV(H,N) - LLV(L,N)) * 100,
//! v11 = 3*SMA(ratio,5) - 2*SMA(SMA(ratio,5),3), trend = EMA(v11,3).

use super::ema::calculate_ema;
use super::rolling::{hhv, llv, sma};
use crate::domain::ohlcv::Bar;

/// Ratio used when the trailing range is flat or undefined.
pub const NEUTRAL_RATIO: f64 = 50.0;

const RATIO_SMA: usize = 5;
const SMOOTH_SMA: usize = 3;
const TREND_SPAN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLines {
    pub support: f64,
    pub resistance: f64,
    pub midline: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Oscillator {
    pub ratio: Vec<f64>,
    pub trend_line: Vec<f64>,
    pub raw_momentum: Vec<Option<f64>>,
}

/// Reference lines per bar; bar 0 uses itself as its previous bar.
pub fn reference_lines(bars: &[Bar]) -> Vec<ReferenceLines> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let prev = if i == 0 { bar } else { &bars[i - 1] };
            let h1 = prev.close.max(prev.high);
            let l1 = prev.close.min(prev.low);
            let p1 = h1 - l1;
            let resistance = l1 + p1 * 7.0 / 8.0;
            let support = l1 + p1 * 0.5 / 8.0;
            ReferenceLines {
                support,
                resistance,
                midline: (support + resistance) / 2.0,
            }
        })
        .collect()
}

pub fn compute_oscillator(bars: &[Bar], lookback: usize) -> Oscillator {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let hh = hhv(&highs, lookback);
    let ll = llv(&lows, lookback);

    let ratio: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let value = (bar.close - ll[i]) / (hh[i] - ll[i]) * 100.0;
            if value.is_finite() {
                value
            } else {
                NEUTRAL_RATIO
            }
        })
        .collect();

    let sma1 = sma(&ratio, RATIO_SMA);
    let sma2 = sma(&sma1, SMOOTH_SMA);
    let v11: Vec<f64> = sma1
        .iter()
        .zip(&sma2)
        .map(|(a, b)| 3.0 * a - 2.0 * b)
        .collect();
    let trend_line = calculate_ema(&v11, TREND_SPAN);
    let raw_momentum = momentum(&trend_line);

    Oscillator {
        ratio,
        trend_line,
        raw_momentum,
    }
}

/// Percentage change of the trend line against its previous value.
fn momentum(trend_line: &[f64]) -> Vec<Option<f64>> {
    trend_line
        .iter()
        .enumerate()
        .map(|(i, &tl)| {
            let prev = *trend_line.get(i.checked_sub(1)?)?;
            if prev == 0.0 {
                return None;
            }
            let v = (tl - prev) / prev * 100.0;
            v.is_finite().then_some(v)
        })
        .collect()
}
