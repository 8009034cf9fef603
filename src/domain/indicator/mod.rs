//! Indicator rows: the oscillator, reference lines and signal flags for each bar.
//!
//! - `rolling`: shrinking-window HHV / LLV / SMA
//! - `ema`: exponential moving average seeded by the first value
//! - `oscillator`: trend line, raw momentum and support/resistance lines

pub mod ema;
pub mod oscillator;
pub mod rolling;

use serde::Serialize;

use crate::domain::error::TrendcrossError;
use crate::domain::ohlcv::{sort_by_date, Bar};
use crate::domain::signal::detect_signals;

pub const DEFAULT_LOOKBACK: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    #[serde(flatten)]
    pub bar: Bar,
    pub support: f64,
    pub resistance: f64,
    pub midline: f64,
    pub trend_line: f64,
    pub raw_momentum: Option<f64>,
    pub oversold: bool,
    pub overbought: bool,
    pub buy_signal: bool,
    pub sell_signal: bool,
    pub bottom_alert: bool,
    pub top_alert: bool,
}

impl IndicatorRow {
    /// Row with indicator values set and every flag cleared.
    pub fn new(bar: Bar, trend_line: f64) -> Self {
        IndicatorRow {
            support: bar.low,
            resistance: bar.high,
            midline: (bar.low + bar.high) / 2.0,
            bar,
            trend_line,
            raw_momentum: None,
            oversold: false,
            overbought: false,
            buy_signal: false,
            sell_signal: false,
            bottom_alert: false,
            top_alert: false,
        }
    }

    /// Trend line value usable for signal decisions.
    pub fn trend(&self) -> Option<f64> {
        self.trend_line.is_finite().then_some(self.trend_line)
    }
}

/// Compute indicator rows for `bars` (sorted by date first) and populate the
/// signal flags. One row per input bar.
pub fn compute_indicators(
    bars: &[Bar],
    lookback: usize,
    buy_threshold: f64,
) -> Result<Vec<IndicatorRow>, TrendcrossError> {
    if lookback == 0 {
        return Err(TrendcrossError::invalid_parameter(
            "lookback",
            "must be at least 1",
        ));
    }

    let mut sorted = bars.to_vec();
    sort_by_date(&mut sorted);

    let lines = oscillator::reference_lines(&sorted);
    let osc = oscillator::compute_oscillator(&sorted, lookback);

    let mut rows: Vec<IndicatorRow> = sorted
        .into_iter()
        .enumerate()
        .map(|(i, bar)| {
            let mut row = IndicatorRow::new(bar, osc.trend_line[i]);
            row.support = lines[i].support;
            row.resistance = lines[i].resistance;
            row.midline = lines[i].midline;
            row.raw_momentum = osc.raw_momentum[i];
            row
        })
        .collect();

    detect_signals(&mut rows, buy_threshold)?;
    Ok(rows)
}
