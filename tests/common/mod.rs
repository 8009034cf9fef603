#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use std::process::ExitCode;
pub use trendcross::domain::ohlcv::Bar;
use trendcross::domain::error::TrendcrossError;
use trendcross::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, source: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(source.to_string(), bars);
        self
    }

    pub fn with_error(mut self, source: &str, reason: &str) -> Self {
        self.errors.insert(source.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_daily_bars(&self, source: &str) -> Result<Vec<Bar>, TrendcrossError> {
        if let Some(reason) = self.errors.get(source) {
            return Err(TrendcrossError::DataSource {
                reason: reason.clone(),
            });
        }
        self.data
            .get(source)
            .cloned()
            .ok_or_else(|| TrendcrossError::DataSource {
                reason: format!("unknown source {}", source),
            })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bar with high/low spanning open and close.
pub fn make_bar(date: NaiveDate, open: f64, close: f64) -> Bar {
    Bar::new(date, open, open.max(close), open.min(close), close)
}

/// Consecutive calendar days starting at `start`, one bar per close with a
/// narrow high/low band around it.
pub fn bars_from_closes(start: NaiveDate, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let d = start + chrono::Duration::days(i as i64);
            Bar::new(d, c, c * 1.001, c * 0.999, c).with_volume(1000.0)
        })
        .collect()
}

/// Zigzag of 15-day legs: a steady fall from 130 to 74, then a steady rise
/// from 70 to 126, with a slow upward drift. Each fall pins the oscillator
/// near zero and each rise crosses the buy threshold.
pub fn swing_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let phase = (i % 30) as f64;
            let leg = if phase < 15.0 {
                130.0 - 4.0 * phase
            } else {
                70.0 + 4.0 * (phase - 15.0)
            };
            leg + 0.02 * i as f64
        })
        .collect()
}

/// Trailing 20-bar simple average of the closes, absent for the first 19.
pub fn with_ma20(mut bars: Vec<Bar>) -> Vec<Bar> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    for (i, bar) in bars.iter_mut().enumerate() {
        if i >= 19 {
            let avg = closes[i - 19..=i].iter().sum::<f64>() / 20.0;
            bar.ma20 = Some(avg);
        }
    }
    bars
}

pub fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

pub fn same_code(code: ExitCode, expected: u8) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::from(expected))
}
