//! Signal detection over indicator rows.
//!
//! Entries are driven only by the upward crossing of the buy threshold. Sell
//! crossings, zone alerts and the multi-threshold cross rules are computed for
//! display and statistics.

use serde::Serialize;

use crate::domain::error::TrendcrossError;
use crate::domain::indicator::IndicatorRow;

pub const DEFAULT_BUY_THRESHOLD: f64 = 10.0;
pub const SELL_THRESHOLD: f64 = 90.0;
pub const OVERSOLD_LEVEL: f64 = 10.0;
pub const OVERBOUGHT_LEVEL: f64 = 90.0;

/// Debounce window used by the bottom/top zone alerts.
pub const ZONE_ALERT_WINDOW: usize = 15;
const BOTTOM_ZONE: f64 = 11.0;
const TOP_ZONE: f64 = 89.0;

pub fn validate_buy_threshold(threshold: f64) -> Result<(), TrendcrossError> {
    if !threshold.is_finite() || !(0.0..100.0).contains(&threshold) {
        return Err(TrendcrossError::invalid_parameter(
            "buy_threshold",
            format!("{} is outside [0, 100)", threshold),
        ));
    }
    Ok(())
}

/// `true` when the series moves from at-or-below `level` to strictly above it.
pub fn crossed_above(prev: f64, curr: f64, level: f64) -> bool {
    prev <= level && curr > level
}

/// `true` when the series moves from at-or-above `level` to strictly below it.
pub fn crossed_below(prev: f64, curr: f64, level: f64) -> bool {
    prev >= level && curr < level
}

/// Populate oversold/overbought, buy/sell and zone alert flags in place.
///
/// A row whose trend line (or whose predecessor's trend line) is not finite
/// never carries a crossing signal.
pub fn detect_signals(rows: &mut [IndicatorRow], buy_threshold: f64) -> Result<(), TrendcrossError> {
    validate_buy_threshold(buy_threshold)?;

    let mut prev: Option<f64> = None;
    for row in rows.iter_mut() {
        let curr = row.trend();
        row.oversold = curr.is_some_and(|tl| tl < OVERSOLD_LEVEL);
        row.overbought = curr.is_some_and(|tl| tl > OVERBOUGHT_LEVEL);
        (row.buy_signal, row.sell_signal) = match (prev, curr) {
            (Some(p), Some(c)) => (
                crossed_above(p, c, buy_threshold),
                crossed_below(p, c, SELL_THRESHOLD),
            ),
            _ => (false, false),
        };
        prev = curr;
    }

    mark_zone_alerts(rows);
    Ok(())
}

/// Keep only the first `true` of each run; a run restarts after a `false` or
/// after `window` consecutive `true`s.
///
/// `[1,1,1,0,1,1]` with window 2 gives `[1,0,1,0,1,0]`.
pub fn filter_first_of_run(series: &[bool], window: usize) -> Vec<bool> {
    let mut count = 0usize;
    series
        .iter()
        .map(|&high| {
            if !high {
                count = 0;
                return false;
            }
            let emit = count == 0;
            count += 1;
            if count >= window {
                count = 0;
            }
            emit
        })
        .collect()
}

fn mark_zone_alerts(rows: &mut [IndicatorRow]) {
    let near_bottom: Vec<bool> = rows
        .iter()
        .map(|r| r.trend().is_some_and(|tl| tl <= BOTTOM_ZONE))
        .collect();
    let near_top: Vec<bool> = rows
        .iter()
        .map(|r| r.trend().is_some_and(|tl| tl > TOP_ZONE))
        .collect();
    let first_bottom = filter_first_of_run(&near_bottom, ZONE_ALERT_WINDOW);
    let first_top = filter_first_of_run(&near_top, ZONE_ALERT_WINDOW);

    for (i, row) in rows.iter_mut().enumerate() {
        let tl = row.trend();
        row.bottom_alert = first_bottom[i]
            && tl.is_some_and(|v| v < BOTTOM_ZONE)
            && row.bar.close < row.midline;
        row.top_alert = first_top[i] && row.bar.close > row.midline;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossDirection {
    Up,
    Down,
}

/// A band `(lower, upper)` the previous trend value must sit strictly inside.
/// `Up` fires when the current value breaks above `upper`, `Down` when it
/// breaks below `lower`. Use infinities for open-ended bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossRule {
    pub lower: f64,
    pub upper: f64,
    pub direction: CrossDirection,
}

impl CrossRule {
    pub const fn up(lower: f64, upper: f64) -> Self {
        CrossRule {
            lower,
            upper,
            direction: CrossDirection::Up,
        }
    }

    pub const fn down(lower: f64, upper: f64) -> Self {
        CrossRule {
            lower,
            upper,
            direction: CrossDirection::Down,
        }
    }

    pub fn fires(&self, prev: f64, curr: f64) -> bool {
        if !(prev > self.lower && prev < self.upper) {
            return false;
        }
        match self.direction {
            CrossDirection::Up => curr > self.upper,
            CrossDirection::Down => curr < self.lower,
        }
    }
}

/// Rebound rules out of the low zone.
pub fn rebound_rules() -> Vec<CrossRule> {
    vec![
        CrossRule::up(6.0, 11.0),
        CrossRule::up(3.0, 6.0),
        CrossRule::up(1.0, 3.0),
        CrossRule::up(0.0, 1.0),
        CrossRule::up(f64::NEG_INFINITY, 0.0),
    ]
}

/// Pullback rules out of the high zone.
pub fn pullback_rules() -> Vec<CrossRule> {
    vec![
        CrossRule::down(89.0, 94.0),
        CrossRule::down(94.0, 97.0),
        CrossRule::down(97.0, 99.0),
        CrossRule::down(99.0, 100.0),
        CrossRule::down(100.0, f64::INFINITY),
    ]
}

/// For each row, whether any of `rules` fires against the previous row.
pub fn cross_events(rows: &[IndicatorRow], rules: &[CrossRule]) -> Vec<bool> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let Some(prev) = i.checked_sub(1).and_then(|p| rows[p].trend()) else {
                return false;
            };
            let Some(curr) = row.trend() else {
                return false;
            };
            rules.iter().any(|rule| rule.fires(prev, curr))
        })
        .collect()
}
