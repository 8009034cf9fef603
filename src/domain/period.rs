//! Period aggregation: daily bars into weekly or monthly bars.
//!
//! Weekly windows are ISO weeks (Monday to Sunday) labeled on the Sunday;
//! monthly windows are calendar months labeled on the last day of the month.
//! The label is the closing boundary even when no trading happened that day.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::TrendcrossError;
use super::ohlcv::{sort_by_date, Bar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Period {
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "M")]
    Monthly,
}

impl Period {
    pub fn name(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }

    /// Closing boundary date of the window containing `date`.
    pub fn window_end(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Daily => date,
            Period::Weekly => {
                let to_sunday = 6 - date.weekday().num_days_from_monday();
                date.checked_add_days(Days::new(to_sunday as u64))
                    .unwrap_or(date)
            }
            Period::Monthly => {
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .and_then(|first| first.pred_opt())
                    .unwrap_or(date)
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Period::Daily => "D",
            Period::Weekly => "W",
            Period::Monthly => "M",
        };
        write!(f, "{}", code)
    }
}

impl FromStr for Period {
    type Err = TrendcrossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(Period::Daily),
            "w" | "week" | "weekly" => Ok(Period::Weekly),
            "m" | "month" | "monthly" => Ok(Period::Monthly),
            other => Err(TrendcrossError::invalid_parameter(
                "period",
                format!("unsupported period '{}', expected D, W or M", other),
            )),
        }
    }
}

/// Aggregate daily bars into `period` bars.
///
/// Daily returns a copy. Partial windows at either end of the series still
/// produce one bar from whatever bars fall inside them.
pub fn aggregate(bars: &[Bar], period: Period) -> Vec<Bar> {
    if period == Period::Daily {
        return bars.to_vec();
    }

    let mut sorted = bars.to_vec();
    sort_by_date(&mut sorted);

    let mut out: Vec<Bar> = Vec::new();
    let mut current_label: Option<NaiveDate> = None;

    for bar in &sorted {
        let label = period.window_end(bar.date);
        if current_label == Some(label) {
            if let Some(agg) = out.last_mut() {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume = match (agg.volume, bar.volume) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
            }
            continue;
        }

        current_label = Some(label);
        out.push(Bar {
            date: label,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            ma20: None,
        });
    }

    out
}
