//! OHLCV bar representation.

use chrono::NaiveDate;
use serde::Serialize;

/// One price bar. `ma20` is an externally supplied 20-period moving average
/// of the close; the core never computes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
    pub ma20: Option<f64>,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Bar {
            date,
            open,
            high,
            low,
            close,
            volume: None,
            ma20: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_ma20(mut self, ma20: f64) -> Self {
        self.ma20 = Some(ma20);
        self
    }

    /// MA20 value usable for comparisons; NaN counts as absent.
    pub fn ma20_value(&self) -> Option<f64> {
        self.ma20.filter(|v| v.is_finite())
    }
}

/// Sort bars ascending by date, in place.
pub fn sort_by_date(bars: &mut [Bar]) {
    bars.sort_by_key(|b| b.date);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            100.0,
            110.0,
            90.0,
            105.0,
        )
    }

    #[test]
    fn new_bar_has_no_optional_columns() {
        let bar = sample_bar();
        assert!(bar.volume.is_none());
        assert!(bar.ma20.is_none());
    }

    #[test]
    fn builders_set_optional_columns() {
        let bar = sample_bar().with_volume(50_000.0).with_ma20(101.5);
        assert_eq!(bar.volume, Some(50_000.0));
        assert_eq!(bar.ma20_value(), Some(101.5));
    }

    #[test]
    fn nan_ma20_is_treated_as_absent() {
        let bar = sample_bar().with_ma20(f64::NAN);
        assert!(bar.ma20.is_some());
        assert_eq!(bar.ma20_value(), None);
    }

    #[test]
    fn sort_orders_by_date() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let mut bars = vec![
            Bar::new(d(3), 1.0, 1.0, 1.0, 1.0),
            Bar::new(d(1), 1.0, 1.0, 1.0, 1.0),
            Bar::new(d(2), 1.0, 1.0, 1.0, 1.0),
        ];
        sort_by_date(&mut bars);
        let dates: Vec<_> = bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![d(1), d(2), d(3)]);
    }
}
