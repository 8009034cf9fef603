//! Trailing stop following the highest daily close since entry.

use super::{DayCursor, ExitStrategy, StrategyContext};
use crate::domain::error::TrendcrossError;

pub const DEFAULT_TRAILING_STOP_PCT: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct TrailingStop {
    pct: f64,
    high_water: f64,
    stop_price: f64,
    cursor: DayCursor,
}

impl TrailingStop {
    pub fn new(pct: f64) -> Result<Self, TrendcrossError> {
        if !pct.is_finite() || pct <= 0.0 || pct >= 100.0 {
            return Err(TrendcrossError::invalid_parameter(
                "trailing_stop_pct",
                format!("must be within (0, 100), got {}", pct),
            ));
        }
        Ok(TrailingStop {
            pct,
            high_water: 0.0,
            stop_price: 0.0,
            cursor: DayCursor::default(),
        })
    }

    fn raise_to(&mut self, price: f64) {
        self.high_water = price;
        self.stop_price = price * (1.0 - self.pct / 100.0);
    }
}

impl ExitStrategy for TrailingStop {
    fn name(&self) -> &'static str {
        "trailing_stop"
    }

    fn on_entry(&mut self, ctx: &StrategyContext<'_>) {
        self.raise_to(ctx.buy_price);
        self.cursor.start_at(ctx.buy_idx);
    }

    fn should_exit(&mut self, ctx: &StrategyContext<'_>) -> Option<String> {
        if ctx.buy_price <= 0.0 {
            return None;
        }

        let days = self.cursor.pending(ctx);
        for day in days.clone() {
            let Some(close) = ctx.close_at(day).filter(|c| *c > 0.0) else {
                continue;
            };
            if close > self.high_water {
                self.raise_to(close);
            }
            if close < self.stop_price {
                self.cursor.mark(day);
                return Some(format!("trailing stop ({:.2}%)", ctx.change_pct(close)));
            }
        }
        self.cursor.mark_through(&days);
        None
    }

    fn reset(&mut self) {
        self.high_water = 0.0;
        self.stop_price = 0.0;
        self.cursor.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{run_daily, Series};
    use super::*;

    #[test]
    fn seeded_at_buy_price() {
        let series = Series::closes(&[100.0]);
        let mut ts = TrailingStop::new(10.0).unwrap();
        ts.on_entry(&series.ctx(100.0, 0, 0));
        assert!((ts.stop_price - 90.0).abs() < 1e-9);
    }

    #[test]
    fn stop_follows_new_highs() {
        let series = Series::closes(&[100.0, 120.0, 110.0, 107.0]);
        let mut ts = TrailingStop::new(10.0).unwrap();
        let (day, reason) = run_daily(&mut ts, &series, 100.0, 0).unwrap();
        // high 120 -> stop 108; 110 holds, 107 exits
        assert_eq!(day, 3);
        assert_eq!(reason, "trailing stop (7.00%)");
        assert!((ts.high_water - 120.0).abs() < 1e-9);
    }

    #[test]
    fn stop_never_lowers() {
        let series = Series::closes(&[100.0, 130.0, 118.0, 120.0]);
        let mut ts = TrailingStop::new(10.0).unwrap();
        assert!(run_daily(&mut ts, &series, 100.0, 0).is_none());
        assert!((ts.stop_price - 117.0).abs() < 1e-9);
    }

    #[test]
    fn close_below_seeded_stop_exits_at_loss() {
        let series = Series::closes(&[100.0, 84.0]);
        let mut ts = TrailingStop::new(15.0).unwrap();
        let (_, reason) = run_daily(&mut ts, &series, 100.0, 0).unwrap();
        assert!(reason.contains("-16.00"));
    }

    #[test]
    fn reset_clears_high_water() {
        let series = Series::closes(&[100.0, 150.0]);
        let mut ts = TrailingStop::new(10.0).unwrap();
        let _ = run_daily(&mut ts, &series, 100.0, 0);
        ts.reset();
        assert_eq!(ts.high_water, 0.0);
        ts.on_entry(&series.ctx(50.0, 1, 1));
        assert!((ts.stop_price - 45.0).abs() < 1e-9);
    }

    #[test]
    fn pct_domain() {
        assert!(TrailingStop::new(0.0).is_err());
        assert!(TrailingStop::new(100.0).is_err());
        assert!(TrailingStop::new(99.0).is_ok());
    }
}
