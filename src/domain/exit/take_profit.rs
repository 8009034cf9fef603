//! Fixed-percentage take profit; inactive when no target is configured.

use super::{DayCursor, ExitStrategy, StrategyContext};
use crate::domain::error::TrendcrossError;

#[derive(Debug, Clone)]
pub struct TakeProfit {
    pct: Option<f64>,
    cursor: DayCursor,
}

impl TakeProfit {
    pub fn new(pct: Option<f64>) -> Result<Self, TrendcrossError> {
        if let Some(p) = pct {
            if !p.is_finite() || p <= 0.0 {
                return Err(TrendcrossError::invalid_parameter(
                    "take_profit_pct",
                    format!("must be positive, got {}", p),
                ));
            }
        }
        Ok(TakeProfit {
            pct,
            cursor: DayCursor::default(),
        })
    }
}

impl ExitStrategy for TakeProfit {
    fn name(&self) -> &'static str {
        "take_profit"
    }

    fn on_entry(&mut self, ctx: &StrategyContext<'_>) {
        self.cursor.start_at(ctx.buy_idx);
    }

    fn should_exit(&mut self, ctx: &StrategyContext<'_>) -> Option<String> {
        let target = self.pct?;
        if ctx.buy_price <= 0.0 {
            return None;
        }

        let days = self.cursor.pending(ctx);
        for day in days.clone() {
            let Some(close) = ctx.close_at(day) else {
                continue;
            };
            let change = ctx.change_pct(close);
            if change >= target {
                self.cursor.mark(day);
                return Some(format!("take profit ({:.2}%)", change));
            }
        }
        self.cursor.mark_through(&days);
        None
    }

    fn reset(&mut self) {
        self.cursor.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{run_daily, Series};
    use super::*;

    #[test]
    fn target_reached_triggers() {
        let series = Series::closes(&[100.0, 105.0, 112.5]);
        let mut tp = TakeProfit::new(Some(10.0)).unwrap();
        let (day, reason) = run_daily(&mut tp, &series, 100.0, 0).unwrap();
        assert_eq!(day, 2);
        assert_eq!(reason, "take profit (12.50%)");
    }

    #[test]
    fn below_target_holds() {
        let series = Series::closes(&[100.0, 109.9]);
        let mut tp = TakeProfit::new(Some(10.0)).unwrap();
        assert!(run_daily(&mut tp, &series, 100.0, 0).is_none());
    }

    #[test]
    fn unset_target_never_exits() {
        let series = Series::closes(&[100.0, 500.0]);
        let mut tp = TakeProfit::new(None).unwrap();
        assert!(run_daily(&mut tp, &series, 100.0, 0).is_none());
    }

    #[test]
    fn invalid_target_rejected() {
        assert!(TakeProfit::new(Some(0.0)).is_err());
        assert!(TakeProfit::new(Some(-1.0)).is_err());
    }
}
