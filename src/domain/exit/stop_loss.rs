//! Fixed-percentage stop loss measured on daily closes.

use super::{DayCursor, ExitStrategy, StrategyContext};
use crate::domain::error::TrendcrossError;

pub const DEFAULT_STOP_LOSS_PCT: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct StopLoss {
    pct: f64,
    cursor: DayCursor,
}

impl StopLoss {
    pub fn new(pct: f64) -> Result<Self, TrendcrossError> {
        if !pct.is_finite() || pct <= 0.0 {
            return Err(TrendcrossError::invalid_parameter(
                "stop_loss_pct",
                format!("must be positive, got {}", pct),
            ));
        }
        Ok(StopLoss {
            pct,
            cursor: DayCursor::default(),
        })
    }
}

impl ExitStrategy for StopLoss {
    fn name(&self) -> &'static str {
        "stop_loss"
    }

    fn on_entry(&mut self, ctx: &StrategyContext<'_>) {
        self.cursor.start_at(ctx.buy_idx);
    }

    fn should_exit(&mut self, ctx: &StrategyContext<'_>) -> Option<String> {
        if ctx.buy_price <= 0.0 {
            return None;
        }

        let days = self.cursor.pending(ctx);
        for day in days.clone() {
            let Some(close) = ctx.close_at(day) else {
                continue;
            };
            let change = ctx.change_pct(close);
            if change <= -self.pct {
                self.cursor.mark(day);
                return Some(format!("stop loss ({:.2}%)", change));
            }
        }
        self.cursor.mark_through(&days);
        None
    }

    fn reset(&mut self) {
        self.cursor.clear();
    }
}
