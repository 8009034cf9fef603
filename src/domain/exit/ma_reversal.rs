//! Moving-average reversal exit.
//!
//! Only armed when the entry day closed below its MA20. The position is then
//! held until the close crosses above MA20, after which `days` consecutive
//! closes back below MA20 close it. With a minimum profit set, closes below
//! MA20 are only counted once the daily profit has reached that level at
//! least once; the flag stays set for the life of the position while the
//! consecutive count still resets on any close at or above MA20.

use super::{DayCursor, ExitStrategy, StrategyContext};
use crate::domain::error::TrendcrossError;

pub const DEFAULT_MA_REVERSAL_DAYS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Entry did not happen below MA20.
    Disarmed,
    WaitCross,
    WatchDecline,
}

#[derive(Debug, Clone)]
pub struct MaReversal {
    days: usize,
    min_profit: Option<f64>,
    phase: Phase,
    below_count: usize,
    profit_reached: bool,
    cursor: DayCursor,
}

impl MaReversal {
    pub fn new(days: usize, min_profit: Option<f64>) -> Result<Self, TrendcrossError> {
        if days == 0 {
            return Err(TrendcrossError::invalid_parameter(
                "ma_reversal_days",
                "must be at least 1",
            ));
        }
        if let Some(m) = min_profit {
            if !m.is_finite() || m <= 0.0 {
                return Err(TrendcrossError::invalid_parameter(
                    "ma_reversal_min_profit",
                    format!("must be positive, got {}", m),
                ));
            }
        }
        Ok(MaReversal {
            days,
            min_profit,
            phase: Phase::Disarmed,
            below_count: 0,
            profit_reached: false,
            cursor: DayCursor::default(),
        })
    }

    fn crossed_up(ctx: &StrategyContext<'_>, day: usize) -> bool {
        let prev = day - 1;
        match (
            ctx.close_at(prev),
            ctx.ma20_at(prev),
            ctx.close_at(day),
            ctx.ma20_at(day),
        ) {
            (Some(pc), Some(pm), Some(c), Some(m)) => pc <= pm && c > m,
            _ => false,
        }
    }

    fn exit_reason(&self, ctx: &StrategyContext<'_>, close: f64) -> String {
        let profit = match self.min_profit {
            Some(_) => format!(" (profit {:.2}%)", ctx.change_pct(close)),
            None => String::new(),
        };
        format!(
            "close below MA20 for {} days{}, exit on day {}",
            self.days,
            profit,
            self.days + 1
        )
    }
}

impl ExitStrategy for MaReversal {
    fn name(&self) -> &'static str {
        "ma_reversal"
    }

    fn on_entry(&mut self, ctx: &StrategyContext<'_>) {
        self.reset();
        let entry_below = match (ctx.close_at(ctx.buy_idx), ctx.ma20_at(ctx.buy_idx)) {
            (Some(close), Some(ma)) => close < ma,
            _ => false,
        };
        if entry_below {
            self.phase = Phase::WaitCross;
        }
        self.cursor.start_at(ctx.buy_idx);
    }

    fn should_exit(&mut self, ctx: &StrategyContext<'_>) -> Option<String> {
        if self.phase == Phase::Disarmed {
            return None;
        }

        let days = self.cursor.pending(ctx);
        for day in days.clone() {
            if self.phase == Phase::WaitCross {
                if Self::crossed_up(ctx, day) {
                    self.phase = Phase::WatchDecline;
                    self.below_count = 0;
                }
                continue;
            }

            let (Some(close), Some(ma)) = (ctx.close_at(day), ctx.ma20_at(day)) else {
                continue;
            };

            if let Some(min_profit) = self.min_profit {
                if ctx.buy_price > 0.0 && ctx.change_pct(close) >= min_profit {
                    self.profit_reached = true;
                }
                if !self.profit_reached {
                    continue;
                }
            }

            if close < ma {
                self.below_count += 1;
                if self.below_count >= self.days {
                    self.cursor.mark(day);
                    return Some(self.exit_reason(ctx, close));
                }
            } else {
                self.below_count = 0;
            }
        }
        self.cursor.mark_through(&days);
        None
    }

    fn reset(&mut self) {
        self.phase = Phase::Disarmed;
        self.below_count = 0;
        self.profit_reached = false;
        self.cursor.clear();
    }
}
