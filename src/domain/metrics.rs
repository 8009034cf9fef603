//! Performance metrics and trade statistics.

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::position::TradePair;

pub const DAYS_PER_YEAR: f64 = 365.25;

/// Compound annual return in percent.
///
/// Returns 0 when `elapsed_days <= 0` or `initial_amount <= 0`.
pub fn annualized_return(initial_amount: f64, final_amount: f64, elapsed_days: f64) -> f64 {
    if elapsed_days <= 0.0 || initial_amount <= 0.0 {
        return 0.0;
    }
    let growth = final_amount / initial_amount;
    let value = (growth.powf(DAYS_PER_YEAR / elapsed_days) - 1.0) * 100.0;
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    /// Percent of closed trades with positive profit.
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_days: f64,
    /// Largest peak-to-trough decline of the equity curve, in percent.
    pub max_drawdown: f64,
    /// Longest run of equity points spent below a prior peak.
    pub max_drawdown_duration: i64,
}

impl Metrics {
    pub fn compute(trades: &[TradePair], equity_curve: &[EquityPoint]) -> Self {
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding_days = 0i64;

        for trade in trades {
            let pnl = trade.profit;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_holding_days += trade.holding_days();
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_holding_days = if total_trades > 0 {
            total_holding_days as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_holding_days,
            max_drawdown,
            max_drawdown_duration,
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if !point.equity.is_finite() {
            continue;
        }
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak * 100.0);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}
