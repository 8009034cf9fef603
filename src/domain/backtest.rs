//! Backtest engine: single-position, full-allocation simulation.
//!
//! Signals come from (optionally aggregated) indicator rows; exits are decided
//! on the daily series by the configured `ExitStrategySet`. Every fill happens
//! at the next row's open, except the end-of-data close-out which uses the
//! last available close.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::TrendcrossError;
use super::execution::{enter_long, exit_position, is_valid_price, EntryResult};
use super::exit::{CombinationMode, ExitStrategySet, StrategyContext};
use super::indicator::{compute_indicators, IndicatorRow, DEFAULT_LOOKBACK};
use super::metrics::{annualized_return, Metrics};
use super::ohlcv::{sort_by_date, Bar};
use super::period::{aggregate, Period};
use super::portfolio::{Account, EquityPoint};
use super::position::{pair_trades, TradePair};
use super::signal::{validate_buy_threshold, DEFAULT_BUY_THRESHOLD};
use super::strategy::{ExitKind, ExitParams};

pub const DEFAULT_INITIAL_AMOUNT: f64 = 100_000.0;
const MIN_BARS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub period: Period,
    pub initial_amount: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub lookback: usize,
    pub buy_threshold: f64,
    pub exits: ExitParams,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            period: Period::Daily,
            initial_amount: DEFAULT_INITIAL_AMOUNT,
            start_date: None,
            end_date: None,
            lookback: DEFAULT_LOOKBACK,
            buy_threshold: DEFAULT_BUY_THRESHOLD,
            exits: ExitParams::default(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), TrendcrossError> {
        if !self.initial_amount.is_finite() || self.initial_amount <= 0.0 {
            return Err(TrendcrossError::invalid_parameter(
                "initial_amount",
                format!("must be positive, got {}", self.initial_amount),
            ));
        }
        if self.lookback == 0 {
            return Err(TrendcrossError::invalid_parameter(
                "lookback",
                "must be at least 1",
            ));
        }
        validate_buy_threshold(self.buy_threshold)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(TrendcrossError::invalid_parameter(
                    "start_date",
                    format!("{} is after end_date {}", start, end),
                ));
            }
        }
        Ok(())
    }

    fn in_range(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|s| date >= s) && self.end_date.is_none_or(|e| date <= e)
    }
}

/// Final account state of one simulation plus its paired trades.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub account: Account,
    pub trades: Vec<TradePair>,
}

impl SimulationOutcome {
    pub fn final_amount(&self) -> f64 {
        self.account.cash
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub period: Period,
    pub initial_amount: f64,
    pub final_amount: f64,
    pub total_profit: f64,
    pub total_profit_rate: f64,
    pub annualized_return: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub elapsed_days: i64,
    pub total_trades: usize,
    pub buy_signal_count: usize,
    pub sell_signal_count: usize,
    pub exit_strategies: Vec<ExitKind>,
    pub combination_mode: CombinationMode,
    pub statistics: Metrics,
    /// Most recent sell first.
    pub trades: Vec<TradePair>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub fn from_simulation(
        period: Period,
        initial_amount: f64,
        rows: &[IndicatorRow],
        outcome: SimulationOutcome,
        exits: &ExitParams,
    ) -> Self {
        let start_date = rows.first().map(|r| r.bar.date);
        let end_date = rows.last().map(|r| r.bar.date);
        let elapsed_days = match (start_date, end_date) {
            (Some(s), Some(e)) => (e - s).num_days(),
            _ => 0,
        };

        let final_amount = outcome.final_amount();
        let total_profit = final_amount - initial_amount;
        let total_profit_rate = if initial_amount > 0.0 {
            total_profit / initial_amount * 100.0
        } else {
            0.0
        };
        let statistics = Metrics::compute(&outcome.trades, &outcome.account.equity_curve);

        BacktestReport {
            period,
            initial_amount,
            final_amount,
            total_profit,
            total_profit_rate,
            annualized_return: annualized_return(
                initial_amount,
                final_amount,
                elapsed_days as f64,
            ),
            start_date,
            end_date,
            elapsed_days,
            total_trades: outcome.trades.len(),
            buy_signal_count: rows.iter().filter(|r| r.buy_signal).count(),
            sell_signal_count: rows.iter().filter(|r| r.sell_signal).count(),
            exit_strategies: exits.selected.clone(),
            combination_mode: exits.mode,
            statistics,
            trades: outcome.trades,
            equity_curve: outcome.account.equity_curve,
        }
    }
}

/// Run the FLAT/LONG state machine over `rows`.
///
/// `daily` is the daily series the exit strategies inspect; for a daily
/// period it is the same series the rows were computed from. Both must be
/// sorted by date.
pub fn simulate(
    rows: &[IndicatorRow],
    daily: &[Bar],
    period: Period,
    initial_amount: f64,
    exits: &mut ExitStrategySet,
) -> SimulationOutcome {
    let closes: Vec<f64> = daily.iter().map(|b| b.close).collect();
    let ma20: Vec<Option<f64>> = daily.iter().map(|b| b.ma20).collect();

    let mut account = Account::new(initial_amount);
    // next daily index the exit strategies have not seen yet
    let mut next_day = 0usize;
    let mut pending_exit: Option<String> = None;

    for (i, row) in rows.iter().enumerate() {
        account.record_equity(row.bar.date, row.bar.close);

        let Some(next) = rows.get(i + 1) else {
            break;
        };

        if let Some(position) = &account.position {
            if pending_exit.is_none() {
                let ctx = StrategyContext {
                    daily_idx: position.entry_daily_idx,
                    buy_price: position.entry_price,
                    buy_idx: position.entry_daily_idx,
                    closes: &closes,
                    ma20: &ma20,
                    period,
                };
                let end = daily.partition_point(|b| b.date <= row.bar.date);
                while next_day < end {
                    let day = next_day;
                    next_day += 1;
                    if let Some(reason) = exits.evaluate(&StrategyContext {
                        daily_idx: day,
                        ..ctx
                    }) {
                        debug!(date = %daily[day].date, %reason, "exit triggered");
                        pending_exit = Some(reason);
                        break;
                    }
                }
            }

            if let Some(reason) = pending_exit.take() {
                let price = next.bar.open;
                if is_valid_price(price) {
                    if let Some(result) =
                        exit_position(&mut account, price, next.bar.date, Some(reason))
                    {
                        debug!(
                            date = %next.bar.date,
                            price,
                            profit = result.profit,
                            "sell"
                        );
                    }
                    exits.reset();
                } else {
                    warn!(date = %next.bar.date, price, "exit deferred: invalid open price");
                    pending_exit = Some(reason);
                }
            }
        } else if row.buy_signal {
            let entry_idx = daily.partition_point(|b| b.date <= row.bar.date);
            if entry_idx >= daily.len() {
                warn!(date = %row.bar.date, "entry skipped: no daily bar after signal");
                continue;
            }
            match enter_long(&mut account, next.bar.open, next.bar.date, entry_idx) {
                EntryResult::Entered {
                    shares,
                    execution_price,
                    ..
                } => {
                    debug!(date = %next.bar.date, price = execution_price, shares, "buy");
                    exits.on_entry(&StrategyContext {
                        daily_idx: entry_idx,
                        buy_price: execution_price,
                        buy_idx: entry_idx,
                        closes: &closes,
                        ma20: &ma20,
                        period,
                    });
                    next_day = entry_idx + 1;
                }
                EntryResult::Skipped(reason) => {
                    warn!(date = %next.bar.date, %reason, "entry skipped");
                }
            }
        }
    }

    if let Some(position) = &account.position {
        let price = rows
            .iter()
            .rev()
            .map(|r| r.bar.close)
            .find(|c| is_valid_price(*c))
            .unwrap_or(position.entry_price);
        if let Some(last) = rows.last() {
            // a deferred exit keeps its reason through the close-out
            let reason = pending_exit.take();
            debug!(date = %last.bar.date, price, ?reason, "close out open position");
            exit_position(&mut account, price, last.bar.date, reason);
        }
        exits.reset();
    }

    let trades = pair_trades(&account.buys, &account.sells);
    SimulationOutcome { account, trades }
}

/// The bars inside the configured date range, sorted by date.
pub fn select_range(
    daily_bars: &[Bar],
    config: &BacktestConfig,
) -> Result<Vec<Bar>, TrendcrossError> {
    let mut daily: Vec<Bar> = daily_bars
        .iter()
        .filter(|b| config.in_range(b.date))
        .cloned()
        .collect();
    sort_by_date(&mut daily);

    if daily.is_empty() {
        if config.start_date.is_some() || config.end_date.is_some() {
            let bound =
                |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
            return Err(TrendcrossError::NoDataInRange {
                start: bound(config.start_date),
                end: bound(config.end_date),
            });
        }
        return Err(TrendcrossError::InsufficientData {
            bars: 0,
            minimum: MIN_BARS,
        });
    }
    Ok(daily)
}

/// Filter, aggregate, compute signals and simulate over `daily_bars`.
///
/// The daily bars double as the exit strategies' daily series and carry the
/// optional precomputed MA20 column.
pub fn run_backtest(
    daily_bars: &[Bar],
    config: &BacktestConfig,
) -> Result<BacktestReport, TrendcrossError> {
    config.validate()?;
    let mut exits = config.exits.build()?;
    let daily = select_range(daily_bars, config)?;

    if config.exits.uses(ExitKind::MaReversal) && daily.iter().all(|b| b.ma20_value().is_none())
    {
        return Err(TrendcrossError::MissingIndicatorData {
            indicator: "ma20".into(),
            reason: "ma_reversal selected but the daily data has no MA20 values".into(),
        });
    }

    let bars = aggregate(&daily, config.period);
    if bars.len() < MIN_BARS {
        return Err(TrendcrossError::InsufficientData {
            bars: bars.len(),
            minimum: MIN_BARS,
        });
    }

    info!(
        period = %config.period,
        daily = daily.len(),
        bars = bars.len(),
        strategies = ?exits.names(),
        mode = %exits.mode(),
        "running backtest"
    );

    let rows = compute_indicators(&bars, config.lookback, config.buy_threshold)?;
    let outcome = simulate(
        &rows,
        &daily,
        config.period,
        config.initial_amount,
        &mut exits,
    );

    let report = BacktestReport::from_simulation(
        config.period,
        config.initial_amount,
        &rows,
        outcome,
        &config.exits,
    );
    info!(
        trades = report.total_trades,
        final_amount = report.final_amount,
        "backtest complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit::{ExitStrategy, StopLoss};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn bar(date: NaiveDate, open: f64, close: f64) -> Bar {
        Bar::new(date, open, open.max(close), open.min(close), close)
    }

    /// Rows that reuse the bars as-is with a buy signal on the given indices.
    fn rows_with_buys(bars: &[Bar], buys: &[usize]) -> Vec<IndicatorRow> {
        bars.iter()
            .enumerate()
            .map(|(i, b)| {
                let mut row = IndicatorRow::new(b.clone(), 50.0);
                row.buy_signal = buys.contains(&i);
                row
            })
            .collect()
    }

    fn stop_loss_set(pct: f64) -> ExitStrategySet {
        let stop: Box<dyn ExitStrategy> = Box::new(StopLoss::new(pct).unwrap());
        ExitStrategySet::new(vec![stop], CombinationMode::Or).unwrap()
    }

    fn assert_flat_long_invariant(curve: &[EquityPoint]) {
        for p in curve {
            let long = p.shares > 0.0;
            assert!(long != (p.cash > 0.0), "cash and shares both set at {}", p.date);
        }
    }

    #[test]
    fn three_bar_force_close() {
        let bars = vec![
            bar(d(1, 1), 95.0, 98.0),
            bar(d(1, 2), 100.0, 104.0),
            bar(d(1, 3), 106.0, 110.0),
        ];
        let rows = rows_with_buys(&bars, &[0]);
        let mut exits = stop_loss_set(5.0);
        let outcome = simulate(&rows, &bars, Period::Daily, 1000.0, &mut exits);

        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.buy.price, 100.0);
        assert_eq!(trade.buy.shares, 10.0);
        assert_eq!(trade.sell.price, 110.0);
        assert_eq!(trade.exit_reason, None);

        let report = BacktestReport::from_simulation(
            Period::Daily,
            1000.0,
            &rows,
            outcome,
            &ExitParams::default(),
        );
        assert!((report.total_profit - 100.0).abs() < 1e-9);
        assert!((report.total_profit_rate - 10.0).abs() < 1e-9);
        assert_eq!(report.elapsed_days, 2);
    }

    #[test]
    fn stop_loss_exit_executes_next_open() {
        let bars = vec![
            bar(d(1, 1), 100.0, 100.0),
            bar(d(1, 2), 100.0, 99.0),
            bar(d(1, 3), 99.0, 93.0),
            bar(d(1, 4), 92.0, 95.0),
            bar(d(1, 5), 95.0, 96.0),
        ];
        let rows = rows_with_buys(&bars, &[0]);
        let mut exits = stop_loss_set(5.0);
        let outcome = simulate(&rows, &bars, Period::Daily, 1000.0, &mut exits);

        let trade = &outcome.trades[0];
        assert_eq!(trade.sell.date, d(1, 4));
        assert_eq!(trade.sell.price, 92.0);
        assert!(trade.exit_reason.as_deref().unwrap().contains("-7.00"));
        assert!((outcome.final_amount() - 920.0).abs() < 1e-9);
        assert_flat_long_invariant(&outcome.account.equity_curve);
    }

    #[test]
    fn no_reentry_on_exit_row_and_reentry_later() {
        let bars = vec![
            bar(d(1, 1), 100.0, 100.0),
            bar(d(1, 2), 100.0, 90.0),
            bar(d(1, 3), 90.0, 91.0),
            bar(d(1, 4), 91.0, 92.0),
            bar(d(1, 5), 92.0, 94.0),
        ];
        // bought at row 1 open, stop hit on the day 2 close; the row 1 signal
        // arrives while long and is ignored, the row 3 signal re-enters
        let rows = rows_with_buys(&bars, &[0, 1, 3]);
        let mut exits = stop_loss_set(5.0);
        let outcome = simulate(&rows, &bars, Period::Daily, 1000.0, &mut exits);

        assert_eq!(outcome.account.buys.len(), 2);
        assert_eq!(outcome.account.buys[1].date, d(1, 5));
        assert_eq!(outcome.trades.len(), 2);
        // newest first
        assert_eq!(outcome.trades[0].buy.date, d(1, 5));
        assert_eq!(outcome.trades[0].exit_reason, None);
        assert_flat_long_invariant(&outcome.account.equity_curve);
    }

    #[test]
    fn signal_on_last_row_never_enters() {
        let bars = vec![bar(d(1, 1), 10.0, 10.0), bar(d(1, 2), 10.0, 11.0)];
        let rows = rows_with_buys(&bars, &[1]);
        let mut exits = stop_loss_set(5.0);
        let outcome = simulate(&rows, &bars, Period::Daily, 1000.0, &mut exits);
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.final_amount(), 1000.0);
    }

    #[test]
    fn invalid_next_open_skips_entry() {
        let bars = vec![
            bar(d(1, 1), 10.0, 10.0),
            bar(d(1, 2), 0.0, 11.0),
            bar(d(1, 3), 11.0, 12.0),
        ];
        let rows = rows_with_buys(&bars, &[0]);
        let mut exits = stop_loss_set(5.0);
        let outcome = simulate(&rows, &bars, Period::Daily, 1000.0, &mut exits);
        assert!(outcome.account.buys.is_empty());
    }

    #[test]
    fn deferred_exit_keeps_reason_at_close_out() {
        let bars = vec![
            bar(d(1, 1), 100.0, 100.0),
            bar(d(1, 2), 100.0, 100.0),
            bar(d(1, 3), 100.0, 80.0),
            bar(d(1, 4), 0.0, 85.0),
        ];
        let rows = rows_with_buys(&bars, &[0]);
        let mut exits = stop_loss_set(5.0);
        let outcome = simulate(&rows, &bars, Period::Daily, 1000.0, &mut exits);

        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.sell.date, d(1, 4));
        assert_eq!(trade.sell.price, 85.0);
        assert!(trade.exit_reason.as_deref().unwrap().contains("-20.00"));
        assert!(outcome.account.position.is_none());
    }

    #[test]
    fn weekly_rows_check_every_daily_close() {
        // Mon 2024-01-01 .. Fri 2024-01-19, three weeks
        let daily: Vec<Bar> = (1..=19)
            .filter(|day| ![6, 7, 13, 14].contains(day))
            .map(|day| {
                let close = if day == 10 { 85.0 } else { 100.0 };
                bar(d(1, day), 100.0, close)
            })
            .collect();
        let weekly = aggregate(&daily, Period::Weekly);
        assert_eq!(weekly.len(), 3);
        let rows = rows_with_buys(&weekly, &[0]);

        let mut exits = stop_loss_set(10.0);
        let outcome = simulate(&rows, &daily, Period::Weekly, 1000.0, &mut exits);

        // Wednesday's 85 close inside week 2 is caught; sold at week 3 open
        let trade = &outcome.trades[0];
        assert_eq!(trade.buy.date, d(1, 14));
        assert_eq!(trade.sell.date, d(1, 21));
        assert!(trade.exit_reason.as_deref().unwrap().contains("-15.00"));
    }

    #[test]
    fn run_backtest_rejects_bad_amount() {
        let bars = vec![bar(d(1, 1), 1.0, 1.0), bar(d(1, 2), 1.0, 1.0)];
        let config = BacktestConfig {
            initial_amount: 0.0,
            ..BacktestConfig::default()
        };
        assert!(matches!(
            run_backtest(&bars, &config),
            Err(TrendcrossError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn run_backtest_empty_range() {
        let bars = vec![bar(d(1, 1), 1.0, 1.0), bar(d(1, 2), 1.0, 1.0)];
        let config = BacktestConfig {
            start_date: Some(d(6, 1)),
            ..BacktestConfig::default()
        };
        let err = run_backtest(&bars, &config).unwrap_err();
        assert_eq!(err.to_string(), "no data in range 2024-06-01 to -");
    }

    #[test]
    fn run_backtest_needs_two_bars() {
        let bars = vec![bar(d(1, 1), 1.0, 1.0), bar(d(1, 2), 1.0, 1.0)];
        let config = BacktestConfig {
            period: Period::Monthly,
            ..BacktestConfig::default()
        };
        assert!(matches!(
            run_backtest(&bars, &config),
            Err(TrendcrossError::InsufficientData { bars: 1, .. })
        ));
    }

    #[test]
    fn run_backtest_needs_ma20_for_ma_reversal() {
        let bars = vec![bar(d(1, 1), 1.0, 1.0), bar(d(1, 2), 1.0, 1.0)];
        let config = BacktestConfig {
            exits: ExitParams {
                selected: vec![ExitKind::MaReversal],
                ..ExitParams::default()
            },
            ..BacktestConfig::default()
        };
        assert!(matches!(
            run_backtest(&bars, &config),
            Err(TrendcrossError::MissingIndicatorData { .. })
        ));
    }

    #[test]
    fn run_backtest_reports_dates_and_counts() {
        let bars: Vec<Bar> = (1..=20)
            .map(|day| bar(d(1, day), 100.0 + day as f64, 100.0 + day as f64))
            .collect();
        let report = run_backtest(&bars, &BacktestConfig::default()).unwrap();
        assert_eq!(report.start_date, Some(d(1, 1)));
        assert_eq!(report.end_date, Some(d(1, 20)));
        assert_eq!(report.elapsed_days, 19);
        assert_eq!(report.equity_curve.len(), 20);
        assert_eq!(report.exit_strategies, vec![ExitKind::StopLoss]);
    }

    #[test]
    fn config_validation() {
        assert!(BacktestConfig::default().validate().is_ok());
        let bad_range = BacktestConfig {
            start_date: Some(d(2, 1)),
            end_date: Some(d(1, 1)),
            ..BacktestConfig::default()
        };
        assert!(bad_range.validate().is_err());
        let bad_threshold = BacktestConfig {
            buy_threshold: 120.0,
            ..BacktestConfig::default()
        };
        assert!(bad_threshold.validate().is_err());
    }
}
