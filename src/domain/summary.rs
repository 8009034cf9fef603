//! Signal summary for the `signals` command.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::indicator::IndicatorRow;
use crate::domain::period::Period;

pub const DEFAULT_RECENT_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub trend_line: f64,
}

impl From<&IndicatorRow> for SignalPoint {
    fn from(row: &IndicatorRow) -> Self {
        SignalPoint {
            date: row.bar.date,
            close: row.bar.close,
            trend_line: row.trend_line,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalSummary {
    pub period: Period,
    pub total_records: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub oversold_count: usize,
    pub overbought_count: usize,
    pub buy_signals: Vec<SignalPoint>,
    pub sell_signals: Vec<SignalPoint>,
    pub recent: Vec<IndicatorRow>,
}

impl SignalSummary {
    pub fn from_rows(rows: &[IndicatorRow], period: Period, recent: usize) -> Self {
        let buy_signals: Vec<SignalPoint> = rows
            .iter()
            .filter(|r| r.buy_signal)
            .map(SignalPoint::from)
            .collect();
        let sell_signals: Vec<SignalPoint> = rows
            .iter()
            .filter(|r| r.sell_signal)
            .map(SignalPoint::from)
            .collect();
        let tail = rows.len().saturating_sub(recent);

        SignalSummary {
            period,
            total_records: rows.len(),
            buy_count: buy_signals.len(),
            sell_count: sell_signals.len(),
            oversold_count: rows.iter().filter(|r| r.oversold).count(),
            overbought_count: rows.iter().filter(|r| r.overbought).count(),
            buy_signals,
            sell_signals,
            recent: rows[tail..].to_vec(),
        }
    }
}
