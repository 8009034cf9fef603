//! Open position, trade legs and buy/sell pairing.

use chrono::NaiveDate;
use serde::Serialize;

/// The single open long position of a backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub shares: f64,
    pub entry_price: f64,
    /// Cash spent on entry.
    pub entry_amount: f64,
    pub entry_date: NaiveDate,
    /// Index of the entry day in the daily series.
    pub entry_daily_idx: usize,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }
}

/// One buy or sell execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeLeg {
    pub date: NaiveDate,
    pub price: f64,
    pub shares: f64,
    pub amount: f64,
}

/// A sell leg with the outcome of the position it closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub leg: TradeLeg,
    pub profit: f64,
    pub profit_rate: f64,
    pub exit_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePair {
    pub buy: TradeLeg,
    pub sell: TradeLeg,
    pub profit: f64,
    pub profit_rate: f64,
    /// `None` for a position force-closed at the end of the data.
    pub exit_reason: Option<String>,
}

impl TradePair {
    pub fn holding_days(&self) -> i64 {
        (self.sell.date - self.buy.date).num_days()
    }
}

/// Pair the i-th buy with the i-th sell, most recent sell first.
///
/// Unmatched buys are dropped; the simulator force-closes any open position
/// before pairing so this only happens with hand-built ledgers.
pub fn pair_trades(buys: &[TradeLeg], sells: &[ClosedTrade]) -> Vec<TradePair> {
    let mut pairs: Vec<TradePair> = buys
        .iter()
        .zip(sells)
        .map(|(buy, sell)| TradePair {
            buy: buy.clone(),
            sell: sell.leg.clone(),
            profit: sell.profit,
            profit_rate: sell.profit_rate,
            exit_reason: sell.exit_reason.clone(),
        })
        .collect();
    pairs.sort_by(|a, b| b.sell.date.cmp(&a.sell.date));
    pairs
}
