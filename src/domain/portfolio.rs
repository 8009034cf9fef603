//! Single-position cash account and equity tracking.

use chrono::NaiveDate;
use serde::Serialize;

use super::position::{ClosedTrade, Position, TradeLeg};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: f64,
    pub shares: f64,
    pub equity: f64,
}

/// Cash plus at most one open position. Entries spend all cash and exits
/// return all proceeds, so cash and position value are never both positive.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub cash: f64,
    pub initial_amount: f64,
    pub position: Option<Position>,
    pub buys: Vec<TradeLeg>,
    pub sells: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Account {
    pub fn new(initial_amount: f64) -> Self {
        Account {
            cash: initial_amount,
            initial_amount,
            position: None,
            buys: Vec::new(),
            sells: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn shares(&self) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.shares)
    }

    pub fn total_equity(&self, price: f64) -> f64 {
        self.cash
            + self
                .position
                .as_ref()
                .map_or(0.0, |p| p.market_value(price))
    }

    pub fn record_equity(&mut self, date: NaiveDate, price: f64) {
        let equity = self.total_equity(price);
        self.equity_curve.push(EquityPoint {
            date,
            cash: self.cash,
            shares: self.shares(),
            equity,
        });
    }

    pub fn open(&mut self, position: Position, leg: TradeLeg) {
        self.cash -= leg.amount;
        self.position = Some(position);
        self.buys.push(leg);
    }

    pub fn close(&mut self) -> Option<Position> {
        self.position.take()
    }

    pub fn record_sell(&mut self, trade: ClosedTrade) {
        self.cash += trade.leg.amount;
        self.sells.push(trade);
    }
}
