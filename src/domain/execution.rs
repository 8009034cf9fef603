//! Entry and exit fills for the single-position account.
//!
//! Entries invest all available cash at the execution price (fractional
//! shares). Exits sell every share and return the proceeds to cash.

use chrono::NaiveDate;

use super::portfolio::Account;
use super::position::{ClosedTrade, Position, TradeLeg};

/// Why an entry attempt did not open a position.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InvalidPrice(f64),
    NoCash,
    AlreadyLong,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidPrice(p) => write!(f, "invalid execution price {}", p),
            SkipReason::NoCash => write!(f, "no cash available"),
            SkipReason::AlreadyLong => write!(f, "position already open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        shares: f64,
        execution_price: f64,
        amount: f64,
    },
    Skipped(SkipReason),
}

pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Enter a long position with all available cash.
pub fn enter_long(
    account: &mut Account,
    price: f64,
    date: NaiveDate,
    daily_idx: usize,
) -> EntryResult {
    if !account.is_flat() {
        return EntryResult::Skipped(SkipReason::AlreadyLong);
    }
    if !is_valid_price(price) {
        return EntryResult::Skipped(SkipReason::InvalidPrice(price));
    }
    if account.cash.is_nan() || account.cash <= 0.0 {
        return EntryResult::Skipped(SkipReason::NoCash);
    }

    let amount = account.cash;
    let shares = amount / price;

    let leg = TradeLeg {
        date,
        price,
        shares,
        amount,
    };
    let position = Position {
        shares,
        entry_price: price,
        entry_amount: amount,
        entry_date: date,
        entry_daily_idx: daily_idx,
    };
    account.open(position, leg);

    EntryResult::Entered {
        shares,
        execution_price: price,
        amount,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub shares: f64,
    pub exit_price: f64,
    pub exit_value: f64,
    pub profit: f64,
    pub profit_rate: f64,
}

/// Sell the open position at `price`. Returns `None` when flat.
pub fn exit_position(
    account: &mut Account,
    price: f64,
    date: NaiveDate,
    reason: Option<String>,
) -> Option<ExitResult> {
    let position = account.close()?;

    let exit_value = position.market_value(price);
    let profit = exit_value - position.entry_amount;
    let profit_rate = if position.entry_amount > 0.0 {
        profit / position.entry_amount * 100.0
    } else {
        0.0
    };

    account.record_sell(ClosedTrade {
        leg: TradeLeg {
            date,
            price,
            shares: position.shares,
            amount: exit_value,
        },
        profit,
        profit_rate,
        exit_reason: reason,
    });

    Some(ExitResult {
        shares: position.shares,
        exit_price: price,
        exit_value,
        profit,
        profit_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn enter_uses_all_cash() {
        let mut account = Account::new(1000.0);
        let result = enter_long(&mut account, 100.0, d(2), 1);
        assert_eq!(
            result,
            EntryResult::Entered {
                shares: 10.0,
                execution_price: 100.0,
                amount: 1000.0,
            }
        );
        assert_eq!(account.cash, 0.0);
        assert_eq!(account.shares(), 10.0);
        assert_eq!(account.position.as_ref().unwrap().entry_daily_idx, 1);
    }

    #[test]
    fn fractional_shares_allowed() {
        let mut account = Account::new(1000.0);
        enter_long(&mut account, 300.0, d(2), 1);
        assert!((account.shares() - 1000.0 / 300.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_price_skipped() {
        let mut account = Account::new(1000.0);
        for price in [0.0, -1.0, f64::NAN] {
            let result = enter_long(&mut account, price, d(2), 1);
            assert!(matches!(
                result,
                EntryResult::Skipped(SkipReason::InvalidPrice(_))
            ));
        }
        assert!(account.is_flat());
        assert_eq!(account.cash, 1000.0);
    }

    #[test]
    fn no_cash_skipped() {
        let mut account = Account::new(0.0);
        assert_eq!(
            enter_long(&mut account, 10.0, d(2), 1),
            EntryResult::Skipped(SkipReason::NoCash)
        );
    }

    #[test]
    fn second_entry_skipped_while_long() {
        let mut account = Account::new(1000.0);
        enter_long(&mut account, 100.0, d(2), 1);
        assert_eq!(
            enter_long(&mut account, 90.0, d(3), 2),
            EntryResult::Skipped(SkipReason::AlreadyLong)
        );
        assert_eq!(account.buys.len(), 1);
    }

    #[test]
    fn exit_books_profit() {
        let mut account = Account::new(1000.0);
        enter_long(&mut account, 100.0, d(2), 1);
        let result =
            exit_position(&mut account, 110.0, d(3), Some("take profit".into())).unwrap();

        assert!((result.profit - 100.0).abs() < 1e-9);
        assert!((result.profit_rate - 10.0).abs() < 1e-9);
        assert!((account.cash - 1100.0).abs() < 1e-9);
        assert!(account.is_flat());
        assert_eq!(account.sells[0].exit_reason.as_deref(), Some("take profit"));
    }

    #[test]
    fn exit_when_flat_is_none() {
        let mut account = Account::new(1000.0);
        assert!(exit_position(&mut account, 100.0, d(3), None).is_none());
        assert!(account.sells.is_empty());
    }
}
