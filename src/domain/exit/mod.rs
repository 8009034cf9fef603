//! Exit strategies for an open long position.
//!
//! Each strategy is a stateful rule evaluated against the daily series,
//! whatever period the signals were computed on, so a breach between two
//! weekly or monthly samples is never missed. The simulator talks only to
//! [`ExitStrategySet`], which combines the selected strategies.

pub mod ma_reversal;
pub mod stop_loss;
pub mod take_profit;
pub mod trailing_stop;

pub use ma_reversal::MaReversal;
pub use stop_loss::StopLoss;
pub use take_profit::TakeProfit;
pub use trailing_stop::TrailingStop;

use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::domain::error::TrendcrossError;
use crate::domain::period::Period;

/// Read-only view handed to every strategy for one evaluated daily bar.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    /// Daily index being evaluated.
    pub daily_idx: usize,
    pub buy_price: f64,
    /// Daily index of the entry day.
    pub buy_idx: usize,
    pub closes: &'a [f64],
    pub ma20: &'a [Option<f64>],
    pub period: Period,
}

impl StrategyContext<'_> {
    pub fn close_at(&self, idx: usize) -> Option<f64> {
        self.closes.get(idx).copied().filter(|c| c.is_finite())
    }

    pub fn ma20_at(&self, idx: usize) -> Option<f64> {
        self.ma20
            .get(idx)
            .copied()
            .flatten()
            .filter(|m| m.is_finite())
    }

    /// Percentage change of `price` against the buy price.
    pub fn change_pct(&self, price: f64) -> f64 {
        (price - self.buy_price) / self.buy_price * 100.0
    }
}

pub trait ExitStrategy: Send {
    fn name(&self) -> &'static str;

    /// Called once per new position; clears all state from the previous one.
    fn on_entry(&mut self, ctx: &StrategyContext<'_>);

    /// Returns the exit reason when the position should close.
    fn should_exit(&mut self, ctx: &StrategyContext<'_>) -> Option<String>;

    fn reset(&mut self);
}

/// Tracks which daily bars a strategy has already looked at, so each day is
/// examined exactly once per position.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DayCursor {
    last_checked: Option<usize>,
}

impl DayCursor {
    pub(crate) fn start_at(&mut self, buy_idx: usize) {
        self.last_checked = Some(buy_idx);
    }

    /// Days after the entry day not yet examined, up to and including the
    /// evaluated day.
    pub(crate) fn pending(&self, ctx: &StrategyContext<'_>) -> Range<usize> {
        let first = ctx.buy_idx + 1;
        let start = self.last_checked.map_or(first, |last| (last + 1).max(first));
        let end = (ctx.daily_idx + 1).min(ctx.closes.len());
        start..end
    }

    pub(crate) fn mark(&mut self, idx: usize) {
        self.last_checked = Some(idx);
    }

    /// Record every day in `days` as examined.
    pub(crate) fn mark_through(&mut self, days: &Range<usize>) {
        if days.end > days.start {
            self.last_checked = Some(days.end - 1);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.last_checked = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationMode {
    /// Any strategy firing closes the position.
    #[default]
    Or,
    /// Every strategy must fire on the same day.
    And,
}

impl fmt::Display for CombinationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinationMode::Or => write!(f, "or"),
            CombinationMode::And => write!(f, "and"),
        }
    }
}

impl FromStr for CombinationMode {
    type Err = TrendcrossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "or" | "any" => Ok(CombinationMode::Or),
            "and" | "all" => Ok(CombinationMode::And),
            other => Err(TrendcrossError::invalid_parameter(
                "mode",
                format!("unknown combination mode '{}', expected or/and", other),
            )),
        }
    }
}

/// The active strategies of one backtest and how their verdicts combine.
pub struct ExitStrategySet {
    strategies: Vec<Box<dyn ExitStrategy>>,
    mode: CombinationMode,
}

impl ExitStrategySet {
    pub fn new(
        strategies: Vec<Box<dyn ExitStrategy>>,
        mode: CombinationMode,
    ) -> Result<Self, TrendcrossError> {
        if strategies.is_empty() {
            return Err(TrendcrossError::invalid_parameter(
                "strategies",
                "at least one exit strategy is required",
            ));
        }
        Ok(ExitStrategySet { strategies, mode })
    }

    pub fn mode(&self) -> CombinationMode {
        self.mode
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn on_entry(&mut self, ctx: &StrategyContext<'_>) {
        for strategy in &mut self.strategies {
            strategy.on_entry(ctx);
        }
    }

    /// Evaluate every strategy against one daily bar and combine the verdicts.
    ///
    /// All strategies are evaluated even after one fires so each advances
    /// over the same days.
    pub fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Option<String> {
        let verdicts: Vec<Option<String>> = self
            .strategies
            .iter_mut()
            .map(|s| s.should_exit(ctx))
            .collect();

        match self.mode {
            CombinationMode::Or => verdicts.into_iter().flatten().next(),
            CombinationMode::And => {
                let reasons: Option<Vec<String>> = verdicts.into_iter().collect();
                reasons.map(|r| r.join("; "))
            }
        }
    }

    pub fn reset(&mut self) {
        for strategy in &mut self.strategies {
            strategy.reset();
        }
    }
}

impl fmt::Debug for ExitStrategySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitStrategySet")
            .field("strategies", &self.names())
            .field("mode", &self.mode)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::Series;
    use super::*;

    struct Fixed {
        name: &'static str,
        fire_on: Option<usize>,
    }

    impl ExitStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn on_entry(&mut self, _ctx: &StrategyContext<'_>) {}
        fn should_exit(&mut self, ctx: &StrategyContext<'_>) -> Option<String> {
            (Some(ctx.daily_idx) == self.fire_on).then(|| format!("{} fired", self.name))
        }
        fn reset(&mut self) {}
    }

    fn fixed(name: &'static str, fire_on: Option<usize>) -> Box<dyn ExitStrategy> {
        Box::new(Fixed { name, fire_on })
    }

    #[test]
    fn empty_set_rejected() {
        let err = ExitStrategySet::new(vec![], CombinationMode::Or).unwrap_err();
        assert!(matches!(err, TrendcrossError::InvalidParameter { .. }));
    }

    #[test]
    fn or_mode_first_selected_reason_wins() {
        let series = Series::closes(&[1.0; 5]);
        let mut set = ExitStrategySet::new(
            vec![fixed("a", Some(3)), fixed("b", Some(2)), fixed("c", Some(2))],
            CombinationMode::Or,
        )
        .unwrap();
        assert_eq!(set.evaluate(&series.ctx(1.0, 0, 1)), None);
        assert_eq!(
            set.evaluate(&series.ctx(1.0, 0, 2)).as_deref(),
            Some("b fired")
        );
    }

    #[test]
    fn and_mode_needs_all_on_same_day() {
        let series = Series::closes(&[1.0; 5]);
        let mut set = ExitStrategySet::new(
            vec![fixed("a", Some(2)), fixed("b", Some(3))],
            CombinationMode::And,
        )
        .unwrap();
        assert_eq!(set.evaluate(&series.ctx(1.0, 0, 2)), None);
        assert_eq!(set.evaluate(&series.ctx(1.0, 0, 3)), None);

        let mut both = ExitStrategySet::new(
            vec![fixed("a", Some(2)), fixed("b", Some(2))],
            CombinationMode::And,
        )
        .unwrap();
        assert_eq!(
            both.evaluate(&series.ctx(1.0, 0, 2)).as_deref(),
            Some("a fired; b fired")
        );
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("OR".parse::<CombinationMode>().unwrap(), CombinationMode::Or);
        assert_eq!("and".parse::<CombinationMode>().unwrap(), CombinationMode::And);
        assert!("xor".parse::<CombinationMode>().is_err());
        assert_eq!(CombinationMode::default(), CombinationMode::Or);
    }

    #[test]
    fn cursor_skips_entry_day_and_checked_days() {
        let series = Series::closes(&[1.0; 6]);
        let mut cursor = DayCursor::default();
        cursor.start_at(1);
        assert_eq!(cursor.pending(&series.ctx(1.0, 1, 3)), 2..4);
        cursor.mark(3);
        assert_eq!(cursor.pending(&series.ctx(1.0, 1, 3)), 4..4);
        assert_eq!(cursor.pending(&series.ctx(1.0, 1, 10)), 4..6);
    }

    #[test]
    fn context_treats_nan_as_missing() {
        let series = Series {
            closes: vec![f64::NAN, 2.0],
            ma20: vec![Some(f64::NAN), None],
        };
        let ctx = series.ctx(1.0, 0, 1);
        assert_eq!(ctx.close_at(0), None);
        assert_eq!(ctx.close_at(1), Some(2.0));
        assert_eq!(ctx.ma20_at(0), None);
        assert_eq!(ctx.ma20_at(5), None);
        assert!((ctx.change_pct(2.0) - 100.0).abs() < f64::EPSILON);
    }
}
