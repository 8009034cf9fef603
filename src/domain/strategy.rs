//! Exit strategy selection and parameters.
//!
//! `ExitParams` is plain configuration; `build` turns it into a fresh
//! `ExitStrategySet` for one backtest run.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::TrendcrossError;
use crate::domain::exit::ma_reversal::DEFAULT_MA_REVERSAL_DAYS;
use crate::domain::exit::stop_loss::DEFAULT_STOP_LOSS_PCT;
use crate::domain::exit::trailing_stop::DEFAULT_TRAILING_STOP_PCT;
use crate::domain::exit::{
    CombinationMode, ExitStrategy, ExitStrategySet, MaReversal, StopLoss, TakeProfit,
    TrailingStop,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    StopLoss,
    TakeProfit,
    MaReversal,
    TrailingStop,
}

impl ExitKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExitKind::StopLoss => "stop_loss",
            ExitKind::TakeProfit => "take_profit",
            ExitKind::MaReversal => "ma_reversal",
            ExitKind::TrailingStop => "trailing_stop",
        }
    }
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ExitKind {
    type Err = TrendcrossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop_loss" => Ok(ExitKind::StopLoss),
            "take_profit" => Ok(ExitKind::TakeProfit),
            "ma_reversal" | "below_ma20" => Ok(ExitKind::MaReversal),
            "trailing_stop" | "trailing_stop_loss" => Ok(ExitKind::TrailingStop),
            other => Err(TrendcrossError::invalid_parameter(
                "strategies",
                format!("unknown exit strategy '{}'", other),
            )),
        }
    }
}

/// Parse a comma-separated strategy list, dropping duplicates and keeping
/// the first-seen order.
pub fn parse_exit_kinds(list: &str) -> Result<Vec<ExitKind>, TrendcrossError> {
    let mut kinds: Vec<ExitKind> = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind: ExitKind = item.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitParams {
    pub selected: Vec<ExitKind>,
    pub mode: CombinationMode,
    pub stop_loss_pct: f64,
    pub take_profit_pct: Option<f64>,
    pub ma_reversal_days: usize,
    pub ma_reversal_min_profit: Option<f64>,
    pub trailing_stop_pct: f64,
}

impl Default for ExitParams {
    fn default() -> Self {
        ExitParams {
            selected: vec![ExitKind::StopLoss],
            mode: CombinationMode::Or,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: None,
            ma_reversal_days: DEFAULT_MA_REVERSAL_DAYS,
            ma_reversal_min_profit: None,
            trailing_stop_pct: DEFAULT_TRAILING_STOP_PCT,
        }
    }
}

impl ExitParams {
    pub fn uses(&self, kind: ExitKind) -> bool {
        self.selected.contains(&kind)
    }

    /// Build fresh strategy instances in selection order.
    pub fn build(&self) -> Result<ExitStrategySet, TrendcrossError> {
        let strategies = self
            .selected
            .iter()
            .map(|kind| self.build_one(*kind))
            .collect::<Result<Vec<_>, _>>()?;
        ExitStrategySet::new(strategies, self.mode)
    }

    fn build_one(&self, kind: ExitKind) -> Result<Box<dyn ExitStrategy>, TrendcrossError> {
        let strategy: Box<dyn ExitStrategy> = match kind {
            ExitKind::StopLoss => Box::new(StopLoss::new(self.stop_loss_pct)?),
            ExitKind::TakeProfit => Box::new(TakeProfit::new(self.take_profit_pct)?),
            ExitKind::MaReversal => Box::new(MaReversal::new(
                self.ma_reversal_days,
                self.ma_reversal_min_profit,
            )?),
            ExitKind::TrailingStop => Box::new(TrailingStop::new(self.trailing_stop_pct)?),
        };
        Ok(strategy)
    }
}
