//! Report generation port trait.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::TrendcrossError;
use crate::domain::summary::SignalSummary;

/// Port for writing backtest and signal reports.
pub trait ReportPort {
    fn write_backtest(
        &self,
        report: &BacktestReport,
        output_path: &str,
    ) -> Result<(), TrendcrossError>;

    fn write_signals(
        &self,
        summary: &SignalSummary,
        output_path: &str,
    ) -> Result<(), TrendcrossError>;
}
