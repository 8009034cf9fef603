//! JSON report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::TrendcrossError;
use crate::domain::summary::SignalSummary;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render<T: Serialize>(&self, value: &T) -> Result<String, TrendcrossError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }

    fn write_json<T: Serialize>(&self, value: &T, output_path: &str) -> Result<(), TrendcrossError> {
        let text = self.render(value)?;
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        info!(path = output_path, "report written");
        Ok(())
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_backtest(
        &self,
        report: &BacktestReport,
        output_path: &str,
    ) -> Result<(), TrendcrossError> {
        self.write_json(report, output_path)
    }

    fn write_signals(
        &self,
        summary: &SignalSummary,
        output_path: &str,
    ) -> Result<(), TrendcrossError> {
        self.write_json(summary, output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::run_backtest;
    use crate::domain::backtest::BacktestConfig;
    use crate::domain::indicator::compute_indicators;
    use crate::domain::ohlcv::Bar;
    use crate::domain::period::Period;
    use crate::domain::signal::DEFAULT_BUY_THRESHOLD;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn bars(n: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 10.0;
                Bar::new(start + chrono::Duration::days(i as i64), c, c + 1.0, c - 1.0, c)
            })
            .collect()
    }

    #[test]
    fn writes_backtest_report() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/report.json");
        let report = run_backtest(&bars(40), &BacktestConfig::default()).unwrap();

        JsonReportAdapter::default()
            .write_backtest(&report, out.to_str().unwrap())
            .unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["period"], "D");
        assert_eq!(value["initial_amount"], 100000.0);
        assert!(value["trades"].is_array());
        assert!(value["statistics"]["win_rate"].is_number());
        assert_eq!(value["exit_strategies"][0], "stop_loss");
    }

    #[test]
    fn writes_signal_summary() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("signals.json");
        let rows = compute_indicators(&bars(30), 5, DEFAULT_BUY_THRESHOLD).unwrap();
        let summary = SignalSummary::from_rows(&rows, Period::Daily, 5);

        JsonReportAdapter::new(false)
            .write_signals(&summary, out.to_str().unwrap())
            .unwrap();

        let text = fs::read_to_string(&out).unwrap();
        assert!(!text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["total_records"], 30);
        assert_eq!(value["recent"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn pretty_output_is_indented() {
        let adapter = JsonReportAdapter::new(true);
        let text = adapter.render(&serde_json::json!({"a": 1})).unwrap();
        assert!(text.contains("\n  \"a\": 1"));
    }
}
