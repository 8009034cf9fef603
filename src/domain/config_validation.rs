//! Configuration validation.
//!
//! Every key is read as a string and parsed here, so a malformed value is
//! reported as `ConfigInvalid` instead of silently falling back to a default.

use crate::domain::error::TrendcrossError;
use crate::domain::exit::CombinationMode;
use crate::domain::period::Period;
use crate::domain::signal::validate_buy_threshold;
use crate::domain::strategy::{parse_exit_kinds, ExitKind};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;
use tracing::warn;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TrendcrossError> {
    read_period(config)?;
    validate_initial_amount(config)?;
    validate_dates(config)?;
    validate_lookback(config)?;
    validate_buy_threshold_key(config)?;
    Ok(())
}

pub fn validate_exit_config(config: &dyn ConfigPort) -> Result<(), TrendcrossError> {
    let kinds = read_strategies(config)?.unwrap_or_default();
    read_mode(config)?;

    positive_if_set(config, "exit", "stop_loss_pct")?;
    positive_if_set(config, "exit", "take_profit_pct")?;
    positive_if_set(config, "exit", "ma_reversal_min_profit")?;

    if let Some(days) = read_usize(config, "exit", "ma_reversal_days")? {
        if days == 0 {
            return Err(invalid("exit", "ma_reversal_days", "must be at least 1"));
        }
    }
    if let Some(pct) = read_f64(config, "exit", "trailing_stop_pct")? {
        if pct <= 0.0 || pct >= 100.0 {
            return Err(invalid(
                "exit",
                "trailing_stop_pct",
                "must be between 0 and 100 (exclusive)",
            ));
        }
    }
    if kinds.contains(&ExitKind::TakeProfit)
        && read_f64(config, "exit", "take_profit_pct")?.is_none()
    {
        warn!("take_profit selected without [exit] take_profit_pct, it will never fire");
    }
    Ok(())
}

/// `[data] path` is only required when no path is supplied elsewhere.
pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TrendcrossError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TrendcrossError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        }),
    }
}

fn validate_initial_amount(config: &dyn ConfigPort) -> Result<(), TrendcrossError> {
    match read_f64(config, "backtest", "initial_amount")? {
        Some(value) if value <= 0.0 => Err(invalid(
            "backtest",
            "initial_amount",
            "initial_amount must be positive",
        )),
        _ => Ok(()),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TrendcrossError> {
    let start = read_date(config, "backtest", "start_date")?;
    let end = read_date(config, "backtest", "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), TrendcrossError> {
    match read_usize(config, "backtest", "lookback")? {
        Some(0) => Err(invalid("backtest", "lookback", "lookback must be at least 1")),
        _ => Ok(()),
    }
}

fn validate_buy_threshold_key(config: &dyn ConfigPort) -> Result<(), TrendcrossError> {
    if let Some(value) = read_f64(config, "backtest", "buy_threshold")? {
        validate_buy_threshold(value)
            .map_err(|e| invalid("backtest", "buy_threshold", e.to_string()))?;
    }
    Ok(())
}

fn positive_if_set(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), TrendcrossError> {
    match read_f64(config, section, key)? {
        Some(value) if value <= 0.0 => {
            Err(invalid(section, key, format!("{} must be positive", key)))
        }
        _ => Ok(()),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TrendcrossError {
    TrendcrossError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Non-empty trimmed value of a key.
fn read_raw(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, TrendcrossError> {
    read_raw(config, section, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| invalid(section, key, format!("expected {}, got '{}'", expected, raw)))
        })
        .transpose()
}

/// Finite float value, `None` when the key is absent.
pub fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, TrendcrossError> {
    match read_parsed::<f64>(config, section, key, "a number")? {
        Some(v) if !v.is_finite() => Err(invalid(section, key, "must be finite")),
        other => Ok(other),
    }
}

pub fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, TrendcrossError> {
    read_parsed(config, section, key, "a non-negative integer")
}

pub fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, TrendcrossError> {
    read_raw(config, section, key)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                invalid(
                    section,
                    key,
                    format!("invalid {} format, expected YYYY-MM-DD", key),
                )
            })
        })
        .transpose()
}

pub fn read_period(config: &dyn ConfigPort) -> Result<Option<Period>, TrendcrossError> {
    read_raw(config, "backtest", "period")
        .map(|raw| {
            raw.parse::<Period>()
                .map_err(|e| invalid("backtest", "period", e.to_string()))
        })
        .transpose()
}

pub fn read_mode(config: &dyn ConfigPort) -> Result<Option<CombinationMode>, TrendcrossError> {
    read_raw(config, "exit", "mode")
        .map(|raw| {
            raw.parse::<CombinationMode>()
                .map_err(|e| invalid("exit", "mode", e.to_string()))
        })
        .transpose()
}

/// Selected exit strategies; `None` when the key is absent.
pub fn read_strategies(config: &dyn ConfigPort) -> Result<Option<Vec<ExitKind>>, TrendcrossError> {
    let Some(raw) = config.get_string("exit", "strategies") else {
        return Ok(None);
    };
    let kinds =
        parse_exit_kinds(&raw).map_err(|e| invalid("exit", "strategies", e.to_string()))?;
    if kinds.is_empty() {
        return Err(invalid(
            "exit",
            "strategies",
            "at least one exit strategy is required",
        ));
    }
    Ok(Some(kinds))
}
