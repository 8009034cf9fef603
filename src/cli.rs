//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestReport};
use crate::domain::config_validation::{
    read_date, read_f64, read_mode, read_period, read_strategies, read_usize,
    validate_backtest_config, validate_data_config, validate_exit_config,
};
use crate::domain::error::TrendcrossError;
use crate::domain::exit::ma_reversal::DEFAULT_MA_REVERSAL_DAYS;
use crate::domain::exit::stop_loss::DEFAULT_STOP_LOSS_PCT;
use crate::domain::exit::trailing_stop::DEFAULT_TRAILING_STOP_PCT;
use crate::domain::indicator::{compute_indicators, DEFAULT_LOOKBACK};
use crate::domain::ohlcv::Bar;
use crate::domain::period::{aggregate, Period};
use crate::domain::signal::DEFAULT_BUY_THRESHOLD;
use crate::domain::strategy::ExitParams;
use crate::domain::summary::{SignalSummary, DEFAULT_RECENT_ROWS};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_BACKTEST_OUTPUT: &str = "backtest_report.json";
const DEFAULT_SIGNALS_OUTPUT: &str = "signals.json";

#[derive(Parser, Debug)]
#[command(
    name = "trendcross",
    about = "Trend oscillator signals and single-position backtester"
)]
pub struct Cli {
    /// Log filter, e.g. `info` or `trendcross=debug` (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute the oscillator and summarize buy/sell signals
    Signals {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Daily bar CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// D, W or M, overrides [backtest] period
        #[arg(short, long)]
        period: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of trailing rows to include in the summary
        #[arg(long)]
        recent: Option<usize>,
    },
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        period: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(&cli.log_level);
    match cli.command {
        Command::Signals {
            config,
            data,
            period,
            output,
            recent,
        } => run_signals(
            config.as_ref(),
            data.as_ref(),
            period.as_deref(),
            output.as_ref(),
            recent,
        ),
        Command::Backtest {
            config,
            data,
            period,
            output,
        } => run_backtest(
            config.as_ref(),
            data.as_ref(),
            period.as_deref(),
            output.as_ref(),
        ),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Install the stderr subscriber. A second call is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init()
        .ok();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// The config file if given, otherwise an empty configuration (all defaults).
fn load_optional_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    match path {
        Some(p) => {
            eprintln!("Loading config from {}", p.display());
            load_config(p)
        }
        None => FileConfigAdapter::from_string("").map_err(|err| {
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }),
    }
}

fn fail(err: TrendcrossError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TrendcrossError> {
    Ok(BacktestConfig {
        period: read_period(adapter)?.unwrap_or(Period::Daily),
        initial_amount: adapter.get_double(
            "backtest",
            "initial_amount",
            backtest_engine::DEFAULT_INITIAL_AMOUNT,
        ),
        start_date: read_date(adapter, "backtest", "start_date")?,
        end_date: read_date(adapter, "backtest", "end_date")?,
        lookback: read_usize(adapter, "backtest", "lookback")?.unwrap_or(DEFAULT_LOOKBACK),
        buy_threshold: adapter.get_double("backtest", "buy_threshold", DEFAULT_BUY_THRESHOLD),
        exits: build_exit_params(adapter)?,
    })
}

pub fn build_exit_params(adapter: &dyn ConfigPort) -> Result<ExitParams, TrendcrossError> {
    let defaults = ExitParams::default();
    Ok(ExitParams {
        selected: read_strategies(adapter)?.unwrap_or(defaults.selected),
        mode: read_mode(adapter)?.unwrap_or(defaults.mode),
        stop_loss_pct: adapter.get_double("exit", "stop_loss_pct", DEFAULT_STOP_LOSS_PCT),
        take_profit_pct: read_f64(adapter, "exit", "take_profit_pct")?,
        ma_reversal_days: read_usize(adapter, "exit", "ma_reversal_days")?
            .unwrap_or(DEFAULT_MA_REVERSAL_DAYS),
        ma_reversal_min_profit: read_f64(adapter, "exit", "ma_reversal_min_profit")?,
        trailing_stop_pct: adapter.get_double(
            "exit",
            "trailing_stop_pct",
            DEFAULT_TRAILING_STOP_PCT,
        ),
    })
}

/// Resolve the CSV source: the `--data` flag relative to the working
/// directory, else `[data] path` relative to the config file.
pub fn resolve_data_source(
    data_override: Option<&PathBuf>,
    config_path: Option<&PathBuf>,
    adapter: &dyn ConfigPort,
) -> Result<(CsvAdapter, String), TrendcrossError> {
    if let Some(path) = data_override {
        return Ok((
            CsvAdapter::new(PathBuf::from(".")),
            path.display().to_string(),
        ));
    }
    validate_data_config(adapter)?;
    let source = adapter
        .get_string("data", "path")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let base = config_path
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((CsvAdapter::new(base), source))
}

fn apply_period_override(
    config: &mut BacktestConfig,
    period: Option<&str>,
) -> Result<(), TrendcrossError> {
    if let Some(p) = period {
        config.period = p.parse()?;
    }
    Ok(())
}

fn output_path(
    output_override: Option<&PathBuf>,
    adapter: &dyn ConfigPort,
    default: &str,
) -> String {
    output_override
        .map(|p| p.display().to_string())
        .or_else(|| adapter.get_string("report", "output"))
        .unwrap_or_else(|| default.to_string())
}

fn run_signals(
    config_path: Option<&PathBuf>,
    data_override: Option<&PathBuf>,
    period_override: Option<&str>,
    output_override: Option<&PathBuf>,
    recent: Option<usize>,
) -> ExitCode {
    // Stage 1: Load and validate config
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    let mut bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if let Err(e) = apply_period_override(&mut bt_config, period_override) {
        return fail(e);
    }

    // Stage 2: Load data
    let (data_port, source) = match resolve_data_source(data_override, config_path, &adapter) {
        Ok(v) => v,
        Err(e) => return fail(e),
    };
    let daily = match data_port.fetch_daily_bars(&source) {
        Ok(bars) => bars,
        Err(e) => return fail(e),
    };

    // Stage 3: Compute indicators and summarize
    let recent = recent.unwrap_or_else(|| {
        usize::try_from(adapter.get_int("report", "recent_rows", DEFAULT_RECENT_ROWS as i64))
            .unwrap_or(DEFAULT_RECENT_ROWS)
    });
    let summary = match signal_summary(&daily, &bt_config, recent) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    print_signal_summary(&summary);

    // Stage 4: Write report
    let output = output_path(output_override, &adapter, DEFAULT_SIGNALS_OUTPUT);
    let reporter = JsonReportAdapter::new(adapter.get_bool("report", "pretty", true));
    match reporter.write_signals(&summary, &output) {
        Ok(()) => {
            eprintln!("\nSignals written to: {}", output);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Range-filter, aggregate and summarize the oscillator signals of `daily`.
pub fn signal_summary(
    daily: &[Bar],
    config: &BacktestConfig,
    recent: usize,
) -> Result<SignalSummary, TrendcrossError> {
    config.validate()?;
    let daily = backtest_engine::select_range(daily, config)?;
    let bars = aggregate(&daily, config.period);
    debug!(daily = daily.len(), bars = bars.len(), "computing signals");
    let rows = compute_indicators(&bars, config.lookback, config.buy_threshold)?;
    Ok(SignalSummary::from_rows(&rows, config.period, recent))
}

fn print_signal_summary(summary: &SignalSummary) {
    eprintln!("\n=== Signal Summary ({}) ===", summary.period.name());
    eprintln!("Records:          {}", summary.total_records);
    eprintln!("Buy Signals:      {}", summary.buy_count);
    eprintln!("Sell Signals:     {}", summary.sell_count);
    eprintln!("Oversold Rows:    {}", summary.oversold_count);
    eprintln!("Overbought Rows:  {}", summary.overbought_count);

    if let Some(last) = summary.buy_signals.last() {
        eprintln!(
            "Latest Buy:       {} close {:.2} trend {:.2}",
            last.date, last.close, last.trend_line
        );
    }
    if let Some(last) = summary.sell_signals.last() {
        eprintln!(
            "Latest Sell:      {} close {:.2} trend {:.2}",
            last.date, last.close, last.trend_line
        );
    }
}

fn run_backtest(
    config_path: Option<&PathBuf>,
    data_override: Option<&PathBuf>,
    period_override: Option<&str>,
    output_override: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load config
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate
    if let Err(e) = validate_backtest_config(&adapter).and_then(|_| validate_exit_config(&adapter))
    {
        return fail(e);
    }

    // Stage 3: Build BacktestConfig
    let mut bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if let Err(e) = apply_period_override(&mut bt_config, period_override) {
        return fail(e);
    }

    // Stage 4: Load data
    let (data_port, source) = match resolve_data_source(data_override, config_path, &adapter) {
        Ok(v) => v,
        Err(e) => return fail(e),
    };
    eprintln!("Loading daily bars from {}", source);

    let output = output_path(output_override, &adapter, DEFAULT_BACKTEST_OUTPUT);
    let reporter = JsonReportAdapter::new(adapter.get_bool("report", "pretty", true));
    run_backtest_pipeline(&data_port, &source, &bt_config, &reporter, &output)
}

/// Stages after configuration: fetch, simulate, summarize, report.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    source: &str,
    bt_config: &BacktestConfig,
    reporter: &dyn ReportPort,
    output: &str,
) -> ExitCode {
    let daily = match data_port.fetch_daily_bars(source) {
        Ok(bars) => bars,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Running backtest: {} daily bars, period {}, exits [{}] ({})",
        daily.len(),
        bt_config.period,
        bt_config
            .exits
            .selected
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", "),
        bt_config.exits.mode,
    );

    let report = match backtest_engine::run_backtest(&daily, bt_config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_backtest_summary(&report);

    match reporter.write_backtest(&report, output) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn print_backtest_summary(report: &BacktestReport) {
    let stats = &report.statistics;
    eprintln!("\n=== Backtest Results ({}) ===", report.period.name());
    if let (Some(start), Some(end)) = (report.start_date, report.end_date) {
        eprintln!("Range:            {} to {} ({} days)", start, end, report.elapsed_days);
    }
    eprintln!("Initial Amount:   {:.2}", report.initial_amount);
    eprintln!("Final Amount:     {:.2}", report.final_amount);
    eprintln!(
        "Total Profit:     {:.2} ({:.2}%)",
        report.total_profit, report.total_profit_rate
    );
    eprintln!("Annualized:       {:.2}%", report.annualized_return);
    eprintln!("Max Drawdown:     -{:.1}%", stats.max_drawdown);
    eprintln!("Total Trades:     {}", report.total_trades);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate);
    eprintln!("Profit Factor:    {:.2}", stats.profit_factor);
    eprintln!(
        "Signals:          {} buy / {} sell",
        report.buy_signal_count, report.sell_signal_count
    );

    if !report.trades.is_empty() {
        eprintln!("\n=== Recent Trades ===");
        for trade in report.trades.iter().take(10) {
            let sign = if trade.profit >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {} @ {:.2} -> {} @ {:.2}  {}{:.2} ({}{:.2}%)  {}",
                trade.buy.date,
                trade.buy.price,
                trade.sell.date,
                trade.sell.price,
                sign,
                trade.profit,
                sign,
                trade.profit_rate,
                trade.exit_reason.as_deref().unwrap_or("end of data"),
            );
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let checks = validate_data_config(&adapter)
        .and_then(|_| validate_backtest_config(&adapter))
        .and_then(|_| validate_exit_config(&adapter));
    if let Err(e) = checks {
        return fail(e);
    }

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    // strategy parameters are range-checked when the set is built
    if let Err(e) = bt_config.validate().and_then(|_| bt_config.exits.build().map(|_| ())) {
        return fail(e);
    }

    eprintln!("\nBacktest:");
    eprintln!("  Period:          {}", bt_config.period);
    eprintln!("  Initial Amount:  {:.2}", bt_config.initial_amount);
    eprintln!(
        "  Range:           {} to {}",
        bt_config
            .start_date
            .map_or_else(|| "-".to_string(), |d| d.to_string()),
        bt_config
            .end_date
            .map_or_else(|| "-".to_string(), |d| d.to_string()),
    );
    eprintln!("  Lookback:        {}", bt_config.lookback);
    eprintln!("  Buy Threshold:   {}", bt_config.buy_threshold);
    eprintln!("\nExit Strategies ({}):", bt_config.exits.mode);
    for kind in &bt_config.exits.selected {
        eprintln!("  - {}", kind);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
