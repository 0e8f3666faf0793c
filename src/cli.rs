//! CLI definition and dispatch.
//!
//! Each command runs as a sequence of stages. Progress goes to stderr and
//! results go to stdout.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::strategy_file::load_strategy;
use crate::domain::backtest::{self as engine, BacktestConfig, BacktestResult};
use crate::domain::batch::{BacktestJob, run_batch};
use crate::domain::config_validation::{
    apply_strategy_overrides, build_backtest_config, build_data_spec, validate_data_section,
    validate_regime_section, validate_strategy_section,
};
use crate::domain::error::RegimeTraderError;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::MarketBar;
use crate::domain::regime::SimplifiedRegime;
use crate::domain::strategy::CompositeStrategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "regimetrader", about = "Regime-aware single-asset strategy backtester")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy JSON, overrides [strategy] path
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        /// Bar CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Validate config and strategy without loading bars
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse and validate a strategy file
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Classify every bar and print the regime history
    Regimes {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Only print the regime histogram
        #[arg(long)]
        summary: bool,
    },
    /// Run several strategies over the same bars in parallel
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, required = true, num_args = 1..)]
        strategy: Vec<PathBuf>,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            data,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, strategy.as_deref(), data.as_deref())
            } else {
                run_backtest(&config, strategy.as_deref(), data.as_deref())
            }
        }
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Regimes {
            config,
            data,
            summary,
        } => run_regimes(&config, data.as_deref(), summary),
        Command::Sweep {
            config,
            strategy,
            data,
        } => run_sweep(&config, &strategy, data.as_deref()),
    }
}

fn fail(err: &RegimeTraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Load a strategy file, printing strategy errors with their location.
fn load_strategy_file(path: &Path) -> Result<CompositeStrategy, ExitCode> {
    load_strategy(path).map_err(|e| {
        match &e {
            RegimeTraderError::Strategy(se) => {
                eprintln!("error: {}", se.display_with_context(&path.display().to_string()));
            }
            other => eprintln!("error: failed to read {}: {other}", path.display()),
        }
        (&e).into()
    })
}

/// Load a strategy for a config-driven run, applying `[strategy]` overrides.
fn load_run_strategy(adapter: &dyn ConfigPort, path: &Path) -> Result<CompositeStrategy, ExitCode> {
    let strategy = load_strategy_file(path)?;
    apply_strategy_overrides(adapter, strategy).map_err(|e| fail(&e))
}

fn resolve_strategy_path(adapter: &dyn ConfigPort, strategy_path: Option<&Path>) -> Option<PathBuf> {
    strategy_path
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("strategy", "path").map(PathBuf::from))
}

fn path_str(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.display().to_string())
}

/// Stages shared by every config-driven command: load, validate, build.
fn prepare(
    config_path: &Path,
    data_path: Option<&Path>,
    strategy_required: bool,
    strategy_override: bool,
) -> Result<(FileConfigAdapter, BacktestConfig), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;

    let data_override = path_str(data_path);
    let checks = [
        validate_data_section(&adapter, data_override.as_deref()),
        validate_regime_section(&adapter),
        if strategy_required {
            validate_strategy_section(&adapter, strategy_override)
        } else {
            Ok(())
        },
    ];
    for check in checks {
        if let Err(e) = check {
            return Err(fail(&e));
        }
    }

    let config = build_backtest_config(&adapter).map_err(|e| fail(&e))?;
    Ok((adapter, config))
}

fn load_bars(adapter: &dyn ConfigPort, data_path: Option<&Path>) -> Result<Vec<MarketBar>, ExitCode> {
    let data_override = path_str(data_path);
    let spec = build_data_spec(adapter, data_override.as_deref()).map_err(|e| fail(&e))?;
    eprintln!("Loading {} {} bars from {}", spec.symbol, spec.timeframe, spec.path);

    let data_port: &dyn DataPort = &CsvAdapter::new(&spec.path);
    let bars = data_port
        .fetch_bars(&spec.symbol, &spec.timeframe, spec.start, spec.end)
        .map_err(|e| fail(&e))?;
    eprintln!("  Loaded: {} bars", bars.len());
    Ok(bars)
}

fn run_backtest(config_path: &Path, strategy_path: Option<&Path>, data_path: Option<&Path>) -> ExitCode {
    // Stage 1: Load and validate config
    let (adapter, bt_config) = match prepare(config_path, data_path, true, strategy_path.is_some()) {
        Ok(v) => v,
        Err(code) => return code,
    };

    // Stage 2: Load strategy
    let Some(path) = resolve_strategy_path(&adapter, strategy_path) else {
        return fail(&RegimeTraderError::missing("strategy", "path"));
    };
    eprintln!("Loading strategy from {}", path.display());
    let strategy = match load_run_strategy(&adapter, &path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    eprintln!("  Strategy: {}", strategy.name);

    // Stage 3: Load bars
    let bars = match load_bars(&adapter, data_path) {
        Ok(b) => b,
        Err(code) => return code,
    };

    // Stage 4: Run
    eprintln!("Running backtest over {} bars", bars.len());
    let result = match engine::run(&bars, &strategy, &bt_config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 5: Console summary
    print_summary(&strategy, &bt_config, &result);
    ExitCode::SUCCESS
}

pub fn run_dry_run(config_path: &Path, strategy_path: Option<&Path>, data_path: Option<&Path>) -> ExitCode {
    let (adapter, bt_config) = match prepare(config_path, data_path, true, strategy_path.is_some()) {
        Ok(v) => v,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");

    let Some(path) = resolve_strategy_path(&adapter, strategy_path) else {
        return fail(&RegimeTraderError::missing("strategy", "path"));
    };
    let strategy = match load_run_strategy(&adapter, &path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    // bars are not loaded here, so compare against the configured timeframe
    let data_override = path_str(data_path);
    let spec = match build_data_spec(&adapter, data_override.as_deref()) {
        Ok(spec) => spec,
        Err(e) => return fail(&e),
    };
    if let Err(e) = strategy.check_timeframe(&spec.timeframe) {
        eprintln!("error: {}", e.display_with_context(&path.display().to_string()));
        return (&RegimeTraderError::Strategy(e)).into();
    }

    print_strategy(&strategy);
    println!("\nRun settings:");
    println!("  initial_capital:   {:.2}", bt_config.initial_capital);
    println!("  commission_rate:   {}", bt_config.commission_rate);
    println!("  slippage_rate:     {}", bt_config.slippage_rate);
    println!("  position_size_pct: {}", bt_config.position_size_pct);
    println!("  adaptive_window:   {}", bt_config.adaptive_window);
    println!("  terminal_policy:   {}", bt_config.terminal_policy);

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

pub fn run_validate(strategy_path: &Path) -> ExitCode {
    eprintln!("Validating strategy {}", strategy_path.display());
    let strategy = match load_strategy_file(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    print_strategy(&strategy);
    eprintln!("\nStrategy is valid");
    ExitCode::SUCCESS
}

fn run_regimes(config_path: &Path, data_path: Option<&Path>, summary_only: bool) -> ExitCode {
    let (adapter, bt_config) = match prepare(config_path, data_path, false, false) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let bars = match load_bars(&adapter, data_path) {
        Ok(b) => b,
        Err(code) => return code,
    };

    let history = match engine::replay_regimes(&bars, &bt_config.regime_config()) {
        Ok(h) => h,
        Err(e) => return fail(&e),
    };

    if !summary_only {
        println!(
            "{:<20} {:<10} {:<5} {:<8} {:<11} {:>10}",
            "open_time", "trend", "vol", "momentum", "regime", "confidence"
        );
        for (time, regime) in &history {
            println!(
                "{:<20} {:<10} {:<5} {:<8} {:<11} {:>10.2}",
                time.format("%Y-%m-%d %H:%M:%S").to_string(),
                regime.trend.as_str(),
                regime.volatility.as_str(),
                regime.momentum.as_str(),
                regime.simplified.as_str(),
                regime.confidence
            );
        }
    }

    let mut counts: BTreeMap<SimplifiedRegime, usize> = SimplifiedRegime::ALL.iter().map(|r| (*r, 0)).collect();
    for (_, regime) in &history {
        *counts.entry(regime.simplified).or_default() += 1;
    }
    let total = history.len().max(1) as f64;
    println!("\n=== Regime Distribution ({} bars) ===", history.len());
    for (regime, count) in &counts {
        println!("  {:<11} {:>6}  {:>5.1}%", regime.as_str(), count, *count as f64 / total * 100.0);
    }
    ExitCode::SUCCESS
}

fn run_sweep(config_path: &Path, strategy_paths: &[PathBuf], data_path: Option<&Path>) -> ExitCode {
    let (adapter, bt_config) = match prepare(config_path, data_path, true, true) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let mut strategies = Vec::with_capacity(strategy_paths.len());
    for path in strategy_paths {
        match load_run_strategy(&adapter, path) {
            Ok(s) => strategies.push(s),
            Err(code) => return code,
        }
    }

    let bars = match load_bars(&adapter, data_path) {
        Ok(b) => b,
        Err(code) => return code,
    };

    let jobs: Vec<BacktestJob> = strategies
        .into_iter()
        .map(|s| BacktestJob::new(&bars, s, bt_config.clone()))
        .collect();
    eprintln!("Running {} strategies over {} bars", jobs.len(), bars.len());
    let outcomes = run_batch(&jobs);

    println!(
        "{:<24} {:>7} {:>10} {:>8} {:>9} {:>8} {:>8}",
        "strategy", "trades", "return%", "sharpe", "max_dd%", "win%", "pf"
    );
    let mut exit = ExitCode::SUCCESS;
    for (label, outcome) in &outcomes {
        match outcome {
            Ok(result) => {
                let m = &result.metrics;
                println!(
                    "{:<24} {:>7} {:>10.2} {:>8.2} {:>9.2} {:>8.1} {:>8.2}",
                    label,
                    m.total_trades,
                    m.total_return_pct,
                    m.sharpe_ratio,
                    m.max_drawdown_pct,
                    m.win_rate_pct,
                    m.profit_factor
                );
            }
            Err(e) => {
                println!("{:<24} failed: {e}", label);
                exit = e.into();
            }
        }
    }
    exit
}

fn print_strategy(strategy: &CompositeStrategy) {
    println!("Strategy: {}", strategy.name);
    if !strategy.description.is_empty() {
        println!("  {}", strategy.description);
    }
    println!("\nLogic (parsed):");
    println!("  entry: {}", strategy.entry);
    println!("  exit:  {}", strategy.exit);

    if let Some(allowed) = &strategy.regime_filter {
        let names: Vec<String> = allowed.iter().map(|r| r.to_string()).collect();
        println!("\nRegime filter: [{}]", names.join(", "));
    }
    if let Some(sub) = &strategy.sub_regime_filter {
        println!("Sub-regime filter: {:?}", sub);
    }
    if strategy.has_regime_filter() {
        println!("Filter gates exits: {}", strategy.regime_gates_exits);
    }

    println!("\nIndicators to compute:");
    for indicator in strategy.indicators() {
        println!("  {}", indicator);
    }
}

fn print_summary(strategy: &CompositeStrategy, config: &BacktestConfig, result: &BacktestResult) {
    let m: &Metrics = &result.metrics;

    println!("\n=== {} ===", strategy.name);
    println!("Initial Capital:  {:.2}", config.initial_capital);
    println!("Final Equity:     {:.2}", m.final_equity);
    println!("Total Return:     {:.2}%", m.total_return_pct);
    println!("Annual Return:    {:.2}%", m.annual_return_pct);
    println!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    println!("Max Drawdown:     {:.2}% ({} bars)", m.max_drawdown_pct, m.max_drawdown_duration);
    println!("Total Trades:     {} ({} won, {} lost)", m.total_trades, m.winning_trades, m.losing_trades);
    println!("Win Rate:         {:.1}%", m.win_rate_pct);
    println!("Profit Factor:    {:.2}", m.profit_factor);
    println!("Avg Win / Loss:   {:.2} / {:.2}", m.avg_win, m.avg_loss);
    println!("Streaks (W/L):    {} / {}", m.max_win_streak, m.max_loss_streak);
    println!("Avg Duration:     {:.1} hours", m.avg_trade_duration_hours);

    let s = &result.stats;
    println!(
        "\nBars: {}  Signals: {}  Orders: {}  Regime-blocked: {}",
        s.bars_processed, s.signals_generated, s.orders_executed, s.regime_blocked
    );
    if result.open_position {
        println!("Position still open at end of data (marked to last close)");
    }

    if !result.trades.is_empty() {
        println!("\n=== Trades ===");
        for t in &result.trades {
            let sign = if t.pnl >= 0.0 { "+" } else { "" };
            println!(
                "  {} -> {}  {:.4} @ {:.2} -> {:.2}  {}{:.2} ({}{:.2}%)  [{}]",
                t.entry_time,
                t.exit_time,
                t.quantity,
                t.entry_price,
                t.exit_price,
                sign,
                t.pnl,
                sign,
                t.pnl_pct,
                t.exit_reason
            );
        }
    }
}
