//! CLI definition and dispatch.

use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_results_adapter::{CsvResultsAdapter, DEFAULT_RESULTS_DIR};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::open_data_port;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, TradeRecord};
use crate::domain::config_validation::{build_backtest_config, build_live_config};
use crate::domain::error::SigtraderError;
use crate::domain::live::{JobResults, LiveConfig};
use crate::domain::position::Environment;
use crate::domain::metrics::{summarize, Stats};
use crate::domain::series_store::SeriesStore;
use crate::domain::strategy::StrategyRegistry;
use crate::domain::universe::resolve_tickers;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::results_port::ResultsPort;

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Signal-driven trading backtester and paper trader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated tickers, overriding the configured universe
        #[arg(short, long)]
        tickers: Option<String>,
        /// Directory for the results CSV
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Scan for entry signals and place buy orders
    Buy {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Close open positions that hit their target or stop
    Sell {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List registered strategies
    Strategies,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            tickers,
            output_dir,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, tickers.as_deref())
            } else {
                run_backtest(&config, tickers.as_deref(), output_dir.as_deref())
            }
        }
        Command::Buy { config } => run_live(&config, LiveJob::Buy),
        Command::Sell { config } => run_live(&config, LiveJob::Sell),
        Command::Validate { config } => run_validate(&config),
        Command::Strategies => run_strategies(),
    }
}

fn fail(e: SigtraderError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path)
        .map(FileConfigAdapter::with_env_overrides)
        .map_err(|e| {
            fail(SigtraderError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })
        })
}

/// Everything a finished backtest produced.
#[derive(Debug)]
pub struct BacktestOutcome {
    pub records: Vec<TradeRecord>,
    pub stats: Stats,
    /// Where the records were written, `None` when there were no trades.
    pub output: Option<PathBuf>,
}

/// Fetch, simulate, aggregate and persist one backtest run.
///
/// The strategy is resolved before any data is requested.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    results: &dyn ResultsPort,
    registry: &StrategyRegistry,
    bt_config: &BacktestConfig,
    tickers: &[String],
) -> Result<BacktestOutcome, SigtraderError> {
    let signal_fn = registry.get(&bt_config.strategy)?.backtest_fn()?;

    let series = SeriesStore::new(data_port).fetch(tickers, bt_config.start_date, bt_config.end_date)?;
    eprintln!(
        "Running backtest: {} of {} tickers with data, {} to {}",
        series.len(),
        tickers.len(),
        bt_config.start_date,
        bt_config.end_date,
    );

    let records = backtest_engine::run_backtest(tickers, &series, bt_config, signal_fn);
    let stats = summarize(&records);

    let output = if records.is_empty() {
        None
    } else {
        Some(results.write(&bt_config.strategy, &records)?)
    };

    Ok(BacktestOutcome {
        records,
        stats,
        output,
    })
}

fn results_dir(adapter: &dyn ConfigPort, output_dir: Option<&Path>) -> PathBuf {
    output_dir.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(
            adapter
                .get_string("backtest", "results_dir")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_RESULTS_DIR.to_string()),
        )
    })
}

fn run_backtest(config_path: &Path, tickers: Option<&str>, output_dir: Option<&Path>) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    // Stage 2: Resolve strategy before touching data
    let registry = StrategyRegistry::builtin();
    if let Err(e) = registry
        .get(&bt_config.strategy)
        .and_then(|entry| entry.backtest_fn().map(|_| ()))
    {
        return fail(e);
    }
    eprintln!("Strategy: {}", bt_config.strategy);

    // Stage 3: Universe and data source
    let tickers = match resolve_tickers(&adapter, "backtest", tickers, bt_config.max_tickers) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    let data_port = match open_data_port(bt_config.data_source, &adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    eprintln!(
        "Universe: {} tickers from {} source",
        tickers.len(),
        bt_config.data_source
    );

    // Stage 4: Simulate, summarize, persist
    let sink = CsvResultsAdapter::new(results_dir(&adapter, output_dir));
    let outcome = match run_backtest_pipeline(data_port.as_ref(), &sink, &registry, &bt_config, &tickers) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    eprintln!("\n=== Backtest Results: {} ===", bt_config.strategy);
    eprintln!("{}", outcome.stats);
    match outcome.output {
        Some(path) => eprintln!("\nResults written to: {}", path.display()),
        None => eprintln!("\nNo trades were triggered; no results written."),
    }
    ExitCode::SUCCESS
}

fn run_dry_run(config_path: &Path, tickers: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if let Err(e) = StrategyRegistry::builtin()
        .get(&bt_config.strategy)
        .and_then(|entry| entry.backtest_fn().map(|_| ()))
    {
        return fail(e);
    }
    let tickers = match resolve_tickers(&adapter, "backtest", tickers, bt_config.max_tickers) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    eprintln!("Dry run: configuration is valid");
    eprintln!("  Strategy:     {}", bt_config.strategy);
    eprintln!(
        "  Date range:   {} to {}",
        bt_config.start_date, bt_config.end_date
    );
    eprintln!("  Lookback:     {} bars", bt_config.lookback_days);
    eprintln!(
        "  Exit:         +{:.2}% / -{:.2}% within {} bars",
        bt_config.profit_pct * 100.0,
        bt_config.loss_pct * 100.0,
        bt_config.horizon_bars
    );
    eprintln!("  Data source:  {}", bt_config.data_source);
    eprintln!("  Tickers:      {}", tickers.join(", "));
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match validate_config(&adapter) {
        Ok(sections) => {
            eprintln!("Config is valid ({})", sections.join(", "));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Validate every job section present in `adapter`. Returns the names of
/// the sections checked.
pub fn validate_config(adapter: &dyn ConfigPort) -> Result<Vec<&'static str>, SigtraderError> {
    let registry = StrategyRegistry::builtin();
    let mut checked = Vec::new();

    let has_live = ["strategy", "env", "tickers", "tickers_file", "as_of"]
        .iter()
        .any(|k| adapter.get_string("live", k).is_some());
    let has_backtest = adapter.get_string("backtest", "strategy").is_some();

    // With neither section present, report what a backtest is missing.
    if has_backtest || !has_live {
        let bt = build_backtest_config(adapter)?;
        registry.get(&bt.strategy)?.backtest_fn().map(|_| ())?;
        checked.push("backtest");
    }

    if has_live {
        let live = build_live_config(adapter, Local::now().date_naive())?;
        for id in &live.strategies {
            registry.get(id)?;
        }
        checked.push("live");
    }

    Ok(checked)
}

fn run_strategies() -> ExitCode {
    let registry = StrategyRegistry::builtin();
    eprintln!("{:<20} {:<8} {:<8} {:<8}", "strategy", "signals", "exits", "backtest");
    let flag = |b: bool| if b { "yes" } else { "no" };
    for entry in registry.entries() {
        eprintln!(
            "{:<20} {:<8} {:<8} {:<8}",
            entry.id,
            flag(entry.capabilities.generate_signals),
            flag(entry.capabilities.generate_exit_signals),
            flag(entry.capabilities.backtest),
        );
    }
    ExitCode::SUCCESS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiveJob {
    Buy,
    Sell,
}

/// Exit code for a set of job results: the first failure wins.
pub fn job_exit_code(results: &JobResults) -> ExitCode {
    for (id, result) in results {
        match result {
            Ok(report) => eprintln!(
                "{id}: {} signals, {} executed, {} failed",
                report.signals, report.executed, report.failed
            ),
            Err(e) => eprintln!("{id}: error: {e}"),
        }
    }
    match results.iter().find_map(|(_, r)| r.as_ref().err()) {
        Some(e) => e.into(),
        None => ExitCode::SUCCESS,
    }
}

fn run_live(config_path: &Path, job: LiveJob) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let live_config = match build_live_config(&adapter, Local::now().date_naive()) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if live_config.env == Environment::Live {
        return fail(SigtraderError::invalid_config(
            "live",
            "env",
            "no live broker is available, use env = paper",
        ));
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_ledger::SqliteLedger;

        let ledger = match SqliteLedger::from_config(&adapter) {
            Ok(l) => l,
            Err(e) => return fail(e),
        };
        run_live_with_ledger(&adapter, &live_config, job, &ledger)
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (&adapter, &live_config, job);
        fail(SigtraderError::invalid_config(
            "ledger",
            "path",
            "the sqlite feature is required for the trade ledger",
        ))
    }
}

#[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
fn run_live_with_ledger(
    adapter: &dyn ConfigPort,
    live_config: &LiveConfig,
    job: LiveJob,
    ledger: &dyn crate::ports::ledger_port::LedgerPort,
) -> ExitCode {
    use crate::adapters::log_notifier::LogNotifier;
    use crate::adapters::paper_broker::PaperBroker;
    use crate::domain::live::{run_buy_all, run_exit_all, LiveContext};

    let data_port = match open_data_port(live_config.data_source, adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let broker = PaperBroker::new(data_port.as_ref(), live_config.as_of);
    let notifier = LogNotifier;
    let ctx = LiveContext {
        broker: &broker,
        ledger,
        notifier: &notifier,
    };
    let registry = StrategyRegistry::builtin();
    let now = Local::now().naive_local();

    let results = match job {
        LiveJob::Buy => {
            let symbols = match resolve_tickers(adapter, "live", None, live_config.max_tickers) {
                Ok(s) => s,
                Err(e) => return fail(e),
            };
            eprintln!(
                "Scanning {} tickers as of {} ({})",
                symbols.len(),
                live_config.as_of,
                live_config.env
            );
            run_buy_all(&registry, live_config, &symbols, data_port.as_ref(), &ctx, now)
        }
        LiveJob::Sell => {
            eprintln!(
                "Checking open positions as of {} ({})",
                live_config.as_of, live_config.env
            );
            run_exit_all(&registry, live_config, &ctx, now)
        }
    };
    job_exit_code(&results)
}
