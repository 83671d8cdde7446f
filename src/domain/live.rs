//! Live entry and exit jobs.
//!
//! Both jobs run one pass per configured strategy: fetch, decide, route
//! orders through the broker, notify and write the trade ledger. A failure
//! on one symbol or one strategy is reported and the pass continues.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use super::data_source::DataSource;
use super::error::SigtraderError;
use super::position::{Environment, Holding, LedgerEntry, TradeStatus};
use super::series_store::SeriesStore;
use super::signal::{Action, Signal};
use super::strategy::{ExitParams, SignalParams, StrategyEntry, StrategyRegistry};
use crate::ports::broker_port::{BrokerPort, Order};
use crate::ports::data_port::DataPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::notifier_port::NotifierPort;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    /// Strategy ids run in order by the job drivers.
    pub strategies: Vec<String>,
    pub lookback_days: usize,
    /// Calendar days of history fetched before `as_of`.
    pub period_days: usize,
    pub volume_multiplier: f64,
    pub profit_pct: f64,
    pub loss_pct: f64,
    pub env: Environment,
    pub data_source: DataSource,
    pub as_of: NaiveDate,
    pub max_tickers: Option<usize>,
}

impl LiveConfig {
    pub fn signal_params(&self) -> SignalParams {
        SignalParams {
            lookback_days: self.lookback_days,
            volume_multiplier: self.volume_multiplier,
        }
    }

    pub fn exit_params(&self) -> ExitParams {
        ExitParams {
            profit_pct: self.profit_pct,
            loss_pct: self.loss_pct,
        }
    }
}

/// Outcome counts for one job pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub signals: usize,
    pub executed: usize,
    pub failed: usize,
}

/// Collaborators shared by both jobs.
pub struct LiveContext<'a> {
    pub broker: &'a dyn BrokerPort,
    pub ledger: &'a dyn LedgerPort,
    pub notifier: &'a dyn NotifierPort,
}

impl LiveContext<'_> {
    fn notify(&self, message: &str) {
        if let Err(e) = self.notifier.notify(message) {
            warn!(error = %e, "notification failed");
        }
    }

    fn route(&self, signal: &Signal, price: f64) -> Result<(), SigtraderError> {
        let ack = self.broker.submit_order(&Order {
            symbol: signal.symbol.clone(),
            action: signal.action,
            quantity: signal.quantity,
        })?;
        info!(
            symbol = %signal.symbol,
            action = %signal.action,
            quantity = signal.quantity,
            price,
            order_id = %ack.order_id,
            "order submitted"
        );
        Ok(())
    }

    /// Quote, route and record an entry. Returns the quoted price.
    fn enter(
        &self,
        signal: &Signal,
        strategy: &str,
        config: &LiveConfig,
        now: NaiveDateTime,
    ) -> Result<f64, SigtraderError> {
        let price = self.broker.latest_price(&signal.symbol)?;
        self.route(signal, price)?;
        self.ledger.record(&ledger_entry(
            signal,
            strategy,
            config,
            price,
            TradeStatus::Executed,
            now,
        ))?;
        Ok(price)
    }

    /// Quote an exit and route it inside the ledger's exit unit, so the
    /// order only stands if the sell row and the closed buys are written.
    fn exit(
        &self,
        signal: &Signal,
        strategy: &str,
        config: &LiveConfig,
        now: NaiveDateTime,
    ) -> Result<f64, SigtraderError> {
        let price = self.broker.latest_price(&signal.symbol)?;
        let sell = ledger_entry(signal, strategy, config, price, TradeStatus::Closed, now);
        let closed = self
            .ledger
            .record_exit(&sell, &mut || self.route(signal, price))?;
        info!(symbol = %signal.symbol, closed, "position closed");
        Ok(price)
    }
}

fn ledger_entry(
    signal: &Signal,
    strategy: &str,
    config: &LiveConfig,
    price: f64,
    status: TradeStatus,
    now: NaiveDateTime,
) -> LedgerEntry {
    LedgerEntry {
        timestamp: now,
        symbol: signal.symbol.clone(),
        action: signal.action,
        quantity: signal.quantity,
        price,
        strategy: strategy.to_string(),
        env: config.env,
        status,
        notes: signal.note.clone(),
    }
}

fn fail_job(ctx: &LiveContext<'_>, job: &str, strategy: &str, err: SigtraderError) -> SigtraderError {
    error!(%strategy, error = %err, "{job} job failed");
    ctx.notify(&format!("[{job}] {strategy} failed: {err}"));
    err
}

/// Scan `symbols` for entry signals as of `config.as_of` and buy each one.
pub fn run_buy(
    entry: &StrategyEntry,
    config: &LiveConfig,
    symbols: &[String],
    data: &dyn DataPort,
    ctx: &LiveContext<'_>,
    now: NaiveDateTime,
) -> Result<JobReport, SigtraderError> {
    let start = config.as_of - Duration::days(config.period_days as i64);
    let series = SeriesStore::new(data)
        .fetch(symbols, start, config.as_of)
        .map_err(|e| fail_job(ctx, "buy", &entry.id, e))?;
    let signals = entry
        .generate_signals(symbols, &series, &config.signal_params())
        .map_err(|e| fail_job(ctx, "buy", &entry.id, e))?;

    let mut report = JobReport {
        signals: signals.len(),
        ..JobReport::default()
    };
    for signal in signals.iter().filter(|s| s.action == Action::Buy) {
        match ctx.enter(signal, &entry.id, config, now) {
            Ok(price) => {
                report.executed += 1;
                ctx.notify(&format!(
                    "[{}] BUY {} x{} @ {price:.2} ({})",
                    config.env, signal.symbol, signal.quantity, entry.id
                ));
            }
            Err(e) => {
                report.failed += 1;
                error!(symbol = %signal.symbol, error = %e, "buy failed");
                ctx.notify(&format!("[{}] BUY {} failed: {e}", config.env, signal.symbol));
            }
        }
    }

    info!(
        strategy = %entry.id,
        signals = report.signals,
        executed = report.executed,
        failed = report.failed,
        "buy job finished"
    );
    Ok(report)
}

/// Merge holdings of the same symbol into one position with the
/// quantity-weighted entry price.
fn consolidate(holdings: Vec<Holding>) -> Vec<Holding> {
    let mut merged: BTreeMap<String, Holding> = BTreeMap::new();
    for h in holdings {
        match merged.get_mut(&h.symbol) {
            Some(acc) => {
                let qty = acc.quantity + h.quantity;
                if qty > 0 {
                    acc.entry_price = (acc.entry_price * acc.quantity as f64
                        + h.entry_price * h.quantity as f64)
                        / qty as f64;
                }
                acc.quantity = qty;
                acc.timestamp = acc.timestamp.min(h.timestamp);
            }
            None => {
                merged.insert(h.symbol.clone(), h);
            }
        }
    }
    merged.into_values().collect()
}

/// Close open positions that reached the profit target or stop loss.
pub fn run_exit(
    entry: &StrategyEntry,
    config: &LiveConfig,
    ctx: &LiveContext<'_>,
    now: NaiveDateTime,
) -> Result<JobReport, SigtraderError> {
    let holdings = ctx
        .ledger
        .open_positions(&entry.id, config.env)
        .map_err(|e| fail_job(ctx, "sell", &entry.id, e))?;
    let holdings = consolidate(holdings);
    info!(strategy = %entry.id, open = holdings.len(), "evaluating open positions");

    let signals = entry
        .generate_exit_signals(&holdings, ctx.broker, &config.exit_params())
        .map_err(|e| fail_job(ctx, "sell", &entry.id, e))?;

    let mut report = JobReport {
        signals: signals.len(),
        ..JobReport::default()
    };
    for signal in &signals {
        match ctx.exit(signal, &entry.id, config, now) {
            Ok(price) => {
                report.executed += 1;
                ctx.notify(&format!(
                    "[{}] SELL {} x{} @ {price:.2} ({})",
                    config.env,
                    signal.symbol,
                    signal.quantity,
                    signal.note.as_deref().unwrap_or("exit")
                ));
            }
            Err(e) => {
                report.failed += 1;
                error!(symbol = %signal.symbol, error = %e, "sell failed");
                ctx.notify(&format!("[{}] SELL {} failed: {e}", config.env, signal.symbol));
            }
        }
    }

    info!(
        strategy = %entry.id,
        signals = report.signals,
        executed = report.executed,
        failed = report.failed,
        "sell job finished"
    );
    Ok(report)
}

/// Per-strategy results of a job run, in configuration order.
pub type JobResults = Vec<(String, Result<JobReport, SigtraderError>)>;

fn resolve<'r>(
    registry: &'r StrategyRegistry,
    ctx: &LiveContext<'_>,
    job: &str,
    id: &str,
) -> Result<&'r StrategyEntry, SigtraderError> {
    registry.get(id).map_err(|e| fail_job(ctx, job, id, e))
}

/// Run the entry job for every configured strategy.
pub fn run_buy_all(
    registry: &StrategyRegistry,
    config: &LiveConfig,
    symbols: &[String],
    data: &dyn DataPort,
    ctx: &LiveContext<'_>,
    now: NaiveDateTime,
) -> JobResults {
    config
        .strategies
        .iter()
        .map(|id| {
            let result = resolve(registry, ctx, "buy", id)
                .and_then(|entry| run_buy(entry, config, symbols, data, ctx, now));
            (id.clone(), result)
        })
        .collect()
}

/// Run the exit job for every configured strategy.
pub fn run_exit_all(
    registry: &StrategyRegistry,
    config: &LiveConfig,
    ctx: &LiveContext<'_>,
    now: NaiveDateTime,
) -> JobResults {
    config
        .strategies
        .iter()
        .map(|id| {
            let result = resolve(registry, ctx, "sell", id)
                .and_then(|entry| run_exit(entry, config, ctx, now));
            (id.clone(), result)
        })
        .collect()
}
