//! Backtest driver: slides lookback windows over each symbol's series and
//! turns signals into completed trade records.
//!
//! Symbols are independent of one another. The driver holds no state across
//! symbols and never reads the wall clock, so identical inputs always produce
//! identical records.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::data_source::DataSource;
use super::exit_sim::{simulate_exit, Outcome};
use super::ohlcv::{Series, Window};
use super::signal::{Action, Signal};

/// Forward bars examined after an entry before marking to close.
pub const DEFAULT_HORIZON_BARS: usize = 14;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub strategy: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub lookback_days: usize,
    pub profit_pct: f64,
    pub loss_pct: f64,
    pub horizon_bars: usize,
    pub data_source: DataSource,
    pub volume_multiplier: f64,
    /// Cap on the resolved ticker universe.
    pub max_tickers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_date: NaiveDate,
    pub symbol: String,
    pub entry_price: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: f64,
    pub gain_pct: f64,
    pub holding_days: i64,
    pub outcome: Outcome,
    pub low_confidence: bool,
}

/// Percentage change from entry to exit.
pub fn gain_pct(entry_price: f64, exit_price: f64) -> f64 {
    (exit_price - entry_price) / entry_price * 100.0
}

/// Run `signal_fn` over every window of every symbol in `symbols` order.
///
/// Symbols missing from `series_by_symbol` or with no more bars than the
/// lookback are skipped with a diagnostic.
pub fn run_backtest<F>(
    symbols: &[String],
    series_by_symbol: &BTreeMap<String, Series>,
    config: &BacktestConfig,
    signal_fn: F,
) -> Vec<TradeRecord>
where
    F: Fn(&Window<'_>, &str, &BacktestConfig) -> Option<Signal>,
{
    let mut records = Vec::new();

    for symbol in symbols {
        let Some(series) = series_by_symbol.get(symbol) else {
            warn!(%symbol, "no data found, skipping");
            continue;
        };

        info!(%symbol, bars = series.len(), "backtesting");
        let before = records.len();
        backtest_symbol(series, config, &signal_fn, &mut records);
        debug!(%symbol, trades = records.len() - before, "symbol complete");
    }

    records
}

fn backtest_symbol<F>(
    series: &Series,
    config: &BacktestConfig,
    signal_fn: &F,
    records: &mut Vec<TradeRecord>,
) where
    F: Fn(&Window<'_>, &str, &BacktestConfig) -> Option<Signal>,
{
    let symbol = series.symbol();
    let lookback = config.lookback_days;

    if series.len() <= lookback {
        warn!(
            %symbol,
            bars = series.len(),
            lookback,
            "insufficient history, skipping"
        );
        return;
    }

    // The last bar is never an entry: at least one bar must follow it.
    for i in lookback..series.len() - 1 {
        let Some(window) = series.window(i, lookback) else {
            continue;
        };

        let Some(signal) = signal_fn(&window, symbol, config) else {
            continue;
        };

        if signal.action != Action::Buy {
            debug!(%symbol, action = %signal.action, "ignoring non-entry signal");
            continue;
        }

        let entry = window.current();
        let forward = series.forward(i, config.horizon_bars);

        let exit = match simulate_exit(entry.close, forward, config.profit_pct, config.loss_pct) {
            Ok(exit) => exit,
            Err(e) => {
                warn!(%symbol, date = %entry.date, error = %e, "dropping trade candidate");
                continue;
            }
        };

        if exit.low_confidence {
            warn!(%symbol, date = %entry.date, "exit declared at entry price, no forward bars evaluated");
        }

        let holding_days = exit
            .exit_date
            .map(|d| (d - entry.date).num_days())
            .unwrap_or(0);

        records.push(TradeRecord {
            entry_date: entry.date,
            symbol: symbol.to_string(),
            entry_price: entry.close,
            exit_date: exit.exit_date,
            exit_price: exit.exit_price,
            gain_pct: gain_pct(entry.close, exit.exit_price),
            holding_days,
            outcome: exit.outcome,
            low_confidence: exit.low_confidence,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    fn config(lookback: usize) -> BacktestConfig {
        BacktestConfig {
            strategy: "test".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            lookback_days: lookback,
            profit_pct: 0.05,
            loss_pct: 0.03,
            horizon_bars: DEFAULT_HORIZON_BARS,
            data_source: DataSource::Csv,
            volume_multiplier: 2.0,
            max_tickers: None,
        }
    }

    fn flat_series(symbol: &str, n: usize) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| OhlcvBar {
                symbol: symbol.into(),
                date: start + chrono::Duration::days(i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1_000.0,
            })
            .collect();
        Series::new(symbol, bars).unwrap()
    }

    fn map(series: Vec<Series>) -> BTreeMap<String, Series> {
        series
            .into_iter()
            .map(|s| (s.symbol().to_string(), s))
            .collect()
    }

    #[test]
    fn gain_pct_fifty_to_fifty_five_is_ten_percent() {
        assert_relative_eq!(gain_pct(50.0, 55.0), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn insufficient_history_yields_no_trades() {
        let data = map(vec![flat_series("AAPL", 5)]);
        let records = run_backtest(&["AAPL".into()], &data, &config(5), |_, s, _| {
            Some(Signal::buy(s))
        });
        assert!(records.is_empty());
    }

    #[test]
    fn exactly_lookback_plus_one_bars_yields_no_trades() {
        let data = map(vec![flat_series("AAPL", 6)]);
        let records = run_backtest(&["AAPL".into()], &data, &config(5), |_, s, _| {
            Some(Signal::buy(s))
        });
        assert!(records.is_empty());
    }

    #[test]
    fn slides_from_lookback_to_second_last_bar() {
        let data = map(vec![flat_series("AAPL", 10)]);
        let seen = RefCell::new(Vec::new());
        run_backtest(&["AAPL".into()], &data, &config(3), |w, _, _| {
            seen.borrow_mut().push(w.current().date);
            None
        });
        let series = &data["AAPL"];
        let expected: Vec<_> = (3..9).map(|i| series.bars()[i].date).collect();
        assert_eq!(seen.into_inner(), expected);
    }

    #[test]
    fn missing_symbol_is_skipped() {
        let data = map(vec![flat_series("AAPL", 10)]);
        let records = run_backtest(
            &["MSFT".into(), "AAPL".into()],
            &data,
            &config(3),
            |_, s, _| Some(Signal::buy(s)),
        );
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.symbol == "AAPL"));
    }

    #[test]
    fn sell_signals_open_no_trades() {
        let data = map(vec![flat_series("AAPL", 10)]);
        let records = run_backtest(&["AAPL".into()], &data, &config(3), |_, s, _| {
            Some(Signal::sell(s, 1))
        });
        assert!(records.is_empty());
    }

    #[test]
    fn flat_prices_hold_until_horizon() {
        let data = map(vec![flat_series("AAPL", 30)]);
        let records = run_backtest(&["AAPL".into()], &data, &config(3), |w, s, _| {
            (w.current().date == NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
                .then(|| Signal::buy(s))
        });
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.outcome, Outcome::Hold);
        assert_eq!(r.exit_date, NaiveDate::from_ymd_opt(2024, 1, 19));
        assert_eq!(r.holding_days, 14);
        assert_relative_eq!(r.gain_pct, 0.0);
    }

    #[test]
    fn record_uses_window_close_as_entry() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let closes = [100.0, 100.0, 100.0, 50.0, 52.0, 56.0];
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                symbol: "AAPL".into(),
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 1.0,
            })
            .collect();
        let data = map(vec![Series::new("AAPL", bars).unwrap()]);
        let mut cfg = config(3);
        cfg.profit_pct = 0.10;
        let records = run_backtest(&["AAPL".into()], &data, &cfg, |w, s, _| {
            (w.current().close == 50.0).then(|| Signal::buy(s))
        });
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_relative_eq!(r.entry_price, 50.0);
        assert_relative_eq!(r.exit_price, 55.0, epsilon = 1e-9);
        assert_relative_eq!(r.gain_pct, 10.0, epsilon = 1e-9);
        assert_eq!(r.outcome, Outcome::Win);
        assert_eq!(r.holding_days, 2);
    }
}
