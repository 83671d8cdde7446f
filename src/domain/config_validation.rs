//! Configuration validation.
//!
//! Builds the explicit configuration structs from a [`ConfigPort`], failing
//! on the first missing or malformed key before any data is fetched.

use chrono::NaiveDate;

use crate::domain::backtest::{BacktestConfig, DEFAULT_HORIZON_BARS};
use crate::domain::data_source::DataSource;
use crate::domain::error::SigtraderError;
use crate::domain::live::LiveConfig;
use crate::domain::position::Environment;
use crate::domain::strategy::VOLUME_BREAKOUT;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_VOLUME_MULTIPLIER: f64 = 2.0;

fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, SigtraderError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        SigtraderError::invalid_config(
            section,
            key,
            format!("invalid {key} format, expected YYYY-MM-DD"),
        )
    })
}

fn required_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, SigtraderError> {
    let raw = config.require_string(section, key)?;
    parse_date(&raw, section, key)
}

fn parse_positive_int(raw: &str, section: &str, key: &str) -> Result<usize, SigtraderError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SigtraderError::invalid_config(
            section,
            key,
            format!("{key} must be a positive integer"),
        )),
    }
}

fn parse_fraction(raw: &str, section: &str, key: &str, upper: Option<f64>) -> Result<f64, SigtraderError> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        SigtraderError::invalid_config(section, key, format!("{key} must be a number"))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(SigtraderError::invalid_config(
            section,
            key,
            format!("{key} must be non-negative"),
        ));
    }
    if let Some(limit) = upper {
        if value >= limit {
            return Err(SigtraderError::invalid_config(
                section,
                key,
                format!("{key} must be below {limit}"),
            ));
        }
    }
    Ok(value)
}

fn optional<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
    parse: impl FnOnce(&str) -> Result<T, SigtraderError>,
) -> Result<T, SigtraderError> {
    match config.get_string(section, key).filter(|s| !s.trim().is_empty()) {
        Some(raw) => parse(&raw),
        None => Ok(default),
    }
}

fn volume_multiplier(config: &dyn ConfigPort, section: &str) -> Result<f64, SigtraderError> {
    let value = optional(config, section, "volume_multiplier", DEFAULT_VOLUME_MULTIPLIER, |raw| {
        parse_fraction(raw, section, "volume_multiplier", None)
    })?;
    if value == 0.0 {
        return Err(SigtraderError::invalid_config(
            section,
            "volume_multiplier",
            "volume_multiplier must be positive",
        ));
    }
    Ok(value)
}

fn max_tickers(config: &dyn ConfigPort, section: &str) -> Result<Option<usize>, SigtraderError> {
    optional(config, section, "max_tickers", None, |raw| {
        parse_positive_int(raw, section, "max_tickers").map(Some)
    })
}

fn data_source(config: &dyn ConfigPort, section: &str) -> Result<DataSource, SigtraderError> {
    optional(config, section, "data_source", DataSource::Csv, |raw| raw.parse())
}

/// Build the backtest configuration from `[backtest]` and `[strategy]`.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SigtraderError> {
    const S: &str = "backtest";

    let strategy = config.require_string(S, "strategy")?;
    let start_date = required_date(config, S, "start_date")?;
    let end_date = required_date(config, S, "end_date")?;
    if start_date > end_date {
        return Err(SigtraderError::invalid_config(
            S,
            "start_date",
            "start_date must not be after end_date",
        ));
    }

    let lookback_days = parse_positive_int(&config.require_string(S, "lookback_days")?, S, "lookback_days")?;
    let profit_pct = parse_fraction(&config.require_string(S, "profit_pct")?, S, "profit_pct", None)?;
    let loss_pct = parse_fraction(&config.require_string(S, "loss_pct")?, S, "loss_pct", Some(1.0))?;
    let horizon_bars = optional(config, S, "horizon_bars", DEFAULT_HORIZON_BARS, |raw| {
        parse_positive_int(raw, S, "horizon_bars")
    })?;

    Ok(BacktestConfig {
        strategy,
        start_date,
        end_date,
        lookback_days,
        profit_pct,
        loss_pct,
        horizon_bars,
        data_source: data_source(config, S)?,
        volume_multiplier: volume_multiplier(config, "strategy")?,
        max_tickers: max_tickers(config, S)?,
    })
}

/// Build the live job configuration from `[live]`. `strategy` may list
/// several comma-separated ids.
///
/// `today` supplies the as-of date when `as_of` is not configured.
pub fn build_live_config(config: &dyn ConfigPort, today: NaiveDate) -> Result<LiveConfig, SigtraderError> {
    const S: &str = "live";

    let strategies = config
        .get_list(S, "strategy")
        .filter(|ids| !ids.is_empty())
        .unwrap_or_else(|| vec![VOLUME_BREAKOUT.to_string()]);

    Ok(LiveConfig {
        strategies,
        lookback_days: optional(config, S, "lookback_days", 5, |raw| {
            parse_positive_int(raw, S, "lookback_days")
        })?,
        period_days: optional(config, S, "period_days", 10, |raw| {
            parse_positive_int(raw, S, "period_days")
        })?,
        volume_multiplier: volume_multiplier(config, S)?,
        profit_pct: optional(config, S, "profit_pct", 0.05, |raw| {
            parse_fraction(raw, S, "profit_pct", None)
        })?,
        loss_pct: optional(config, S, "loss_pct", 0.03, |raw| {
            parse_fraction(raw, S, "loss_pct", Some(1.0))
        })?,
        env: optional(config, S, "env", Environment::Paper, |raw| raw.parse())?,
        data_source: data_source(config, S)?,
        as_of: optional(config, S, "as_of", today, |raw| parse_date(raw, S, "as_of"))?,
        max_tickers: max_tickers(config, S)?,
    })
}
