//! Volume breakout rule: buy when the latest session's volume reaches a
//! multiple of the trailing average volume.

use std::collections::BTreeMap;

use super::ohlcv::{Series, Window};
use super::signal::Signal;

/// Average volume of the bars preceding the current one.
pub fn trailing_average_volume(window: &Window<'_>) -> Option<f64> {
    let history = window.history();
    if history.is_empty() {
        return None;
    }
    Some(history.iter().map(|b| b.volume).sum::<f64>() / history.len() as f64)
}

pub fn is_breakout(window: &Window<'_>, volume_multiplier: f64) -> bool {
    match trailing_average_volume(window) {
        Some(avg) => window.current().volume >= volume_multiplier * avg,
        None => false,
    }
}

/// Entry check on a single historical window.
pub fn backtest_signal(
    window: &Window<'_>,
    symbol: &str,
    lookback_days: usize,
    volume_multiplier: f64,
) -> Option<Signal> {
    if window.len() < lookback_days + 1 {
        return None;
    }
    is_breakout(window, volume_multiplier).then(|| {
        Signal::buy(symbol).with_note(format!(
            "volume {} >= {volume_multiplier}x trailing average",
            window.current().volume
        ))
    })
}

/// Entry check on the most recent bars of each symbol, in `symbols` order.
pub fn latest_signals(
    symbols: &[String],
    series_by_symbol: &BTreeMap<String, Series>,
    lookback_days: usize,
    volume_multiplier: f64,
) -> Vec<Signal> {
    symbols
        .iter()
        .filter_map(|symbol| {
            let series = series_by_symbol.get(symbol)?;
            let window = series.latest_window(lookback_days)?;
            backtest_signal(&window, symbol, lookback_days, volume_multiplier)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;

    fn series(symbol: &str, volumes: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| OhlcvBar {
                symbol: symbol.into(),
                date: start + chrono::Duration::days(i as i64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0,
                volume: v,
            })
            .collect();
        Series::new(symbol, bars).unwrap()
    }

    #[test]
    fn average_excludes_current_bar() {
        let s = series("AAPL", &[100.0, 200.0, 300.0, 1_000.0]);
        let w = s.latest_window(3).unwrap();
        assert_eq!(trailing_average_volume(&w), Some(200.0));
    }

    #[test]
    fn breakout_at_exact_multiple() {
        let s = series("AAPL", &[100.0, 100.0, 100.0, 200.0]);
        let w = s.latest_window(3).unwrap();
        assert!(is_breakout(&w, 2.0));
        assert!(!is_breakout(&w, 2.01));
    }

    #[test]
    fn backtest_signal_needs_full_window() {
        let s = series("AAPL", &[100.0, 100.0, 500.0]);
        let w = s.latest_window(2).unwrap();
        assert!(backtest_signal(&w, "AAPL", 3, 2.0).is_none());
        let sig = backtest_signal(&w, "AAPL", 2, 2.0).unwrap();
        assert_eq!(sig.symbol, "AAPL");
        assert_eq!(sig.quantity, 1);
    }

    #[test]
    fn latest_signals_only_for_breakouts_in_order() {
        let mut data = BTreeMap::new();
        data.insert("AAA".to_string(), series("AAA", &[10.0, 10.0, 10.0]));
        data.insert("BBB".to_string(), series("BBB", &[10.0, 10.0, 50.0]));
        data.insert("CCC".to_string(), series("CCC", &[10.0, 10.0, 30.0]));
        let symbols: Vec<String> = ["CCC", "BBB", "AAA", "ZZZ"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let signals = latest_signals(&symbols, &data, 2, 2.0);
        let got: Vec<_> = signals.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(got, vec!["CCC", "BBB"]);
    }

    #[test]
    fn short_history_produces_no_live_signal() {
        let mut data = BTreeMap::new();
        data.insert("AAA".to_string(), series("AAA", &[10.0, 90.0]));
        assert!(latest_signals(&["AAA".to_string()], &data, 5, 2.0).is_empty());
    }
}
