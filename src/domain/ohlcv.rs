//! OHLCV bars, per-symbol series and lookback windows.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Why a bar was rejected at the store boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BarError {
    #[error("{field} is not a positive finite price ({value})")]
    InvalidPrice { field: &'static str, value: f64 },

    #[error("volume is negative or not finite ({0})")]
    InvalidVolume(f64),
}

impl OhlcvBar {
    pub fn validate(&self) -> Result<(), BarError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(BarError::InvalidPrice { field, value });
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(BarError::InvalidVolume(self.volume));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("bar for {symbol} on {date} belongs to another series")]
    ForeignBar { symbol: String, date: NaiveDate },

    #[error("dates not strictly increasing at {date}")]
    OutOfOrder { date: NaiveDate },

    #[error("invalid bar on {date}: {source}")]
    InvalidBar {
        date: NaiveDate,
        #[source]
        source: BarError,
    },
}

/// Strictly date-ascending, validated bars for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    symbol: String,
    bars: Vec<OhlcvBar>,
}

impl Series {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        let mut prev: Option<NaiveDate> = None;
        for bar in &bars {
            if bar.symbol != symbol {
                return Err(SeriesError::ForeignBar {
                    symbol: bar.symbol.clone(),
                    date: bar.date,
                });
            }
            if prev.is_some_and(|p| bar.date <= p) {
                return Err(SeriesError::OutOfOrder { date: bar.date });
            }
            bar.validate().map_err(|source| SeriesError::InvalidBar {
                date: bar.date,
                source,
            })?;
            prev = Some(bar.date);
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }

    /// Window of `lookback + 1` bars ending at `current`, or `None` when
    /// there is not enough history before `current`.
    pub fn window(&self, current: usize, lookback: usize) -> Option<Window<'_>> {
        if current < lookback || current >= self.bars.len() {
            return None;
        }
        Some(Window {
            bars: &self.bars[current - lookback..=current],
        })
    }

    /// Up to `horizon` bars strictly after `entry`.
    pub fn forward(&self, entry: usize, horizon: usize) -> &[OhlcvBar] {
        let start = (entry + 1).min(self.bars.len());
        let end = start.saturating_add(horizon).min(self.bars.len());
        &self.bars[start..end]
    }

    /// Trailing window over the most recent `lookback + 1` bars.
    pub fn latest_window(&self, lookback: usize) -> Option<Window<'_>> {
        self.bars
            .len()
            .checked_sub(1)
            .and_then(|last| self.window(last, lookback))
    }
}

/// Read-only trailing slice handed to signal functions.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    bars: &'a [OhlcvBar],
}

impl<'a> Window<'a> {
    pub fn bars(&self) -> &'a [OhlcvBar] {
        self.bars
    }

    /// The bar under evaluation; always the last one.
    pub fn current(&self) -> &'a OhlcvBar {
        &self.bars[self.bars.len() - 1]
    }

    /// Bars before the current one.
    pub fn history(&self) -> &'a [OhlcvBar] {
        &self.bars[..self.bars.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            symbol: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    fn series(n: u32) -> Series {
        Series::new("AAPL", (1..=n).map(|d| bar(d, 100.0 + d as f64)).collect()).unwrap()
    }

    #[test]
    fn validate_rejects_non_positive_price() {
        let mut b = bar(1, 100.0);
        b.low = 0.0;
        assert_eq!(
            b.validate(),
            Err(BarError::InvalidPrice {
                field: "low",
                value: 0.0
            })
        );
    }

    #[test]
    fn validate_rejects_nan_close() {
        let mut b = bar(1, 100.0);
        b.close = f64::NAN;
        assert!(matches!(
            b.validate(),
            Err(BarError::InvalidPrice { field: "close", .. })
        ));
    }

    #[test]
    fn validate_rejects_negative_volume() {
        let mut b = bar(1, 100.0);
        b.volume = -5.0;
        assert_eq!(b.validate(), Err(BarError::InvalidVolume(-5.0)));
    }

    #[test]
    fn series_rejects_duplicate_dates() {
        let err = Series::new("AAPL", vec![bar(1, 100.0), bar(1, 101.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::OutOfOrder { .. }));
    }

    #[test]
    fn series_rejects_descending_dates() {
        let err = Series::new("AAPL", vec![bar(2, 100.0), bar(1, 101.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::OutOfOrder { .. }));
    }

    #[test]
    fn series_rejects_foreign_symbol() {
        let mut other = bar(2, 100.0);
        other.symbol = "MSFT".into();
        let err = Series::new("AAPL", vec![bar(1, 100.0), other]).unwrap_err();
        assert!(matches!(err, SeriesError::ForeignBar { .. }));
    }

    #[test]
    fn window_ends_at_current_bar() {
        let s = series(10);
        let w = s.window(5, 3).unwrap();
        assert_eq!(w.len(), 4);
        assert_eq!(w.current().date, s.bars()[5].date);
        assert_eq!(w.bars()[0].date, s.bars()[2].date);
        assert_eq!(w.history().len(), 3);
    }

    #[test]
    fn window_requires_full_lookback() {
        let s = series(10);
        assert!(s.window(2, 3).is_none());
        assert!(s.window(10, 3).is_none());
    }

    #[test]
    fn forward_excludes_entry_and_respects_horizon() {
        let s = series(10);
        let f = s.forward(3, 4);
        assert_eq!(f.len(), 4);
        assert_eq!(f[0].date, s.bars()[4].date);
        assert_eq!(f[3].date, s.bars()[7].date);
    }

    #[test]
    fn forward_is_bounded_by_series_end() {
        let s = series(10);
        assert_eq!(s.forward(7, 14).len(), 2);
        assert!(s.forward(9, 14).is_empty());
    }

    #[test]
    fn latest_window_uses_last_bars() {
        let s = series(6);
        let w = s.latest_window(5).unwrap();
        assert_eq!(w.len(), 6);
        assert!(s.latest_window(6).is_none());
    }
}
