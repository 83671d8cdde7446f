//! Summary statistics over completed backtest trades.
//!
//! `max_drawdown` is the worst single-trade return, not a drawdown of a
//! compounded equity curve.

use std::fmt;

use super::backtest::TradeRecord;
use super::exit_sim::Outcome;

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub holds: usize,
    /// Percentage of trades that hit the profit target, 0 when empty.
    pub win_rate: f64,
    pub avg_gain_pct: Option<f64>,
    pub max_drawdown: Option<f64>,
}

/// Aggregate `records`. The result does not depend on record order.
pub fn summarize(records: &[TradeRecord]) -> Stats {
    let total = records.len();
    let count = |o: Outcome| records.iter().filter(|r| r.outcome == o).count();
    let wins = count(Outcome::Win);
    let losses = count(Outcome::Loss);
    let holds = count(Outcome::Hold);

    if total == 0 {
        return Stats {
            total,
            wins,
            losses,
            holds,
            win_rate: 0.0,
            avg_gain_pct: None,
            max_drawdown: None,
        };
    }

    // Sorted sum keeps the mean bit-identical regardless of arrival order.
    let mut gains: Vec<f64> = records.iter().map(|r| r.gain_pct).collect();
    gains.sort_by(|a, b| a.total_cmp(b));
    let sum: f64 = gains.iter().sum();

    Stats {
        total,
        wins,
        losses,
        holds,
        win_rate: wins as f64 / total as f64 * 100.0,
        avg_gain_pct: Some(sum / total as f64),
        max_drawdown: gains.first().copied(),
    }
}

fn pct_or_na(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}%"))
        .unwrap_or_else(|| "n/a".to_string())
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total trades:     {}", self.total)?;
        writeln!(
            f,
            "Outcomes:         {} win / {} loss / {} hold",
            self.wins, self.losses, self.holds
        )?;
        writeln!(f, "Win rate:         {:.2}%", self.win_rate)?;
        writeln!(f, "Avg return:       {}", pct_or_na(self.avg_gain_pct))?;
        write!(f, "Max drawdown:     {}", pct_or_na(self.max_drawdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn record(gain_pct: f64, outcome: Outcome) -> TradeRecord {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        TradeRecord {
            entry_date: d,
            symbol: "AAPL".into(),
            entry_price: 100.0,
            exit_date: Some(d),
            exit_price: 100.0 + gain_pct,
            gain_pct,
            holding_days: 1,
            outcome,
            low_confidence: false,
        }
    }

    #[test]
    fn empty_input_is_reportable() {
        let s = summarize(&[]);
        assert_eq!(s.total, 0);
        assert_eq!(s.win_rate, 0.0);
        assert!(s.avg_gain_pct.is_none());
        assert!(s.max_drawdown.is_none());
        let text = s.to_string();
        assert!(text.contains("Avg return:       n/a"));
        assert!(text.contains("Max drawdown:     n/a"));
    }

    #[test]
    fn computes_rate_mean_and_worst_trade() {
        let records = vec![
            record(5.0, Outcome::Win),
            record(-3.0, Outcome::Loss),
            record(1.0, Outcome::Hold),
            record(5.0, Outcome::Win),
        ];
        let s = summarize(&records);
        assert_eq!(s.total, 4);
        assert_eq!((s.wins, s.losses, s.holds), (2, 1, 1));
        assert_relative_eq!(s.win_rate, 50.0);
        assert_relative_eq!(s.avg_gain_pct.unwrap(), 2.0);
        assert_relative_eq!(s.max_drawdown.unwrap(), -3.0);
    }

    #[test]
    fn max_drawdown_can_be_positive() {
        let s = summarize(&[record(2.0, Outcome::Win), record(4.0, Outcome::Win)]);
        assert_relative_eq!(s.max_drawdown.unwrap(), 2.0);
    }

    #[test]
    fn display_rounds_to_two_decimals() {
        let s = summarize(&[record(10.0, Outcome::Win), record(-1.0 / 3.0, Outcome::Hold)]);
        let text = s.to_string();
        assert!(text.contains("Win rate:         50.00%"));
        assert!(text.contains("Avg return:       4.83%"));
        assert!(text.contains("Max drawdown:     -0.33%"));
    }
}
