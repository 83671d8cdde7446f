//! Named market-data providers.

use std::fmt;
use std::str::FromStr;

use super::error::SigtraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// One CSV file per symbol in a directory.
    Csv,
    /// `ohlcv` table in a SQLite database.
    Sqlite,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Csv => "csv",
            DataSource::Sqlite => "sqlite",
        }
    }
}

impl FromStr for DataSource {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            _ => Err(SigtraderError::UnknownSource {
                name: s.trim().to_string(),
            }),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
