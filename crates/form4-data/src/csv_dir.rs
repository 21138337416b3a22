//! File-backed provider reading one CSV per symbol.
//!
//! Layout of the data directory:
//!
//! ```text
//! data/
//!   sectors.csv      Ticker,Sector
//!   ACME.csv         Date,Open,High,Low,Close[,Volume,...]
//!   ^GSPC.csv
//!   ^VIX.csv
//! ```
//!
//! Dates may carry a time and offset suffix (`2023-01-10 00:00:00-05:00`);
//! only the calendar date is kept. Rows with an empty price field are skipped.

use crate::error::{DataError, Result};
use crate::history::{Bar, PriceHistory};
use crate::provider::SecurityDataProvider;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// File name of the optional sector table.
pub const SECTORS_FILE: &str = "sectors.csv";

#[derive(Debug, Deserialize)]
struct HistoryRow {
    #[serde(rename = "Date", alias = "date")]
    date: String,
    #[serde(rename = "Open", alias = "open")]
    open: Option<f64>,
    #[serde(rename = "High", alias = "high")]
    high: Option<f64>,
    #[serde(rename = "Low", alias = "low")]
    low: Option<f64>,
    #[serde(rename = "Close", alias = "close")]
    close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SectorRow {
    #[serde(rename = "Ticker", alias = "ticker", alias = "symbol")]
    ticker: String,
    #[serde(rename = "Sector", alias = "sector")]
    sector: Option<String>,
}

/// Provider backed by a directory of per-symbol CSV files.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    root: PathBuf,
    sectors: HashMap<String, String>,
}

impl CsvDirectoryProvider {
    /// Open a data directory, loading `sectors.csv` if present.
    ///
    /// # Errors
    /// Fails if `root` is not a directory or the sector table is malformed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(DataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("data directory {} does not exist", root.display()),
            )));
        }

        let sectors_path = root.join(SECTORS_FILE);
        let sectors = if sectors_path.is_file() {
            parse_sectors(csv::Reader::from_path(&sectors_path)?)?
        } else {
            debug!(path = %sectors_path.display(), "no sector table, every sector is unknown");
            HashMap::new()
        };

        Ok(Self { root, sectors })
    }

    fn history_path(&self, symbol: &str) -> Result<PathBuf> {
        if symbol.is_empty()
            || symbol.contains(['/', '\\'])
            || symbol.starts_with('.')
            || symbol.eq_ignore_ascii_case("sectors")
        {
            return Err(DataError::InvalidSymbol(symbol.to_string()));
        }
        Ok(self.root.join(format!("{symbol}.csv")))
    }
}

impl SecurityDataProvider for CsvDirectoryProvider {
    async fn sector(&self, symbol: &str) -> Result<Option<String>> {
        Ok(self.sectors.get(symbol).cloned())
    }

    async fn history(&self, symbol: &str) -> Result<PriceHistory> {
        let path = self.history_path(symbol)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::MissingData {
                    symbol: symbol.to_string(),
                    reason: format!("no history file at {}", path.display()),
                });
            }
            Err(e) => return Err(e.into()),
        };
        parse_history(symbol, csv::Reader::from_reader(bytes.as_slice()))
    }

    /// Length and modification time of the symbol's file.
    async fn revision(&self, symbol: &str) -> Result<Option<String>> {
        let path = self.history_path(symbol)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        Ok(Some(format!("{}:{}", metadata.len(), modified)))
    }
}

fn parse_sectors<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<HashMap<String, String>> {
    let mut sectors = HashMap::new();
    for row in reader.deserialize() {
        let row: SectorRow = row?;
        if let Some(sector) = row.sector.filter(|s| !s.trim().is_empty()) {
            sectors.insert(row.ticker.trim().to_string(), sector.trim().to_string());
        }
    }
    Ok(sectors)
}

fn parse_history<R: std::io::Read>(symbol: &str, mut reader: csv::Reader<R>) -> Result<PriceHistory> {
    let mut bars = Vec::new();
    for row in reader.deserialize() {
        let row: HistoryRow = row?;
        let date = parse_calendar_date(&row.date)?;
        match (row.open, row.high, row.low, row.close) {
            (Some(open), Some(high), Some(low), Some(close)) => {
                bars.push(Bar::new(date, open, high, low, close));
            }
            _ => debug!(symbol, %date, "skipping bar with missing prices"),
        }
    }
    PriceHistory::from_bars(symbol, bars)
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp string.
pub fn parse_calendar_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    let prefix = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("invalid date '{}': {}", value, e)))
}
