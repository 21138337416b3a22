//! Transaction table reader and enriched writer.
//!
//! Every input cell is kept verbatim so the enriched output reproduces the
//! input columns unchanged; only the columns the evaluators need are parsed
//! into [`TransactionRecord`]s.

use crate::columns::{
    ACTION_DATE, CLASSIFICATION_CHECK_MONTH, FEATURE_COLUMNS, FILING_CHECK_MONTH, FILING_DATE,
    PERFORMANCE_CHECK_2_WEEKS, PERFORMANCE_CHECK_MONTH, TICKER, TRADE_DATE,
};
use chrono::NaiveDate;
use csv::StringRecord;
use form4_features::RecordFeatures;
use form4_features::TransactionRecord;
use form4_features::data::csv_dir::parse_calendar_date;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading or writing a transaction table.
#[derive(Debug, Error)]
pub enum TableError {
    /// CSV read or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input column is absent
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    /// A date cell could not be parsed
    #[error("row {row}: invalid date in '{column}': '{value}'")]
    InvalidDate {
        /// Zero-based data row
        row: usize,
        /// Column name
        column: &'static str,
        /// Cell content
        value: String,
    },

    /// The input already carries a derived column
    #[error("input already contains derived column '{0}'")]
    DuplicateColumn(String),

    /// Features do not line up with the table rows
    #[error("feature for row {found} supplied at table row {expected}")]
    Misaligned {
        /// Table row
        expected: usize,
        /// Row the feature belongs to
        found: usize,
    },

    /// Feature count differs from the row count
    #[error("{features} feature rows for {rows} table rows")]
    LengthMismatch {
        /// Table rows
        rows: usize,
        /// Feature rows supplied
        features: usize,
    },
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Header comparison shared by every column lookup; surrounding blanks are
/// ignored on both sides.
fn same_column(header: &str, name: &str) -> bool {
    header.trim() == name.trim()
}

/// Position of `name` within `headers`.
fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| same_column(h, name))
}

/// Positions of the required columns within the header.
#[derive(Debug, Clone, Copy)]
struct RequiredPositions {
    ticker: usize,
    filing_date: usize,
    trade_date: usize,
    action_date: usize,
    filing_check_month: usize,
    performance_check_month: usize,
    performance_check_2_weeks: usize,
    classification_check_month: usize,
}

impl RequiredPositions {
    fn locate(headers: &StringRecord) -> Result<Self> {
        let position = |name: &'static str| {
            column_index(headers, name).ok_or(TableError::MissingColumn(name))
        };
        Ok(Self {
            ticker: position(TICKER)?,
            filing_date: position(FILING_DATE)?,
            trade_date: position(TRADE_DATE)?,
            action_date: position(ACTION_DATE)?,
            filing_check_month: position(FILING_CHECK_MONTH)?,
            performance_check_month: position(PERFORMANCE_CHECK_MONTH)?,
            performance_check_2_weeks: position(PERFORMANCE_CHECK_2_WEEKS)?,
            classification_check_month: position(CLASSIFICATION_CHECK_MONTH)?,
        })
    }

    fn parse(&self, row: usize, raw: &StringRecord) -> Result<TransactionRecord> {
        let date = |index: usize, column: &'static str| -> Result<NaiveDate> {
            let value = raw.get(index).unwrap_or_default();
            parse_calendar_date(value).map_err(|_| TableError::InvalidDate {
                row,
                column,
                value: value.to_string(),
            })
        };

        Ok(TransactionRecord {
            row,
            ticker: raw.get(self.ticker).unwrap_or_default().trim().to_string(),
            filing_date: date(self.filing_date, FILING_DATE)?,
            trade_date: date(self.trade_date, TRADE_DATE)?,
            action_date: date(self.action_date, ACTION_DATE)?,
            filing_check_month: date(self.filing_check_month, FILING_CHECK_MONTH)?,
            performance_check_month: date(self.performance_check_month, PERFORMANCE_CHECK_MONTH)?,
            performance_check_2_weeks: date(
                self.performance_check_2_weeks,
                PERFORMANCE_CHECK_2_WEEKS,
            )?,
            classification_check_month: date(
                self.classification_check_month,
                CLASSIFICATION_CHECK_MONTH,
            )?,
        })
    }
}

/// An insider-purchase table: raw cells plus parsed records.
#[derive(Debug, Clone)]
pub struct TransactionTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    records: Vec<TransactionRecord>,
}

impl TransactionTable {
    /// Read a table from a CSV file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_csv(csv::Reader::from_path(path)?)
    }

    /// Read a table from any CSV source.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let headers = reader.headers()?.clone();
        if let Some(derived) = headers
            .iter()
            .find(|h| FEATURE_COLUMNS.iter().any(|column| same_column(h, column)))
        {
            return Err(TableError::DuplicateColumn(derived.to_string()));
        }
        let positions = RequiredPositions::locate(&headers)?;

        let mut rows = Vec::new();
        let mut records = Vec::new();
        for (row, raw) in reader.records().enumerate() {
            let raw = raw?;
            records.push(positions.parse(row, &raw)?);
            rows.push(raw);
        }

        debug!(rows = rows.len(), columns = headers.len(), "transaction table loaded");
        Ok(Self {
            headers,
            rows,
            records,
        })
    }

    /// Input header row.
    pub const fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Parsed records, one per row.
    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw input cell by row and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = column_index(&self.headers, column)?;
        self.rows.get(row)?.get(index)
    }

    /// Write the input columns followed by [`FEATURE_COLUMNS`].
    ///
    /// `features` must be aligned with the table rows. Unavailable values
    /// are written as empty cells.
    pub fn write_enriched<W: Write>(&self, features: &[RecordFeatures], writer: W) -> Result<()> {
        if features.len() != self.rows.len() {
            return Err(TableError::LengthMismatch {
                rows: self.rows.len(),
                features: features.len(),
            });
        }

        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = self.headers.clone();
        for column in FEATURE_COLUMNS {
            header.push_field(column);
        }
        wtr.write_record(&header)?;

        for (row, (raw, feature)) in self.rows.iter().zip(features).enumerate() {
            if feature.row != row {
                return Err(TableError::Misaligned {
                    expected: row,
                    found: feature.row,
                });
            }
            let mut record = raw.clone();
            for cell in feature_cells(feature) {
                record.push_field(&cell);
            }
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// [`write_enriched`](Self::write_enriched) to a file.
    pub fn write_enriched_to_path<P: AsRef<Path>>(
        &self,
        features: &[RecordFeatures],
        path: P,
    ) -> Result<()> {
        self.write_enriched(features, File::create(path)?)
    }
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Derived cells in [`FEATURE_COLUMNS`] order.
fn feature_cells(features: &RecordFeatures) -> [String; 13] {
    let security = features.security.as_ref().ok();
    let market = features.market.as_ref().ok();

    [
        features.sector.clone().unwrap_or_default(),
        cell(security.map(|s| s.month_performance)),
        cell(security.map(|s| s.two_week_performance)),
        cell(security.map(|s| s.mid_exit_return)),
        cell(security.map(|s| s.open_exit_return)),
        cell(security.map(|s| s.days_to_mid_exit)),
        cell(security.map(|s| s.days_to_open_exit)),
        cell(market.map(|m| m.index_month_return)),
        cell(market.map(|m| m.index_two_week_return)),
        cell(market.map(|m| m.volatility_month_change)),
        cell(market.map(|m| m.volatility_two_week_change)),
        features.related.count.to_string(),
        features.related.days_since_last.to_string(),
    ]
}
