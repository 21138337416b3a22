//! Error types for data operations.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Missing data
    #[error("Missing data for {symbol}: {reason}")]
    MissingData {
        /// Symbol that was queried
        symbol: String,
        /// Reason for missing data
        reason: String,
    },

    /// A date that is not a trading day of the series
    #[error("No bar for {symbol} on {date}")]
    DateNotFound {
        /// Symbol of the series
        symbol: String,
        /// Date that was looked up
        date: NaiveDate,
    },

    /// The same date appears twice in a series
    #[error("Duplicate bar for {symbol} on {date}")]
    DuplicateDate {
        /// Symbol of the series
        symbol: String,
        /// Date that appears more than once
        date: NaiveDate,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid symbol
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Provider failure that is not a missing-data condition
    #[error("Provider error for {symbol}: {reason}")]
    Provider {
        /// Symbol that was queried
        symbol: String,
        /// Description of the failure
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
