//! Explicit outcome of a per-record evaluation.
//!
//! An evaluator either produces every value it owns or none of them. The
//! failure side is a tagged [`Unavailable`] rather than a null, so a missing
//! figure can never be mistaken for a genuine zero.

use chrono::NaiveDate;
use form4_data::DataError;
use thiserror::Error;

/// Result of one evaluator call for one record.
pub type Evaluation<T> = Result<T, Unavailable>;

/// Why an evaluator produced no values for a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unavailable {
    /// The provider could not supply data for the symbol
    #[error("provider failed for {symbol}: {reason}")]
    Provider {
        /// Symbol that was requested
        symbol: String,
        /// Provider error message
        reason: String,
    },

    /// A required date is not a trading day of the series
    #[error("{symbol} has no bar on {date}")]
    DateNotFound {
        /// Series symbol
        symbol: String,
        /// Date that was looked up
        date: NaiveDate,
    },

    /// Alignment found no trading day before the date
    #[error("{symbol} has no trading day before {date}")]
    NoEarlierTradingDay {
        /// Series symbol
        symbol: String,
        /// Date that could not be aligned
        date: NaiveDate,
    },

    /// No bars fall inside the classification window
    #[error("{symbol} has no bars between {start} and {end}")]
    EmptyWindow {
        /// Series symbol
        symbol: String,
        /// Window start (inclusive)
        start: NaiveDate,
        /// Window end (inclusive)
        end: NaiveDate,
    },

    /// The shared reference series could not be loaded for this run
    #[error("reference series unavailable: {reason}")]
    ReferenceSeries {
        /// Load failure message
        reason: String,
    },

    /// The inputs were present but the figures are not computable
    #[error("computation failed: {reason}")]
    Computation {
        /// Description of the failure
        reason: String,
    },
}

impl Unavailable {
    /// Classify a data-layer error raised while evaluating `symbol`.
    pub fn from_data_error(symbol: &str, error: DataError) -> Self {
        match error {
            DataError::DateNotFound { symbol, date } => Self::DateNotFound { symbol, date },
            other => Self::Provider {
                symbol: symbol.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Short machine-readable name of the variant.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider",
            Self::DateNotFound { .. } => "date_not_found",
            Self::NoEarlierTradingDay { .. } => "no_earlier_trading_day",
            Self::EmptyWindow { .. } => "empty_window",
            Self::ReferenceSeries { .. } => "reference_series",
            Self::Computation { .. } => "computation",
        }
    }

    /// Wrap a computation error.
    pub fn computation(reason: impl ToString) -> Self {
        Self::Computation {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_not_found_is_preserved() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 14).unwrap();
        let err = DataError::DateNotFound {
            symbol: "ACME".to_string(),
            date,
        };
        assert_eq!(
            Unavailable::from_data_error("ACME", err),
            Unavailable::DateNotFound {
                symbol: "ACME".to_string(),
                date
            }
        );
    }

    #[test]
    fn test_other_errors_are_provider_failures() {
        let err = DataError::InvalidSymbol("".to_string());
        let unavailable = Unavailable::from_data_error("", err);
        assert!(matches!(unavailable, Unavailable::Provider { .. }));
        assert_eq!(unavailable.kind(), "provider");
    }
}
