//! Insider purchase records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One insider purchase, with the evaluation dates derived at ingestion.
///
/// `row` is the record's position in the transaction table and its identity
/// for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Position in the transaction table
    pub row: usize,
    /// Traded security
    pub ticker: String,
    /// Date the disclosure became public
    pub filing_date: NaiveDate,
    /// Date the trade was executed
    pub trade_date: NaiveDate,
    /// Date forward performance windows are measured from
    pub action_date: NaiveDate,
    /// Start of the trailing window for related filings
    pub filing_check_month: NaiveDate,
    /// Roughly one month from the action date
    pub performance_check_month: NaiveDate,
    /// Roughly two weeks from the action date
    pub performance_check_2_weeks: NaiveDate,
    /// End of the classification window
    pub classification_check_month: NaiveDate,
}
