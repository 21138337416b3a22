//! Classifier input preparation.
//!
//! Reduces an enriched table to the model columns, drops incomplete rows,
//! encodes the sector label as an integer and appends a binary `Class`:
//! `1` when the open-exit return reaches the threshold, `0` otherwise.

use crate::columns::{
    DELTA_OWN, FILING_LAG, MID_EXIT_RETURN, MONTH_MARKET_PERFORMANCE, MONTH_PERFORMANCE,
    MONTH_VOLATILITY_CHANGE, OPEN_EXIT_RETURN, SECTOR, TWO_WEEK_INDEX_PERFORMANCE,
    TWO_WEEK_PERFORMANCE, TWO_WEEK_VOLATILITY_CHANGE, VALUE,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the appended label column.
pub const CLASS_COLUMN: &str = "Class";

/// Columns kept for the classifier, in output order.
pub const MODEL_COLUMNS: [&str; 12] = [
    FILING_LAG,
    VALUE,
    DELTA_OWN,
    SECTOR,
    MONTH_PERFORMANCE,
    TWO_WEEK_PERFORMANCE,
    MONTH_MARKET_PERFORMANCE,
    TWO_WEEK_INDEX_PERFORMANCE,
    MONTH_VOLATILITY_CHANGE,
    TWO_WEEK_VOLATILITY_CHANGE,
    MID_EXIT_RETURN,
    OPEN_EXIT_RETURN,
];

/// Errors raised while labelling a table.
#[derive(Debug, Error)]
pub enum LabelError {
    /// CSV read or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The label source column is absent
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    /// The label source cell is not a number
    #[error("row {row}: '{value}' in '{column}' is not a number")]
    InvalidNumber {
        /// Zero-based data row
        row: usize,
        /// Column name
        column: &'static str,
        /// Cell content
        value: String,
    },

    /// The threshold is not a finite number
    #[error("label threshold must be finite, got {0}")]
    InvalidThreshold(f64),
}

/// Labelling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Minimum open-exit return of a positive example
    pub threshold: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self { threshold: 0.07 }
    }
}

/// Outcome of one labelling run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelSummary {
    /// Data rows read
    pub rows_read: usize,
    /// Rows written
    pub rows_written: usize,
    /// Rows dropped for an empty model cell
    pub rows_dropped: usize,
    /// Rows labelled `1`
    pub positive: usize,
    /// Rows labelled `0`
    pub negative: usize,
    /// Sector encoding, code to label
    pub sectors: Vec<String>,
    /// Model columns absent from the input
    pub skipped_columns: Vec<String>,
}

impl LabelSummary {
    /// Share of written rows labelled `1`.
    pub fn positive_share(&self) -> f64 {
        if self.rows_written == 0 {
            0.0
        } else {
            self.positive as f64 / self.rows_written as f64
        }
    }
}

/// Label an enriched table read from `reader` into `writer`.
///
/// # Errors
/// Fails if the open-exit return column is absent or holds a non-numeric
/// value, or on CSV and IO errors. Other missing model columns are skipped.
pub fn label_dataset<R: Read, W: Write>(
    reader: R,
    writer: W,
    config: &LabelConfig,
) -> Result<LabelSummary, LabelError> {
    if !config.threshold.is_finite() {
        return Err(LabelError::InvalidThreshold(config.threshold));
    }

    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut selected = Vec::new();
    let mut skipped_columns = Vec::new();
    for column in MODEL_COLUMNS {
        match headers.iter().position(|h| h.trim() == column) {
            Some(index) => selected.push((column, index)),
            None => skipped_columns.push(column.to_string()),
        }
    }
    let label_at = selected
        .iter()
        .position(|(column, _)| *column == OPEN_EXIT_RETURN)
        .ok_or(LabelError::MissingColumn(OPEN_EXIT_RETURN))?;
    let sector_at = selected.iter().position(|(column, _)| *column == SECTOR);
    if !skipped_columns.is_empty() {
        debug!(columns = ?skipped_columns, "model columns absent from input");
    }

    let mut summary = LabelSummary {
        skipped_columns,
        ..LabelSummary::default()
    };

    // Complete rows only; sector codes need every surviving label first
    let mut kept: Vec<(usize, Vec<String>)> = Vec::new();
    for (row, raw) in rdr.records().enumerate() {
        let raw = raw?;
        summary.rows_read += 1;
        let cells: Vec<String> = selected
            .iter()
            .map(|(_, index)| raw.get(*index).unwrap_or_default().trim().to_string())
            .collect();
        if cells.iter().any(String::is_empty) {
            summary.rows_dropped += 1;
            continue;
        }
        kept.push((row, cells));
    }

    let codes: BTreeMap<String, usize> = match sector_at {
        Some(at) => kept
            .iter()
            .map(|(_, cells)| cells[at].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(code, label)| (label, code))
            .collect(),
        None => BTreeMap::new(),
    };
    summary.sectors = codes.keys().cloned().collect();

    let mut wtr = csv::Writer::from_writer(writer);
    let mut header: Vec<&str> = selected.iter().map(|(column, _)| *column).collect();
    header.push(CLASS_COLUMN);
    wtr.write_record(&header)?;

    for (row, mut cells) in kept {
        let value = &cells[label_at];
        let open_exit: f64 = value.parse().map_err(|_| LabelError::InvalidNumber {
            row,
            column: OPEN_EXIT_RETURN,
            value: value.clone(),
        })?;
        let class = u8::from(open_exit >= config.threshold);
        if class == 1 {
            summary.positive += 1;
        } else {
            summary.negative += 1;
        }

        if let Some(at) = sector_at
            && let Some(code) = codes.get(&cells[at])
        {
            cells[at] = code.to_string();
        }
        cells.push(class.to_string());
        wtr.write_record(&cells)?;
        summary.rows_written += 1;
    }
    wtr.flush()?;

    info!(
        written = summary.rows_written,
        dropped = summary.rows_dropped,
        positive_share = summary.positive_share(),
        "labelled dataset"
    );
    Ok(summary)
}

/// [`label_dataset`] between two files.
pub fn label_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &LabelConfig,
) -> Result<LabelSummary, LabelError> {
    label_dataset(File::open(input)?, File::create(output)?, config)
}
