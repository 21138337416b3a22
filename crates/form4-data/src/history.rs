//! Date-indexed OHLC price series.
//!
//! A [`PriceHistory`] holds every available bar for one symbol, sorted by date.
//! Non-trading days are simply absent, so lookups by an arbitrary calendar
//! date can miss; callers decide whether a miss is fatal or should be aligned
//! to an earlier trading day.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::*;

/// Column names of a price-history frame.
pub mod columns {
    /// Trading date (Date)
    pub const DATE: &str = "date";
    /// Opening price (Float64)
    pub const OPEN: &str = "open";
    /// Session high (Float64)
    pub const HIGH: &str = "high";
    /// Session low (Float64)
    pub const LOW: &str = "low";
    /// Closing price (Float64)
    pub const CLOSE: &str = "close";
}

use columns::{CLOSE, DATE, HIGH, LOW, OPEN};

/// One daily OHLC bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    /// Trading date
    pub date: NaiveDate,
    /// Opening price
    pub open: f64,
    /// Session high
    pub high: f64,
    /// Session low
    pub low: f64,
    /// Closing price
    pub close: f64,
}

impl Bar {
    /// Create a new bar.
    pub const fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// Midpoint of the session range, `(high + low) / 2`.
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Full daily history for one symbol.
///
/// Backed by a polars frame with columns `date`, `open`, `high`, `low`,
/// `close`, sorted ascending by date with unique dates. Immutable once built,
/// so a single instance can be shared read-only across concurrent evaluations.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    symbol: String,
    frame: DataFrame,
    dates: Vec<NaiveDate>,
}

impl PriceHistory {
    /// Build a history from bars in any order.
    ///
    /// # Errors
    /// Returns [`DataError::MissingData`] for an empty bar list and
    /// [`DataError::DuplicateDate`] if two bars share a date.
    pub fn from_bars(symbol: impl Into<String>, mut bars: Vec<Bar>) -> Result<Self> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(DataError::MissingData {
                symbol,
                reason: "price history has no bars".to_string(),
            });
        }

        bars.sort_by_key(|bar| bar.date);
        if let Some(pair) = bars.windows(2).find(|pair| pair[0].date == pair[1].date) {
            return Err(DataError::DuplicateDate {
                symbol,
                date: pair[0].date,
            });
        }

        let dates: Vec<NaiveDate> = bars.iter().map(|bar| bar.date).collect();
        let opens: Vec<f64> = bars.iter().map(|bar| bar.open).collect();
        let highs: Vec<f64> = bars.iter().map(|bar| bar.high).collect();
        let lows: Vec<f64> = bars.iter().map(|bar| bar.low).collect();
        let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();

        let frame = DataFrame::new(vec![
            Series::new(DATE.into(), dates.as_slice()).into(),
            Series::new(OPEN.into(), opens).into(),
            Series::new(HIGH.into(), highs).into(),
            Series::new(LOW.into(), lows).into(),
            Series::new(CLOSE.into(), closes).into(),
        ])?;

        Ok(Self {
            symbol,
            frame,
            dates,
        })
    }

    /// Symbol this history belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the history has no bars. Always false for a constructed history.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The underlying frame.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Trading dates, ascending.
    pub fn trading_dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Whether `date` is a trading date of this series.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    /// Bar on exactly `date`.
    ///
    /// # Errors
    /// Returns [`DataError::DateNotFound`] if `date` is not a trading date.
    pub fn bar_on(&self, date: NaiveDate) -> Result<Bar> {
        let idx = self
            .dates
            .binary_search(&date)
            .map_err(|_| DataError::DateNotFound {
                symbol: self.symbol.clone(),
                date,
            })?;
        self.bar_at(idx)
    }

    /// All bars in date order.
    pub fn bars(&self) -> Result<Vec<Bar>> {
        (0..self.len()).map(|idx| self.bar_at(idx)).collect()
    }

    /// Sub-frame of bars with `start <= date <= end`.
    ///
    /// The bounds need not be trading dates. An inverted range yields an
    /// empty frame.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> DataFrame {
        let lo = self.dates.partition_point(|date| *date < start);
        let hi = self.dates.partition_point(|date| *date <= end);
        self.frame.slice(lo as i64, hi.saturating_sub(lo))
    }

    fn bar_at(&self, idx: usize) -> Result<Bar> {
        let value = |name: &str| -> Result<f64> {
            self.frame.column(name)?.f64()?.get(idx).ok_or_else(|| {
                DataError::Parse(format!("null {} at row {} of {}", name, idx, self.symbol))
            })
        };

        Ok(Bar {
            date: self.dates[idx],
            open: value(OPEN)?,
            high: value(HIGH)?,
            low: value(LOW)?,
            close: value(CLOSE)?,
        })
    }
}
