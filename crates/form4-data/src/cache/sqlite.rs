//! SQLite caching layer for price histories and sector labels.

use crate::error::{DataError, Result};
use crate::history::{Bar, PriceHistory};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// SQLite cache for provider data.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Create a new SQLite cache.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Open a cache that lives only as long as this handle.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create the quote and sector tables when absent.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS quotes (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (symbol, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quotes_symbol_date ON quotes(symbol, date)",
            [],
        )?;

        // A NULL revision records a source that cannot tag its histories
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS history_revisions (
                symbol TEXT PRIMARY KEY,
                revision TEXT,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;

        // A NULL sector records that the provider had no label
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS sectors (
                symbol TEXT PRIMARY KEY,
                sector TEXT,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Check if a history is cached for a symbol.
    pub fn has_history(&self, symbol: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quotes WHERE symbol = ?1",
            params![symbol],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Cached history of `symbol`, if it was stored under `revision`.
    ///
    /// Returns `Ok(None)` when nothing is cached or the cached copy was taken
    /// from a different revision of the source.
    pub fn current_history(
        &self,
        symbol: &str,
        revision: Option<&str>,
    ) -> Result<Option<PriceHistory>> {
        let stored = self
            .conn
            .query_row(
                "SELECT revision FROM history_revisions WHERE symbol = ?1",
                params![symbol],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;

        match stored {
            Some(stored) if stored.as_deref() == revision && self.has_history(symbol)? => {
                self.get_history(symbol).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Get the cached history for a symbol.
    pub fn get_history(&self, symbol: &str) -> Result<PriceHistory> {
        let mut stmt = self.conn.prepare(
            "SELECT date, open, high, low, close
             FROM quotes
             WHERE symbol = ?1
             ORDER BY date ASC",
        )?;

        let rows = stmt.query_map(params![symbol], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut bars = Vec::new();
        for row in rows {
            let (date, open, high, low, close) = row?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("Invalid cached date {}: {}", date, e)))?;
            bars.push(Bar::new(date, open, high, low, close));
        }

        if bars.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No cached data found".to_string(),
            });
        }

        PriceHistory::from_bars(symbol, bars)
    }

    /// Store a history taken from `revision` of its source, replacing any
    /// previous bars.
    pub fn put_history(&self, history: &PriceHistory, revision: Option<&str>) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let bars = history.bars()?;

        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM quotes WHERE symbol = ?1",
            params![history.symbol()],
        )?;

        for bar in &bars {
            tx.execute(
                "INSERT OR REPLACE INTO quotes
                 (symbol, date, open, high, low, close, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    history.symbol(),
                    bar.date.to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    cached_at
                ],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO history_revisions (symbol, revision, cached_at)
             VALUES (?1, ?2, ?3)",
            params![history.symbol(), revision, cached_at],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Get the cached sector answer for a symbol.
    ///
    /// `None` means nothing is cached; `Some(None)` means the provider was
    /// asked and had no label.
    pub fn get_sector(&self, symbol: &str) -> Result<Option<Option<String>>> {
        let result = self
            .conn
            .query_row(
                "SELECT sector FROM sectors WHERE symbol = ?1",
                params![symbol],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;

        Ok(result)
    }

    /// Store a sector answer, including an unknown one.
    pub fn put_sector(&self, symbol: &str, sector: Option<&str>) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT OR REPLACE INTO sectors (symbol, sector, cached_at)
             VALUES (?1, ?2, ?3)",
            params![symbol, sector, cached_at],
        )?;

        Ok(())
    }

    /// Drop everything cached for a symbol.
    pub fn clear_symbol(&self, symbol: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM quotes WHERE symbol = ?1", params![symbol])?;
        self.conn.execute(
            "DELETE FROM history_revisions WHERE symbol = ?1",
            params![symbol],
        )?;
        self.conn
            .execute("DELETE FROM sectors WHERE symbol = ?1", params![symbol])?;
        Ok(())
    }

    /// Get cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let total_quotes: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;

        let unique_symbols: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT symbol) FROM quotes", [], |row| {
                    row.get(0)
                })?;

        let cached_sectors: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sectors", [], |row| row.get(0))?;

        Ok(CacheStats {
            total_quotes: total_quotes as usize,
            unique_symbols: unique_symbols as usize,
            cached_sectors: cached_sectors as usize,
        })
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of cached bars
    pub total_quotes: usize,
    /// Number of symbols with a cached history
    pub unique_symbols: usize,
    /// Number of cached sector answers
    pub cached_sectors: usize,
}
