//! Security and market data provider contract.

use crate::error::{DataError, Result};
use crate::history::PriceHistory;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

/// Source of sector labels and daily price histories.
///
/// Implementations are shared by every concurrent evaluation of a run, so
/// they must be `Send + Sync`. No retry policy is implied: a failed call is
/// reported once and the caller decides what to do with it.
pub trait SecurityDataProvider: Send + Sync {
    /// Sector label for `symbol`; `Ok(None)` when the provider has no label.
    fn sector(&self, symbol: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Full available daily history for `symbol`.
    fn history(&self, symbol: &str) -> impl Future<Output = Result<PriceHistory>> + Send;

    /// Opaque tag that changes whenever the history of `symbol` changes.
    ///
    /// Caches compare it with the tag stored next to their copy and refetch
    /// on a mismatch. `None` means the source cannot tell, which matches only
    /// a copy stored without a tag.
    fn revision(&self, symbol: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        let _ = symbol;
        async { Ok(None) }
    }
}

/// In-memory provider with fixed answers.
///
/// Deterministic, so two runs over the same input produce identical
/// features. Symbols registered with [`StaticProvider::with_failure`] fail
/// every call the way an unreachable upstream would.
#[derive(Debug, Default)]
pub struct StaticProvider {
    sectors: HashMap<String, String>,
    histories: HashMap<String, PriceHistory>,
    failing: HashSet<String>,
    requests: Mutex<HashMap<String, usize>>,
}

impl StaticProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sector label.
    pub fn with_sector(mut self, symbol: impl Into<String>, sector: impl Into<String>) -> Self {
        self.sectors.insert(symbol.into(), sector.into());
        self
    }

    /// Register a history under its own symbol.
    pub fn with_history(mut self, history: PriceHistory) -> Self {
        self.histories.insert(history.symbol().to_string(), history);
        self
    }

    /// Make every call for `symbol` fail.
    pub fn with_failure(mut self, symbol: impl Into<String>) -> Self {
        self.failing.insert(symbol.into());
        self
    }

    /// Number of history requests received for `symbol`.
    pub fn history_requests(&self, symbol: &str) -> usize {
        self.requests
            .lock()
            .map(|requests| requests.get(symbol).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn check_available(&self, symbol: &str) -> Result<()> {
        if self.failing.contains(symbol) {
            return Err(DataError::Provider {
                symbol: symbol.to_string(),
                reason: "upstream unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl SecurityDataProvider for StaticProvider {
    async fn sector(&self, symbol: &str) -> Result<Option<String>> {
        self.check_available(symbol)?;
        Ok(self.sectors.get(symbol).cloned())
    }

    async fn history(&self, symbol: &str) -> Result<PriceHistory> {
        if let Ok(mut requests) = self.requests.lock() {
            *requests.entry(symbol.to_string()).or_insert(0) += 1;
        }
        self.check_available(symbol)?;
        self.histories
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "symbol not found".to_string(),
            })
    }
}
