//! Read-through cache in front of any provider.

use crate::cache::sqlite::SqliteCache;
use crate::error::Result;
use crate::history::PriceHistory;
use crate::provider::SecurityDataProvider;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Provider wrapper that serves sectors and histories from a [`SqliteCache`]
/// and falls back to the wrapped provider on a miss.
///
/// A cached history is served only while the wrapped provider reports the
/// same [`SecurityDataProvider::revision`] it was stored under.
///
/// Cache read or write failures never fail a lookup; they are logged and the
/// wrapped provider's answer is used. Provider failures are not cached.
#[derive(Debug)]
pub struct CachingProvider<P> {
    inner: P,
    cache: Mutex<SqliteCache>,
    force_refresh: bool,
}

impl<P> CachingProvider<P> {
    /// Wrap `inner` with `cache`.
    pub fn new(inner: P, cache: SqliteCache) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
            force_refresh: false,
        }
    }

    /// Ignore cached entries and re-fetch (results are still written back).
    pub const fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// The wrapped provider.
    pub const fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: SecurityDataProvider> SecurityDataProvider for CachingProvider<P> {
    async fn sector(&self, symbol: &str) -> Result<Option<String>> {
        if !self.force_refresh {
            let cache = self.cache.lock().await;
            match cache.get_sector(symbol) {
                Ok(Some(cached)) => return Ok(cached),
                Ok(None) => {}
                Err(e) => warn!(symbol, error = %e, "failed to read cached sector"),
            }
        }

        let sector = self.inner.sector(symbol).await?;

        let cache = self.cache.lock().await;
        if let Err(e) = cache.put_sector(symbol, sector.as_deref()) {
            warn!(symbol, error = %e, "failed to cache sector");
        }

        Ok(sector)
    }

    async fn history(&self, symbol: &str) -> Result<PriceHistory> {
        let revision = match self.inner.revision(symbol).await {
            Ok(revision) => Some(revision),
            Err(e) => {
                warn!(symbol, error = %e, "source revision unknown, bypassing cache");
                None
            }
        };

        if !self.force_refresh
            && let Some(revision) = &revision
        {
            let cache = self.cache.lock().await;
            match cache.current_history(symbol, revision.as_deref()) {
                Ok(Some(history)) => return Ok(history),
                Ok(None) => debug!(symbol, "cached history absent or stale"),
                Err(e) => warn!(symbol, error = %e, "failed to read cached history"),
            }
        }

        let history = self.inner.history(symbol).await?;

        let cache = self.cache.lock().await;
        if let Err(e) = cache.put_history(&history, revision.flatten().as_deref()) {
            warn!(symbol, error = %e, "failed to cache history");
        }

        Ok(history)
    }

    async fn revision(&self, symbol: &str) -> Result<Option<String>> {
        self.inner.revision(symbol).await
    }
}
