//! Enrichment run over a file-backed data directory.
//!
//! Price histories and sectors come from a [`CsvDirectoryProvider`]. Unless
//! disabled, the provider sits behind the on-disk SQLite cache so repeated
//! runs skip re-reading and re-validating every series.

use super::cache_manager;
use form4_data::{CachingProvider, CsvDirectoryProvider, DataError, SecurityDataProvider};
use form4_features::{EnrichConfig, Enricher, PipelineError, RecordFeatures, TransactionRecord};
use indicatif::ProgressBar;
use std::path::Path;
use tracing::{info, warn};

/// Error type for an enrichment run.
#[derive(Debug, thiserror::Error)]
pub(crate) enum EnrichmentError {
    /// The data directory could not be opened.
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    /// The run could not start.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration for data fetching.
#[derive(Debug, Clone)]
pub(crate) struct FetchConfig {
    /// Whether to use the cache.
    pub use_cache: bool,
    /// Whether to force refresh (ignore cache).
    pub force_refresh: bool,
}

/// Enrich `records` with data read from `data_dir`.
///
/// A cache that cannot be opened is logged and the run proceeds uncached.
pub(crate) async fn enrich_records(
    data_dir: &Path,
    records: &[TransactionRecord],
    config: EnrichConfig,
    fetch: &FetchConfig,
    progress: Option<&ProgressBar>,
) -> Result<Vec<RecordFeatures>, EnrichmentError> {
    let source = CsvDirectoryProvider::open(data_dir)?;

    let cache = if fetch.use_cache {
        match cache_manager::open_cache() {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "cache unavailable, reading the data directory directly");
                None
            }
        }
    } else {
        None
    };

    match cache {
        Some(cache) => {
            info!(refresh = fetch.force_refresh, "using cached provider");
            let provider =
                CachingProvider::new(source, cache).with_force_refresh(fetch.force_refresh);
            run(provider, records, config, progress).await
        }
        None => run(source, records, config, progress).await,
    }
}

async fn run<P: SecurityDataProvider>(
    provider: P,
    records: &[TransactionRecord],
    config: EnrichConfig,
    progress: Option<&ProgressBar>,
) -> Result<Vec<RecordFeatures>, EnrichmentError> {
    let enricher = Enricher::new(provider, config)?;
    Ok(enricher.enrich(records, progress).await)
}
