//! Cache manager for market data.
//!
//! Locates the SQLite cache shared by every run under a platform-specific
//! default directory.

use form4_data::{DataError, SqliteCache};
use std::path::PathBuf;

/// Get the default cache directory path.
///
/// - Linux: `~/.cache/form4/`
/// - macOS: `~/Library/Caches/form4/`
/// - Windows: `%LOCALAPPDATA%\form4\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("form4")
}

/// Get the default cache database path.
pub(crate) fn default_cache_path() -> PathBuf {
    default_cache_dir().join("form4.db")
}

/// Open the cache, creating the directory if needed.
pub(crate) fn open_cache() -> Result<SqliteCache, DataError> {
    let cache_path = default_cache_path();

    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    SqliteCache::new(&cache_path)
}

/// Print the cache location and what it holds.
pub(crate) fn print_cache_info() {
    println!("  Cache location: {}", default_cache_path().display());
    match open_cache().and_then(|cache| cache.get_stats()) {
        Ok(stats) => println!(
            "  Cached data: {} quotes for {} symbols, {} sectors",
            stats.total_quotes, stats.unique_symbols, stats.cached_sectors
        ),
        Err(e) => println!("  Cache unavailable: {}", e),
    }
}

/// Drop every cached entry of `symbol`.
pub(crate) fn clear_symbol(symbol: &str) -> Result<(), DataError> {
    open_cache()?.clear_symbol(symbol)
}
