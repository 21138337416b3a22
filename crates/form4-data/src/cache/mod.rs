//! Caching layer for provider data.

pub mod provider;
pub mod sqlite;

pub use provider::CachingProvider;
pub use sqlite::{CacheStats, SqliteCache};
