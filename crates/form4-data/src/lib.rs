#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/form4/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod csv_dir;
pub mod error;
pub mod history;
pub mod provider;

pub use cache::{CacheStats, CachingProvider, SqliteCache};
pub use csv_dir::CsvDirectoryProvider;
pub use error::{DataError, Result};
pub use history::{Bar, PriceHistory};
pub use provider::{SecurityDataProvider, StaticProvider};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
