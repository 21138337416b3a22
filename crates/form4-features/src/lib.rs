#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/form4/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod align;
pub mod config;
pub mod market;
pub mod outcome;
pub mod pipeline;
pub mod record;
pub mod related;
pub mod security;

pub use align::{align_to_trading_day, nearest_earlier};
pub use config::{ConfigError, DateAlignment, EnrichConfig, VolatilityWindow};
pub use market::{MarketContext, MarketEvaluator, MarketReference, MarketWindow};
pub use outcome::{Evaluation, Unavailable};
pub use pipeline::{EnrichSummary, Enricher, Phase, PipelineError, RecordFeatures};
pub use record::TransactionRecord;
pub use related::{RelatedTransactionIndex, RelatedTransactions};
pub use security::{SecurityEvaluator, SecurityPerformance, SecurityWindow, period_return};

// Re-export the data layer
pub use form4_data as data;

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
