#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/form4/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod columns;
pub mod label;
pub mod table;

pub use columns::{FEATURE_COLUMNS, REQUIRED_COLUMNS};
pub use label::{LabelConfig, LabelError, LabelSummary, MODEL_COLUMNS, label_dataset, label_file};
pub use table::{Result, TableError, TransactionTable};

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
