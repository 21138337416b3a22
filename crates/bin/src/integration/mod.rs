//! Glue between the command line and the library crates.
//!
//! Resolves where market data comes from (data directory, optionally behind
//! the on-disk cache) and runs the enrichment driver over a loaded table.

pub(crate) mod cache_manager;
pub(crate) mod enrichment;
