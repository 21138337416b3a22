//! Run configuration for the enrichment pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating an [`EnrichConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Concurrency must be at least one
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    /// Exit quantile outside `[0, 1]`
    #[error("exit quantile must be within [0, 1], got {0}")]
    InvalidQuantile(f64),

    /// Reference symbol left empty
    #[error("{0} symbol must not be empty")]
    EmptySymbol(&'static str),

    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for this schema
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How evaluation dates are matched against a price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateAlignment {
    /// Dates must be trading days of the series; a miss makes the evaluation unavailable.
    #[default]
    Exact,
    /// A date absent from the series is moved to the nearest earlier trading day.
    NearestEarlier,
}

/// Which close the volatility-index changes are measured to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityWindow {
    /// 1-month change to the 1-month close, 2-week change to the 2-week close.
    #[default]
    Matched,
    /// Both changes use the 2-week window, matching runs produced before the
    /// windows were separated.
    Legacy,
}

/// Configuration for one enrichment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Maximum number of in-flight provider calls (default: 12)
    pub concurrency: usize,
    /// Broad market index symbol (default: `^GSPC`)
    pub index_symbol: String,
    /// Volatility index symbol (default: `^VIX`)
    pub volatility_symbol: String,
    /// Quantile used for the hypothetical exits (default: 0.75)
    pub exit_quantile: f64,
    /// Date matching policy (default: exact)
    pub date_alignment: DateAlignment,
    /// Volatility window policy (default: matched)
    pub volatility_window: VolatilityWindow,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 12,
            index_symbol: "^GSPC".to_string(),
            volatility_symbol: "^VIX".to_string(),
            exit_quantile: 0.75,
            date_alignment: DateAlignment::Exact,
            volatility_window: VolatilityWindow::Matched,
        }
    }
}

impl EnrichConfig {
    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if !(0.0..=1.0).contains(&self.exit_quantile) {
            return Err(ConfigError::InvalidQuantile(self.exit_quantile));
        }
        if self.index_symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol("index"));
        }
        if self.volatility_symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol("volatility"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EnrichConfig::default();
        assert_eq!(config.concurrency, 12);
        assert_eq!(config.index_symbol, "^GSPC");
        assert_eq!(config.volatility_symbol, "^VIX");
        assert_eq!(config.exit_quantile, 0.75);
        assert_eq!(config.date_alignment, DateAlignment::Exact);
        assert_eq!(config.volatility_window, VolatilityWindow::Matched);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EnrichConfig::from_json_str(
            r#"{"concurrency": 4, "date_alignment": "nearest_earlier", "volatility_window": "legacy"}"#,
        )
        .unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.date_alignment, DateAlignment::NearestEarlier);
        assert_eq!(config.volatility_window, VolatilityWindow::Legacy);
        assert_eq!(config.index_symbol, "^GSPC");
    }

    #[test]
    fn test_invalid_values() {
        let config = EnrichConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency)
        ));

        let config = EnrichConfig {
            exit_quantile: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQuantile(_))
        ));

        assert!(EnrichConfig::from_json_str(r#"{"index_symbol": ""}"#).is_err());
        assert!(EnrichConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form4.json");
        std::fs::write(&path, r#"{"exit_quantile": 0.9}"#).unwrap();
        let config = EnrichConfig::from_path(&path).unwrap();
        assert_eq!(config.exit_quantile, 0.9);
    }
}
