//! Serializable scan configuration.
//!
//! A `ScanConfig` is everything needed to reproduce a scan: the target
//! granularity, the lookback window, the baseline statistic and threshold,
//! plus runner concerns (native granularity for the aggregation fallback,
//! symbol filter, worker threads). Loaded from TOML; every field is optional
//! and falls back to the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use volbreak_core::domain::{Granularity, SymbolId};
use volbreak_core::{BaselineAnchor, ScanParams, Statistic, WindowPolicy};

/// Errors from loading or validating a scan configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Granularity the scan runs at.
    pub granularity: Granularity,
    /// Granularity stored bars are aggregated from when the store has no
    /// series at `granularity`.
    pub native_granularity: Granularity,
    pub lookback_period: usize,
    /// A bar is a breakout when `volume / baseline` is strictly above this.
    pub ratio_threshold: f64,
    pub baseline: Statistic,
    pub anchor: BaselineAnchor,
    pub window_policy: WindowPolicy,
    /// Symbols to scan. Empty means every symbol in the store.
    pub symbols: Vec<String>,
    /// Worker threads. `None` uses rayon's global pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let params = ScanParams::default();
        Self {
            granularity: params.granularity,
            native_granularity: Granularity::ONE_MINUTE,
            lookback_period: params.lookback_period,
            ratio_threshold: params.ratio_threshold,
            baseline: params.baseline,
            anchor: params.anchor,
            window_policy: params.window_policy,
            symbols: Vec::new(),
            threads: None,
        }
    }
}

impl ScanConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let min_period = self.baseline.min_period();
        if self.lookback_period < min_period {
            return Err(ConfigError::Invalid(format!(
                "lookback_period {} is below the minimum of {} for {}",
                self.lookback_period, min_period, self.baseline
            )));
        }
        if !self.ratio_threshold.is_finite() || self.ratio_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "ratio_threshold must be positive and finite, got {}",
                self.ratio_threshold
            )));
        }
        if self.granularity.multiple_of(self.native_granularity).is_none() {
            return Err(ConfigError::Invalid(format!(
                "granularity {} is not a whole multiple of native granularity {}",
                self.granularity, self.native_granularity
            )));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        for symbol in &self.symbols {
            symbol
                .parse::<SymbolId>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Scanner parameters carried by this config.
    pub fn params(&self) -> ScanParams {
        ScanParams {
            granularity: self.granularity,
            lookback_period: self.lookback_period,
            ratio_threshold: self.ratio_threshold,
            baseline: self.baseline,
            anchor: self.anchor,
            window_policy: self.window_policy,
        }
    }

    /// The symbol filter as ids, or `None` when every symbol is scanned.
    pub fn symbol_filter(&self) -> Option<Vec<SymbolId>> {
        if self.symbols.is_empty() {
            None
        } else {
            Some(self.symbols.iter().map(|s| SymbolId::new(s.trim())).collect())
        }
    }

    /// Content hash of the config, stable across runs with identical settings.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scanner_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.params(), ScanParams::default());
        assert_eq!(config.native_granularity, Granularity::ONE_MINUTE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_the_default_config() {
        assert_eq!(ScanConfig::from_toml("").unwrap(), ScanConfig::default());
    }

    #[test]
    fn parses_full_toml() {
        let config = ScanConfig::from_toml(
            r#"
granularity = "15min"
native_granularity = "5min"
lookback_period = 30
ratio_threshold = 4.5
baseline = "ema"
anchor = "preceding"
window_policy = "by_elapsed_time"
symbols = ["AAPL", "MSFT"]
threads = 2
"#,
        )
        .unwrap();

        assert_eq!(config.granularity, Granularity::FIFTEEN_MINUTES);
        assert_eq!(config.native_granularity, Granularity::FIVE_MINUTES);
        assert_eq!(config.lookback_period, 30);
        assert_eq!(config.baseline, Statistic::Ema);
        assert_eq!(config.anchor, BaselineAnchor::Preceding);
        assert_eq!(config.window_policy, WindowPolicy::ByElapsedTime);
        assert_eq!(config.threads, Some(2));
        assert_eq!(
            config.symbol_filter(),
            Some(vec![SymbolId::new("AAPL"), SymbolId::new("MSFT")])
        );
    }

    #[test]
    fn toml_roundtrip() {
        let config = ScanConfig {
            lookback_period: 12,
            symbols: vec!["SPY".into()],
            ..ScanConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(ScanConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn unknown_field_rejected() {
        let err = ScanConfig::from_toml("lookback = 20").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn adjusted_sma_needs_three_bars() {
        let err = ScanConfig::from_toml("lookback_period = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let sma = ScanConfig::from_toml("lookback_period = 2\nbaseline = \"sma\"");
        assert!(sma.is_ok());
    }

    #[test]
    fn threshold_must_be_positive() {
        assert!(ScanConfig::from_toml("ratio_threshold = 0.0").is_err());
        assert!(ScanConfig::from_toml("ratio_threshold = -3.0").is_err());
        assert!(ScanConfig::from_toml("ratio_threshold = nan").is_err());
    }

    #[test]
    fn native_must_divide_target() {
        let err = ScanConfig::from_toml("granularity = \"5min\"\nnative_granularity = \"15min\"")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(ScanConfig::from_toml("threads = 0").is_err());
    }

    #[test]
    fn symbols_must_be_plain_ids() {
        for bad in ["[\"\"]", "[\"../escaped\"]", "[\"a/b\"]"] {
            let err = ScanConfig::from_toml(&format!("symbols = {bad}")).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{bad}");
        }
        let ok = ScanConfig::from_toml("symbols = [\" BRK.B \"]").unwrap();
        assert_eq!(ok.symbol_filter(), Some(vec![SymbolId::new("BRK.B")]));
    }

    #[test]
    fn config_hash_is_deterministic() {
        let a = ScanConfig::default();
        let b = ScanConfig::default();
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());

        let c = ScanConfig {
            ratio_threshold: 8.0,
            ..ScanConfig::default()
        };
        assert_ne!(a.config_hash().unwrap(), c.config_hash().unwrap());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ScanConfig::from_file(Path::new("/nonexistent/volbreak.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
