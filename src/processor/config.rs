use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::processor::ProcessorError;
use crate::processor::column::DEFAULT_METRIC_KEYS;

/// Tunables for classification, pagination and view caching
///
/// Every field is optional in TOML; missing keys take the defaults below.
///
/// ```toml
/// metric_keys = ["spend", "clicks", "revenue"]
/// page_size_presets = [10, 20, 50]
/// default_page_size = 20
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Field names classified as metrics
    pub metric_keys: Vec<String>,
    /// Page sizes offered to the user
    pub page_size_presets: Vec<usize>,
    /// Page size of a fresh view, must be one of the presets
    pub default_page_size: usize,
    /// Non-null values inspected when deciding if a field is numeric
    pub numeric_sample_size: usize,
    /// Derived views kept by a `QueryCache`
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            metric_keys: DEFAULT_METRIC_KEYS.iter().map(|k| k.to_string()).collect(),
            page_size_presets: vec![5, 10, 25, 50, 100],
            default_page_size: 10,
            numeric_sample_size: 10,
            cache_capacity: 32,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ProcessorError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ProcessorError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.page_size_presets.is_empty() {
            return Err(ProcessorError::Config(
                "page_size_presets must not be empty".into(),
            ));
        }
        if self.page_size_presets.contains(&0) {
            return Err(ProcessorError::Config(
                "page sizes must be positive".into(),
            ));
        }
        if !self.page_size_presets.contains(&self.default_page_size) {
            return Err(ProcessorError::Config(format!(
                "default_page_size {} is not one of {:?}",
                self.default_page_size, self.page_size_presets
            )));
        }
        if self.numeric_sample_size == 0 {
            return Err(ProcessorError::Config(
                "numeric_sample_size must be at least 1".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ProcessorError::Config(
                "cache_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `requested` when it is a preset, otherwise the default page size
    pub fn resolve_page_size(&self, requested: usize) -> usize {
        if self.page_size_presets.contains(&requested) {
            requested
        } else {
            tracing::debug!(
                requested,
                fallback = self.default_page_size,
                "Page size is not a preset"
            );
            self.default_page_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.metric_keys.len(), 9);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            "page_size_presets = [20, 40]\ndefault_page_size = 20\n",
        )
        .unwrap();
        assert_eq!(config.page_size_presets, vec![20, 40]);
        assert_eq!(config.numeric_sample_size, 10);
        assert_eq!(config.resolve_page_size(40), 40);
        assert_eq!(config.resolve_page_size(7), 20);
    }

    #[test]
    fn test_invalid_default_page_size() {
        let err = EngineConfig::from_toml_str("default_page_size = 7\n").unwrap_err();
        assert!(matches!(err, ProcessorError::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::from_toml_str("metric_keys = 3").unwrap_err();
        assert!(matches!(err, ProcessorError::Toml(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let config = EngineConfig {
            cache_capacity: 4,
            ..EngineConfig::default()
        };
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);
    }
}
