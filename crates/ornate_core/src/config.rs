//! Ornate configuration
//!
//! Runtime tuning lives in an optional `ornate.toml`:
//!
//! ```toml
//! [scheduler]
//! frame_interval_ms = 16
//!
//! [debounce]
//! default_timeout_ms = 50
//! ```
//!
//! Every section and key is optional; missing values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{OrnateError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OrnateConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
}

/// Settings for the local scheduler
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Simulated time between animation frames
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Settings for debounced methods
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DebounceConfig {
    /// Window used by `Debounce::configured`
    #[serde(default)]
    pub default_timeout_ms: u64,
}

impl OrnateConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| OrnateError::ConfigFile(e.to_string()))
    }

    /// Load a configuration file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| OrnateError::ConfigFile(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded ornate config from {}", path.display());
        Ok(config)
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| OrnateError::ConfigFile(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = OrnateConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrnateConfig::default());
        assert_eq!(config.scheduler.frame_interval(), Duration::from_millis(16));
        assert_eq!(config.debounce.default_timeout_ms, 0);
    }

    #[test]
    fn test_partial_sections() {
        let config = OrnateConfig::from_toml_str(
            r#"
            [debounce]
            default_timeout_ms = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.debounce.default_timeout_ms, 40);
        assert_eq!(config.scheduler.frame_interval_ms, 16);
    }

    #[test]
    fn test_invalid_toml() {
        let err = OrnateConfig::from_toml_str("[scheduler\nframe_interval_ms = ").unwrap_err();
        assert!(matches!(err, OrnateError::ConfigFile(_)));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = OrnateConfig::default();
        config.scheduler.frame_interval_ms = 8;
        let text = config.to_toml().unwrap();
        assert_eq!(OrnateConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = OrnateConfig::load_from_path(Path::new("/nonexistent/ornate.toml")).unwrap_err();
        assert!(matches!(err, OrnateError::ConfigFile(_)));
    }
}
