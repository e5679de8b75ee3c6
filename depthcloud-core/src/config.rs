//! Static per-run pipeline configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Clip bounds and initial scan mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Near clip in meters; depths at or below it are discarded.
    pub near: f32,
    /// Far clip in meters; depths at or beyond it are discarded.
    pub far: f32,
    /// Whether the pipeline starts in scanning mode.
    pub scanning: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            near: 0.0,
            far: 5.0,
            scanning: true,
        }
    }
}

impl PipelineConfig {
    pub fn new(near: f32, far: f32) -> Self {
        Self {
            near,
            far,
            ..Self::default()
        }
    }

    pub fn with_scanning(mut self, scanning: bool) -> Self {
        self.scanning = scanning;
        self
    }

    /// Check `near < far` with both bounds finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (near, far) = (self.near, self.far);
        if !near.is_finite() || !far.is_finite() {
            return Err(ConfigError::NonFiniteBounds { near, far });
        }
        if near >= far {
            return Err(ConfigError::InvertedBounds { near, far });
        }
        Ok(())
    }

    /// Parse and validate a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.scanning);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = PipelineConfig::new(3.0, 1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedBounds { .. })
        ));
        assert!(PipelineConfig::new(2.0, 2.0).validate().is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let config = PipelineConfig::new(0.0, f32::INFINITY);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFiniteBounds { .. })
        ));
    }

    #[test]
    fn test_json_partial_document() {
        let config = PipelineConfig::from_json_str(r#"{ "far": 3.5, "scanning": false }"#).unwrap();
        assert_eq!(config.near, 0.0);
        assert_eq!(config.far, 3.5);
        assert!(!config.scanning);
    }

    #[test]
    fn test_json_invalid_bounds() {
        let result = PipelineConfig::from_json_str(r#"{ "near": 4.0, "far": 1.0 }"#);
        assert!(matches!(result, Err(ConfigError::InvertedBounds { .. })));
        assert!(matches!(
            PipelineConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
