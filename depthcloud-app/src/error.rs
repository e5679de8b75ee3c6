//! Error types for the depthcloud binary.

use depthcloud_core::ConfigError;
use depthcloud_sensor::SensorError;
use thiserror::Error;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("{0} sensor images were never released")]
    LeakedImages(usize),
}
