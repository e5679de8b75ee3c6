//! Error types for pipeline operations.

use crate::texture::TargetFormat;
use depthcloud_sensor::{NativeFormat, SensorError};
use thiserror::Error;

/// Errors that can occur while converting a sensor image.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Unsupported conversion: {from:?} -> {to:?}")]
    Unsupported { from: NativeFormat, to: TargetFormat },

    #[error("Sensor image error: {0}")]
    Sensor(#[from] SensorError),
}

/// Reasons a frame could not be reprojected. None of them is fatal; the
/// pipeline skips the frame and tries again on the next one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReprojectError {
    #[error("Camera intrinsics unavailable")]
    IntrinsicsUnavailable,

    #[error("Depth image is empty")]
    EmptyDepth,

    #[error("Depth is {depth:?} but confidence is {confidence:?}")]
    DimensionMismatch {
        depth: (u32, u32),
        confidence: (u32, u32),
    },
}

/// Errors in pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Clip bounds must be finite: near={near}, far={far}")]
    NonFiniteBounds { near: f32, far: f32 },

    #[error("Near clip {near} must be less than far clip {far}")]
    InvertedBounds { near: f32, far: f32 },

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
