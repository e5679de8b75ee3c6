//! Common sensor source types and traits.

use crate::image::{NativeFormat, SensorImage};
use glam::Vec2;
use thiserror::Error;

/// Errors that can occur while describing or producing sensor images.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Invalid image layout: {format:?} {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidLayout {
        format: NativeFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported format for {stream} stream: {format:?}")]
    UnsupportedFormat {
        stream: &'static str,
        format: NativeFormat,
    },

    #[error("Invalid resolution: {0}x{1}")]
    InvalidResolution(u32, u32),
}

/// Pinhole intrinsics of the color camera at its native resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in pixels (fx, fy).
    pub focal_length: Vec2,
    /// Principal point in pixels (cx, cy).
    pub principal_point: Vec2,
    /// Resolution the intrinsics were calibrated at (width, height).
    pub resolution: (u32, u32),
}

impl CameraIntrinsics {
    pub fn new(focal_length: Vec2, principal_point: Vec2, resolution: (u32, u32)) -> Self {
        Self {
            focal_length,
            principal_point,
            resolution,
        }
    }
}

/// Trait for sensor subsystems that provide synchronized camera and depth products.
///
/// Every acquisition hands out a [`SensorImage`] that must be dropped (or
/// disposed) before the frame handler returns. `None` means no new image is
/// available for this frame; callers skip the stage and wait for the next
/// notification.
pub trait SensorSource {
    /// Acquire the latest color camera image.
    fn try_acquire_camera_image(&mut self) -> Option<SensorImage>;

    /// Acquire the latest environment depth image (meters or millimeters).
    fn try_acquire_depth_image(&mut self) -> Option<SensorImage>;

    /// Acquire the latest per-pixel depth confidence image.
    fn try_acquire_confidence_image(&mut self) -> Option<SensorImage>;

    /// Get the color camera intrinsics, if the subsystem has them.
    fn intrinsics(&self) -> Option<CameraIntrinsics>;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn try_acquire_camera_image(&mut self) -> Option<SensorImage> {
        (**self).try_acquire_camera_image()
    }

    fn try_acquire_depth_image(&mut self) -> Option<SensorImage> {
        (**self).try_acquire_depth_image()
    }

    fn try_acquire_confidence_image(&mut self) -> Option<SensorImage> {
        (**self).try_acquire_confidence_image()
    }

    fn intrinsics(&self) -> Option<CameraIntrinsics> {
        (**self).intrinsics()
    }
}
