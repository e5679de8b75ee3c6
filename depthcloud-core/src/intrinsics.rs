//! Camera intrinsics rescaled to the depth image resolution.

use crate::error::ReprojectError;
use depthcloud_sensor::CameraIntrinsics;
use tracing::{debug, info, warn};

/// Pinhole parameters in depth-pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl ScaledIntrinsics {
    /// Scale camera-resolution intrinsics by `ratio` (depth width / camera width).
    pub fn from_camera(intrinsics: &CameraIntrinsics, ratio: f32) -> Self {
        Self {
            fx: intrinsics.focal_length.x * ratio,
            fy: intrinsics.focal_length.y * ratio,
            cx: intrinsics.principal_point.x * ratio,
            cy: intrinsics.principal_point.y * ratio,
        }
    }

    /// Positive finite focal lengths and a finite principal point.
    pub fn is_usable(&self) -> bool {
        self.fx > 0.0
            && self.fy > 0.0
            && [self.fx, self.fy, self.cx, self.cy].iter().all(|v| v.is_finite())
    }
}

/// Scaled intrinsics computed once per buffer-allocation epoch.
///
/// The reprojector bumps its epoch every time it reallocates its point
/// buffers; until then the cached value is returned without querying the
/// sensor again.
#[derive(Debug, Default)]
pub struct IntrinsicsCache {
    entry: Option<(u64, ScaledIntrinsics)>,
}

impl IntrinsicsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the intrinsics for `epoch`, querying `raw` only if the epoch changed.
    ///
    /// When `raw` yields nothing the cache stays empty, so the next call for
    /// the same epoch asks again.
    pub fn ensure(
        &mut self,
        epoch: u64,
        camera_width: u32,
        depth_width: u32,
        raw: impl FnOnce() -> Option<CameraIntrinsics>,
    ) -> Result<ScaledIntrinsics, ReprojectError> {
        if let Some((cached_epoch, scaled)) = self.entry {
            if cached_epoch == epoch {
                return Ok(scaled);
            }
        }

        if camera_width == 0 {
            return Err(ReprojectError::IntrinsicsUnavailable);
        }
        let intrinsics = raw().ok_or(ReprojectError::IntrinsicsUnavailable)?;
        if intrinsics.resolution.0 != camera_width {
            warn!(
                "Intrinsics calibrated at {}x{} but camera texture is {} wide; scaling by texture width",
                intrinsics.resolution.0, intrinsics.resolution.1, camera_width
            );
        }
        let ratio = depth_width as f32 / camera_width as f32;
        let scaled = ScaledIntrinsics::from_camera(&intrinsics, ratio);
        if !scaled.is_usable() {
            warn!("Ignoring degenerate intrinsics {:?} (scaled {:?})", intrinsics, scaled);
            return Err(ReprojectError::IntrinsicsUnavailable);
        }

        info!("intrinsics: {:?} (scaled by {:.4} for epoch {})", intrinsics, ratio, epoch);
        debug!("scaled intrinsics: {:?}", scaled);
        self.entry = Some((epoch, scaled));
        Ok(scaled)
    }

    /// The cached value, if any.
    pub fn cached(&self) -> Option<ScaledIntrinsics> {
        self.entry.map(|(_, scaled)| scaled)
    }

    /// Epoch of the cached value, if any.
    pub fn epoch(&self) -> Option<u64> {
        self.entry.map(|(epoch, _)| epoch)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use std::cell::Cell;

    fn camera() -> CameraIntrinsics {
        CameraIntrinsics::new(Vec2::new(1000.0, 800.0), Vec2::new(960.0, 720.0), (1920, 1440))
    }

    #[test]
    fn test_scaling_by_width_ratio() {
        let mut cache = IntrinsicsCache::new();
        let scaled = cache.ensure(1, 1920, 256, || Some(camera())).unwrap();
        let ratio = 256.0 / 1920.0;

        assert!((scaled.fx - 1000.0 * ratio).abs() < 1e-4);
        assert!((scaled.fy - 800.0 * ratio).abs() < 1e-4);
        assert!((scaled.cx - 128.0).abs() < 1e-4);
        assert!((scaled.cy - 96.0).abs() < 1e-4);
    }

    #[test]
    fn test_queried_once_per_epoch() {
        let mut cache = IntrinsicsCache::new();
        let queries = Cell::new(0);
        let query = || {
            queries.set(queries.get() + 1);
            Some(camera())
        };

        cache.ensure(1, 1920, 256, query).unwrap();
        cache.ensure(1, 1920, 256, query).unwrap();
        cache.ensure(1, 1920, 256, query).unwrap();
        assert_eq!(queries.get(), 1);

        cache.ensure(2, 1920, 256, query).unwrap();
        assert_eq!(queries.get(), 2);
        assert_eq!(cache.epoch(), Some(2));
    }

    #[test]
    fn test_cached_value_survives_input_changes_within_epoch() {
        let mut cache = IntrinsicsCache::new();
        let first = cache.ensure(1, 1920, 256, || Some(camera())).unwrap();
        let again = cache.ensure(1, 640, 256, || None).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_missing_intrinsics_is_retried() {
        let mut cache = IntrinsicsCache::new();
        assert_eq!(
            cache.ensure(1, 1920, 256, || None),
            Err(ReprojectError::IntrinsicsUnavailable)
        );
        assert!(cache.cached().is_none());
        assert!(cache.ensure(1, 1920, 256, || Some(camera())).is_ok());
    }

    #[test]
    fn test_zero_camera_width() {
        let mut cache = IntrinsicsCache::new();
        assert_eq!(
            cache.ensure(1, 0, 256, || Some(camera())),
            Err(ReprojectError::IntrinsicsUnavailable)
        );
    }

    #[test]
    fn test_calibration_width_mismatch_scales_by_texture_width() {
        let mut cache = IntrinsicsCache::new();
        let mut calibrated = camera();
        calibrated.resolution = (3840, 2880);
        assert_ne!(calibrated.resolution.0, 1920);

        let scaled = cache.ensure(1, 1920, 256, || Some(calibrated)).unwrap();
        assert_eq!(scaled, ScaledIntrinsics::from_camera(&camera(), 256.0 / 1920.0));
    }

    #[test]
    fn test_degenerate_intrinsics_rejected_and_not_cached() {
        let mut cache = IntrinsicsCache::new();
        let zero_focal = CameraIntrinsics::new(Vec2::ZERO, Vec2::new(960.0, 720.0), (1920, 1440));
        assert_eq!(
            cache.ensure(1, 1920, 256, || Some(zero_focal)),
            Err(ReprojectError::IntrinsicsUnavailable)
        );
        assert!(cache.cached().is_none());

        let nan_center = CameraIntrinsics::new(Vec2::splat(1000.0), Vec2::new(f32::NAN, 720.0), (1920, 1440));
        assert!(cache.ensure(1, 1920, 256, || Some(nan_center)).is_err());

        let negative = CameraIntrinsics::new(Vec2::new(1000.0, -800.0), Vec2::new(960.0, 720.0), (1920, 1440));
        assert!(cache.ensure(1, 1920, 256, || Some(negative)).is_err());

        assert!(cache.ensure(1, 1920, 256, || Some(camera())).is_ok());
    }

    #[test]
    fn test_invalidate() {
        let mut cache = IntrinsicsCache::new();
        cache.ensure(1, 1920, 256, || Some(camera())).unwrap();
        cache.invalidate();
        assert!(cache.cached().is_none());
    }
}
