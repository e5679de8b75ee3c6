//! Confidence-gated unprojection of depth pixels into camera space.

use crate::error::ReprojectError;
use crate::intrinsics::{IntrinsicsCache, ScaledIntrinsics};
use crate::texture::{Confidence, DepthImage};
use depthcloud_sensor::CameraIntrinsics;
use glam::{Vec3, Vec4};
use image::imageops::sample_bilinear;
use image::{GrayImage, RgbaImage};
use tracing::{debug, info};

/// Depth written for samples that failed the range or confidence gate.
pub const SENTINEL_DEPTH: f32 = -999.0;

/// Vertex written for samples that failed the range or confidence gate.
pub const SENTINEL_VERTEX: Vec3 = Vec3::new(0.0, 0.0, SENTINEL_DEPTH);

/// Unproject depth pixel `(x, y)` or return [`SENTINEL_VERTEX`].
///
/// A sample passes when `near < depth < far` and its confidence is high.
/// Camera space follows the display convention of the textures: x and y are
/// negated so the cloud appears upright and unmirrored.
#[inline]
pub fn unproject(
    x: u32,
    y: u32,
    depth: f32,
    confidence: u8,
    near: f32,
    far: f32,
    k: &ScaledIntrinsics,
) -> Vec3 {
    if depth > near && depth < far && confidence == Confidence::High as u8 {
        Vec3::new(
            -depth * (x as f32 - k.cx) / k.fx,
            -depth * (y as f32 - k.cy) / k.fy,
            depth,
        )
    } else {
        SENTINEL_VERTEX
    }
}

/// Parallel vertex/color arrays in depth raster order.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    vertices: Vec<Vec3>,
    colors: Vec<Vec4>,
    width: u32,
    height: u32,
}

impl PointCloud {
    fn allocate(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            vertices: vec![SENTINEL_VERTEX; len],
            colors: vec![Vec4::ZERO; len],
            width,
            height,
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    /// Depth raster size (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether sample `index` passed the gate.
    pub fn is_valid(&self, index: usize) -> bool {
        self.vertices[index].z != SENTINEL_DEPTH
    }

    /// Vertices and colors of the samples that passed the gate.
    pub fn valid_points(&self) -> impl Iterator<Item = (Vec3, Vec4)> + '_ {
        self.vertices
            .iter()
            .zip(&self.colors)
            .filter(|(v, _)| v.z != SENTINEL_DEPTH)
            .map(|(v, c)| (*v, *c))
    }

    pub fn valid_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.z != SENTINEL_DEPTH).count()
    }
}

/// Turns depth + confidence + camera textures into a colored point cloud.
///
/// Owns the point buffers and reuses them while the depth resolution is
/// stable. Every reallocation starts a new epoch, which is what keys the
/// intrinsics cache.
#[derive(Debug)]
pub struct PointCloudReprojector {
    near: f32,
    far: f32,
    cloud: PointCloud,
    epoch: u64,
    intrinsics: IntrinsicsCache,
}

impl PointCloudReprojector {
    pub fn new(near: f32, far: f32) -> Self {
        Self {
            near,
            far,
            cloud: PointCloud::default(),
            epoch: 0,
            intrinsics: IntrinsicsCache::new(),
        }
    }

    /// Reproject one frame.
    ///
    /// `camera` may have any resolution; it is sampled bilinearly at the
    /// normalized position of each depth pixel. `intrinsics` is only called
    /// when the cached value is missing for the current epoch.
    pub fn reproject(
        &mut self,
        camera: &RgbaImage,
        depth: &DepthImage,
        confidence: &GrayImage,
        intrinsics: impl FnOnce() -> Option<CameraIntrinsics>,
    ) -> Result<&PointCloud, ReprojectError> {
        let (width, height) = depth.dimensions();
        if confidence.dimensions() != (width, height) {
            return Err(ReprojectError::DimensionMismatch {
                depth: (width, height),
                confidence: confidence.dimensions(),
            });
        }
        if width == 0 || height == 0 {
            return Err(ReprojectError::EmptyDepth);
        }

        debug!("Depth:{},{}", width, height);
        debug!("Color:{},{}", camera.width(), camera.height());
        self.ensure_buffers(width, height);

        let k = self
            .intrinsics
            .ensure(self.epoch, camera.width(), width, intrinsics)?;

        let (near, far) = (self.near, self.far);
        let samples = depth.as_raw().iter().zip(confidence.as_raw().iter());
        let outputs = self.cloud.vertices.iter_mut().zip(self.cloud.colors.iter_mut());

        for (index, ((&d, &c), (vertex, color))) in samples.zip(outputs).enumerate() {
            let x = index as u32 % width;
            let y = index as u32 / width;
            *color = sample_color(camera, x as f32 / width as f32, y as f32 / height as f32);
            *vertex = unproject(x, y, d, c, near, far, &k);
        }

        Ok(&self.cloud)
    }

    /// The most recent cloud (empty before the first reprojection).
    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    /// Number of buffer allocations so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn intrinsics(&self) -> &IntrinsicsCache {
        &self.intrinsics
    }

    fn ensure_buffers(&mut self, width: u32, height: u32) {
        let required = width as usize * height as usize;
        if !self.cloud.is_empty() && self.cloud.len() == required {
            self.cloud.width = width;
            self.cloud.height = height;
            return;
        }

        self.cloud = PointCloud::allocate(width, height);
        self.epoch += 1;
        self.intrinsics.invalidate();
        info!(
            "Allocated point buffers for {}x{} ({} points, epoch {})",
            width, height, required, self.epoch
        );
    }
}

/// Bilinear RGBA sample at normalized `(u, v)` as 0-1 floats.
fn sample_color(camera: &RgbaImage, u: f32, v: f32) -> Vec4 {
    sample_bilinear(camera, u, v)
        .map(|pixel| Vec4::from_array(pixel.0.map(|channel| channel as f32 / 255.0)))
        .unwrap_or(Vec4::ZERO)
}
