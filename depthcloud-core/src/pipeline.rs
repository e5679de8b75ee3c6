//! Per-frame orchestration: textures, reprojection and mesh publication.

use crate::config::PipelineConfig;
use crate::error::{ConfigError, ReprojectError};
use crate::mesh::{MeshSink, MeshUpdate};
use crate::render::{RenderTarget, SceneCommand, TextureSlot, TextureView};
use crate::reprojection::PointCloudReprojector;
use crate::texture::{
    DepthImage, colorize_confidence, convert_into, depth_to_grayscale, ensure_buffer,
};
use depthcloud_sensor::SensorSource;
use image::{GrayImage, Rgba32FImage, RgbaImage};
use std::fmt;
use tracing::{debug, info, warn};

/// Whether frames feed the point cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Scanning,
    Paused,
}

impl ScanMode {
    pub fn from_scanning(scanning: bool) -> Self {
        if scanning {
            ScanMode::Scanning
        } else {
            ScanMode::Paused
        }
    }

    pub fn is_scanning(self) -> bool {
        self == ScanMode::Scanning
    }

    /// Where the cloud belongs while in this mode.
    pub fn scene_command(self) -> SceneCommand {
        match self {
            ScanMode::Scanning => SceneCommand::AttachToCamera,
            ScanMode::Paused => SceneCommand::DetachToWorld,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Scanning => write!(f, "Scanning"),
            ScanMode::Paused => write!(f, "Paused"),
        }
    }
}

/// What happened to the point cloud this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ReprojectionOutcome {
    NotScanning,
    /// Depth or confidence did not arrive this frame, or no camera texture exists yet.
    MissingImages,
    Skipped(ReprojectError),
    Published {
        valid: usize,
        total: usize,
        update: MeshUpdate,
    },
}

/// Summary of one [`FramePipeline::process_frame`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub camera_updated: bool,
    pub depth_updated: bool,
    pub confidence_updated: bool,
    pub reprojection: ReprojectionOutcome,
}

impl FrameReport {
    pub fn published(&self) -> bool {
        matches!(self.reprojection, ReprojectionOutcome::Published { .. })
    }
}

#[derive(Debug, Default)]
struct DisplayTextures {
    camera: Option<RgbaImage>,
    depth: Option<DepthImage>,
    grayscale: Option<Rgba32FImage>,
    confidence: Option<GrayImage>,
    confidence_colors: Option<RgbaImage>,
}

/// The frame-ready handler.
///
/// Each call acquires the camera, depth and confidence images, converts them
/// into display textures and, while scanning, reprojects the depth into the
/// point mesh. Acquired images are released before the call returns.
#[derive(Debug)]
pub struct FramePipeline {
    config: PipelineConfig,
    mode: ScanMode,
    textures: DisplayTextures,
    reprojector: PointCloudReprojector,
    mesh: MeshSink,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Frame pipeline: near={} far={} mode={}",
            config.near,
            config.far,
            ScanMode::from_scanning(config.scanning)
        );
        Ok(Self {
            config,
            mode: ScanMode::from_scanning(config.scanning),
            textures: DisplayTextures::default(),
            reprojector: PointCloudReprojector::new(config.near, config.far),
            mesh: MeshSink::new(),
        })
    }

    /// Put the cloud where the initial mode wants it.
    pub fn start<R: RenderTarget + ?Sized>(&mut self, target: &mut R) {
        target.apply(self.mode.scene_command());
    }

    /// Switch scan mode; the scene command is sent only when the mode changes.
    ///
    /// Returns whether the mode changed.
    pub fn set_scanning<R: RenderTarget + ?Sized>(&mut self, scanning: bool, target: &mut R) -> bool {
        let mode = ScanMode::from_scanning(scanning);
        if mode == self.mode {
            return false;
        }
        info!("Scan mode {} -> {}", self.mode, mode);
        self.mode = mode;
        target.apply(mode.scene_command());
        true
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage for the current frame.
    pub fn process_frame<S, R>(&mut self, sensor: &mut S, target: &mut R) -> FrameReport
    where
        S: SensorSource + ?Sized,
        R: RenderTarget + ?Sized,
    {
        let camera_updated = self.update_camera(sensor, target);
        let depth_updated = self.update_depth(sensor, target);
        let confidence_updated = self.update_confidence(sensor, target);

        let reprojection = if !self.mode.is_scanning() {
            ReprojectionOutcome::NotScanning
        } else if !(depth_updated && confidence_updated) {
            ReprojectionOutcome::MissingImages
        } else {
            self.reproject(sensor, target)
        };

        FrameReport {
            camera_updated,
            depth_updated,
            confidence_updated,
            reprojection,
        }
    }

    fn update_camera<S, R>(&mut self, sensor: &mut S, target: &mut R) -> bool
    where
        S: SensorSource + ?Sized,
        R: RenderTarget + ?Sized,
    {
        let Some(image) = sensor.try_acquire_camera_image() else {
            return false;
        };
        let texture = ensure_buffer(&mut self.textures.camera, image.dimensions(), "camera");
        if let Err(e) = convert_into(&image, texture) {
            warn!("Skipping camera texture: {}", e);
            return false;
        }
        image.dispose();

        target.present_texture(TextureSlot::Camera, TextureView::Rgba8(texture));
        true
    }

    fn update_depth<S, R>(&mut self, sensor: &mut S, target: &mut R) -> bool
    where
        S: SensorSource + ?Sized,
        R: RenderTarget + ?Sized,
    {
        let Some(image) = sensor.try_acquire_depth_image() else {
            return false;
        };
        let size = image.dimensions();
        let depth = ensure_buffer(&mut self.textures.depth, size, "depth");
        if let Err(e) = convert_into(&image, depth) {
            warn!("Skipping depth texture: {}", e);
            return false;
        }
        image.dispose();
        target.present_texture(TextureSlot::RawDepth, TextureView::DepthF32(depth));

        let grayscale = ensure_buffer(&mut self.textures.grayscale, size, "grayscale depth");
        depth_to_grayscale(depth, grayscale, self.config.near, self.config.far);
        target.present_texture(TextureSlot::GrayscaleDepth, TextureView::Rgba32F(grayscale));
        true
    }

    fn update_confidence<S, R>(&mut self, sensor: &mut S, target: &mut R) -> bool
    where
        S: SensorSource + ?Sized,
        R: RenderTarget + ?Sized,
    {
        let Some(image) = sensor.try_acquire_confidence_image() else {
            return false;
        };
        let size = image.dimensions();
        let confidence = ensure_buffer(&mut self.textures.confidence, size, "confidence");
        if let Err(e) = convert_into(&image, confidence) {
            warn!("Skipping confidence texture: {}", e);
            return false;
        }
        image.dispose();

        let colors = ensure_buffer(&mut self.textures.confidence_colors, size, "confidence colors");
        colorize_confidence(confidence, colors);
        target.present_texture(TextureSlot::Confidence, TextureView::Rgba8(colors));
        true
    }

    fn reproject<S, R>(&mut self, sensor: &mut S, target: &mut R) -> ReprojectionOutcome
    where
        S: SensorSource + ?Sized,
        R: RenderTarget + ?Sized,
    {
        let (Some(camera), Some(depth), Some(confidence)) = (
            self.textures.camera.as_ref(),
            self.textures.depth.as_ref(),
            self.textures.confidence.as_ref(),
        ) else {
            return ReprojectionOutcome::MissingImages;
        };

        let cloud = match self
            .reprojector
            .reproject(camera, depth, confidence, || sensor.intrinsics())
        {
            Ok(cloud) => cloud,
            Err(e) => {
                warn!("Skipping reprojection: {}", e);
                return ReprojectionOutcome::Skipped(e);
            }
        };

        let (valid, total) = (cloud.valid_count(), cloud.len());
        let update = self.mesh.update(cloud.vertices(), cloud.colors());
        if let Some(mesh) = self.mesh.mesh() {
            match update {
                MeshUpdate::Updated => target.geometry_updated(mesh),
                MeshUpdate::Built | MeshUpdate::Rebuilt { .. } => target.publish_geometry(mesh),
            }
        }
        debug!("Reprojected {}/{} points ({:?})", valid, total, update);

        ReprojectionOutcome::Published {
            valid,
            total,
            update,
        }
    }

    /// Current contents of a display slot, if it has been filled.
    pub fn texture(&self, slot: TextureSlot) -> Option<TextureView<'_>> {
        match slot {
            TextureSlot::Camera => self.textures.camera.as_ref().map(TextureView::Rgba8),
            TextureSlot::RawDepth => self.textures.depth.as_ref().map(TextureView::DepthF32),
            TextureSlot::GrayscaleDepth => self.textures.grayscale.as_ref().map(TextureView::Rgba32F),
            TextureSlot::Confidence => self.textures.confidence_colors.as_ref().map(TextureView::Rgba8),
        }
    }

    pub fn camera_texture(&self) -> Option<&RgbaImage> {
        self.textures.camera.as_ref()
    }

    pub fn depth_texture(&self) -> Option<&DepthImage> {
        self.textures.depth.as_ref()
    }

    pub fn grayscale_texture(&self) -> Option<&Rgba32FImage> {
        self.textures.grayscale.as_ref()
    }

    /// Raw confidence levels, as converted from the sensor.
    pub fn confidence_texture(&self) -> Option<&GrayImage> {
        self.textures.confidence.as_ref()
    }

    pub fn reprojector(&self) -> &PointCloudReprojector {
        &self.reprojector
    }

    pub fn mesh(&self) -> &MeshSink {
        &self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reprojection::SENTINEL_VERTEX;
    use crate::testing::{Payload, RecordingTarget, ScriptedSensor};
    use depthcloud_sensor::{NativeFormat, SyntheticConfig, SyntheticSensor};
    use glam::Vec3;

    fn synthetic() -> SyntheticSensor {
        SyntheticSensor::new(SyntheticConfig {
            camera_size: (32, 24),
            depth_size: (16, 12),
            ..SyntheticConfig::default()
        })
        .unwrap()
    }

    fn pipeline(scanning: bool) -> FramePipeline {
        FramePipeline::new(PipelineConfig::new(0.0, 5.0).with_scanning(scanning)).unwrap()
    }

    #[test]
    fn test_scanning_frame_publishes_then_updates() {
        let mut sensor = synthetic();
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        sensor.advance();
        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert!(report.camera_updated && report.depth_updated && report.confidence_updated);
        match report.reprojection {
            ReprojectionOutcome::Published { valid, total, update } => {
                assert_eq!(total, 16 * 12);
                assert!(valid > 0 && valid < total);
                assert_eq!(update, MeshUpdate::Built);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            target.presented_slots(),
            vec![
                TextureSlot::Camera,
                TextureSlot::RawDepth,
                TextureSlot::GrayscaleDepth,
                TextureSlot::Confidence
            ]
        );
        assert_eq!(target.published, vec![16 * 12]);

        sensor.advance();
        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert!(matches!(
            report.reprojection,
            ReprojectionOutcome::Published { update: MeshUpdate::Updated, .. }
        ));
        assert_eq!(target.published.len(), 1);
        assert_eq!(target.updated, vec![16 * 12]);
    }

    #[test]
    fn test_every_image_released_each_frame() {
        let mut sensor = synthetic();
        let ledger = sensor.ledger();
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        for _ in 0..3 {
            sensor.advance();
            pipeline.process_frame(&mut sensor, &mut target);
            assert_eq!(ledger.outstanding(), 0);
        }
        assert_eq!(ledger.acquired(), 9);
        assert_eq!(ledger.released(), 9);
    }

    #[test]
    fn test_paused_still_updates_textures() {
        let mut sensor = synthetic();
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(false);

        sensor.advance();
        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert_eq!(report.reprojection, ReprojectionOutcome::NotScanning);
        assert!(report.camera_updated && report.depth_updated && report.confidence_updated);
        assert_eq!(target.presented.len(), 4);
        assert!(target.published.is_empty() && target.updated.is_empty());
        assert!(pipeline.mesh().mesh().is_none());
        assert_eq!(pipeline.camera_texture().unwrap().dimensions(), (32, 24));
    }

    #[test]
    fn test_scene_commands_only_on_mode_edges() {
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        pipeline.start(&mut target);
        assert_eq!(target.commands, vec![SceneCommand::AttachToCamera]);

        assert!(!pipeline.set_scanning(true, &mut target));
        assert!(pipeline.set_scanning(false, &mut target));
        assert!(!pipeline.set_scanning(false, &mut target));
        assert!(pipeline.set_scanning(true, &mut target));
        assert_eq!(
            target.commands,
            vec![
                SceneCommand::AttachToCamera,
                SceneCommand::DetachToWorld,
                SceneCommand::AttachToCamera
            ]
        );
    }

    #[test]
    fn test_paused_start_detaches() {
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(false);
        pipeline.start(&mut target);
        assert_eq!(target.commands, vec![SceneCommand::DetachToWorld]);
        assert_eq!(pipeline.mode(), ScanMode::Paused);
    }

    #[test]
    fn test_missing_intrinsics_skips_reprojection() {
        let mut sensor = synthetic();
        sensor.set_intrinsics_available(false);
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        sensor.advance();
        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert_eq!(
            report.reprojection,
            ReprojectionOutcome::Skipped(ReprojectError::IntrinsicsUnavailable)
        );
        assert!(target.published.is_empty());
        assert_eq!(target.presented.len(), 4);

        sensor.set_intrinsics_available(true);
        sensor.advance();
        assert!(pipeline.process_frame(&mut sensor, &mut target).published());
        assert_eq!(target.published.len(), 1);
    }

    #[test]
    fn test_missing_depth_keeps_camera_stage() {
        let mut sensor = synthetic();
        sensor.set_depth_available(false);
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        sensor.advance();
        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert!(report.camera_updated);
        assert!(!report.depth_updated && !report.confidence_updated);
        assert_eq!(report.reprojection, ReprojectionOutcome::MissingImages);
        assert_eq!(target.presented_slots(), vec![TextureSlot::Camera]);
    }

    #[test]
    fn test_no_frame_yet() {
        let mut sensor = synthetic();
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert!(!report.camera_updated);
        assert_eq!(report.reprojection, ReprojectionOutcome::MissingImages);
        assert!(target.presented.is_empty());
        assert!(pipeline.texture(TextureSlot::Camera).is_none());
    }

    #[test]
    fn test_uniform_scene_end_to_end() {
        let mut sensor = ScriptedSensor::uniform((8, 6), [255, 0, 0, 255], (8, 6), 2.5, 2, 10.0);
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert_eq!(
            report.reprojection,
            ReprojectionOutcome::Published {
                valid: 48,
                total: 48,
                update: MeshUpdate::Built
            }
        );

        // Principal point (4, 3) lands on the optical axis.
        let cloud = pipeline.reprojector().cloud();
        assert_eq!(cloud.vertices()[3 * 8 + 4], Vec3::new(0.0, 0.0, 2.5));
        assert!(cloud.colors().iter().all(|c| (c.x - 1.0).abs() < 0.01 && c.y == 0.0));

        let gray = pipeline.grayscale_texture().unwrap();
        assert!(gray.pixels().all(|p| p.0 == [0.5, 0.5, 0.5, 1.0]));
        let mesh = target.last_mesh.as_ref().unwrap();
        assert_eq!(mesh.indices().len(), 48);
    }

    #[test]
    fn test_far_depth_is_all_sentinel() {
        let mut sensor = ScriptedSensor::uniform((4, 4), [0, 0, 0, 255], (4, 4), 6.0, 2, 4.0);
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert!(matches!(report.reprojection, ReprojectionOutcome::Published { valid: 0, .. }));
        assert!(pipeline
            .reprojector()
            .cloud()
            .vertices()
            .iter()
            .all(|v| *v == SENTINEL_VERTEX));
    }

    #[test]
    fn test_unsupported_camera_format_skips_stage() {
        let mut sensor = ScriptedSensor::uniform((4, 4), [0, 0, 0, 255], (4, 4), 1.0, 2, 4.0);
        sensor.camera = Some(Payload {
            size: (4, 4),
            format: NativeFormat::DepthFloat32,
            data: vec![0; 64],
        });
        let ledger = sensor.ledger();
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);

        let report = pipeline.process_frame(&mut sensor, &mut target);
        assert!(!report.camera_updated);
        assert!(report.depth_updated);
        assert_eq!(ledger.outstanding(), 0);
        assert!(!target.presented_slots().contains(&TextureSlot::Camera));
    }

    #[test]
    fn test_depth_resize_rebuilds_mesh() {
        let mut sensor = ScriptedSensor::uniform((8, 8), [0, 0, 0, 255], (8, 8), 1.0, 2, 8.0);
        let mut target = RecordingTarget::default();
        let mut pipeline = pipeline(true);
        pipeline.process_frame(&mut sensor, &mut target);

        let small = ScriptedSensor::uniform((8, 8), [0, 0, 0, 255], (4, 4), 1.0, 2, 8.0);
        sensor.depth = small.depth;
        sensor.confidence = small.confidence;
        let report = pipeline.process_frame(&mut sensor, &mut target);

        assert!(matches!(
            report.reprojection,
            ReprojectionOutcome::Published {
                total: 16,
                update: MeshUpdate::Rebuilt { previous: 64 },
                ..
            }
        ));
        assert_eq!(target.published, vec![64, 16]);
        assert_eq!(pipeline.reprojector().epoch(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(FramePipeline::new(PipelineConfig::new(5.0, 1.0)).is_err());
    }
}
