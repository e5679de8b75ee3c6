//! Test doubles for the sensor and render seams.

use crate::mesh::PointMesh;
use crate::render::{RenderTarget, SceneCommand, TextureSlot, TextureView};
use depthcloud_sensor::{CameraIntrinsics, ImageReleaser, NativeFormat, ReleaseLedger, SensorImage, SensorSource};
use glam::Vec2;
use std::rc::Rc;

/// Records every call made on it.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub presented: Vec<(TextureSlot, (u32, u32))>,
    /// Vertex counts of meshes passed to `publish_geometry`.
    pub published: Vec<usize>,
    /// Vertex counts of meshes passed to `geometry_updated`.
    pub updated: Vec<usize>,
    pub commands: Vec<SceneCommand>,
    pub last_mesh: Option<PointMesh>,
}

impl RecordingTarget {
    pub fn presented_slots(&self) -> Vec<TextureSlot> {
        self.presented.iter().map(|(slot, _)| *slot).collect()
    }
}

impl RenderTarget for RecordingTarget {
    fn present_texture(&mut self, slot: TextureSlot, texture: TextureView<'_>) {
        self.presented.push((slot, texture.dimensions()));
    }

    fn publish_geometry(&mut self, mesh: &PointMesh) {
        self.published.push(mesh.len());
        self.last_mesh = Some(mesh.clone());
    }

    fn geometry_updated(&mut self, mesh: &PointMesh) {
        self.updated.push(mesh.len());
        self.last_mesh = Some(mesh.clone());
    }

    fn apply(&mut self, command: SceneCommand) {
        self.commands.push(command);
    }
}

/// Native bytes handed out on every acquisition.
#[derive(Debug, Clone)]
pub struct Payload {
    pub size: (u32, u32),
    pub format: NativeFormat,
    pub data: Vec<u8>,
}

/// Sensor that returns fixed payloads every frame.
pub struct ScriptedSensor {
    pub camera: Option<Payload>,
    pub depth: Option<Payload>,
    pub confidence: Option<Payload>,
    pub intrinsics: Option<CameraIntrinsics>,
    ledger: Rc<ReleaseLedger>,
}

impl ScriptedSensor {
    /// Uniform scene: every depth pixel at `depth` meters with raw `confidence`,
    /// every camera pixel `rgba`. Intrinsics put the principal point at the
    /// camera center with focal length `focal`.
    pub fn uniform(
        camera_size: (u32, u32),
        rgba: [u8; 4],
        depth_size: (u32, u32),
        depth: f32,
        confidence: u8,
        focal: f32,
    ) -> Self {
        let depth_pixels = (depth_size.0 * depth_size.1) as usize;
        let camera_pixels = (camera_size.0 * camera_size.1) as usize;
        Self {
            camera: Some(Payload {
                size: camera_size,
                format: NativeFormat::Rgba32,
                data: rgba.repeat(camera_pixels),
            }),
            depth: Some(Payload {
                size: depth_size,
                format: NativeFormat::DepthFloat32,
                data: depth.to_le_bytes().repeat(depth_pixels),
            }),
            confidence: Some(Payload {
                size: depth_size,
                format: NativeFormat::OneComponent8,
                data: vec![confidence; depth_pixels],
            }),
            intrinsics: Some(CameraIntrinsics::new(
                Vec2::splat(focal),
                Vec2::new(camera_size.0 as f32 * 0.5, camera_size.1 as f32 * 0.5),
                camera_size,
            )),
            ledger: Rc::new(ReleaseLedger::new()),
        }
    }

    pub fn ledger(&self) -> Rc<ReleaseLedger> {
        self.ledger.clone()
    }

    fn issue(&self, payload: &Option<Payload>) -> Option<SensorImage> {
        let payload = payload.as_ref()?;
        let releaser: Rc<dyn ImageReleaser> = self.ledger.clone();
        SensorImage::acquired(
            self.ledger.acquire(),
            payload.size.0,
            payload.size.1,
            payload.format,
            payload.data.clone(),
            releaser,
        )
        .ok()
    }
}

impl SensorSource for ScriptedSensor {
    fn try_acquire_camera_image(&mut self) -> Option<SensorImage> {
        self.issue(&self.camera)
    }

    fn try_acquire_depth_image(&mut self) -> Option<SensorImage> {
        self.issue(&self.depth)
    }

    fn try_acquire_confidence_image(&mut self) -> Option<SensorImage> {
        self.issue(&self.confidence)
    }

    fn intrinsics(&self) -> Option<CameraIntrinsics> {
        self.intrinsics
    }
}
