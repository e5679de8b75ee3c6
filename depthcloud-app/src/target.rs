//! Headless render target that logs and tallies what the pipeline produces.

use depthcloud_core::{MeshBounds, PointMesh, RenderTarget, SceneCommand, TextureSlot, TextureView};
use tracing::{debug, info, trace};

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetStats {
    pub textures_presented: u64,
    pub geometry_published: u64,
    pub geometry_updates: u64,
    pub point_count: usize,
    pub bounds: Option<MeshBounds>,
    /// Whether the cloud currently follows the camera.
    pub attached_to_camera: bool,
}

#[derive(Debug, Default)]
pub struct StatsTarget {
    stats: TargetStats,
}

impl StatsTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &TargetStats {
        &self.stats
    }

    fn record_mesh(&mut self, mesh: &PointMesh) {
        self.stats.point_count = mesh.len();
        self.stats.bounds = Some(*mesh.bounds());
    }
}

impl RenderTarget for StatsTarget {
    fn present_texture(&mut self, slot: TextureSlot, texture: TextureView<'_>) {
        let (width, height) = texture.dimensions();
        trace!("{} texture {}x{}", slot, width, height);
        self.stats.textures_presented += 1;
    }

    fn publish_geometry(&mut self, mesh: &PointMesh) {
        let bounds = mesh.bounds();
        info!(
            "Point mesh published: {} points, bounds {:?} .. {:?}",
            mesh.len(),
            bounds.min,
            bounds.max
        );
        self.stats.geometry_published += 1;
        self.record_mesh(mesh);
    }

    fn geometry_updated(&mut self, mesh: &PointMesh) {
        debug!("Point mesh updated, center {:?}", mesh.bounds().center);
        self.stats.geometry_updates += 1;
        self.record_mesh(mesh);
    }

    fn apply(&mut self, command: SceneCommand) {
        info!("Scene: {:?}", command);
        self.stats.attached_to_camera = command == SceneCommand::AttachToCamera;
    }
}
