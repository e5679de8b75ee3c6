//! Point-topology mesh fed from the reprojected cloud.

use glam::{Vec3, Vec4};
use tracing::{debug, warn};

/// Axis-aligned bounds of the mesh vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

impl MeshBounds {
    /// Compute bounds from an iterator of positions.
    pub fn from_positions(positions: impl Iterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut count = 0;

        for pos in positions {
            min = min.min(pos);
            max = max.max(pos);
            count += 1;
        }

        if count == 0 {
            return Self::default();
        }
        Self::from_min_max(min, max)
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let center = (min + max) * 0.5;
        let radius = (max - min).length().max(1.0);
        Self {
            min,
            max,
            center,
            radius,
        }
    }
}

impl Default for MeshBounds {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
            center: Vec3::ZERO,
            radius: 1.0,
        }
    }
}

/// What [`MeshSink::update`] did to the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshUpdate {
    /// First upload: index buffer created.
    Built,
    /// Same vertex count: positions and colors overwritten in place.
    Updated,
    /// Vertex count changed: index buffer rebuilt.
    Rebuilt { previous: usize },
}

/// Renderable point mesh: one index per vertex, drawn as points.
#[derive(Debug, Clone, Default)]
pub struct PointMesh {
    vertices: Vec<Vec3>,
    colors: Vec<Vec4>,
    indices: Vec<u32>,
    bounds: MeshBounds,
}

impl PointMesh {
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    /// Point-topology indices, always `0..len`.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn bounds(&self) -> &MeshBounds {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Owns the point mesh and keeps it in sync with the latest cloud.
#[derive(Debug, Default)]
pub struct MeshSink {
    mesh: Option<PointMesh>,
}

impl MeshSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `vertices` and `colors` into the mesh.
    ///
    /// Bounds are recomputed over every vertex, sentinel samples included.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length or hold more than `u32::MAX`
    /// points.
    pub fn update(&mut self, vertices: &[Vec3], colors: &[Vec4]) -> MeshUpdate {
        assert_eq!(
            vertices.len(),
            colors.len(),
            "Vertex and color arrays must have the same length."
        );
        let count = u32::try_from(vertices.len())
            .unwrap_or_else(|_| panic!("{} points exceed the u32 index range", vertices.len()));

        let outcome = match &self.mesh {
            None => MeshUpdate::Built,
            Some(mesh) if mesh.len() == vertices.len() => MeshUpdate::Updated,
            Some(mesh) => MeshUpdate::Rebuilt {
                previous: mesh.len(),
            },
        };

        let mesh = self.mesh.get_or_insert_with(PointMesh::default);
        match outcome {
            MeshUpdate::Updated => {
                mesh.vertices.copy_from_slice(vertices);
                mesh.colors.copy_from_slice(colors);
            }
            MeshUpdate::Built | MeshUpdate::Rebuilt { .. } => {
                if let MeshUpdate::Rebuilt { previous } = outcome {
                    warn!(
                        "Point count changed from {} to {}, rebuilding mesh indices",
                        previous, count
                    );
                } else {
                    debug!("Building point mesh with {} vertices", count);
                }
                mesh.vertices.clear();
                mesh.vertices.extend_from_slice(vertices);
                mesh.colors.clear();
                mesh.colors.extend_from_slice(colors);
                mesh.indices = (0..count).collect();
            }
        }
        mesh.bounds = MeshBounds::from_positions(vertices.iter().copied());
        outcome
    }

    /// The mesh, once the first update has run.
    pub fn mesh(&self) -> Option<&PointMesh> {
        self.mesh.as_ref()
    }
}
