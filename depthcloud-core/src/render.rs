//! The seam between the pipeline and whatever displays its output.

use crate::mesh::PointMesh;
use crate::texture::DepthImage;
use image::{Rgba32FImage, RgbaImage};
use std::fmt;

/// Display slots the pipeline publishes textures into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Camera,
    RawDepth,
    GrayscaleDepth,
    Confidence,
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureSlot::Camera => write!(f, "Camera"),
            TextureSlot::RawDepth => write!(f, "Raw Depth"),
            TextureSlot::GrayscaleDepth => write!(f, "Grayscale Depth"),
            TextureSlot::Confidence => write!(f, "Confidence"),
        }
    }
}

/// Borrowed view of a display texture.
#[derive(Debug, Clone, Copy)]
pub enum TextureView<'a> {
    Rgba8(&'a RgbaImage),
    Rgba32F(&'a Rgba32FImage),
    DepthF32(&'a DepthImage),
}

impl TextureView<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            TextureView::Rgba8(image) => image.dimensions(),
            TextureView::Rgba32F(image) => image.dimensions(),
            TextureView::DepthF32(image) => image.dimensions(),
        }
    }
}

/// Where the rendered cloud lives in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    /// Parent the cloud to the camera so it follows the device (scanning).
    AttachToCamera,
    /// Reparent the cloud to the world, keeping its current world pose (paused).
    DetachToWorld,
}

/// Receives everything the pipeline produces.
pub trait RenderTarget {
    /// A texture slot has new contents for this frame.
    fn present_texture(&mut self, slot: TextureSlot, texture: TextureView<'_>);

    /// The mesh was (re)built and needs a fresh upload.
    fn publish_geometry(&mut self, mesh: &PointMesh);

    /// The mesh kept its size; only vertex and color data changed.
    fn geometry_updated(&mut self, mesh: &PointMesh) {
        self.publish_geometry(mesh);
    }

    /// Reparent the rendered cloud.
    fn apply(&mut self, command: SceneCommand);
}

impl<T: RenderTarget + ?Sized> RenderTarget for Box<T> {
    fn present_texture(&mut self, slot: TextureSlot, texture: TextureView<'_>) {
        (**self).present_texture(slot, texture)
    }

    fn publish_geometry(&mut self, mesh: &PointMesh) {
        (**self).publish_geometry(mesh)
    }

    fn geometry_updated(&mut self, mesh: &PointMesh) {
        (**self).geometry_updated(mesh)
    }

    fn apply(&mut self, command: SceneCommand) {
        (**self).apply(command)
    }
}
