//! Depthcloud Core
//!
//! Per-frame pipeline that turns a color camera image, a registered depth map
//! and its confidence map into a colored point cloud in camera space.
//!
//! ## Modules
//!
//! - [`texture`]: native-to-texture conversion, grayscale depth and confidence visualization
//! - [`intrinsics`]: depth-resolution camera intrinsics cached per buffer allocation
//! - [`reprojection`]: confidence-gated unprojection of depth pixels
//! - [`mesh`]: point-topology geometry updated in place every frame
//! - [`pipeline`]: the frame handler tying the stages together
//! - [`session`]: subscription of a pipeline to the sensor's frame signal

pub mod config;
pub mod error;
pub mod intrinsics;
pub mod mesh;
pub mod pipeline;
pub mod render;
pub mod reprojection;
pub mod session;
pub mod texture;

#[cfg(test)]
mod testing;

pub use config::PipelineConfig;
pub use error::{ConfigError, ConvertError, ReprojectError};
pub use mesh::{MeshBounds, MeshSink, MeshUpdate, PointMesh};
pub use pipeline::{FramePipeline, FrameReport, ReprojectionOutcome, ScanMode};
pub use render::{RenderTarget, SceneCommand, TextureSlot, TextureView};
pub use reprojection::{PointCloud, PointCloudReprojector};
pub use session::ScanSession;
