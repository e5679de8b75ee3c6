//! Depthcloud Sensor - the boundary to the platform depth/camera subsystem
//!
//! This crate provides the types the reprojection pipeline needs from a sensor:
//!
//! - [`SensorImage`]: an acquired native-format image that releases itself on drop
//! - [`SensorSource`]: acquisition of camera, depth and confidence images plus intrinsics
//! - [`FrameSignal`]: the frame-ready notification with scoped subscriptions
//! - [`SyntheticSensor`]: a procedural sensor used by the headless app and tests
//!
//! ## Example
//!
//! ```ignore
//! use depthcloud_sensor::{SensorSource, SyntheticConfig, SyntheticSensor};
//!
//! let mut sensor = SyntheticSensor::new(SyntheticConfig::default())?;
//! sensor.advance();
//! if let Some(image) = sensor.try_acquire_depth_image() {
//!     // Convert the image; it is released when `image` goes out of scope.
//! }
//! ```

mod image;
mod signal;
mod source;
mod synthetic;

pub use image::{ImageReleaser, NativeFormat, ReleaseLedger, SensorImage};
pub use signal::{FrameEvent, FrameSignal, Subscription};
pub use source::{CameraIntrinsics, SensorError, SensorSource};
pub use synthetic::{SyntheticConfig, SyntheticSensor};
