//! Texture buffers and the conversions feeding them.
//!
//! Destination buffers are typed `image` buffers allocated once per
//! resolution and overwritten in place every frame.

pub mod confidence;
pub mod convert;
pub mod grayscale;

use image::{ImageBuffer, Luma, Pixel};

pub use confidence::{Confidence, colorize_confidence};
pub use convert::{ConvertTarget, TargetFormat, convert_into, convert_raw, converted_size, to_sensor_image};
pub use grayscale::depth_to_grayscale;
pub use image::{GrayImage, Rgba32FImage, RgbaImage};

/// Single-channel depth texture, meters.
pub type DepthImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Return `slot`'s buffer, (re)allocating it only when the resolution changed.
pub(crate) fn ensure_buffer<'a, P: Pixel>(
    slot: &'a mut Option<ImageBuffer<P, Vec<P::Subpixel>>>,
    (width, height): (u32, u32),
    label: &str,
) -> &'a mut ImageBuffer<P, Vec<P::Subpixel>> {
    if slot.as_ref().map(|buffer| buffer.dimensions()) != Some((width, height)) {
        *slot = None;
    }
    slot.get_or_insert_with(|| {
        tracing::debug!("Allocating {} texture {}x{}", label, width, height);
        ImageBuffer::new(width, height)
    })
}
