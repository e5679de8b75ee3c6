//! Depth to grayscale visualization.

use super::DepthImage;
use image::{Rgba, Rgba32FImage};

/// Map metric depth linearly onto `[near, far] -> [0, 1]` gray.
///
/// Values are written as `(v, v, v, 1)` without clamping: depths outside the
/// clip range produce channel values below 0 or above 1, and the display
/// layer decides how to show them.
///
/// # Panics
///
/// Panics if the two buffers have different pixel counts.
pub fn depth_to_grayscale(depth: &DepthImage, dst: &mut Rgba32FImage, near: f32, far: f32) {
    let pixel_count = |(w, h): (u32, u32)| w as usize * h as usize;
    assert_eq!(
        pixel_count(depth.dimensions()),
        pixel_count(dst.dimensions()),
        "Grayscale target must have as many pixels as the depth image."
    );

    let range = far - near;
    for (sample, out) in depth.pixels().zip(dst.pixels_mut()) {
        let value = (sample.0[0] - near) / range;
        *out = Rgba([value, value, value, 1.0]);
    }
}
