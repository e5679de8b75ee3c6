//! Per-pixel depth confidence levels and their color coding.

use image::{GrayImage, Rgba, RgbaImage};

/// Depth confidence reported by the sensor for each depth pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Confidence {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Confidence {
    /// Interpret a raw confidence byte; bytes other than 0, 1, 2 carry no level.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Confidence::Low),
            1 => Some(Confidence::Medium),
            2 => Some(Confidence::High),
            _ => None,
        }
    }

    /// Display color: low red, medium green, high blue.
    pub fn color(self) -> Rgba<u8> {
        match self {
            Confidence::Low => Rgba([255, 0, 0, 255]),
            Confidence::Medium => Rgba([0, 255, 0, 255]),
            Confidence::High => Rgba([0, 0, 255, 255]),
        }
    }
}

/// Color-code a confidence map into `dst`.
///
/// Pixels whose raw value is not a confidence level are left untouched, so
/// they keep whatever `dst` held from the previous frame.
///
/// # Panics
///
/// Panics if the two buffers have different dimensions.
pub fn colorize_confidence(src: &GrayImage, dst: &mut RgbaImage) {
    assert_eq!(
        src.dimensions(),
        dst.dimensions(),
        "Confidence texture must match the confidence map size."
    );
    for (level, out) in src.pixels().zip(dst.pixels_mut()) {
        if let Some(confidence) = Confidence::from_raw(level.0[0]) {
            *out = confidence.color();
        }
    }
}
