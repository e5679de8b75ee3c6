//! Acquired sensor images and their release discipline.

use crate::source::SensorError;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Pixel layout of an image as delivered by the sensor subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFormat {
    /// 8-bit RGBA, 4 bytes per pixel.
    Rgba32,
    /// 8-bit BGRA, 4 bytes per pixel.
    Bgra32,
    /// 8-bit RGB, 3 bytes per pixel.
    Rgb24,
    /// Y plane followed by an interleaved half-resolution UV plane.
    Nv12,
    /// Little-endian f32 depth in meters.
    DepthFloat32,
    /// Little-endian u16 depth in millimeters.
    DepthUint16,
    /// One byte per pixel (confidence levels).
    OneComponent8,
}

impl NativeFormat {
    /// Number of bytes a `width` x `height` image occupies in this layout.
    pub fn data_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            NativeFormat::Rgba32 | NativeFormat::Bgra32 | NativeFormat::DepthFloat32 => w * h * 4,
            NativeFormat::Rgb24 => w * h * 3,
            NativeFormat::DepthUint16 => w * h * 2,
            NativeFormat::OneComponent8 => w * h,
            NativeFormat::Nv12 => w * h + w.div_ceil(2) * h.div_ceil(2) * 2,
        }
    }

    /// Whether this layout carries color samples.
    pub fn is_color(self) -> bool {
        matches!(
            self,
            NativeFormat::Rgba32 | NativeFormat::Bgra32 | NativeFormat::Rgb24 | NativeFormat::Nv12
        )
    }

    /// Whether this layout carries depth samples.
    pub fn is_depth(self) -> bool {
        matches!(self, NativeFormat::DepthFloat32 | NativeFormat::DepthUint16)
    }
}

/// Receives the release notification of images handed out by a sensor.
pub trait ImageReleaser {
    fn release(&self, image_id: u64);
}

/// An image acquired from the sensor subsystem.
///
/// The image notifies its releaser exactly once, when it is dropped or
/// explicitly [`dispose`](SensorImage::dispose)d, so every exit path of the
/// code holding it gives the native resource back.
pub struct SensorImage {
    id: u64,
    width: u32,
    height: u32,
    format: NativeFormat,
    data: Vec<u8>,
    releaser: Option<Rc<dyn ImageReleaser>>,
}

impl SensorImage {
    /// Create an image that is not owned by any sensor and needs no release.
    pub fn detached(
        width: u32,
        height: u32,
        format: NativeFormat,
        data: Vec<u8>,
    ) -> Result<Self, SensorError> {
        let expected = format.data_size(width, height);
        if data.len() != expected {
            return Err(SensorError::InvalidLayout {
                format,
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            id: 0,
            width,
            height,
            format,
            data,
            releaser: None,
        })
    }

    /// Create an image issued by a sensor; `releaser` is notified with `id` on drop.
    pub fn acquired(
        id: u64,
        width: u32,
        height: u32,
        format: NativeFormat,
        data: Vec<u8>,
        releaser: Rc<dyn ImageReleaser>,
    ) -> Result<Self, SensorError> {
        let mut image = Self::detached(width, height, format, data)?;
        image.id = id;
        image.releaser = Some(releaser);
        Ok(image)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> NativeFormat {
        self.format
    }

    /// Raw native bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the image still holds a sensor resource that will be released.
    pub fn is_acquired(&self) -> bool {
        self.releaser.is_some()
    }

    /// Release the image now.
    pub fn dispose(self) {
        drop(self);
    }
}

impl fmt::Debug for SensorImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorImage")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("acquired", &self.is_acquired())
            .finish()
    }
}

impl Drop for SensorImage {
    fn drop(&mut self) {
        if let Some(releaser) = self.releaser.take() {
            releaser.release(self.id);
        }
    }
}

/// Book-keeping of images handed out and given back.
#[derive(Debug, Default)]
pub struct ReleaseLedger {
    next_id: Cell<u64>,
    acquired: Cell<u64>,
    released: Cell<u64>,
    outstanding: RefCell<HashSet<u64>>,
}

impl ReleaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new acquisition and return the id to stamp on the image.
    pub fn acquire(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.acquired.set(self.acquired.get() + 1);
        self.outstanding.borrow_mut().insert(id);
        id
    }

    /// Total acquisitions so far.
    pub fn acquired(&self) -> u64 {
        self.acquired.get()
    }

    /// Total releases so far.
    pub fn released(&self) -> u64 {
        self.released.get()
    }

    /// Number of images currently held by consumers.
    pub fn outstanding(&self) -> usize {
        self.outstanding.borrow().len()
    }
}

impl ImageReleaser for ReleaseLedger {
    fn release(&self, image_id: u64) {
        if self.outstanding.borrow_mut().remove(&image_id) {
            self.released.set(self.released.get() + 1);
        } else {
            warn!("Release of unknown or already released image {}", image_id);
        }
    }
}
