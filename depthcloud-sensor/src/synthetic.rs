//! Procedural sensor producing a moving depth scene.

use crate::image::{ImageReleaser, NativeFormat, ReleaseLedger, SensorImage};
use crate::signal::FrameEvent;
use crate::source::{CameraIntrinsics, SensorError, SensorSource};
use glam::Vec2;
use std::rc::Rc;
use tracing::{debug, error, info};

/// Depth assigned to background pixels that lie outside any sensible clip range.
const BACKGROUND_DEPTH: f32 = 6.0;

/// Configuration of the synthetic sensor.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Color camera resolution (width, height).
    pub camera_size: (u32, u32),
    /// Depth and confidence resolution (width, height).
    pub depth_size: (u32, u32),
    /// Layout of camera images (a color format).
    pub camera_format: NativeFormat,
    /// Layout of depth images (a depth format).
    pub depth_format: NativeFormat,
    /// Frame interval in seconds.
    pub frame_interval: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            camera_size: (640, 480),
            depth_size: (256, 192),
            camera_format: NativeFormat::Nv12,
            depth_format: NativeFormat::DepthFloat32,
            frame_interval: 1.0 / 60.0,
        }
    }
}

/// Native bytes of the current frame.
struct SyntheticFrame {
    camera: Vec<u8>,
    depth: Vec<u8>,
    confidence: Vec<u8>,
}

/// A sensor that renders a tilted floor with a moving bump in front of a far wall.
///
/// The top band of every depth frame lies beyond [`BACKGROUND_DEPTH`] meters,
/// the border has low confidence and the bump's flank medium confidence, so
/// every gating branch of a consumer is exercised.
pub struct SyntheticSensor {
    config: SyntheticConfig,
    ledger: Rc<ReleaseLedger>,
    frame: Option<SyntheticFrame>,
    frame_count: u64,
    intrinsics_available: bool,
    depth_available: bool,
}

impl SyntheticSensor {
    pub fn new(config: SyntheticConfig) -> Result<Self, SensorError> {
        if !config.camera_format.is_color() {
            return Err(SensorError::UnsupportedFormat {
                stream: "camera",
                format: config.camera_format,
            });
        }
        if !config.depth_format.is_depth() {
            return Err(SensorError::UnsupportedFormat {
                stream: "depth",
                format: config.depth_format,
            });
        }
        for (width, height) in [config.camera_size, config.depth_size] {
            if width == 0 || height == 0 {
                return Err(SensorError::InvalidResolution(width, height));
            }
        }

        info!(
            "Synthetic sensor: camera {}x{} {:?}, depth {}x{} {:?}",
            config.camera_size.0,
            config.camera_size.1,
            config.camera_format,
            config.depth_size.0,
            config.depth_size.1,
            config.depth_format
        );

        Ok(Self {
            config,
            ledger: Rc::new(ReleaseLedger::new()),
            frame: None,
            frame_count: 0,
            intrinsics_available: true,
            depth_available: true,
        })
    }

    /// Render the next frame and return the matching frame-ready event.
    pub fn advance(&mut self) -> FrameEvent {
        self.frame_count += 1;
        let timestamp = self.frame_count as f64 * self.config.frame_interval;
        let phase = timestamp as f32;

        let (depth, confidence) = self.render_depth(phase);
        self.frame = Some(SyntheticFrame {
            camera: self.render_camera(phase),
            depth,
            confidence,
        });

        debug!("Synthetic frame {} at {:.3}s", self.frame_count, timestamp);
        FrameEvent::new(self.frame_count, timestamp)
    }

    /// Make [`SensorSource::intrinsics`] report nothing (or report again).
    pub fn set_intrinsics_available(&mut self, available: bool) {
        self.intrinsics_available = available;
    }

    /// Withhold depth and confidence images, as a sensor does while its
    /// depth estimate warms up. Camera images keep flowing.
    pub fn set_depth_available(&mut self, available: bool) {
        self.depth_available = available;
    }

    /// Acquisition/release accounting for every image handed out.
    pub fn ledger(&self) -> Rc<ReleaseLedger> {
        self.ledger.clone()
    }

    /// Depth in meters and raw confidence of depth pixel (x, y).
    fn sample_scene(&self, x: u32, y: u32, phase: f32) -> (f32, u8) {
        let (width, height) = self.config.depth_size;
        let u = (x as f32 + 0.5) / width as f32;
        let v = (y as f32 + 0.5) / height as f32;

        if v < 0.2 {
            return (BACKGROUND_DEPTH, 1);
        }

        // Floor rising towards the top of the frame, 1m at the bottom row.
        let floor = 1.0 + (1.0 - v) * 3.0;
        let center = Vec2::new(0.5 + 0.25 * phase.sin(), 0.6);
        let distance = Vec2::new(u, v).distance(center);
        let bump = 0.6 * (-(distance * distance) / 0.01).exp();
        let depth = floor - bump;

        let border = x < 2 || y < 2 || x + 2 >= width || y + 2 >= height;
        let confidence = if border {
            0
        } else if (0.08..0.14).contains(&distance) {
            1
        } else {
            2
        };
        (depth, confidence)
    }

    fn render_depth(&self, phase: f32) -> (Vec<u8>, Vec<u8>) {
        let (width, height) = self.config.depth_size;
        let pixels = (width * height) as usize;
        let mut depth = Vec::with_capacity(self.config.depth_format.data_size(width, height));
        let mut confidence = Vec::with_capacity(pixels);

        for y in 0..height {
            for x in 0..width {
                let (meters, level) = self.sample_scene(x, y, phase);
                match self.config.depth_format {
                    NativeFormat::DepthUint16 => {
                        let millimeters = (meters * 1000.0).round().clamp(0.0, u16::MAX as f32) as u16;
                        depth.extend_from_slice(&millimeters.to_le_bytes());
                    }
                    _ => depth.extend_from_slice(&meters.to_le_bytes()),
                }
                confidence.push(level);
            }
        }
        (depth, confidence)
    }

    fn render_camera(&self, phase: f32) -> Vec<u8> {
        let (width, height) = self.config.camera_size;
        let shift = (phase * 40.0) as u32;
        let color_at = |x: u32, y: u32| -> [u8; 3] {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = if ((x + shift) / 32 + y / 32) % 2 == 0 { 200 } else { 40 };
            [r, g, b]
        };

        let format = self.config.camera_format;
        let mut data = Vec::with_capacity(format.data_size(width, height));
        match format {
            NativeFormat::Nv12 => {
                for y in 0..height {
                    for x in 0..width {
                        data.push(rgb_to_yuv(color_at(x, y))[0]);
                    }
                }
                for y in (0..height).step_by(2) {
                    for x in (0..width).step_by(2) {
                        let [_, u, v] = rgb_to_yuv(color_at(x, y));
                        data.push(u);
                        data.push(v);
                    }
                }
            }
            _ => {
                for y in 0..height {
                    for x in 0..width {
                        let [r, g, b] = color_at(x, y);
                        match format {
                            NativeFormat::Bgra32 => data.extend_from_slice(&[b, g, r, 255]),
                            NativeFormat::Rgb24 => data.extend_from_slice(&[r, g, b]),
                            _ => data.extend_from_slice(&[r, g, b, 255]),
                        }
                    }
                }
            }
        }
        data
    }

    fn issue(&self, size: (u32, u32), format: NativeFormat, data: Vec<u8>) -> Option<SensorImage> {
        let id = self.ledger.acquire();
        let releaser: Rc<dyn ImageReleaser> = self.ledger.clone();
        match SensorImage::acquired(id, size.0, size.1, format, data, releaser.clone()) {
            Ok(image) => Some(image),
            Err(e) => {
                // The image never reached a consumer; give the id back ourselves.
                releaser.release(id);
                error!("Synthetic sensor produced an invalid image: {}", e);
                None
            }
        }
    }
}

impl SensorSource for SyntheticSensor {
    fn try_acquire_camera_image(&mut self) -> Option<SensorImage> {
        let frame = self.frame.as_ref()?;
        self.issue(
            self.config.camera_size,
            self.config.camera_format,
            frame.camera.clone(),
        )
    }

    fn try_acquire_depth_image(&mut self) -> Option<SensorImage> {
        if !self.depth_available {
            return None;
        }
        let frame = self.frame.as_ref()?;
        self.issue(
            self.config.depth_size,
            self.config.depth_format,
            frame.depth.clone(),
        )
    }

    fn try_acquire_confidence_image(&mut self) -> Option<SensorImage> {
        if !self.depth_available {
            return None;
        }
        let frame = self.frame.as_ref()?;
        self.issue(
            self.config.depth_size,
            NativeFormat::OneComponent8,
            frame.confidence.clone(),
        )
    }

    fn intrinsics(&self) -> Option<CameraIntrinsics> {
        if !self.intrinsics_available {
            return None;
        }
        let (width, height) = self.config.camera_size;
        let focal = width as f32 * 0.8;
        Some(CameraIntrinsics::new(
            Vec2::splat(focal),
            Vec2::new(width as f32 * 0.5, height as f32 * 0.5),
            (width, height),
        ))
    }
}

/// BT.601 full-range RGB to YUV.
fn rgb_to_yuv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
    [
        y.round().clamp(0.0, 255.0) as u8,
        u.round().clamp(0.0, 255.0) as u8,
        v.round().clamp(0.0, 255.0) as u8,
    ]
}
