//! Depthcloud Application
//!
//! Headless driver for the depth reprojection pipeline.
//!
//! Features:
//! - Synthetic camera/depth/confidence sensor with configurable layouts
//! - JSON pipeline config with command-line overrides
//! - Scan/pause toggling at a chosen frame
//! - Run statistics and release accounting in the log

mod app;
mod error;
mod target;

use app::{AppBuilder, LoggingConfig};
use clap::Parser;
use depthcloud_core::PipelineConfig;
use depthcloud_sensor::{NativeFormat, SyntheticConfig};
use error::AppError;
use std::path::PathBuf;

/// Depthcloud - reproject AR depth into a colored point cloud
#[derive(Parser, Debug)]
#[command(name = "depthcloud")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON pipeline config ({"near": .., "far": .., "scanning": ..})
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Near clip in meters, overrides the config file
    #[arg(long)]
    near: Option<f32>,

    /// Far clip in meters, overrides the config file
    #[arg(long)]
    far: Option<f32>,

    /// Start with scanning paused
    #[arg(long)]
    paused: bool,

    /// Number of frames to run
    #[arg(short = 'n', long, default_value_t = 120)]
    frames: u64,

    /// Toggle scanning before this frame
    #[arg(long)]
    pause_at: Option<u64>,

    /// Camera resolution, WIDTHxHEIGHT
    #[arg(long, default_value = "640x480", value_parser = parse_size)]
    camera_size: (u32, u32),

    /// Depth and confidence resolution, WIDTHxHEIGHT
    #[arg(long, default_value = "256x192", value_parser = parse_size)]
    depth_size: (u32, u32),

    /// Camera image layout (rgba, bgra, rgb, nv12)
    #[arg(long, default_value = "nv12", value_parser = parse_camera_format)]
    camera_format: NativeFormat,

    /// Depth image layout (float for meters, mm for 16-bit millimeters)
    #[arg(long, default_value = "float", value_parser = parse_depth_format)]
    depth_format: NativeFormat,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Send spans to Tracy
    #[cfg(feature = "tracy")]
    #[arg(long)]
    tracy: bool,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    fn pipeline_config(&self) -> Result<PipelineConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(near) = self.near {
            config.near = near;
        }
        if let Some(far) = self.far {
            config.far = far;
        }
        if self.paused {
            config.scanning = false;
        }
        config.validate()?;
        Ok(config)
    }

    fn sensor_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            camera_size: self.camera_size,
            depth_size: self.depth_size,
            camera_format: self.camera_format,
            depth_format: self.depth_format,
            ..SyntheticConfig::default()
        }
    }

    fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            #[cfg(feature = "tracy")]
            enable_tracy: self.tracy,
            #[cfg(not(feature = "tracy"))]
            enable_tracy: false,
        }
    }
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width: u32 = width.trim().parse().map_err(|e| format!("bad width: {}", e))?;
    let height: u32 = height.trim().parse().map_err(|e| format!("bad height: {}", e))?;
    if width == 0 || height == 0 {
        return Err(format!("resolution must be non-zero, got {}x{}", width, height));
    }
    Ok((width, height))
}

fn parse_camera_format(value: &str) -> Result<NativeFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "rgba" | "rgba32" => Ok(NativeFormat::Rgba32),
        "bgra" | "bgra32" => Ok(NativeFormat::Bgra32),
        "rgb" | "rgb24" => Ok(NativeFormat::Rgb24),
        "nv12" => Ok(NativeFormat::Nv12),
        other => Err(format!("unknown camera format '{}'", other)),
    }
}

fn parse_depth_format(value: &str) -> Result<NativeFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "float" | "f32" => Ok(NativeFormat::DepthFloat32),
        "mm" | "u16" => Ok(NativeFormat::DepthUint16),
        other => Err(format!("unknown depth format '{}'", other)),
    }
}

fn run(args: &Args) -> Result<(), AppError> {
    AppBuilder::new()
        .with_logging(args.logging_config())
        .with_pipeline_config(args.pipeline_config()?)
        .with_sensor_config(args.sensor_config())
        .with_frames(args.frames)
        .with_pause_at(args.pause_at)
        .run()?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("depthcloud").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.frames, 120);
        assert_eq!(args.camera_size, (640, 480));
        assert_eq!(args.depth_size, (256, 192));
        assert_eq!(args.camera_format, NativeFormat::Nv12);
        assert_eq!(args.depth_format, NativeFormat::DepthFloat32);
        assert_eq!(args.pipeline_config().unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--near", "0.25", "--far", "3", "--paused", "-n", "10", "--pause-at", "4",
            "--camera-size", "320x240", "--camera-format", "bgra", "--depth-format", "mm",
        ]);
        let config = args.pipeline_config().unwrap();
        assert_eq!(config, PipelineConfig::new(0.25, 3.0).with_scanning(false));
        assert_eq!(args.pause_at, Some(4));

        let sensor = args.sensor_config();
        assert_eq!(sensor.camera_size, (320, 240));
        assert_eq!(sensor.camera_format, NativeFormat::Bgra32);
        assert_eq!(sensor.depth_format, NativeFormat::DepthUint16);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = parse(&["--near", "4", "--far", "2"]);
        assert!(matches!(args.pipeline_config(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_bad_values_rejected_by_parser() {
        let bad = [
            vec!["--camera-size", "640"],
            vec!["--depth-size", "0x10"],
            vec!["--camera-format", "yuyv"],
            vec!["--depth-format", "nv12"],
        ];
        for args in bad {
            let result = Args::try_parse_from(std::iter::once("depthcloud").chain(args));
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_config_file_with_override() {
        let path = std::env::temp_dir().join(format!("depthcloud-args-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"near": 0.5, "far": 4.0}"#).unwrap();

        let args = parse(&["--config", path.to_str().unwrap(), "--far", "6"]);
        let config = args.pipeline_config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config, PipelineConfig::new(0.5, 6.0));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1920X1440"), Ok((1920, 1440)));
        assert!(parse_size("axb").is_err());
    }
}
