//! Application setup and the headless frame loop.

use crate::error::AppError;
use crate::target::{StatsTarget, TargetStats};
use depthcloud_core::{FramePipeline, PipelineConfig, ScanSession};
use depthcloud_sensor::{FrameSignal, SyntheticConfig, SyntheticSensor};
use tracing::{info, warn};

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames: u64,
    pub published_frames: u64,
    pub images_acquired: u64,
    pub target: TargetStats,
}

/// Builder for configuring and running the application.
pub struct AppBuilder {
    pipeline: PipelineConfig,
    sensor: SyntheticConfig,
    frames: u64,
    pause_at: Option<u64>,
    logging: LoggingConfig,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            sensor: SyntheticConfig::default(),
            frames: 120,
            pause_at: None,
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    pub fn with_sensor_config(mut self, config: SyntheticConfig) -> Self {
        self.sensor = config;
        self
    }

    /// Number of frame-ready events to emit.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    /// Toggle the scan mode before frame `frame` (zero based).
    pub fn with_pause_at(mut self, frame: Option<u64>) -> Self {
        self.pause_at = frame;
        self
    }

    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    /// Run the application.
    pub fn run(self) -> Result<RunSummary, AppError> {
        self.init_logging();

        let sensor = SyntheticSensor::new(self.sensor)?;
        let ledger = sensor.ledger();
        let pipeline = FramePipeline::new(self.pipeline)?;

        let signal = FrameSignal::new();
        let mut session = ScanSession::new(pipeline, sensor, StatsTarget::new());
        session.attach(&signal);

        let mut scanning = self.pipeline.scanning;
        let mut published_frames = 0;
        for frame in 0..self.frames {
            if self.pause_at == Some(frame) {
                scanning = !scanning;
                session.set_scanning(scanning);
            }

            let event = session.with_sensor(|sensor| sensor.advance());
            signal.emit(&event);
            if session.last_report().is_some_and(|report| report.published()) {
                published_frames += 1;
            }
        }
        session.detach();

        let target = session.with_target(|target| target.stats().clone());
        info!(
            "Processed {} frames ({} reprojected), {} textures presented, {} points in mesh",
            session.frames_processed(),
            published_frames,
            target.textures_presented,
            target.point_count
        );
        info!(
            "Sensor images: {} acquired, {} released",
            ledger.acquired(),
            ledger.released()
        );

        let outstanding = ledger.outstanding();
        if outstanding > 0 {
            warn!("{} sensor images still held after the run", outstanding);
            return Err(AppError::LeakedImages(outstanding));
        }

        Ok(RunSummary {
            frames: session.frames_processed(),
            published_frames,
            images_acquired: ledger.acquired(),
            target,
        })
    }

    fn init_logging(&self) {
        #[cfg(feature = "tracy")]
        {
            if self.logging.enable_tracy {
                use tracing_subscriber::Layer;
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;
                let _ = tracing_subscriber::registry()
                    .with(tracing_tracy::TracyLayer::default())
                    .with(
                        tracing_subscriber::fmt::layer().with_filter(
                            tracing_subscriber::EnvFilter::try_from_default_env()
                                .unwrap_or_else(|_| self.logging.level.clone().into()),
                        ),
                    )
                    .try_init();
                return;
            }
        }

        // A subscriber may already be installed when several runs share a process.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .try_init();
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
