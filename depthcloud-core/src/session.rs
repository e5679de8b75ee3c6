//! Binding a pipeline, its sensor and its render target to the frame signal.

use crate::pipeline::{FramePipeline, FrameReport};
use crate::render::RenderTarget;
use depthcloud_sensor::{FrameEvent, FrameSignal, SensorSource, Subscription};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

struct SessionState<S, R> {
    pipeline: FramePipeline,
    sensor: S,
    target: R,
    last_report: Option<FrameReport>,
    frames: u64,
}

impl<S: SensorSource, R: RenderTarget> SessionState<S, R> {
    fn on_frame(&mut self, event: &FrameEvent) {
        let report = self.pipeline.process_frame(&mut self.sensor, &mut self.target);
        debug!("Frame {} at {:.3}s: {:?}", event.frame_number, event.timestamp, report.reprojection);
        self.frames += 1;
        self.last_report = Some(report);
    }
}

/// A pipeline wired to a sensor and a render target.
///
/// While attached, every frame-ready event runs
/// [`FramePipeline::process_frame`]. The subscription is released on
/// [`ScanSession::detach`] or when the session is dropped.
pub struct ScanSession<S, R> {
    state: Rc<RefCell<SessionState<S, R>>>,
    subscription: Option<Subscription>,
}

impl<S, R> ScanSession<S, R>
where
    S: SensorSource + 'static,
    R: RenderTarget + 'static,
{
    /// Create a detached session and send the initial scene command.
    pub fn new(mut pipeline: FramePipeline, sensor: S, mut target: R) -> Self {
        pipeline.start(&mut target);
        Self {
            state: Rc::new(RefCell::new(SessionState {
                pipeline,
                sensor,
                target,
                last_report: None,
                frames: 0,
            })),
            subscription: None,
        }
    }

    /// Subscribe to `signal`, replacing any previous subscription.
    pub fn attach(&mut self, signal: &FrameSignal) {
        let state = Rc::downgrade(&self.state);
        let subscription = signal.subscribe(move |event| {
            let Some(state) = state.upgrade() else {
                return;
            };
            match state.try_borrow_mut() {
                Ok(mut state) => state.on_frame(event),
                Err(_) => warn!("Frame {} arrived while the session was busy", event.frame_number),
            };
        });

        if self.subscription.replace(subscription).is_some() {
            debug!("Replaced previous frame subscription");
        }
        info!("Scan session attached");
    }

    /// Unsubscribe. Returns whether the session was attached.
    pub fn detach(&mut self) -> bool {
        let attached = self.subscription.take().is_some();
        if attached {
            info!("Scan session detached");
        }
        attached
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// See [`FramePipeline::set_scanning`].
    pub fn set_scanning(&self, scanning: bool) -> bool {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        state.pipeline.set_scanning(scanning, &mut state.target)
    }

    pub fn with_sensor<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.state.borrow_mut().sensor)
    }

    pub fn with_target<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut self.state.borrow_mut().target)
    }

    pub fn with_pipeline<T>(&self, f: impl FnOnce(&FramePipeline) -> T) -> T {
        f(&self.state.borrow().pipeline)
    }

    pub fn last_report(&self) -> Option<FrameReport> {
        self.state.borrow().last_report.clone()
    }

    pub fn frames_processed(&self) -> u64 {
        self.state.borrow().frames
    }
}
