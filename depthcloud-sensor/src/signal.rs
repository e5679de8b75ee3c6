//! Frame-ready notification.
//!
//! The sensor subsystem pushes one [`FrameEvent`] per camera frame. Consumers
//! subscribe a handler and get a [`Subscription`] guard back; dropping the
//! guard unsubscribes, so a consumer cannot outlive its registration.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::trace;

/// A camera frame became available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEvent {
    /// Frame number, starting at 1.
    pub frame_number: u64,
    /// Timestamp in seconds (relative to stream start).
    pub timestamp: f64,
}

impl FrameEvent {
    pub fn new(frame_number: u64, timestamp: f64) -> Self {
        Self {
            frame_number,
            timestamp,
        }
    }
}

type Handler = Box<dyn FnMut(&FrameEvent)>;

#[derive(Default)]
struct SignalInner {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(u64, Handler)>>,
    // Unsubscriptions requested while `emit` holds the handler list.
    pending_removals: RefCell<Vec<u64>>,
    // Nesting depth of `emit`; removals apply when the outermost call returns.
    emit_depth: Cell<usize>,
}

impl SignalInner {
    fn unsubscribe(&self, id: u64) {
        if self.emit_depth.get() > 0 {
            self.pending_removals.borrow_mut().push(id);
            return;
        }
        self.handlers.borrow_mut().retain(|(handler_id, _)| *handler_id != id);
    }
}

/// Single-threaded frame-ready signal.
///
/// Cloning the signal yields another handle to the same subscriber list.
#[derive(Clone, Default)]
pub struct FrameSignal {
    inner: Rc<SignalInner>,
}

impl FrameSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it stays registered until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes the handler immediately"]
    pub fn subscribe(&self, handler: impl FnMut(&FrameEvent) + 'static) -> Subscription {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        self.inner.handlers.borrow_mut().push((id, Box::new(handler)));
        trace!("Frame signal subscriber {} added", id);

        Subscription {
            id,
            signal: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &FrameEvent) -> usize {
        let mut handlers = std::mem::take(&mut *self.inner.handlers.borrow_mut());
        self.inner.emit_depth.set(self.inner.emit_depth.get() + 1);
        for (_, handler) in handlers.iter_mut() {
            handler(event);
        }
        let depth = self.inner.emit_depth.get() - 1;
        self.inner.emit_depth.set(depth);
        let invoked = handlers.len();

        // Subscriptions made during emission were pushed onto the (empty) live list.
        let mut live = self.inner.handlers.borrow_mut();
        handlers.append(&mut live);
        if depth == 0 {
            let removals = std::mem::take(&mut *self.inner.pending_removals.borrow_mut());
            handlers.retain(|(id, _)| !removals.contains(id));
        }
        *live = handlers;

        invoked
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }
}

/// Registration guard returned by [`FrameSignal::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    signal: Weak<SignalInner>,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.signal.upgrade() {
            inner.unsubscribe(self.id);
            trace!("Frame signal subscriber {} removed", self.id);
        }
    }
}
