//! Test doubles for the driver boundary and the clock.
//!
//! Both doubles share their state through `Rc`, so a test keeps one handle
//! while the manager owns a clone: the test advances the clock and inspects
//! transmitted frames without touching the manager's internals.

use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::frame::Frame;
use crate::network::FrameSink;
use crate::timer::Clock;

/// A [`FrameSink`] that records every transmitted frame.
#[derive(Debug, Clone, Default)]
pub struct MockSink {
    record: Rc<RefCell<Vec<Frame>>>,
    accept: Rc<Cell<bool>>,
}

impl MockSink {
    /// An accepting sink with an empty record.
    pub fn new() -> Self {
        Self {
            record: Rc::new(RefCell::new(Vec::new())),
            accept: Rc::new(Cell::new(true)),
        }
    }

    /// Script whether subsequent transmissions succeed.
    pub fn set_accept(&self, accept: bool) {
        self.accept.set(accept);
    }

    /// Drain and return everything transmitted so far.
    pub fn take_frames(&self) -> Vec<Frame> {
        self.record.borrow_mut().drain(..).collect()
    }

    /// Number of frames transmitted so far.
    pub fn sent_count(&self) -> usize {
        self.record.borrow().len()
    }
}

impl FrameSink for MockSink {
    fn transmit(&mut self, frame: &Frame) -> bool {
        if !self.accept.get() {
            return false;
        }
        self.record.borrow_mut().push(*frame);
        true
    }
}

/// A [`Clock`] that only moves when told to.
///
/// Instants are milliseconds since construction.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    /// A clock parked at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, dur: Duration) {
        self.now_ms.set(self.now_ms.get() + dur.as_millis() as u64);
    }
}

impl Clock for ManualClock {
    type Instant = u64;

    fn now(&self) -> Self::Instant {
        self.now_ms.get()
    }

    fn add(&self, instant: Self::Instant, dur: Duration) -> Self::Instant {
        instant.saturating_add(dur.as_millis() as u64)
    }
}
