//! Monotonic clock abstraction.
//!
//! Every deadline in the stack (claim settle window, transport timeouts,
//! broadcast pacing) is evaluated against one clock sample taken at the start
//! of each `update()`. Responsiveness is therefore bounded by the caller's
//! update cadence, not by the clock itself.

use core::time::Duration;

/// A monotonic time source.
pub trait Clock {
    /// Instant type produced by the clock.
    type Instant: Copy + PartialOrd;

    /// Current instant.
    fn now(&self) -> Self::Instant;

    /// An instant `dur` after `instant`, saturating if necessary.
    fn add(&self, instant: Self::Instant, dur: Duration) -> Self::Instant;
}

/// Clock backed by [`std::time::Instant`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn add(&self, instant: Self::Instant, dur: Duration) -> Self::Instant {
        instant.checked_add(dur).unwrap_or(instant)
    }
}
