//! Clock sources
//!
//! Test cases read time through a clock captured when they are built, so a
//! test body cannot skew the measured duration of its own run.

use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

/// Source of monotonic timestamps
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The process monotonic clock
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that advances by a fixed step on every reading
pub struct SteppingClock {
    origin: Instant,
    step: Duration,
    reads: Cell<u32>,
}

impl SteppingClock {
    pub fn new(step: Duration) -> Self {
        Self {
            origin: Instant::now(),
            step,
            reads: Cell::new(0),
        }
    }

    /// Number of times `now()` has been called
    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Instant {
        let n = self.reads.get();
        self.reads.set(n + 1);
        self.origin + self.step * n
    }
}

impl fmt::Debug for SteppingClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SteppingClock")
            .field("step", &self.step)
            .field("reads", &self.reads.get())
            .finish()
    }
}
