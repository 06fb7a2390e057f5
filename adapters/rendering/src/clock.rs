//! Sources of per-frame elapsed time.

use std::time::{Duration, Instant};

/// Supplies the time that elapsed since the previous frame.
pub trait FrameClock {
    /// Returns the time since the previous call, or zero on the first call.
    fn elapsed_since_last(&mut self) -> Duration;
}

/// Monotonic wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct WallClock {
    last: Option<Instant>,
}

impl WallClock {
    /// Creates a clock whose first reading is zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }
}

impl FrameClock for WallClock {
    fn elapsed_since_last(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = self
            .last
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last = Some(now);
        elapsed
    }
}

/// Clock that advances by a constant step, for reproducible runs.
#[derive(Clone, Copy, Debug)]
pub struct FixedStepClock {
    step: Duration,
    started: bool,
}

impl FixedStepClock {
    /// Creates a clock that reports `step` on every call after the first.
    #[must_use]
    pub const fn new(step: Duration) -> Self {
        Self {
            step,
            started: false,
        }
    }
}

impl FrameClock for FixedStepClock {
    fn elapsed_since_last(&mut self) -> Duration {
        if !self.started {
            self.started = true;
            return Duration::ZERO;
        }
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reading_is_zero() {
        assert_eq!(WallClock::new().elapsed_since_last(), Duration::ZERO);
        let mut fixed = FixedStepClock::new(Duration::from_millis(16));
        assert_eq!(fixed.elapsed_since_last(), Duration::ZERO);
        assert_eq!(fixed.elapsed_since_last(), Duration::from_millis(16));
        assert_eq!(fixed.elapsed_since_last(), Duration::from_millis(16));
    }
}
