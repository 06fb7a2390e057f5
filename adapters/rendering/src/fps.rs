use std::{collections::VecDeque, time::Duration};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);
const TRAILING_WINDOW: Duration = Duration::from_secs(10);

/// Frame rate statistics reported roughly once per second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpsMetrics {
    /// Frames per second over the last reporting interval.
    pub per_second: f32,
    /// Frames per second over the trailing ten seconds.
    pub trailing_ten_seconds: f32,
}

/// Accumulates frame durations into frame rate statistics.
#[derive(Clone, Debug, Default)]
pub struct FpsCounter {
    elapsed: Duration,
    frames: u32,
    frame_times: VecDeque<Duration>,
    window_duration: Duration,
    total_elapsed: Duration,
    total_frames: u64,
}

impl FpsCounter {
    /// Records a rendered frame and returns the per-second and trailing
    /// ten-second averages once one second has elapsed.
    pub fn record_frame(&mut self, frame: Duration) -> Option<FpsMetrics> {
        self.elapsed += frame;
        self.frames = self.frames.saturating_add(1);
        self.total_elapsed += frame;
        self.total_frames = self.total_frames.saturating_add(1);

        self.frame_times.push_back(frame);
        self.window_duration += frame;
        while self.window_duration > TRAILING_WINDOW {
            if let Some(removed) = self.frame_times.pop_front() {
                self.window_duration = self.window_duration.saturating_sub(removed);
            } else {
                break;
            }
        }

        if self.elapsed < REPORT_INTERVAL {
            return None;
        }

        let seconds = self.elapsed.as_secs_f32();
        let per_second = self.frames as f32 / seconds;
        let window_seconds = self.window_duration.as_secs_f32();
        let trailing_ten_seconds = if window_seconds <= f32::EPSILON {
            per_second
        } else {
            self.frame_times.len() as f32 / window_seconds
        };
        self.elapsed = Duration::ZERO;
        self.frames = 0;

        Some(FpsMetrics {
            per_second,
            trailing_ten_seconds,
        })
    }

    /// Average frame rate since construction or the last reset.
    ///
    /// Returns zero until any time has been recorded.
    #[must_use]
    pub fn average(&self) -> f64 {
        let seconds = self.total_elapsed.as_secs_f64();
        if seconds <= f64::EPSILON {
            return 0.0;
        }
        self.total_frames as f64 / seconds
    }

    /// Time recorded since construction or the last reset.
    #[must_use]
    pub fn measured(&self) -> Duration {
        self.total_elapsed
    }

    /// Discards every recorded frame.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_second() {
        let mut counter = FpsCounter::default();
        let frame = Duration::from_millis(250);

        assert_eq!(counter.record_frame(frame), None);
        assert_eq!(counter.record_frame(frame), None);
        assert_eq!(counter.record_frame(frame), None);
        let metrics = counter.record_frame(frame).expect("one second elapsed");

        assert_eq!(metrics.per_second, 4.0);
        assert_eq!(metrics.trailing_ten_seconds, 4.0);
        assert_eq!(counter.average(), 4.0);
    }

    #[test]
    fn trailing_window_drops_old_frames() {
        let mut counter = FpsCounter::default();
        for _ in 0..10 {
            let _ = counter.record_frame(Duration::from_secs(1));
        }
        let mut last = None;
        for _ in 0..20 {
            last = counter.record_frame(Duration::from_millis(50)).or(last);
        }
        let metrics = last.expect("interval elapsed");

        assert_eq!(metrics.per_second, 20.0);
        assert!((metrics.trailing_ten_seconds - 2.9).abs() < 1e-4);
    }

    #[test]
    fn reset_discards_history() {
        let mut counter = FpsCounter::default();
        let _ = counter.record_frame(Duration::from_millis(500));
        counter.reset();

        assert_eq!(counter.average(), 0.0);
        assert_eq!(counter.measured(), Duration::ZERO);
    }
}
