use std::{fmt, time::Duration};

use anyhow::Result as AnyResult;
use gpumark_core::DrawMode;
use gpumark_rendering::{FpsCounter, FrameClock, InstanceBackend};
use gpumark_world::query;
use log::info;

use crate::FrameOrchestrator;

/// Conditions that end a benchmark session.
///
/// The session stops at whichever limit is reached first. With no limits it
/// runs until the caller stops driving it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionLimits {
    /// Measured time after which the session stops. The measurement restarts
    /// whenever storage is reallocated.
    pub test_time: Option<Duration>,
    /// Number of frames after which the session stops.
    pub frames: Option<u64>,
}

/// Outcome of a finished benchmark session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionSummary {
    /// Draw mode the session ran with.
    pub mode: DrawMode,
    /// Entity total realized at the end of the session.
    pub total: u32,
    /// Frames rendered.
    pub frames: u64,
    /// Average frame rate since the last reallocation.
    pub average_fps: f64,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[RESULT] MODE:{},COUNT:{},FPS:{:.0}",
            self.mode, self.total, self.average_fps
        )
    }
}

/// Runs an orchestrator until its limits are reached while measuring frame rate.
#[derive(Debug)]
pub struct BenchmarkSession<B, C> {
    orchestrator: FrameOrchestrator<B, C>,
    limits: SessionLimits,
    fps: FpsCounter,
    frames: u64,
}

impl<B, C> BenchmarkSession<B, C>
where
    B: InstanceBackend,
    C: FrameClock,
{
    /// Creates a session around a ready orchestrator.
    #[must_use]
    pub fn new(orchestrator: FrameOrchestrator<B, C>, limits: SessionLimits) -> Self {
        Self {
            orchestrator,
            limits,
            fps: FpsCounter::default(),
            frames: 0,
        }
    }

    /// Reports whether a configured limit has been reached.
    #[must_use]
    pub fn finished(&self) -> bool {
        let frames_done = self.limits.frames.is_some_and(|limit| self.frames >= limit);
        let time_done = self
            .limits
            .test_time
            .is_some_and(|limit| self.fps.measured() > limit);
        frames_done || time_done
    }

    /// Runs one frame and folds it into the statistics.
    pub fn step(&mut self) -> AnyResult<()> {
        let report = self.orchestrator.tick()?;
        self.frames = self.frames.saturating_add(1);

        if report.reallocation.is_some() {
            self.fps.reset();
            return Ok(());
        }
        if let Some(metrics) = self.fps.record_frame(report.dt) {
            info!(
                "{:.1} fps (trailing 10 s: {:.1}) at {} entities",
                metrics.per_second, metrics.trailing_ten_seconds, report.target_total
            );
        }
        Ok(())
    }

    /// Runs frames until a limit is reached and summarizes the session.
    pub fn run(&mut self) -> AnyResult<SessionSummary> {
        while !self.finished() {
            self.step()?;
        }
        Ok(self.summary())
    }

    /// Statistics gathered so far.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            mode: self.orchestrator.draw_mode(),
            total: query::realized_total(self.orchestrator.world()),
            frames: self.frames,
            average_fps: self.fps.average(),
        }
    }

    /// Orchestrator the session drives.
    #[must_use]
    pub fn orchestrator(&self) -> &FrameOrchestrator<B, C> {
        &self.orchestrator
    }

    /// Consumes the session and returns its orchestrator.
    #[must_use]
    pub fn into_orchestrator(self) -> FrameOrchestrator<B, C> {
        self.orchestrator
    }
}
