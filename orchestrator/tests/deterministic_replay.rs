use std::{num::NonZeroU32, time::Duration};

use gpumark_core::{DrawMode, PopulationDelta, ScenarioEvent};
use gpumark_orchestrator::{
    BenchmarkSession, FrameOrchestrator, PipelineConfig, SessionLimits,
};
use gpumark_rendering::FixedStepClock;
use gpumark_rendering_headless::{HeadlessBackend, HeadlessConfig};

fn event(frames: u32, delta: PopulationDelta) -> ScenarioEvent {
    ScenarioEvent::new(NonZeroU32::new(frames).expect("non-zero delay"), delta)
}

fn scripted_config(draw_mode: DrawMode) -> PipelineConfig {
    PipelineConfig {
        initial_total: 300,
        draw_mode,
        scenario: vec![
            event(4, PopulationDelta::add(1_200)),
            event(3, PopulationDelta::remove(1_450)),
            event(2, PopulationDelta::add(80)),
        ],
        ..PipelineConfig::default()
    }
}

fn run(config: PipelineConfig, frames: u64) -> HeadlessBackend {
    let orchestrator = FrameOrchestrator::new(
        config,
        HeadlessBackend::new(HeadlessConfig::default()),
        FixedStepClock::new(Duration::from_millis(16)),
    )
    .expect("pipeline starts");
    let mut session = BenchmarkSession::new(
        orchestrator,
        SessionLimits {
            frames: Some(frames),
            ..SessionLimits::default()
        },
    );
    let summary = session.run().expect("session completes");
    assert_eq!(summary.frames, frames);
    session.into_orchestrator().into_backend()
}

#[test]
fn replaying_a_session_reproduces_its_fingerprint() {
    let first = run(scripted_config(DrawMode::Batched), 24);
    let second = run(scripted_config(DrawMode::Batched), 24);

    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.frames_presented(), 24);
    assert_eq!(first.reallocations(), 4, "initial storage plus three changes");
    assert_eq!(first.layout().capacity, 130);
}

#[test]
fn draw_modes_write_identical_uniforms() {
    let batched = run(scripted_config(DrawMode::Batched), 12);
    let per_entity = run(scripted_config(DrawMode::PerEntity), 12);

    assert_eq!(batched.layout(), per_entity.layout());
    for slot in 0..batched.layout().capacity {
        assert_eq!(batched.instance(slot), per_entity.instance(slot));
    }
    assert_eq!(batched.last_frame().draw_calls, 5);
    assert_eq!(
        per_entity.last_frame().draw_calls,
        u64::from(per_entity.layout().capacity)
    );
    assert_eq!(
        batched.last_frame().indices_submitted,
        per_entity.last_frame().indices_submitted
    );
}

#[test]
fn superseded_storage_is_released_after_frames_in_flight() {
    let backend = run(scripted_config(DrawMode::Batched), 12);

    assert_eq!(backend.retired_storage(), 0);
    assert_eq!(backend.released_storage(), 3);
}

#[test]
fn session_reports_the_realized_total() {
    let orchestrator = FrameOrchestrator::new(
        scripted_config(DrawMode::Batched),
        HeadlessBackend::default(),
        FixedStepClock::new(Duration::from_millis(10)),
    )
    .expect("pipeline starts");
    let mut session = BenchmarkSession::new(
        orchestrator,
        SessionLimits {
            test_time: Some(Duration::from_millis(500)),
            frames: None,
        },
    );

    let summary = session.run().expect("session completes");

    assert_eq!(summary.total, 130);
    assert!((summary.average_fps - 100.0).abs() < 1e-6);
    assert!(summary.to_string().starts_with("[RESULT] MODE:batched,COUNT:130,FPS:100"));
}
