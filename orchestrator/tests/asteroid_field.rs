use std::{num::NonZeroU32, time::Duration};

use glam::Vec3;
use gpumark_core::{CategoryId, CategoryTable, OrbitProfile, PopulationDelta, Preset, ScenarioEvent};
use gpumark_orchestrator::{FrameOrchestrator, PipelineConfig, Reallocation};
use gpumark_rendering::FixedStepClock;
use gpumark_rendering_headless::HeadlessBackend;

fn asteroid_field(initial_total: u32, scenario: Vec<ScenarioEvent>) -> PipelineConfig {
    PipelineConfig {
        initial_total,
        table: Preset::Asteroids.table(),
        scenario,
        ..PipelineConfig::default()
    }
}

fn orchestrator(config: PipelineConfig) -> FrameOrchestrator<HeadlessBackend, FixedStepClock> {
    FrameOrchestrator::new(
        config,
        HeadlessBackend::default(),
        FixedStepClock::new(Duration::from_millis(16)),
    )
    .expect("pipeline starts")
}

fn ring_radius(position: Vec3) -> f32 {
    Vec3::new(position.x, 0.0, position.z).length()
}

#[test]
fn asteroids_are_allocated_and_animated_on_their_ring() {
    let mut pipeline = orchestrator(asteroid_field(256, Vec::new()));
    let orbit = OrbitProfile::default();
    let inner = orbit.orbit_radius - orbit.radial_spread * orbit.disc_radius - 1e-2;
    let outer = orbit.orbit_radius + orbit.radial_spread * orbit.disc_radius + 1e-2;

    for _ in 0..3 {
        let report = pipeline.tick().expect("frame runs");
        assert_eq!(report.instances, 256);
        assert_eq!(report.draws, 1, "one category, one batched draw");
    }

    let backend = pipeline.backend();
    assert_eq!(backend.layout().capacity, 256);
    for slot in 0..256 {
        let record = backend.instance(slot).expect("slot written");
        assert_eq!(record.index, slot);
        assert_eq!(record.frame_index, 3);
        let radius = ring_radius(record.pose.head);
        assert!((inner..=outer).contains(&radius), "slot {slot} at radius {radius}");
        assert!((record.pose.axis.length() - 1.0).abs() < 1e-4);
    }
}

#[test]
fn asteroids_move_along_their_orbit_between_frames() {
    let mut pipeline = orchestrator(asteroid_field(8, Vec::new()));
    let _ = pipeline.tick().expect("frame runs");
    let first: Vec<Vec3> = (0..8)
        .map(|slot| pipeline.backend().instance(slot).expect("written").pose.head)
        .collect();

    for _ in 0..30 {
        let _ = pipeline.tick().expect("frame runs");
    }

    for (slot, start) in (0..8).zip(first) {
        let now = pipeline.backend().instance(slot).expect("written").pose.head;
        assert_ne!(now, start, "asteroid {slot} stood still");
        assert!((ring_radius(now) - ring_radius(start)).abs() < 1e-2);
        assert_eq!(now.y, start.y);
    }
}

#[test]
fn asteroid_field_reallocates_when_the_scenario_grows_it() {
    let grow = ScenarioEvent::new(
        NonZeroU32::new(2).expect("non-zero delay"),
        PopulationDelta::add(100),
    );
    let mut pipeline = orchestrator(asteroid_field(50, vec![grow]));

    let reallocations: Vec<Option<Reallocation>> = (0..3)
        .map(|_| pipeline.tick().expect("frame runs").reallocation)
        .collect();

    assert_eq!(
        reallocations,
        vec![
            None,
            Some(Reallocation {
                previous: 50,
                current: 150
            }),
            None
        ]
    );
    assert_eq!(pipeline.backend().last_frame().uniform_updates, 150);
    assert_eq!(pipeline.backend().layout().capacity, 150);
}

#[test]
fn asteroid_preset_owns_one_mesh() {
    let pipeline = orchestrator(asteroid_field(1, Vec::new()));
    let table = CategoryTable::asteroids();
    let asteroid = table.find("Asteroid").expect("asteroid present");

    assert!(pipeline.vertex_buffer(asteroid).is_some());
    assert_eq!(pipeline.vertex_buffer(CategoryId::new(1)), None);
}
