#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-frame driver of the GPUMark population pipeline.
//!
//! Every [`FrameOrchestrator::tick`] runs one frame to completion:
//! advance the clock, replay the scenario, reallocate storage when the
//! target total moved, animate every entity and hand the results to the
//! backend. Storage is always resized before any entity of the new
//! population is animated.

mod session;

use std::{fmt, time::Duration};

use anyhow::{Context, Result as AnyResult};
use gpumark_core::{
    AnimationTuning, CategoryId, CategoryTable, ClockSettings, Command, ConfigurationError,
    DrawMode, Event, PopulationCounts, PseudoRandomSequence, ScenarioEvent,
};
use gpumark_rendering::{
    BufferHandle, DrawRange, FrameClock, FrameView, InstanceBackend, InstanceUniforms, ProxyMesh,
};
use gpumark_system_animation::EntityAnimator;
use gpumark_system_population::PopulationAllocator;
use gpumark_system_scenario::ScenarioScript;
use gpumark_world::{self as world, query, World};
use log::{debug, info};

pub use session::{BenchmarkSession, SessionLimits, SessionSummary};

const PROXY_MESH_SEGMENTS: u16 = 8;

/// Everything the orchestrator needs to start a session.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Entity total realized before the first frame.
    pub initial_total: u32,
    /// How uniform updates are paired with draws.
    pub draw_mode: DrawMode,
    /// Whether instance uniforms share one arena addressed by offsets.
    pub dynamic_offset: bool,
    /// Categories to allocate and animate.
    pub table: CategoryTable,
    /// Global animation constants.
    pub animation: AnimationTuning,
    /// Clock multipliers and camera orbit.
    pub clock: ClockSettings,
    /// Timed population changes, in order.
    pub scenario: Vec<ScenarioEvent>,
    /// Seed the pseudo-random cursor rewinds to every frame.
    pub random_seed: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_total: gpumark_core::DEFAULT_TARGET_TOTAL,
            draw_mode: DrawMode::default(),
            dynamic_offset: true,
            table: CategoryTable::aquarium(),
            animation: AnimationTuning::default(),
            clock: ClockSettings::default(),
            scenario: Vec::new(),
            random_seed: 0,
        }
    }
}

/// Stage of the frame the orchestrator is executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    /// Between frames.
    Idle,
    /// Reading elapsed time and advancing the global clock.
    ClockAdvance,
    /// Replaying scenario events against the target total.
    ScenarioApply,
    /// Resizing storage for a new target total.
    Reallocate,
    /// Computing poses and writing instance uniforms.
    Animate,
    /// Submitting draws and presenting.
    Emit,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::ClockAdvance => "clock advance",
            Self::ScenarioApply => "scenario apply",
            Self::Reallocate => "reallocate",
            Self::Animate => "animate",
            Self::Emit => "emit",
        };
        f.write_str(label)
    }
}

/// Storage change performed during a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reallocation {
    /// Total storage was sized for before the frame.
    pub previous: u32,
    /// Total storage is sized for now.
    pub current: u32,
}

/// Summary of one completed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at one.
    pub frame_index: u64,
    /// Wall-clock time consumed by the clock advance.
    pub dt: Duration,
    /// Animation clock after advancing.
    pub clock: f64,
    /// Target total after scenario replay.
    pub target_total: u32,
    /// Storage change performed this frame, if any.
    pub reallocation: Option<Reallocation>,
    /// Instance uniform blocks written.
    pub instances: u64,
    /// Draw calls submitted.
    pub draws: u64,
}

#[derive(Clone, Copy, Debug)]
struct CategoryMesh {
    vertices: BufferHandle,
    indices: BufferHandle,
}

/// Drives one backend through successive frames.
#[derive(Debug)]
pub struct FrameOrchestrator<B, C> {
    world: World,
    allocator: PopulationAllocator,
    animator: EntityAnimator,
    scenario: ScenarioScript,
    random: PseudoRandomSequence,
    draw_mode: DrawMode,
    dynamic_offset: bool,
    meshes: Vec<CategoryMesh>,
    phase: FramePhase,
    backend: B,
    clock: C,
}

impl<B, C> FrameOrchestrator<B, C>
where
    B: InstanceBackend,
    C: FrameClock,
{
    /// Validates `config` against the backend and realizes the initial population.
    ///
    /// No reallocation happens on the first frame: storage for
    /// `config.initial_total` is created here.
    pub fn new(config: PipelineConfig, mut backend: B, clock: C) -> AnyResult<Self> {
        let capabilities = backend.capabilities();
        if config.draw_mode == DrawMode::PerEntity && !capabilities.per_entity_draw {
            return Err(ConfigurationError::UnsupportedDrawMode {
                mode: config.draw_mode,
            }
            .into());
        }
        if config.dynamic_offset && !capabilities.dynamic_buffer_offset {
            return Err(ConfigurationError::DynamicOffsetUnsupported.into());
        }

        let mesh = ProxyMesh::fish(PROXY_MESH_SEGMENTS);
        let mut meshes = Vec::with_capacity(config.table.len());
        for (_, category) in config.table.iter() {
            let vertices = backend
                .create_buffer(mesh.vertex_descriptor())
                .with_context(|| format!("failed to create vertex buffer for {}", category.name))?;
            let indices = backend
                .create_buffer(mesh.index_descriptor())
                .with_context(|| format!("failed to create index buffer for {}", category.name))?;
            meshes.push(CategoryMesh { vertices, indices });
        }

        let mut orchestrator = Self {
            world: World::new(),
            allocator: PopulationAllocator::new(config.table),
            animator: EntityAnimator::new(config.animation),
            scenario: ScenarioScript::new(config.scenario),
            random: PseudoRandomSequence::with_seed(config.random_seed),
            draw_mode: config.draw_mode,
            dynamic_offset: config.dynamic_offset,
            meshes,
            phase: FramePhase::Idle,
            backend,
            clock,
        };

        let mut events = Vec::new();
        for command in [
            Command::ConfigureClock {
                settings: config.clock,
            },
            Command::ResetClock,
            Command::SetTargetTotal {
                total: config.initial_total,
            },
        ] {
            world::apply(&mut orchestrator.world, command, &mut events);
        }
        let _ = orchestrator
            .realize_target()
            .context("failed to allocate initial instance storage")?;

        info!(
            "pipeline ready: {} entities across {} categories, {} mode",
            config.initial_total,
            orchestrator.meshes.len(),
            orchestrator.draw_mode
        );
        Ok(orchestrator)
    }

    /// Runs one frame to completion.
    pub fn tick(&mut self) -> AnyResult<FrameReport> {
        self.random.reset();

        self.phase = FramePhase::ClockAdvance;
        let dt = self.clock.elapsed_since_last();
        let mut events = Vec::new();
        world::tick(&mut self.world, dt, &mut events);
        let frame_index = query::frame_index(&self.world);

        self.phase = FramePhase::ScenarioApply;
        let mut commands = Vec::new();
        self.scenario.handle(&events, &mut commands);
        events.clear();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
        for event in &events {
            if let Event::TargetTotalChanged { previous, current } = event {
                debug!("frame {frame_index}: target total {previous} -> {current}");
            }
        }

        let reallocation = if query::needs_realization(&self.world) {
            self.phase = FramePhase::Reallocate;
            let reallocation = self
                .realize_target()
                .with_context(|| format!("frame {frame_index} failed during {}", self.phase))?;
            info!(
                "frame {frame_index}: reallocated storage {} -> {} entities",
                reallocation.previous, reallocation.current
            );
            Some(reallocation)
        } else {
            None
        };

        self.phase = FramePhase::Animate;
        let view = FrameView {
            frame_index,
            clock: query::clock(&self.world),
            camera: query::camera(&self.world),
        };
        self.backend
            .begin_frame(&view)
            .with_context(|| format!("frame {frame_index} failed to begin"))?;

        let (instances, draws) = match self.draw_mode {
            DrawMode::PerEntity => self.emit_per_entity(&view),
            DrawMode::Batched => self.emit_batched(&view),
        }
        .with_context(|| format!("frame {frame_index} failed during {}", self.phase))?;

        self.phase = FramePhase::Emit;
        self.backend
            .present()
            .with_context(|| format!("frame {frame_index} failed to present"))?;
        self.phase = FramePhase::Idle;

        let report = FrameReport {
            frame_index,
            dt,
            clock: view.clock.clock,
            target_total: query::target_total(&self.world),
            reallocation,
            instances,
            draws,
        };
        debug!(
            "frame {}: dt {:?}, {} instances, {} draws",
            report.frame_index, report.dt, report.instances, report.draws
        );
        Ok(report)
    }

    fn realize_target(&mut self) -> AnyResult<Reallocation> {
        let previous = query::realized_total(&self.world);
        let current = query::target_total(&self.world);
        let counts = self.allocator.recompute(current);

        self.backend
            .realloc_resource(previous, current, self.dynamic_offset)
            .with_context(|| format!("failed to resize instance storage to {current} entities"))?;

        let mut events = Vec::new();
        world::apply(
            &mut self.world,
            Command::RealizePopulation {
                total: current,
                counts,
            },
            &mut events,
        );
        Ok(Reallocation { previous, current })
    }

    fn emit_per_entity(&mut self, view: &FrameView) -> AnyResult<(u64, u64)> {
        let Self {
            world,
            allocator,
            animator,
            random,
            meshes,
            phase,
            backend,
            ..
        } = self;
        let meshes: &[CategoryMesh] = meshes;
        let counts = query::population(world);
        let slots = first_slots(counts);

        backend.begin_render_pass()?;
        *phase = FramePhase::Emit;
        let mut instances = 0u64;
        animator.animate_population(
            allocator.table(),
            counts,
            &view.clock,
            random,
            |category, index, pose| {
                let slot = slot_of(&slots, category, index);
                backend.update_per_instance_uniforms(&InstanceUniforms {
                    category,
                    index,
                    slot,
                    pose,
                })?;
                backend.draw(mesh_of(meshes, category)?.indices, DrawRange::single(slot))?;
                instances += 1;
                Ok::<(), anyhow::Error>(())
            },
        )?;
        Ok((instances, instances))
    }

    fn emit_batched(&mut self, view: &FrameView) -> AnyResult<(u64, u64)> {
        let Self {
            world,
            allocator,
            animator,
            random,
            meshes,
            phase,
            backend,
            ..
        } = self;
        let meshes: &[CategoryMesh] = meshes;
        let counts = query::population(world);
        let slots = first_slots(counts);

        let mut instances = 0u64;
        animator.animate_population(
            allocator.table(),
            counts,
            &view.clock,
            random,
            |category, index, pose| {
                backend.update_per_instance_uniforms(&InstanceUniforms {
                    category,
                    index,
                    slot: slot_of(&slots, category, index),
                    pose,
                })?;
                instances += 1;
                Ok::<(), anyhow::Error>(())
            },
        )?;
        backend.flush_instance_data()?;

        *phase = FramePhase::Emit;
        backend.begin_render_pass()?;
        let mut draws = 0u64;
        for (category, count) in counts.iter() {
            if count == 0 {
                continue;
            }
            let range = DrawRange {
                first_slot: slot_of(&slots, category, 0),
                count,
            };
            backend.draw(mesh_of(meshes, category)?.indices, range)?;
            draws += 1;
        }
        Ok((instances, draws))
    }

    /// Read-only view of the authoritative session state.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Backend the orchestrator drives.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consumes the orchestrator and returns its backend.
    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Draw mode selected at construction.
    #[must_use]
    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    /// Stage the orchestrator is in; anything other than idle after `tick`
    /// returns names the stage that failed.
    #[must_use]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Scenario events that have not fired yet.
    #[must_use]
    pub fn pending_scenario_events(&self) -> usize {
        self.scenario.len()
    }

    /// Vertex buffer created for the provided category.
    #[must_use]
    pub fn vertex_buffer(&self, category: CategoryId) -> Option<BufferHandle> {
        self.meshes.get(category.index()).map(|mesh| mesh.vertices)
    }
}

fn first_slots(counts: &PopulationCounts) -> Vec<u32> {
    let mut next = 0u32;
    counts
        .iter()
        .map(|(_, count)| {
            let first = next;
            next = next.saturating_add(count);
            first
        })
        .collect()
}

fn slot_of(slots: &[u32], category: CategoryId, index: u32) -> u32 {
    slots
        .get(category.index())
        .copied()
        .unwrap_or(0)
        .saturating_add(index)
}

fn mesh_of(meshes: &[CategoryMesh], category: CategoryId) -> AnyResult<&CategoryMesh> {
    meshes
        .get(category.index())
        .with_context(|| format!("no mesh created for category {}", category.get()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_slots_are_prefix_sums_in_table_order() {
        let counts = PopulationCounts::from_counts(vec![3, 0, 2, 1]);
        assert_eq!(first_slots(&counts), vec![0, 3, 3, 5]);
        assert_eq!(slot_of(&first_slots(&counts), CategoryId::new(2), 1), 4);
    }

    #[test]
    fn phases_render_lowercase_labels() {
        assert_eq!(FramePhase::Reallocate.to_string(), "reallocate");
        assert_eq!(FramePhase::ScenarioApply.to_string(), "scenario apply");
    }
}
