#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative session state for the GPUMark population pipeline.
//!
//! The world owns the global clock, the target and realized entity totals,
//! and the per-category allocation that storage is currently sized for. It
//! never computes allocations or poses itself; systems read it through
//! [`query`] and request mutations through [`apply`].

use std::time::Duration;

use gpumark_core::{ClockSettings, Command, Event, GlobalClock, PopulationCounts};

/// Represents the authoritative session state.
#[derive(Clone, Debug, Default)]
pub struct World {
    clock: GlobalClock,
    clock_settings: ClockSettings,
    target_total: u32,
    realized_total: u32,
    population: PopulationCounts,
    frame_index: u64,
}

impl World {
    /// Creates an empty world with a rewound clock and no entities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn set_target_total(&mut self, total: u32, out_events: &mut Vec<Event>) {
        let previous = self.target_total;
        if previous == total {
            return;
        }
        self.target_total = total;
        out_events.push(Event::TargetTotalChanged {
            previous,
            current: total,
        });
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ResetClock => {
            world.clock = GlobalClock::default();
            world.frame_index = 0;
            out_events.push(Event::ClockReset);
        }
        Command::ConfigureClock { settings } => {
            world.clock_settings = settings;
        }
        Command::Tick { dt } => {
            world.clock = world.clock.advanced(dt, &world.clock_settings);
            world.frame_index = world.frame_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced {
                dt,
                clock: world.clock.clock,
            });
        }
        Command::SetTargetTotal { total } => world.set_target_total(total, out_events),
        Command::AdjustTargetTotal { delta } => {
            let total = delta.apply_to(world.target_total);
            world.set_target_total(total, out_events);
        }
        Command::RealizePopulation { total, counts } => {
            let previous = world.realized_total;
            world.realized_total = total;
            world.population = counts;
            out_events.push(Event::PopulationRealized {
                previous,
                current: total,
            });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::World;
    use gpumark_core::{CameraRig, ClockSettings, GlobalClock, PopulationCounts};

    /// Current global clock.
    #[must_use]
    pub fn clock(world: &World) -> GlobalClock {
        world.clock
    }

    /// Multipliers the clock advances with.
    #[must_use]
    pub fn clock_settings(world: &World) -> &ClockSettings {
        &world.clock_settings
    }

    /// Unscaled wall-clock time accumulated since the last reset.
    #[must_use]
    pub fn elapsed(world: &World) -> Duration {
        world.clock.elapsed
    }

    /// Camera placement for the current orbit clock.
    #[must_use]
    pub fn camera(world: &World) -> CameraRig {
        CameraRig::orbit(&world.clock, &world.clock_settings)
    }

    /// Number of ticks applied since the last clock reset.
    #[must_use]
    pub fn frame_index(world: &World) -> u64 {
        world.frame_index
    }

    /// Desired overall entity count.
    #[must_use]
    pub fn target_total(world: &World) -> u32 {
        world.target_total
    }

    /// Entity count that storage is currently sized for.
    #[must_use]
    pub fn realized_total(world: &World) -> u32 {
        world.realized_total
    }

    /// Reports whether the target total differs from the realized total.
    #[must_use]
    pub fn needs_realization(world: &World) -> bool {
        world.target_total != world.realized_total
    }

    /// Per-category counts that storage is currently sized for.
    #[must_use]
    pub fn population(world: &World) -> &PopulationCounts {
        &world.population
    }
}

/// Convenience helper that advances the world clock by `dt`.
pub fn tick(world: &mut World, dt: Duration, out_events: &mut Vec<Event>) {
    apply(world, Command::Tick { dt }, out_events);
}
