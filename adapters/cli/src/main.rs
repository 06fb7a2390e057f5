#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs the headless population benchmark.

mod come_and_go;
mod config;

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Result as AnyResult};
use clap::{Parser, ValueEnum};
use gpumark_core::{target_total_from_signed, DrawMode, Preset};
use gpumark_orchestrator::{
    BenchmarkSession, FrameOrchestrator, PipelineConfig, SessionLimits, SessionSummary,
};
use gpumark_rendering::{FixedStepClock, FrameClock, WallClock};
use gpumark_rendering_headless::{HeadlessBackend, HeadlessConfig};
use log::info;

use self::config::{load_scenario, validate_scenario, SessionFile};

const DEFAULT_TEST_TIME: Duration = Duration::from_secs(30);
const RANDOM_SCENARIO_EVENTS: usize = 64;

#[derive(Debug, Parser)]
#[command(name = "aquarium")]
#[command(about = "Headless entity population and reallocation benchmark")]
struct Cli {
    /// Built-in category table to animate.
    #[arg(long, value_enum)]
    preset: Option<PresetArg>,
    /// Number of entities realized before the first frame.
    #[arg(long, allow_hyphen_values = true)]
    fish_count: Option<i64>,
    /// TOML session file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Scenario file (legacy JSON `behaviors` list, or TOML `[[scenario]]` tables).
    #[arg(long, conflicts_with = "random_scenario")]
    scenario: Option<PathBuf>,
    /// Generate a reproducible come-and-go scenario from this seed.
    #[arg(long)]
    random_scenario: Option<u64>,
    /// How uniform updates are paired with draws.
    #[arg(long, value_enum)]
    draw_mode: Option<DrawModeArg>,
    /// Give every instance its own uniform binding instead of a shared arena.
    #[arg(long)]
    disable_dynamic_buffer_offset: bool,
    /// Stop after this many seconds, measured from the last reallocation.
    #[arg(long)]
    test_time: Option<f64>,
    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
    /// Advance the clock by a fixed step instead of wall-clock time.
    #[arg(long)]
    fixed_step_ms: Option<u64>,
    /// Log per-frame details.
    #[arg(long)]
    print_log: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DrawModeArg {
    PerEntity,
    Batched,
}

impl From<DrawModeArg> for DrawMode {
    fn from(value: DrawModeArg) -> Self {
        match value {
            DrawModeArg::PerEntity => Self::PerEntity,
            DrawModeArg::Batched => Self::Batched,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PresetArg {
    Aquarium,
    Asteroids,
}

impl From<PresetArg> for Preset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Aquarium => Self::Aquarium,
            PresetArg::Asteroids => Self::Asteroids,
        }
    }
}

#[derive(Debug)]
struct SessionPlan {
    preset: Preset,
    pipeline: PipelineConfig,
    limits: SessionLimits,
    headless: HeadlessConfig,
    fixed_step: Option<Duration>,
}

impl SessionPlan {
    fn resolve(cli: &Cli, file: &SessionFile) -> AnyResult<Self> {
        let preset = cli
            .preset
            .map(Preset::from)
            .or(file.session.preset)
            .unwrap_or_default();
        let initial_total = match cli.fish_count {
            Some(requested) => target_total_from_signed(requested)?,
            None => file.fish_count(preset)?,
        };

        let scenario = if let Some(seed) = cli.random_scenario {
            come_and_go::generate(seed, initial_total, RANDOM_SCENARIO_EVENTS)
        } else if let Some(path) = &cli.scenario {
            load_scenario(path)?
        } else {
            validate_scenario(&file.scenario)?
        };

        let test_time = match cli.test_time {
            Some(seconds) if !seconds.is_finite() || seconds < 0.0 => {
                bail!("--test-time must be a non-negative number of seconds (received {seconds})")
            }
            Some(seconds) => Some(Duration::from_secs_f64(seconds)),
            None => file.test_time(),
        };
        let frames = cli.frames.or(file.session.frames);
        let limits = match (test_time, frames) {
            (None, None) => SessionLimits {
                test_time: Some(DEFAULT_TEST_TIME),
                frames: None,
            },
            (test_time, frames) => SessionLimits { test_time, frames },
        };

        let mut headless = HeadlessConfig::default();
        if let Some(frames_in_flight) = file.session.frames_in_flight {
            headless.frames_in_flight = frames_in_flight;
        }
        if let Some(max_instances) = file.session.max_instances {
            headless.max_instances = max_instances;
        }

        let pipeline = PipelineConfig {
            initial_total,
            draw_mode: cli
                .draw_mode
                .map(DrawMode::from)
                .or(file.session.draw_mode)
                .unwrap_or_default(),
            dynamic_offset: !cli.disable_dynamic_buffer_offset
                && file.session.dynamic_buffer_offset.unwrap_or(true),
            table: file.table(preset)?,
            animation: file.animation,
            clock: file.clock,
            scenario,
            random_seed: file.session.seed.unwrap_or(0),
        };

        Ok(Self {
            preset,
            pipeline,
            limits,
            headless,
            fixed_step: cli.fixed_step_ms.map(Duration::from_millis),
        })
    }
}

fn run_session<C: FrameClock>(plan: SessionPlan, clock: C) -> AnyResult<SessionSummary> {
    let backend = HeadlessBackend::new(plan.headless);
    let orchestrator = FrameOrchestrator::new(plan.pipeline, backend, clock)?;
    let mut session = BenchmarkSession::new(orchestrator, plan.limits);
    session.run()
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

/// Entry point for the aquarium benchmark command-line interface.
fn main() -> AnyResult<()> {
    let cli = Cli::parse();
    init_logging(cli.print_log);

    let file = match &cli.config {
        Some(path) => SessionFile::load(path)?,
        None => SessionFile::default(),
    };
    let plan = SessionPlan::resolve(&cli, &file)?;
    info!(
        "starting {} session: {} entities, {} mode, {} scenario events",
        plan.preset,
        plan.pipeline.initial_total,
        plan.pipeline.draw_mode,
        plan.pipeline.scenario.len()
    );

    let summary = match plan.fixed_step {
        Some(step) => run_session(plan, FixedStepClock::new(step))?,
        None => run_session(plan, WallClock::new())?,
    };
    println!("{summary}");
    Ok(())
}
