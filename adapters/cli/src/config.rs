use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result as AnyResult};
use gpumark_core::{
    target_total_from_signed, AnimationTuning, Category, CategoryTable, ClockSettings,
    ConfigurationError, DrawMode, Preset, ScenarioEvent,
};
use serde::Deserialize;

/// Session file layout.
///
/// Every table is optional; anything omitted falls back to the defaults of
/// the selected preset.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SessionFile {
    #[serde(default)]
    pub(crate) session: SessionSection,
    #[serde(default)]
    pub(crate) clock: ClockSettings,
    #[serde(default)]
    pub(crate) animation: AnimationTuning,
    #[serde(default)]
    pub(crate) categories: Option<Vec<Category>>,
    #[serde(default)]
    pub(crate) scenario: Vec<RawScenarioEvent>,
}

/// `[session]` table of the session file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SessionSection {
    pub(crate) preset: Option<Preset>,
    pub(crate) fish_count: Option<i64>,
    pub(crate) draw_mode: Option<DrawMode>,
    pub(crate) dynamic_buffer_offset: Option<bool>,
    pub(crate) test_time: Option<f64>,
    pub(crate) frames: Option<u64>,
    pub(crate) seed: Option<u32>,
    pub(crate) frames_in_flight: Option<u32>,
    pub(crate) max_instances: Option<u32>,
}

/// Scenario event exactly as written in a file, before validation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub(crate) struct RawScenarioEvent {
    pub(crate) frame: i64,
    pub(crate) op: String,
    pub(crate) count: i64,
}

#[derive(Debug, Deserialize)]
struct LegacyScenario {
    behaviors: Vec<RawScenarioEvent>,
}

#[derive(Debug, Deserialize)]
struct TomlScenario {
    scenario: Vec<RawScenarioEvent>,
}

impl SessionFile {
    /// Parses a session file from TOML text.
    pub(crate) fn parse(contents: &str) -> AnyResult<Self> {
        toml::from_str(contents).context("failed to parse session file")
    }

    /// Reads and parses the session file at `path`.
    pub(crate) fn load(path: &Path) -> AnyResult<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid session file {}", path.display()))
    }

    /// Validated category table, or the preset's table when none is given.
    pub(crate) fn table(&self, preset: Preset) -> Result<CategoryTable, ConfigurationError> {
        match &self.categories {
            Some(categories) => CategoryTable::new(categories.clone()),
            None => Ok(preset.table()),
        }
    }

    /// Entity total requested by the file, validated.
    pub(crate) fn fish_count(&self, preset: Preset) -> Result<u32, ConfigurationError> {
        self.session
            .fish_count
            .map_or(Ok(preset.default_total()), target_total_from_signed)
    }

    /// Autostop time requested by the file.
    pub(crate) fn test_time(&self) -> Option<Duration> {
        self.session
            .test_time
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Validates raw events into scenario events, reporting the first failure.
pub(crate) fn validate_scenario(
    raw: &[RawScenarioEvent],
) -> Result<Vec<ScenarioEvent>, ConfigurationError> {
    raw.iter()
        .enumerate()
        .map(|(index, event)| ScenarioEvent::from_raw(index, event.frame, &event.op, event.count))
        .collect()
}

/// Parses a scenario in the legacy JSON layout `{"behaviors": [...]}`.
pub(crate) fn parse_json_scenario(contents: &str) -> AnyResult<Vec<ScenarioEvent>> {
    let legacy: LegacyScenario =
        serde_json::from_str(contents).context("failed to parse JSON scenario")?;
    Ok(validate_scenario(&legacy.behaviors)?)
}

/// Parses a scenario made of TOML `[[scenario]]` tables.
pub(crate) fn parse_toml_scenario(contents: &str) -> AnyResult<Vec<ScenarioEvent>> {
    let document: TomlScenario =
        toml::from_str(contents).context("failed to parse TOML scenario")?;
    Ok(validate_scenario(&document.scenario)?)
}

/// Reads a scenario file, choosing the format from its extension.
pub(crate) fn load_scenario(path: &Path) -> AnyResult<Vec<ScenarioEvent>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("toml"));
    let parsed = if is_toml {
        parse_toml_scenario(&contents)
    } else {
        parse_json_scenario(&contents)
    };
    parsed.with_context(|| format!("invalid scenario file {}", path.display()))
}
