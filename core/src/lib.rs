#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the GPUMark population pipeline.
//!
//! This crate defines the vocabulary that connects adapters, the
//! authoritative world, and the pure systems. Adapters and the frame
//! orchestrator submit [`Command`] values describing desired mutations, the
//! world executes those commands via its `apply` entry point, and then
//! broadcasts [`Event`] values describing what changed. Static configuration
//! (the [`CategoryTable`], [`AnimationTuning`], [`ClockSettings`]) and the
//! per-frame [`EntityPose`] produced by the animator also live here so every
//! crate agrees on a single representation.

mod random;

use std::{collections::HashSet, f64::consts::TAU, num::NonZeroU32, time::Duration};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use random::PseudoRandomSequence;

/// Entity count used when no explicit total is configured.
pub const DEFAULT_TARGET_TOTAL: u32 = 30_000;

/// Asteroid count used by the asteroid preset when no total is configured.
pub const DEFAULT_ASTEROID_TOTAL: u32 = 50_000;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Rewinds the global clock to the start of a session.
    ResetClock,
    /// Replaces the multipliers applied to wall-clock time.
    ConfigureClock {
        /// Multipliers applied when the clock advances.
        settings: ClockSettings,
    },
    /// Advances the global clock by the provided wall-clock delta.
    Tick {
        /// Wall-clock time that elapsed since the previous frame.
        dt: Duration,
    },
    /// Replaces the target entity total.
    SetTargetTotal {
        /// Desired overall entity count.
        total: u32,
    },
    /// Adjusts the target entity total by a signed delta, flooring at zero.
    AdjustTargetTotal {
        /// Delta applied to the current target.
        delta: PopulationDelta,
    },
    /// Records that storage has been resized for the provided allocation.
    RealizePopulation {
        /// Target total the storage now accommodates.
        total: u32,
        /// Per-category counts computed for `total`.
        counts: PopulationCounts,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the global clock was rewound.
    ClockReset,
    /// Indicates that the global clock advanced.
    TimeAdvanced {
        /// Wall-clock time that elapsed in the frame.
        dt: Duration,
        /// Animation clock value after advancing.
        clock: f64,
    },
    /// Announces that the target total changed.
    TargetTotalChanged {
        /// Target before the change.
        previous: u32,
        /// Target after the change.
        current: u32,
    },
    /// Confirms that storage now matches a new allocation.
    PopulationRealized {
        /// Total the storage was sized for before the change.
        previous: u32,
        /// Total the storage is sized for now.
        current: u32,
    },
}

/// Errors detected while loading configuration, before any frame runs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The requested entity total was negative.
    #[error("entity count must be zero or greater (received {requested})")]
    NegativeTotal {
        /// Value supplied by the caller.
        requested: i64,
    },
    /// The requested entity total does not fit the supported range.
    #[error("entity count {requested} exceeds the supported maximum of {max}", max = u32::MAX)]
    TotalOutOfRange {
        /// Value supplied by the caller.
        requested: i64,
    },
    /// A scenario event used a frame delay of zero or less.
    #[error("scenario event {index} has non-positive frame delay {frames}")]
    NonPositiveFrameDelay {
        /// Position of the event in the script.
        index: usize,
        /// Delay supplied for the event.
        frames: i64,
    },
    /// A scenario event used a sign token other than `+` or `-`.
    #[error("scenario event {index} has unknown operation `{token}` (expected `+` or `-`)")]
    UnknownSign {
        /// Position of the event in the script.
        index: usize,
        /// Token supplied for the event.
        token: String,
    },
    /// A scenario event carried a count outside `0..=u32::MAX`.
    #[error("scenario event {index} has invalid count {count}")]
    InvalidDeltaCount {
        /// Position of the event in the script.
        index: usize,
        /// Count supplied for the event.
        count: i64,
    },
    /// The category table contained no categories.
    #[error("category table must contain at least one category")]
    EmptyCategoryTable,
    /// Two categories shared a name.
    #[error("category `{name}` is declared more than once")]
    DuplicateCategory {
        /// Name that was repeated.
        name: String,
    },
    /// More than one category was configured to absorb the remainder.
    #[error("categories `{first}` and `{second}` both absorb the remainder")]
    MultipleRemainderCategories {
        /// First remainder category encountered in rank order.
        first: String,
        /// Second remainder category encountered in rank order.
        second: String,
    },
    /// A banded rule did not end with an open-ended band.
    #[error("category `{name}` must end its bands with an open-ended band")]
    UnboundedBandMissing {
        /// Category whose bands were malformed.
        name: String,
    },
    /// Band thresholds were not strictly increasing.
    #[error("category `{name}` has band thresholds that are not strictly increasing")]
    UnorderedBands {
        /// Category whose bands were malformed.
        name: String,
    },
    /// The table holds more categories than identifiers can address.
    #[error("category table holds {count} categories, more than the supported {max}", max = u16::MAX)]
    TooManyCategories {
        /// Number of categories supplied.
        count: usize,
    },
    /// The selected draw mode is not offered by the backend.
    #[error("draw mode `{mode}` is not supported by the selected backend")]
    UnsupportedDrawMode {
        /// Mode that was requested.
        mode: DrawMode,
    },
    /// Dynamic buffer offsets were requested but the backend lacks them.
    #[error("dynamic buffer offsets are not supported by the selected backend")]
    DynamicOffsetUnsupported,
}

/// Converts a caller-supplied signed total into a validated entity count.
pub fn target_total_from_signed(requested: i64) -> Result<u32, ConfigurationError> {
    if requested < 0 {
        return Err(ConfigurationError::NegativeTotal { requested });
    }
    u32::try_from(requested).map_err(|_| ConfigurationError::TotalOutOfRange { requested })
}

/// Index of a category within the [`CategoryTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(u16);

impl CategoryId {
    /// Creates a new category identifier with the provided table index.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric table index.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }

    /// Retrieves the table index as a `usize`.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Amount requested by a single population band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quota {
    /// A constant number of entities.
    Fixed(u32),
    /// The target total divided by the provided divisor, truncated.
    Divisor(NonZeroU32),
}

impl Quota {
    /// Number of entities requested for `total`.
    #[must_use]
    pub const fn request(self, total: u32) -> u32 {
        match self {
            Self::Fixed(count) => count,
            Self::Divisor(divisor) => total / divisor.get(),
        }
    }
}

/// Quota that applies while the target total is below a threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PopulationBand {
    /// Exclusive upper bound on the target total; `None` for the final band.
    #[serde(default)]
    pub below: Option<u32>,
    /// Amount requested while this band is active.
    pub quota: Quota,
}

impl PopulationBand {
    /// Creates a band that applies while the total is below `threshold`.
    #[must_use]
    pub const fn below(threshold: u32, quota: Quota) -> Self {
        Self {
            below: Some(threshold),
            quota,
        }
    }

    /// Creates the open-ended band that applies to all remaining totals.
    #[must_use]
    pub const fn otherwise(quota: Quota) -> Self {
        Self { below: None, quota }
    }
}

/// How a category claims its share of the target total.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationRule {
    /// Takes every entity still unassigned when the category is visited.
    Remainder,
    /// Requests the quota of the first band whose threshold exceeds the total.
    Banded(Vec<PopulationBand>),
}

impl AllocationRule {
    /// Number of entities requested for `total` before clamping.
    ///
    /// Remainder categories request everything that is still unassigned.
    #[must_use]
    pub fn request(&self, total: u32, unassigned: u32) -> u32 {
        match self {
            Self::Remainder => unassigned,
            Self::Banded(bands) => bands
                .iter()
                .find(|band| band.below.map_or(true, |threshold| total < threshold))
                .map_or(0, |band| band.quota.request(total)),
        }
    }

    /// Reports whether the rule absorbs the remainder.
    #[must_use]
    pub const fn is_remainder(&self) -> bool {
        matches!(self, Self::Remainder)
    }
}

/// Swimming constants that distinguish one fish category from another.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    /// Base swim speed multiplier.
    pub speed: f32,
    /// Random spread added on top of `speed`.
    pub speed_range: f32,
    /// Base orbit radius on the x and z axes.
    pub radius: f32,
    /// Random spread added on top of `radius`.
    pub radius_range: f32,
    /// Tail wag speed before the global multiplier.
    pub tail_speed: f32,
    /// Offset added to the global swim height.
    pub height_offset: f32,
    /// Factor applied to the global height range.
    pub height_range: f32,
}

/// Ring orbit constants for bodies circling the origin.
///
/// Every per-body value is jittered uniformly within its spread.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitProfile {
    /// Mean distance from the ring centre.
    pub orbit_radius: f32,
    /// Half width of the ring disc.
    pub disc_radius: f32,
    /// Orbit radius spread as a fraction of `disc_radius`.
    pub radial_spread: f32,
    /// Vertical spread as a fraction of `disc_radius`.
    pub height_spread: f32,
    /// Mean body scale.
    pub scale: f32,
    /// Spread around `scale`.
    pub scale_range: f32,
    /// Smallest scale a body may receive.
    pub min_scale: f32,
    /// Slowest tangential speed before dividing by scale and radius.
    pub min_orbit_speed: f32,
    /// Fastest tangential speed before dividing by scale and radius.
    pub max_orbit_speed: f32,
    /// Largest absolute spin speed before dividing by scale.
    pub max_spin_speed: f32,
}

impl Default for OrbitProfile {
    fn default() -> Self {
        Self {
            orbit_radius: 450.0,
            disc_radius: 120.0,
            radial_spread: 0.8,
            height_spread: 0.4,
            scale: 1.4,
            scale_range: 0.9,
            min_scale: 0.2,
            min_orbit_speed: 5.0,
            max_orbit_speed: 15.0,
            max_spin_speed: 2.0,
        }
    }
}

/// How entities of a category move.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Motion {
    /// Sinusoidal swimming around the tank with a wagging tail.
    Swim(MotionProfile),
    /// Circling a ring while spinning about a per-body axis.
    Orbit(OrbitProfile),
}

/// Static description of one class of animated entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Human readable category name, unique within a table.
    pub name: String,
    /// Allocation priority; lower ranks are allocated first.
    pub rank: u32,
    /// Rule deciding how many entities the category receives.
    pub rule: AllocationRule,
    /// Animation constants for entities of this category.
    pub motion: Motion,
}

/// Validated, ordered list of categories.
///
/// Table order is the order in which entities are animated and drawn. Rank
/// order (stable with respect to table order) is the order in which the
/// allocator visits categories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Category>", into = "Vec<Category>")]
pub struct CategoryTable {
    categories: Vec<Category>,
    allocation_order: Vec<CategoryId>,
}

impl CategoryTable {
    /// Validates `categories` and captures them as a table.
    pub fn new(categories: Vec<Category>) -> Result<Self, ConfigurationError> {
        if categories.is_empty() {
            return Err(ConfigurationError::EmptyCategoryTable);
        }
        if categories.len() > usize::from(u16::MAX) {
            return Err(ConfigurationError::TooManyCategories {
                count: categories.len(),
            });
        }

        let mut names = HashSet::new();
        for category in &categories {
            if !names.insert(category.name.as_str()) {
                return Err(ConfigurationError::DuplicateCategory {
                    name: category.name.clone(),
                });
            }
            validate_rule(category)?;
        }

        let table = Self::ordered(categories);

        let mut remainder: Option<&str> = None;
        for id in &table.allocation_order {
            let category = &table.categories[id.index()];
            if !category.rule.is_remainder() {
                continue;
            }
            if let Some(first) = remainder {
                return Err(ConfigurationError::MultipleRemainderCategories {
                    first: first.to_owned(),
                    second: category.name.clone(),
                });
            }
            remainder = Some(category.name.as_str());
        }

        Ok(table)
    }

    fn ordered(categories: Vec<Category>) -> Self {
        let mut allocation_order: Vec<CategoryId> = (0..categories.len())
            .map(|index| CategoryId::new(index as u16))
            .collect();
        allocation_order.sort_by_key(|id| categories[id.index()].rank);
        Self {
            categories,
            allocation_order,
        }
    }

    /// Fish table used by the aquarium benchmark.
    #[must_use]
    pub fn aquarium() -> Self {
        let big = |radius: f32, tail_speed: f32| {
            Motion::Swim(MotionProfile {
                speed: 0.5,
                speed_range: 0.5,
                radius,
                radius_range: 3.0,
                tail_speed,
                height_offset: 0.0,
                height_range: 16.0,
            })
        };
        let big_rule = AllocationRule::Banded(vec![
            PopulationBand::below(100, Quota::Fixed(1)),
            PopulationBand::otherwise(Quota::Fixed(2)),
        ]);
        let medium_rule = AllocationRule::Banded(vec![
            PopulationBand::below(1_000, Quota::Divisor(TEN)),
            PopulationBand::below(10_000, Quota::Fixed(80)),
            PopulationBand::otherwise(Quota::Fixed(160)),
        ]);

        let categories = vec![
            Category {
                name: "SmallFishA".to_owned(),
                rank: 2,
                rule: AllocationRule::Remainder,
                motion: Motion::Swim(MotionProfile {
                    speed: 1.0,
                    speed_range: 1.5,
                    radius: 30.0,
                    radius_range: 25.0,
                    tail_speed: 10.0,
                    height_offset: 0.0,
                    height_range: 16.0,
                }),
            },
            Category {
                name: "MediumFishA".to_owned(),
                rank: 1,
                rule: medium_rule.clone(),
                motion: Motion::Swim(MotionProfile {
                    speed: 1.0,
                    speed_range: 2.0,
                    radius: 10.0,
                    radius_range: 20.0,
                    tail_speed: 1.0,
                    height_offset: 0.0,
                    height_range: 16.0,
                }),
            },
            Category {
                name: "MediumFishB".to_owned(),
                rank: 1,
                rule: medium_rule,
                motion: Motion::Swim(MotionProfile {
                    speed: 0.5,
                    speed_range: 4.0,
                    radius: 10.0,
                    radius_range: 20.0,
                    tail_speed: 3.0,
                    height_offset: -8.0,
                    height_range: 5.0,
                }),
            },
            Category {
                name: "BigFishA".to_owned(),
                rank: 0,
                rule: big_rule.clone(),
                motion: big(50.0, 1.5),
            },
            Category {
                name: "BigFishB".to_owned(),
                rank: 0,
                rule: big_rule,
                motion: big(45.0, 1.0),
            },
        ];

        Self::ordered(categories)
    }

    /// Single-class ring of spinning asteroids.
    #[must_use]
    pub fn asteroids() -> Self {
        Self::ordered(vec![Category {
            name: "Asteroid".to_owned(),
            rank: 0,
            rule: AllocationRule::Remainder,
            motion: Motion::Orbit(OrbitProfile::default()),
        }])
    }

    /// Number of categories in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Reports whether the table is empty. Validated tables never are.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Retrieves the category with the provided identifier.
    #[must_use]
    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(id.index())
    }

    /// Looks up a category identifier by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<CategoryId> {
        self.categories
            .iter()
            .position(|category| category.name == name)
            .map(|index| CategoryId::new(index as u16))
    }

    /// Iterates categories in table order alongside their identifiers.
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &Category)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(index, category)| (CategoryId::new(index as u16), category))
    }

    /// Category identifiers in the order the allocator visits them.
    #[must_use]
    pub fn allocation_order(&self) -> &[CategoryId] {
        &self.allocation_order
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::aquarium()
    }
}

/// Built-in category tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Five fish classes swimming around a tank.
    #[default]
    Aquarium,
    /// One class of asteroids circling a ring.
    Asteroids,
}

impl Preset {
    /// Category table of the preset.
    #[must_use]
    pub fn table(self) -> CategoryTable {
        match self {
            Self::Aquarium => CategoryTable::aquarium(),
            Self::Asteroids => CategoryTable::asteroids(),
        }
    }

    /// Entity total used when none is configured.
    #[must_use]
    pub const fn default_total(self) -> u32 {
        match self {
            Self::Aquarium => DEFAULT_TARGET_TOTAL,
            Self::Asteroids => DEFAULT_ASTEROID_TOTAL,
        }
    }

    /// Stable lowercase label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Aquarium => "aquarium",
            Self::Asteroids => "asteroids",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<Vec<Category>> for CategoryTable {
    type Error = ConfigurationError;

    fn try_from(categories: Vec<Category>) -> Result<Self, Self::Error> {
        Self::new(categories)
    }
}

impl From<CategoryTable> for Vec<Category> {
    fn from(table: CategoryTable) -> Self {
        table.categories
    }
}

const TEN: NonZeroU32 = match NonZeroU32::new(10) {
    Some(value) => value,
    None => unreachable!(),
};

fn validate_rule(category: &Category) -> Result<(), ConfigurationError> {
    let AllocationRule::Banded(bands) = &category.rule else {
        return Ok(());
    };

    match bands.last() {
        Some(band) if band.below.is_none() => {}
        _ => {
            return Err(ConfigurationError::UnboundedBandMissing {
                name: category.name.clone(),
            })
        }
    }

    let mut previous: Option<u32> = None;
    for band in &bands[..bands.len() - 1] {
        let Some(threshold) = band.below else {
            return Err(ConfigurationError::UnorderedBands {
                name: category.name.clone(),
            });
        };
        if previous.is_some_and(|previous| threshold <= previous) {
            return Err(ConfigurationError::UnorderedBands {
                name: category.name.clone(),
            });
        }
        previous = Some(threshold);
    }

    Ok(())
}

/// Per-category entity counts indexed by [`CategoryId`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PopulationCounts {
    counts: Vec<u32>,
}

impl PopulationCounts {
    /// Creates an all-zero mapping for `categories` categories.
    #[must_use]
    pub fn zeroed(categories: usize) -> Self {
        Self {
            counts: vec![0; categories],
        }
    }

    /// Creates a mapping from raw counts in table order.
    #[must_use]
    pub fn from_counts(counts: Vec<u32>) -> Self {
        Self { counts }
    }

    /// Count assigned to the provided category, zero when unknown.
    #[must_use]
    pub fn get(&self, id: CategoryId) -> u32 {
        self.counts.get(id.index()).copied().unwrap_or(0)
    }

    /// Overwrites the count assigned to the provided category.
    pub fn set(&mut self, id: CategoryId, count: u32) {
        if let Some(slot) = self.counts.get_mut(id.index()) {
            *slot = count;
        }
    }

    /// Sum of every category count.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|count| u64::from(*count)).sum()
    }

    /// Iterates counts in table order alongside their identifiers.
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, u32)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(index, count)| (CategoryId::new(index as u16), *count))
    }

    /// Raw counts in table order.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.counts
    }
}

/// Direction of a population change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaSign {
    /// Entities are added.
    Add,
    /// Entities are removed.
    Remove,
}

impl DeltaSign {
    /// Parses the `+`/`-` token used by scenario files.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "+" => Some(Self::Add),
            "-" => Some(Self::Remove),
            _ => None,
        }
    }

    /// Token representation used by scenario files.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Remove => "-",
        }
    }
}

/// Signed change applied to the target total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PopulationDelta {
    /// Whether entities are added or removed.
    pub sign: DeltaSign,
    /// Number of entities added or removed.
    pub count: u32,
}

impl PopulationDelta {
    /// Creates a delta that adds `count` entities.
    #[must_use]
    pub const fn add(count: u32) -> Self {
        Self {
            sign: DeltaSign::Add,
            count,
        }
    }

    /// Creates a delta that removes `count` entities.
    #[must_use]
    pub const fn remove(count: u32) -> Self {
        Self {
            sign: DeltaSign::Remove,
            count,
        }
    }

    /// Applies the delta to `total`, flooring at zero and saturating at the top.
    #[must_use]
    pub const fn apply_to(self, total: u32) -> u32 {
        match self.sign {
            DeltaSign::Add => total.saturating_add(self.count),
            DeltaSign::Remove => total.saturating_sub(self.count),
        }
    }
}

/// Timed instruction to change the target total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioEvent {
    frames: NonZeroU32,
    delta: PopulationDelta,
}

impl ScenarioEvent {
    /// Creates an event that fires after `frames` ticks at the queue head.
    #[must_use]
    pub const fn new(frames: NonZeroU32, delta: PopulationDelta) -> Self {
        Self { frames, delta }
    }

    /// Validates an event expressed in the loose form used by scenario files.
    ///
    /// `index` is the position of the event in its script and is only used
    /// for error reporting.
    pub fn from_raw(
        index: usize,
        frames: i64,
        op: &str,
        count: i64,
    ) -> Result<Self, ConfigurationError> {
        let frames = u32::try_from(frames)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(ConfigurationError::NonPositiveFrameDelay { index, frames })?;
        let sign = DeltaSign::from_token(op).ok_or_else(|| ConfigurationError::UnknownSign {
            index,
            token: op.to_owned(),
        })?;
        let count = u32::try_from(count)
            .map_err(|_| ConfigurationError::InvalidDeltaCount { index, count })?;

        Ok(Self::new(frames, PopulationDelta { sign, count }))
    }

    /// Number of head-of-queue ticks before the event fires.
    #[must_use]
    pub const fn frames(&self) -> NonZeroU32 {
        self.frames
    }

    /// Change applied when the event fires.
    #[must_use]
    pub const fn delta(&self) -> PopulationDelta {
        self.delta
    }
}

/// How per-entity uniforms are paired with draw submissions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawMode {
    /// Update each entity's uniforms and draw it immediately.
    PerEntity,
    /// Update every entity first, then issue one draw per category.
    #[default]
    Batched,
}

impl DrawMode {
    /// Stable lowercase label used in logs and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PerEntity => "per-entity",
            Self::Batched => "batched",
        }
    }
}

impl std::fmt::Display for DrawMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Multipliers applied to wall-clock time and the camera orbit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Multiplier applied to elapsed time for the animation clock.
    pub speed: f64,
    /// Multiplier applied to elapsed time for the camera orbit clock.
    pub eye_speed: f64,
    /// Radius of the circle the camera eye travels on.
    pub eye_radius: f32,
    /// Height of the camera eye.
    pub eye_height: f32,
    /// Radius of the circle the look-at target travels on.
    pub target_radius: f32,
    /// Height of the look-at target.
    pub target_height: f32,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            eye_speed: 0.0258,
            eye_radius: 60.0,
            eye_height: 19.0,
            target_radius: 88.0,
            target_height: 63.3,
        }
    }
}

/// Process-wide clock that drives animation and the camera orbit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlobalClock {
    /// Animation clock in scaled seconds.
    pub clock: f64,
    /// Camera orbit clock in scaled seconds.
    pub eye_clock: f64,
    /// Unscaled wall-clock time since the last reset.
    pub elapsed: Duration,
}

impl GlobalClock {
    /// Returns the clock advanced by `dt` using the provided multipliers.
    #[must_use]
    pub fn advanced(self, dt: Duration, settings: &ClockSettings) -> Self {
        let seconds = dt.as_secs_f64();
        Self {
            clock: self.clock + seconds * settings.speed,
            eye_clock: self.eye_clock + seconds * settings.eye_speed,
            elapsed: self.elapsed.saturating_add(dt),
        }
    }
}

/// Camera placement derived from the orbit clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraRig {
    /// Position of the camera eye.
    pub eye: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
}

impl CameraRig {
    /// Places the camera on its orbit for the provided clock.
    #[must_use]
    pub fn orbit(clock: &GlobalClock, settings: &ClockSettings) -> Self {
        let eye_angle = clock.eye_clock;
        let target_angle = eye_angle + std::f64::consts::PI;
        Self {
            eye: Vec3::new(
                (eye_angle.sin() as f32) * settings.eye_radius,
                settings.eye_height,
                (eye_angle.cos() as f32) * settings.eye_radius,
            ),
            target: Vec3::new(
                (target_angle.sin() as f32) * settings.target_radius,
                settings.target_height,
                (target_angle.cos() as f32) * settings.target_radius,
            ),
        }
    }
}

/// Global animation constants shared by every category.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationTuning {
    /// Multiplier converting the global clock into a category base clock.
    pub fish_speed: f32,
    /// Phase offset between consecutive entities of a category.
    pub fish_offset: f32,
    /// Clock multiplier for the x axis sinusoid.
    pub x_clock: f32,
    /// Clock multiplier for the y axis sinusoid.
    pub y_clock: f32,
    /// Clock multiplier for the z axis sinusoid.
    pub z_clock: f32,
    /// Global multiplier applied to every category's tail speed.
    pub tail_speed: f32,
    /// Clock offset between consecutive entities' tail wag.
    pub tail_offset_mult: f32,
    /// Base swim height shared by every category.
    pub height: f32,
    /// Global height range scaled by each category's `height_range`.
    pub height_range: f32,
    /// Random spread added to the unit scale.
    pub scale_range: f32,
    /// Base vertical radius before jitter.
    pub y_radius: f32,
}

impl Default for AnimationTuning {
    fn default() -> Self {
        Self {
            fish_speed: 0.124,
            fish_offset: 0.52,
            x_clock: 1.0,
            y_clock: 0.556,
            z_clock: 1.0,
            tail_speed: 1.0,
            tail_offset_mult: 1.0,
            height: 25.0,
            height_range: 1.0,
            scale_range: 1.0,
            y_radius: 2.0,
        }
    }
}

/// Animated pose of a single entity for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityPose {
    /// Position of the entity's head.
    pub head: Vec3,
    /// Trailing reference point a short step behind along the path.
    pub tail: Vec3,
    /// Unit axis: the heading for swimmers, the spin axis for orbiting bodies.
    pub axis: Vec3,
    /// Uniform scale applied to the entity mesh.
    pub scale: f32,
    /// Tail wag phase for swimmers, spin angle for orbiting bodies; in `[0, 2π)`.
    pub tail_phase: f32,
}

/// Wraps `value` into `[0, 2π)`.
#[must_use]
pub fn wrap_phase(value: f64) -> f32 {
    let wrapped = value.rem_euclid(TAU) as f32;
    if wrapped.is_finite() && wrapped < std::f32::consts::TAU {
        wrapped
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_total_is_rejected() {
        assert_eq!(
            target_total_from_signed(-1),
            Err(ConfigurationError::NegativeTotal { requested: -1 })
        );
        assert_eq!(target_total_from_signed(0), Ok(0));
        assert_eq!(target_total_from_signed(30_000), Ok(30_000));
        assert!(matches!(
            target_total_from_signed(i64::from(u32::MAX) + 1),
            Err(ConfigurationError::TotalOutOfRange { .. })
        ));
    }

    #[test]
    fn scenario_event_validates_raw_fields() {
        let event = ScenarioEvent::from_raw(0, 3, "+", 200).expect("valid event");
        assert_eq!(event.frames().get(), 3);
        assert_eq!(event.delta(), PopulationDelta::add(200));

        assert_eq!(
            ScenarioEvent::from_raw(4, 0, "+", 1),
            Err(ConfigurationError::NonPositiveFrameDelay {
                index: 4,
                frames: 0
            })
        );
        assert_eq!(
            ScenarioEvent::from_raw(1, 2, "*", 1),
            Err(ConfigurationError::UnknownSign {
                index: 1,
                token: "*".to_owned()
            })
        );
        assert_eq!(
            ScenarioEvent::from_raw(2, 2, "-", -5),
            Err(ConfigurationError::InvalidDeltaCount {
                index: 2,
                count: -5
            })
        );
    }

    #[test]
    fn delta_floors_at_zero() {
        assert_eq!(PopulationDelta::remove(50).apply_to(20), 0);
        assert_eq!(PopulationDelta::add(5).apply_to(u32::MAX), u32::MAX);
        assert_eq!(PopulationDelta::add(5).apply_to(20), 25);
    }

    #[test]
    fn aquarium_table_allocates_big_fish_first() {
        let table = CategoryTable::aquarium();
        let order: Vec<&str> = table
            .allocation_order()
            .iter()
            .filter_map(|id| table.get(*id))
            .map(|category| category.name.as_str())
            .collect();

        assert_eq!(
            order,
            vec![
                "BigFishA",
                "BigFishB",
                "MediumFishA",
                "MediumFishB",
                "SmallFishA"
            ]
        );
    }

    #[test]
    fn table_rejects_second_remainder() {
        let mut categories: Vec<Category> = CategoryTable::aquarium().into();
        categories[3].rule = AllocationRule::Remainder;

        assert_eq!(
            CategoryTable::new(categories),
            Err(ConfigurationError::MultipleRemainderCategories {
                first: "BigFishA".to_owned(),
                second: "SmallFishA".to_owned(),
            })
        );
    }

    #[test]
    fn table_rejects_bands_without_open_end() {
        let mut categories: Vec<Category> = CategoryTable::aquarium().into();
        categories[1].rule =
            AllocationRule::Banded(vec![PopulationBand::below(10, Quota::Fixed(1))]);

        assert_eq!(
            CategoryTable::new(categories),
            Err(ConfigurationError::UnboundedBandMissing {
                name: "MediumFishA".to_owned()
            })
        );
    }

    #[test]
    fn table_rejects_unordered_bands() {
        let mut categories: Vec<Category> = CategoryTable::aquarium().into();
        categories[1].rule = AllocationRule::Banded(vec![
            PopulationBand::below(100, Quota::Fixed(1)),
            PopulationBand::below(50, Quota::Fixed(2)),
            PopulationBand::otherwise(Quota::Fixed(3)),
        ]);

        assert!(matches!(
            CategoryTable::new(categories),
            Err(ConfigurationError::UnorderedBands { .. })
        ));
    }

    #[test]
    fn table_rejects_duplicate_names() {
        let mut categories: Vec<Category> = CategoryTable::aquarium().into();
        categories[2].name = "MediumFishA".to_owned();

        assert_eq!(
            CategoryTable::new(categories),
            Err(ConfigurationError::DuplicateCategory {
                name: "MediumFishA".to_owned()
            })
        );
    }

    #[test]
    fn built_in_tables_pass_validation() {
        for preset in [Preset::Aquarium, Preset::Asteroids] {
            let table = preset.table();
            let categories: Vec<Category> = table.clone().into();
            assert_eq!(CategoryTable::new(categories), Ok(table), "{preset}");
        }
    }

    #[test]
    fn asteroid_preset_is_one_remainder_orbit() {
        let table = Preset::Asteroids.table();
        assert_eq!(table.len(), 1);
        let asteroid = table.get(CategoryId::new(0)).expect("asteroid category");
        assert!(asteroid.rule.is_remainder());
        assert!(matches!(asteroid.motion, Motion::Orbit(_)));
        assert_eq!(Preset::Asteroids.default_total(), DEFAULT_ASTEROID_TOTAL);
        assert_eq!(Preset::default(), Preset::Aquarium);
    }

    #[test]
    fn aquarium_table_round_trips_through_bincode() {
        let table = CategoryTable::aquarium();
        let bytes = bincode::serialize(&table).expect("serialize");
        let restored: CategoryTable = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, table);

        let asteroids = CategoryTable::asteroids();
        let bytes = bincode::serialize(&asteroids).expect("serialize");
        let restored: CategoryTable = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, asteroids);
    }

    #[test]
    fn wrap_phase_stays_below_tau() {
        for value in [0.0, 1.0, -1.0, 1.0e9, -1.0e-20, std::f64::consts::TAU] {
            let wrapped = wrap_phase(value);
            assert!(
                (0.0..std::f32::consts::TAU).contains(&wrapped),
                "{value} wrapped to {wrapped}"
            );
        }
    }

    #[test]
    fn camera_orbit_starts_on_positive_z() {
        let settings = ClockSettings::default();
        let rig = CameraRig::orbit(&GlobalClock::default(), &settings);
        assert!((rig.eye.z - settings.eye_radius).abs() < 1e-5);
        assert!(rig.eye.x.abs() < 1e-5);
        assert!((rig.target.z + settings.target_radius).abs() < 1e-4);
    }
}
