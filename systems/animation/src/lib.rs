#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Stateless procedural animation of population entities.
//!
//! An entity has no identity beyond its index within a category. Its pose is
//! re-derived every frame from the global clock, the category's motion and
//! scalars drawn from the shared [`PseudoRandomSequence`]. Swimmers draw five
//! (speed, scale, x radius, y radius, z radius); orbiting bodies draw eight
//! (scale, orbit radius, height, start angle, orbit speed, spin speed and two
//! for the spin axis). The same frame animated in the same order always
//! yields the same poses.

use std::f64::consts::{PI, TAU};

use glam::{DVec3, Vec3};
use gpumark_core::{
    wrap_phase, AnimationTuning, Category, CategoryId, CategoryTable, EntityPose, GlobalClock,
    Motion, MotionProfile, OrbitProfile, PopulationCounts, PseudoRandomSequence,
};

const TAIL_LAG_XZ: f64 = 0.04;
const TAIL_LAG_Y: f64 = 0.01;
const ORBIT_TRAIL: f64 = 0.01;
const MIN_ORBIT_RADIUS: f64 = 0.01;

/// Pure system that computes per-entity poses.
#[derive(Clone, Debug, Default)]
pub struct EntityAnimator {
    tuning: AnimationTuning,
}

impl EntityAnimator {
    /// Creates an animator using the provided global constants.
    #[must_use]
    pub const fn new(tuning: AnimationTuning) -> Self {
        Self { tuning }
    }

    /// Global constants applied to every category.
    #[must_use]
    pub const fn tuning(&self) -> &AnimationTuning {
        &self.tuning
    }

    /// Computes the pose of entity `index` of `category` for the current frame.
    ///
    /// Consumes five scalars from `random` for swimmers and eight for
    /// orbiting bodies.
    pub fn pose(
        &self,
        category: &Category,
        index: u32,
        clock: &GlobalClock,
        random: &mut PseudoRandomSequence,
    ) -> EntityPose {
        match &category.motion {
            Motion::Swim(motion) => self.swim(motion, index, clock, random),
            Motion::Orbit(orbit) => orbit_pose(orbit, clock, random),
        }
    }

    fn swim(
        &self,
        motion: &MotionProfile,
        index: u32,
        clock: &GlobalClock,
        random: &mut PseudoRandomSequence,
    ) -> EntityPose {
        let tuning = &self.tuning;
        let index = f64::from(index);

        let base_clock = clock.clock * f64::from(tuning.fish_speed);
        let entity_clock = base_clock + index * f64::from(tuning.fish_offset);
        let height = f64::from(tuning.height) + f64::from(motion.height_offset);
        let height_range = f64::from(tuning.height_range) * f64::from(motion.height_range);
        let tail_speed = f64::from(motion.tail_speed) * f64::from(tuning.tail_speed);

        let speed = f64::from(motion.speed) + random.next_unit() * f64::from(motion.speed_range);
        let scale = 1.0 + random.next_unit() * f64::from(tuning.scale_range);
        let x_radius =
            f64::from(motion.radius) + random.next_unit() * f64::from(motion.radius_range);
        let y_radius = f64::from(tuning.y_radius) + random.next_unit() * height_range;
        let z_radius =
            f64::from(motion.radius) + random.next_unit() * f64::from(motion.radius_range);

        let speed_clock = entity_clock * speed;
        let x_clock = speed_clock * f64::from(tuning.x_clock);
        let y_clock = speed_clock * f64::from(tuning.y_clock);
        let z_clock = speed_clock * f64::from(tuning.z_clock);

        let orbit = |x: f64, y: f64, z: f64| {
            Vec3::new(
                (x.sin() * x_radius) as f32,
                (y.sin() * y_radius + height) as f32,
                (z.cos() * z_radius) as f32,
            )
        };

        let tail_clock = clock.clock + index * f64::from(tuning.tail_offset_mult);

        let head = orbit(x_clock, y_clock, z_clock);
        let tail = orbit(x_clock - TAIL_LAG_XZ, y_clock - TAIL_LAG_Y, z_clock - TAIL_LAG_XZ);

        EntityPose {
            head,
            tail,
            axis: (head - tail).normalize_or_zero(),
            scale: scale as f32,
            tail_phase: wrap_phase(tail_clock * tail_speed * speed),
        }
    }

    /// Animates every entity of every category in table order.
    ///
    /// `visit` receives each pose as soon as it is computed. The first error
    /// returned by `visit` stops the walk and is handed back to the caller.
    pub fn animate_population<E, F>(
        &self,
        table: &CategoryTable,
        counts: &PopulationCounts,
        clock: &GlobalClock,
        random: &mut PseudoRandomSequence,
        mut visit: F,
    ) -> Result<(), E>
    where
        F: FnMut(CategoryId, u32, EntityPose) -> Result<(), E>,
    {
        for (id, category) in table.iter() {
            for index in 0..counts.get(id) {
                let pose = self.pose(category, index, clock, random);
                visit(id, index, pose)?;
            }
        }
        Ok(())
    }
}

/// Places a body on its ring. Orbit and spin angles grow linearly with the
/// clock, so the pose needs no state carried between frames.
fn orbit_pose(
    orbit: &OrbitProfile,
    clock: &GlobalClock,
    random: &mut PseudoRandomSequence,
) -> EntityPose {
    let disc = f64::from(orbit.disc_radius);
    let mut spread = |half_width: f64| (random.next_unit() * 2.0 - 1.0) * half_width;

    let scale = (f64::from(orbit.scale) + spread(f64::from(orbit.scale_range)))
        .max(f64::from(orbit.min_scale));
    let radius = (f64::from(orbit.orbit_radius) + spread(f64::from(orbit.radial_spread) * disc))
        .max(MIN_ORBIT_RADIUS);
    let height = spread(f64::from(orbit.height_spread) * disc);
    let start_angle = spread(PI);
    let min_speed = f64::from(orbit.min_orbit_speed);
    let max_speed = f64::from(orbit.max_orbit_speed);
    let tangential = min_speed + random.next_unit() * (max_speed - min_speed);
    let spin = (random.next_unit() * 2.0 - 1.0) * f64::from(orbit.max_spin_speed) / scale;
    let axis_z = random.next_unit() * 2.0 - 1.0;
    let axis_angle = random.next_unit() * TAU;

    let angular_speed = tangential / (scale * radius);
    let angle = start_angle + angular_speed * clock.clock;
    let place = |angle: f64| {
        DVec3::new(radius * angle.cos(), height, -radius * angle.sin()).as_vec3()
    };
    let ring = (1.0 - axis_z * axis_z).max(0.0).sqrt();
    let axis = DVec3::new(ring * axis_angle.cos(), ring * axis_angle.sin(), axis_z);

    EntityPose {
        head: place(angle),
        tail: place(angle - ORBIT_TRAIL),
        axis: axis.normalize_or_zero().as_vec3(),
        scale: scale as f32,
        tail_phase: wrap_phase(spin * clock.clock),
    }
}
