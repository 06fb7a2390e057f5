use std::num::NonZeroU32;

use gpumark_core::{PopulationDelta, ScenarioEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const MIN_DELAY: u32 = 30;
const MAX_DELAY: u32 = 240;

/// Builds a reproducible scenario that repeatedly grows and shrinks the
/// population around `initial_total`.
///
/// Removals never exceed the running total, so every event changes it
/// unless the total is already zero.
pub(crate) fn generate(seed: u64, initial_total: u32, events: usize) -> Vec<ScenarioEvent> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut total = initial_total;

    (0..events)
        .map(|_| {
            let delay = rng.gen_range(MIN_DELAY..=MAX_DELAY);
            let span = (total / 4).max(1);
            let count = rng.gen_range(1..=span);
            let delta = if total == 0 || rng.gen_bool(0.5) {
                PopulationDelta::add(count)
            } else {
                PopulationDelta::remove(count.min(total))
            };
            total = delta.apply_to(total);
            ScenarioEvent::new(NonZeroU32::MIN.saturating_add(delay - 1), delta)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpumark_core::DeltaSign;

    #[test]
    fn same_seed_same_scenario() {
        assert_eq!(generate(7, 30_000, 32), generate(7, 30_000, 32));
        assert_ne!(generate(7, 30_000, 32), generate(8, 30_000, 32));
    }

    #[test]
    fn running_total_never_underflows() {
        let mut total = 10u32;
        for event in generate(99, total, 200) {
            let delta = event.delta();
            if delta.sign == DeltaSign::Remove {
                assert!(delta.count <= total);
            }
            assert!((MIN_DELAY..=MAX_DELAY).contains(&event.frames().get()));
            total = delta.apply_to(total);
        }
    }
}
