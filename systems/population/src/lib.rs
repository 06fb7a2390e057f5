#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic split of a target entity total across configured categories.
//!
//! Categories are visited in rank order (stable with respect to table
//! order). Each category requests an amount from its allocation rule and
//! receives at most what is still unassigned, so the sum of all counts never
//! exceeds the total. The single remainder category, when present, takes
//! everything left when it is visited. Reordering ranks changes which
//! category absorbs the remainder, so rank order is part of the contract.

use gpumark_core::{CategoryTable, PopulationCounts};

/// Pure system that maps a target total onto per-category counts.
#[derive(Clone, Debug)]
pub struct PopulationAllocator {
    table: CategoryTable,
}

impl PopulationAllocator {
    /// Creates a new allocator for the provided category table.
    #[must_use]
    pub fn new(table: CategoryTable) -> Self {
        Self { table }
    }

    /// Category table the allocator distributes across.
    #[must_use]
    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    /// Computes the per-category counts for `total`.
    #[must_use]
    pub fn recompute(&self, total: u32) -> PopulationCounts {
        let mut counts = PopulationCounts::zeroed(self.table.len());
        let mut unassigned = total;

        for id in self.table.allocation_order() {
            let Some(category) = self.table.get(*id) else {
                continue;
            };
            let requested = category.rule.request(total, unassigned);
            let granted = requested.min(unassigned);
            counts.set(*id, granted);
            unassigned -= granted;
        }

        counts
    }
}

impl Default for PopulationAllocator {
    fn default() -> Self {
        Self::new(CategoryTable::aquarium())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpumark_core::{
        AllocationRule, Category, CategoryId, Motion, OrbitProfile, PopulationBand, Quota,
    };
    use proptest::prelude::*;

    fn category(name: &str, rank: u32, rule: AllocationRule) -> Category {
        Category {
            name: name.to_owned(),
            rank,
            rule,
            motion: Motion::Orbit(OrbitProfile::default()),
        }
    }

    #[test]
    fn zero_total_assigns_nothing() {
        let allocator = PopulationAllocator::default();
        let counts = allocator.recompute(0);
        assert!(counts.as_slice().iter().all(|count| *count == 0));
    }

    #[test]
    fn first_ranked_category_is_clamped_for_tiny_totals() {
        let table = CategoryTable::new(vec![
            category("tail", 1, AllocationRule::Remainder),
            category(
                "head",
                0,
                AllocationRule::Banded(vec![PopulationBand::otherwise(Quota::Fixed(5))]),
            ),
        ])
        .expect("valid table");
        let allocator = PopulationAllocator::new(table);

        let counts = allocator.recompute(3);
        assert_eq!(counts.get(CategoryId::new(1)), 3);
        assert_eq!(counts.get(CategoryId::new(0)), 0);
    }

    #[test]
    fn table_without_remainder_leaves_entities_unassigned() {
        let table = CategoryTable::new(vec![category(
            "only",
            0,
            AllocationRule::Banded(vec![PopulationBand::otherwise(Quota::Fixed(4))]),
        )])
        .expect("valid table");
        let counts = PopulationAllocator::new(table).recompute(100);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn reordering_ranks_moves_the_remainder() {
        let fixed = AllocationRule::Banded(vec![PopulationBand::otherwise(Quota::Fixed(7))]);
        let remainder_last = CategoryTable::new(vec![
            category("a", 0, fixed.clone()),
            category("b", 1, AllocationRule::Remainder),
        ])
        .expect("valid table");
        let remainder_first = CategoryTable::new(vec![
            category("a", 1, fixed),
            category("b", 0, AllocationRule::Remainder),
        ])
        .expect("valid table");

        let last = PopulationAllocator::new(remainder_last).recompute(10);
        let first = PopulationAllocator::new(remainder_first).recompute(10);

        assert_eq!(last.as_slice(), &[7, 3]);
        assert_eq!(first.as_slice(), &[0, 10]);
    }

    #[test]
    fn asteroid_field_takes_the_whole_total() {
        let allocator = PopulationAllocator::new(CategoryTable::asteroids());
        for total in [0, 1, 50_000, u32::MAX] {
            assert_eq!(allocator.recompute(total).as_slice(), &[total]);
        }
    }

    proptest! {
        #[test]
        fn counts_never_exceed_total(total in 0u32..2_000_000) {
            let counts = PopulationAllocator::default().recompute(total);
            prop_assert!(counts.total() <= u64::from(total));
        }

        #[test]
        fn remainder_makes_the_aquarium_split_exact(total in 0u32..2_000_000) {
            let counts = PopulationAllocator::default().recompute(total);
            prop_assert_eq!(counts.total(), u64::from(total));
        }

        #[test]
        fn big_fish_never_shrink_as_total_grows(total in 0u32..1_000_000, step in 0u32..50_000) {
            let allocator = PopulationAllocator::default();
            let table = allocator.table();
            let smaller = allocator.recompute(total);
            let larger = allocator.recompute(total + step);
            for name in ["BigFishA", "BigFishB"] {
                let id = table.find(name).expect("big fish present");
                prop_assert!(larger.get(id) >= smaller.get(id));
            }
        }

        #[test]
        fn medium_fish_never_shrink_within_a_band(total in 0u32..1_000_000, step in 0u32..5_000) {
            let band = |value: u32| match value {
                0..=999 => 0,
                1_000..=9_999 => 1,
                _ => 2,
            };
            prop_assume!(band(total) == band(total + step));
            let allocator = PopulationAllocator::default();
            let id = allocator.table().find("MediumFishA").expect("medium fish present");
            let smaller = allocator.recompute(total).get(id);
            let larger = allocator.recompute(total + step).get(id);
            prop_assert!(larger >= smaller);
        }
    }
}
