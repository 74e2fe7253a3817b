//! Unit and property tests for the edge materializer.

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use rand::{SeedableRng, rngs::SmallRng};
use rstest::{fixture, rstest};

use crate::{allocator::Allocation, test_utils::suite_proptest_config};

use super::{Adjacency, MaterializeError, MaterializeOptions, TargetPool, materialize};

#[fixture]
fn rng() -> SmallRng {
    SmallRng::seed_from_u64(0x5EED)
}

fn options(unique: bool, randomized: bool) -> MaterializeOptions {
    MaterializeOptions { unique, randomized }
}

#[rstest]
fn sequential_unique_consumes_pool_in_order(mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(0, 2), (1, 0), (2, 3)]);
    let mut pool: Vec<u64> = (100..108).collect();
    let edges = materialize(
        &plan,
        TargetPool::Shared(&mut pool),
        None,
        options(true, false),
        &mut rng,
    )
    .expect("pool is large enough");

    assert_eq!(edges.get(&0), Some(&vec![100, 101]));
    assert_eq!(edges.get(&2), Some(&vec![102, 103, 104]));
    assert!(!edges.contains_key(&1), "zero counts receive no key");
    assert_eq!(pool, vec![105, 106, 107]);
}

#[rstest]
#[case::unique(true)]
#[case::repeatable(false)]
fn repeated_pool_entries_reach_a_source_once(#[case] unique: bool, mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(0, 2)]);
    let mut pool = vec![1, 1, 2];
    let edges = materialize(
        &plan,
        TargetPool::Shared(&mut pool),
        None,
        options(unique, false),
        &mut rng,
    )
    .expect("two distinct targets exist");
    assert_eq!(edges.get(&0), Some(&vec![1, 2]));

    let doubled = |_source: u64| vec![3, 3, 4];
    let per_source = materialize(
        &plan,
        TargetPool::PerSource(&doubled),
        None,
        options(unique, false),
        &mut rng,
    )
    .expect("two distinct targets exist");
    assert_eq!(per_source.get(&0), Some(&vec![3, 4]));
}

#[rstest]
fn repeated_pool_entries_do_not_count_as_distinct(mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(0, 3)]);
    let mut pool = vec![5, 5, 6];
    let err = materialize(
        &plan,
        TargetPool::Shared(&mut pool),
        None,
        options(true, false),
        &mut rng,
    )
    .expect_err("only two distinct targets exist");
    assert_eq!(
        err,
        MaterializeError::InsufficientTargets {
            source_id: 0,
            requested: 3,
            available: 2,
        }
    );
}

#[rstest]
fn sequential_shared_pool_rotates_between_sources(mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(0, 2), (1, 2), (2, 2)]);
    let mut pool = vec![10, 11, 12];
    let edges = materialize(
        &plan,
        TargetPool::Shared(&mut pool),
        None,
        options(false, false),
        &mut rng,
    )
    .expect("non-unique draws may repeat across sources");

    assert_eq!(edges.get(&0), Some(&vec![10, 11]));
    assert_eq!(edges.get(&1), Some(&vec![12, 10]));
    assert_eq!(edges.get(&2), Some(&vec![11, 12]));
    assert_eq!(pool, vec![10, 11, 12], "non-unique mode leaves the pool intact");
}

#[rstest]
fn exclusions_are_never_repeated(mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(0, 2)]);
    let mut pool = vec![1, 2, 3, 4];
    let exclude: Adjacency = BTreeMap::from([(0, vec![1, 3])]);
    let edges = materialize(
        &plan,
        TargetPool::Shared(&mut pool),
        Some(&exclude),
        options(false, false),
        &mut rng,
    )
    .expect("two unexcluded targets remain");
    assert_eq!(edges.get(&0), Some(&vec![2, 4]));
}

#[rstest]
#[case::sequential(false)]
#[case::randomized(true)]
fn unique_pool_exhaustion_is_reported(#[case] randomized: bool, mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(0, 2), (1, 2)]);
    let mut pool = vec![1, 2, 3];
    let err = materialize(
        &plan,
        TargetPool::Shared(&mut pool),
        None,
        options(true, randomized),
        &mut rng,
    )
    .expect_err("three targets cannot serve four unique endpoints");
    assert_eq!(
        err,
        MaterializeError::InsufficientTargets {
            source_id: 1,
            requested: 2,
            available: 1,
        }
    );
    assert_eq!(err.code(), "MATERIALIZE_INSUFFICIENT_TARGETS");
}

#[rstest]
fn randomized_draws_stay_in_pool_without_repeats(mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(5, 6), (6, 6)]);
    let mut pool: Vec<u64> = (0..8).collect();
    let edges = materialize(
        &plan,
        TargetPool::Shared(&mut pool),
        None,
        options(false, true),
        &mut rng,
    )
    .expect("each source fits the pool");

    for targets in edges.values() {
        let distinct: HashSet<_> = targets.iter().collect();
        assert_eq!(distinct.len(), targets.len());
        assert!(targets.iter().all(|target| *target < 8));
    }
}

#[rstest]
fn per_source_pools_are_independent(mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(0, 2), (1, 2)]);
    let provider = |source: u64| vec![source * 10, source * 10 + 1, source * 10 + 2];
    let edges = materialize(
        &plan,
        TargetPool::PerSource(&provider),
        None,
        options(false, false),
        &mut rng,
    )
    .expect("each source has its own pool");
    assert_eq!(edges.get(&0), Some(&vec![0, 1]));
    assert_eq!(edges.get(&1), Some(&vec![10, 11]));
}

#[rstest]
fn per_source_unique_skips_targets_claimed_earlier(mut rng: SmallRng) {
    let plan = Allocation::from_counts(vec![(0, 2), (1, 2)]);
    let provider = |_: u64| vec![7, 8, 9, 10];
    let edges = materialize(
        &plan,
        TargetPool::PerSource(&provider),
        None,
        options(true, false),
        &mut rng,
    )
    .expect("four targets serve four endpoints");
    assert_eq!(edges.get(&0), Some(&vec![7, 8]));
    assert_eq!(edges.get(&1), Some(&vec![9, 10]));
}

#[test]
fn same_seed_same_binding() {
    let plan = Allocation::from_counts((0..20).map(|source| (source, 3)).collect());
    let run = |seed: u64| {
        let mut pool: Vec<u64> = (1_000..1_080).collect();
        materialize(
            &plan,
            TargetPool::Shared(&mut pool),
            None,
            options(true, true),
            &mut SmallRng::seed_from_u64(seed),
        )
    };
    assert_eq!(run(12), run(12));
}

proptest! {
    #![proptest_config(suite_proptest_config(96))]

    #[test]
    fn unique_binding_never_reuses_a_target(
        counts in proptest::collection::vec(0_usize..6, 1..20),
        slack in 0_usize..10,
        randomized in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let demand: usize = counts.iter().sum();
        let pool_len = u64::try_from(demand + slack)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        let original: Vec<u64> = (500..500 + pool_len).collect();
        let mut pool = original.clone();
        let plan = Allocation::from_counts(
            counts.iter().enumerate().map(|(index, count)| (index as u64, *count)).collect(),
        );
        let mut rng = SmallRng::seed_from_u64(seed);
        let edges = materialize(
            &plan,
            TargetPool::Shared(&mut pool),
            None,
            options(true, randomized),
            &mut rng,
        )
        .map_err(|err| TestCaseError::fail(err.to_string()))?;

        let mut seen = HashSet::new();
        for (source, targets) in &edges {
            prop_assert_eq!(Some(targets.len()), plan.count_for(*source));
            for target in targets {
                prop_assert!(original.contains(target));
                prop_assert!(seen.insert(*target), "target {} reused", target);
            }
        }
        prop_assert_eq!(pool.len(), slack);
        prop_assert!(pool.iter().all(|target| !seen.contains(target)));
    }
}
