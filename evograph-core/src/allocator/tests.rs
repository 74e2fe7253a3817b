//! Unit and property tests for the count allocator.

use proptest::prelude::*;
use rand::{SeedableRng, rngs::SmallRng};
use rstest::rstest;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

use evograph_test_support::tracing::RecordingLayer;

use crate::test_utils::suite_proptest_config;

use super::{AllocationError, AllocationRequest, allocate, damped_cap};

fn sources(count: u64) -> Vec<u64> {
    (0..count).collect()
}

#[test]
fn meets_total_within_bounds() {
    let ids = sources(10);
    let request = AllocationRequest {
        total: 100,
        sources: &ids,
        min: 5,
        max: Some(20),
        unique: true,
    };
    let mut rng = SmallRng::seed_from_u64(42);
    let plan = allocate(&request, |_| 20, &mut rng).expect("allocation must fit");

    assert_eq!(plan.total(), 100);
    assert_eq!(plan.iter().map(|(_, count)| count).sum::<usize>(), 100);
    assert_eq!(plan.len(), 10);
    for (source, count) in plan.iter() {
        assert!((5..=20).contains(&count), "source {source} got {count}");
    }
    assert!(plan.floor_satisfied());
}

#[test]
fn exact_fit_saturates_every_source() {
    let ids = sources(4);
    let request = AllocationRequest {
        total: 12,
        sources: &ids,
        min: 0,
        max: Some(3),
        unique: false,
    };
    let mut rng = SmallRng::seed_from_u64(1);
    let plan = allocate(&request, |_| usize::MAX, &mut rng).expect("exact fit must succeed");
    assert!(plan.iter().all(|(_, count)| count == 3));
}

#[test]
fn keeps_source_order() {
    let ids = vec![9, 3, 7];
    let request = AllocationRequest {
        total: 6,
        sources: &ids,
        min: 1,
        max: None,
        unique: false,
    };
    let mut rng = SmallRng::seed_from_u64(3);
    let plan = allocate(&request, |_| 10, &mut rng).expect("allocation must fit");
    let order: Vec<u64> = plan.iter().map(|(source, _)| source).collect();
    assert_eq!(order, ids);
}

#[test]
fn zero_total_yields_zero_counts() {
    let ids = sources(3);
    let request = AllocationRequest {
        total: 0,
        sources: &ids,
        min: 2,
        max: Some(4),
        unique: true,
    };
    let mut rng = SmallRng::seed_from_u64(0);
    let plan = allocate(&request, |_| 0, &mut rng).expect("zero total never fails");
    assert_eq!(plan.total(), 0);
    assert!(plan.iter().all(|(_, count)| count == 0));
}

#[test]
fn rejects_total_without_sources() {
    let request = AllocationRequest {
        total: 5,
        sources: &[],
        min: 0,
        max: None,
        unique: false,
    };
    let mut rng = SmallRng::seed_from_u64(0);
    let err = allocate(&request, |_| 10, &mut rng).expect_err("no sources must fail");
    assert_eq!(
        err,
        AllocationError::Infeasible {
            requested: 5,
            allocated: 0
        }
    );
}

#[rstest]
#[case::max_bound(Some(2), 100, 6)]
#[case::capacity_bound(None, 2, 6)]
fn reports_infeasible_when_sources_saturate(
    #[case] max: Option<usize>,
    #[case] capacity: usize,
    #[case] allocated: usize,
) {
    let ids = sources(3);
    let request = AllocationRequest {
        total: 10,
        sources: &ids,
        min: 0,
        max,
        unique: false,
    };
    let mut rng = SmallRng::seed_from_u64(11);
    let err = allocate(&request, |_| capacity, &mut rng).expect_err("saturation must fail");
    assert_eq!(
        err,
        AllocationError::Infeasible {
            requested: 10,
            allocated
        }
    );
    assert_eq!(err.code().as_str(), "ALLOCATION_INFEASIBLE");
}

#[test]
fn unique_floor_fails_fast_on_small_pool() {
    let ids = sources(3);
    let request = AllocationRequest {
        total: 9,
        sources: &ids,
        min: 3,
        max: Some(5),
        unique: true,
    };
    let mut rng = SmallRng::seed_from_u64(5);
    let err = allocate(&request, |source| if source == 1 { 2 } else { 5 }, &mut rng)
        .expect_err("pool smaller than floor must fail");
    assert_eq!(
        err,
        AllocationError::InsufficientTargets {
            source_id: 1,
            requested: 3,
            available: 2,
        }
    );
}

#[test]
fn floor_above_budget_is_logged_and_never_over_allocates() {
    let ids = sources(5);
    let request = AllocationRequest {
        total: 7,
        sources: &ids,
        min: 2,
        max: Some(4),
        unique: false,
    };
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let mut rng = SmallRng::seed_from_u64(9);

    let plan = tracing::subscriber::with_default(subscriber, || {
        allocate(&request, |_| 10, &mut rng)
    })
    .expect("floor overflow is not fatal");

    assert_eq!(plan.total(), 7);
    assert!(!plan.floor_satisfied());
    let counts: Vec<usize> = plan.iter().map(|(_, count)| count).collect();
    assert_eq!(counts, vec![2, 2, 2, 1, 0]);

    let events = layer.events();
    assert!(events.iter().any(|event| {
        event.level == Level::ERROR
            && event
                .fields
                .get("message")
                .is_some_and(|value| value == "per-source minimum exceeds the requested total")
    }));
}

#[test]
fn shared_floor_above_capacity_is_reported() {
    let ids = sources(4);
    let request = AllocationRequest {
        total: 12,
        sources: &ids,
        min: 3,
        max: Some(5),
        unique: false,
    };
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let mut rng = SmallRng::seed_from_u64(3);

    let plan = tracing::subscriber::with_default(subscriber, || {
        allocate(&request, |source| if source == 0 { 1 } else { 5 }, &mut rng)
    })
    .expect("a short non-unique source is not fatal");

    assert_eq!(plan.total(), 12);
    assert_eq!(plan.count_for(0), Some(1));
    assert!(!plan.floor_satisfied());
    assert!(plan.iter().skip(1).all(|(_, count)| (3..=5).contains(&count)));
    assert!(layer.events().iter().any(|event| {
        event.level == Level::ERROR
            && event.fields.get("source_id").map(String::as_str) == Some("0")
            && event
                .fields
                .get("message")
                .is_some_and(|value| value == "source cannot host the per-source minimum")
    }));
}

#[test]
fn same_seed_same_plan() {
    let ids = sources(25);
    let request = AllocationRequest {
        total: 400,
        sources: &ids,
        min: 1,
        max: Some(40),
        unique: false,
    };
    let first = allocate(&request, |_| 40, &mut SmallRng::seed_from_u64(77))
        .expect("allocation must fit");
    let second = allocate(&request, |_| 40, &mut SmallRng::seed_from_u64(77))
        .expect("allocation must fit");
    assert_eq!(first, second);
}

#[rstest]
#[case::small_cap_untouched(5, 1, 5)]
#[case::first_round_damped(100, 1, 10)]
#[case::fourth_round_damped(100, 4, 40)]
#[case::fifth_round_released(100, 5, 100)]
#[case::never_zero(10, 1, 1)]
fn damping_limits_early_rounds(#[case] cap: usize, #[case] round: usize, #[case] expected: usize) {
    assert_eq!(damped_cap(cap, round), expected);
}

#[test]
fn span_records_request_shape() {
    let ids = sources(4);
    let request = AllocationRequest {
        total: 8,
        sources: &ids,
        min: 1,
        max: None,
        unique: false,
    };
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let mut rng = SmallRng::seed_from_u64(2);
    tracing::subscriber::with_default(subscriber, || allocate(&request, |_| 8, &mut rng))
        .expect("allocation must fit");

    let spans = layer.spans();
    let span = spans
        .iter()
        .find(|span| span.name == "allocator.allocate")
        .expect("allocator span must exist");
    assert_eq!(span.fields.get("total"), Some(&"8".to_owned()));
    assert_eq!(span.fields.get("sources"), Some(&"4".to_owned()));
}

proptest! {
    #![proptest_config(suite_proptest_config(128))]

    #[test]
    fn allocation_conserves_total(
        source_count in 1_u64..40,
        min in 0_usize..4,
        spread in 0_usize..12,
        capacity_slack in 0_usize..8,
        fill in 0_u32..=100,
        seed in any::<u64>(),
    ) {
        let ids = sources(source_count);
        let max = min + spread;
        let capacity = max + capacity_slack;
        let source_len = ids.len();
        let floor = source_len * min;
        let ceiling = source_len * max;
        let total = floor + (ceiling - floor) * fill as usize / 100;
        let request = AllocationRequest {
            total,
            sources: &ids,
            min,
            max: Some(max),
            unique: true,
        };
        let mut rng = SmallRng::seed_from_u64(seed);
        let plan = allocate(&request, |_| capacity, &mut rng)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        prop_assert_eq!(plan.total(), total);
        prop_assert_eq!(plan.iter().map(|(_, count)| count).sum::<usize>(), total);
        for (_, count) in plan.iter() {
            prop_assert!(count >= min && count <= max);
            prop_assert!(count <= capacity);
        }
    }

    #[test]
    fn allocation_respects_varying_capacity(
        capacities in proptest::collection::vec(0_usize..10, 1..30),
        fill in 0_u32..=100,
        seed in any::<u64>(),
    ) {
        let ids: Vec<u64> = (0..capacities.len() as u64).collect();
        let reachable: usize = capacities.iter().sum();
        let total = reachable * fill as usize / 100;
        let request = AllocationRequest {
            total,
            sources: &ids,
            min: 0,
            max: None,
            unique: true,
        };
        let capacity_of = |source: u64| capacities[source as usize];
        let mut rng = SmallRng::seed_from_u64(seed);
        let plan = allocate(&request, capacity_of, &mut rng)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        prop_assert_eq!(plan.total(), total);
        for (source, count) in plan.iter() {
            prop_assert!(count <= capacities[source as usize]);
        }
    }
}
