//! Edge target-count allocation.
//!
//! Decides how many edge endpoints every source receives before any concrete
//! target is chosen. The allocator honours a global total, per-source
//! `[min, max]` bounds and a per-source capacity (the number of distinct
//! targets the source could still host). It is a pure function of its inputs
//! and the supplied random generator.
//!
//! The sweep adds `uniform(0, cap)` to every source until the total is met.
//! During the first rounds the cap is damped so the earliest sources touched
//! do not absorb the whole budget.

use rand::Rng;
use tracing::{error, instrument};

use crate::id_range::VertexId;

/// Rounds during which the per-round cap is damped.
const DAMPED_ROUNDS: usize = 4;
/// Caps below this value are never damped.
const DAMPING_THRESHOLD: usize = 10;
/// Denominator of the damping fraction `round / DAMPING_DENOMINATOR`.
const DAMPING_DENOMINATOR: usize = 10;

/// Errors returned by [`allocate`].
#[derive(Clone, Debug, Eq, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum AllocationError {
    /// The sources ran out of capacity before the total was reached.
    #[error("cannot allocate {requested} endpoints: sources are saturated after {allocated}")]
    Infeasible {
        /// Requested total.
        requested: usize,
        /// Amount placed before every source was saturated.
        allocated: usize,
    },
    /// A source must host more distinct targets than it can reach.
    #[error("source {source_id} must host {requested} distinct targets but only {available} exist")]
    InsufficientTargets {
        /// Source that cannot be satisfied.
        source_id: VertexId,
        /// Count the source is asked to host.
        requested: usize,
        /// Distinct targets available to the source.
        available: usize,
    },
}

impl AllocationError {
    /// Returns a stable, machine-readable error code for the variant.
    #[must_use]
    pub const fn code(&self) -> AllocationErrorCode {
        match self {
            Self::Infeasible { .. } => AllocationErrorCode::Infeasible,
            Self::InsufficientTargets { .. } => AllocationErrorCode::InsufficientTargets,
        }
    }
}

/// Machine-readable error codes for [`AllocationError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AllocationErrorCode {
    /// The sources ran out of capacity before the total was reached.
    Infeasible,
    /// A source must host more distinct targets than it can reach.
    InsufficientTargets,
}

impl AllocationErrorCode {
    /// Returns the symbolic identifier for logging and metrics surfaces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Infeasible => "ALLOCATION_INFEASIBLE",
            Self::InsufficientTargets => "ALLOCATION_INSUFFICIENT_TARGETS",
        }
    }
}

/// Inputs of a single allocation.
#[derive(Clone, Copy, Debug)]
pub struct AllocationRequest<'a> {
    /// Endpoints to spread over the sources.
    pub total: usize,
    /// Sources in sweep order.
    pub sources: &'a [VertexId],
    /// Per-source floor.
    pub min: usize,
    /// Per-source ceiling; `None` leaves sources bounded by capacity only.
    pub max: Option<usize>,
    /// Whether every endpoint must be a distinct target.
    pub unique: bool,
}

/// Per-source count plan produced by [`allocate`].
///
/// Entries keep the order of [`AllocationRequest::sources`]; sources that
/// received nothing are kept with a zero count.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Allocation {
    entries: Vec<(VertexId, usize)>,
    total: usize,
    floor_satisfied: bool,
}

impl Allocation {
    /// Builds an allocation from explicit `(source, count)` pairs.
    ///
    /// # Examples
    /// ```
    /// use evograph_core::Allocation;
    ///
    /// let plan = Allocation::from_counts(vec![(4, 2), (5, 0), (6, 1)]);
    /// assert_eq!(plan.total(), 3);
    /// assert_eq!(plan.count_for(6), Some(1));
    /// ```
    #[must_use]
    pub fn from_counts(entries: Vec<(VertexId, usize)>) -> Self {
        let total = entries.iter().map(|(_, count)| count).sum();
        Self {
            entries,
            total,
            floor_satisfied: true,
        }
    }

    fn zeroed(sources: &[VertexId]) -> Self {
        Self::from_counts(sources.iter().map(|&source| (source, 0)).collect())
    }

    /// Iterates `(source, count)` pairs in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = (VertexId, usize)> + '_ {
        self.entries.iter().copied()
    }

    /// Sum of all counts.
    #[must_use]
    #[rustfmt::skip]
    pub fn total(&self) -> usize { self.total }

    /// Count assigned to `source`, if the source took part.
    #[must_use]
    pub fn count_for(&self, source: VertexId) -> Option<usize> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == source)
            .map(|(_, count)| *count)
    }

    /// Number of sources in the plan.
    #[must_use]
    #[rustfmt::skip]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns `true` when no source took part.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// `false` when the total was too small to give every source its floor.
    #[must_use]
    #[rustfmt::skip]
    pub fn floor_satisfied(&self) -> bool { self.floor_satisfied }
}

/// Spreads `request.total` endpoints over `request.sources`.
///
/// `capacity_of` reports how many more distinct targets a source could host;
/// together with `max` it bounds every source's count.
///
/// When `total < sources * min` the floor cannot be honoured: the error is
/// logged, the floor is seeded into as many sources as the budget covers and
/// [`Allocation::floor_satisfied`] reports `false`. The plan still sums to
/// `total`. A non-unique source whose capacity or `max` is below `min` is
/// seeded up to that bound, logged and likewise reported through
/// [`Allocation::floor_satisfied`].
///
/// # Errors
/// Returns [`AllocationError::InsufficientTargets`] when `unique` is set and
/// a source's capacity is below the floor it must host, and
/// [`AllocationError::Infeasible`] when every source is saturated before the
/// total is reached (including an empty source list with a non-zero total).
///
/// # Examples
/// ```
/// use evograph_core::{AllocationRequest, allocate};
/// use rand::{SeedableRng, rngs::SmallRng};
///
/// let sources: Vec<u64> = (0..10).collect();
/// let request = AllocationRequest {
///     total: 100,
///     sources: &sources,
///     min: 5,
///     max: Some(20),
///     unique: true,
/// };
/// let mut rng = SmallRng::seed_from_u64(7);
/// let plan = allocate(&request, |_| 20, &mut rng).expect("allocation fits");
/// assert_eq!(plan.total(), 100);
/// assert!(plan.iter().all(|(_, count)| (5..=20).contains(&count)));
/// ```
#[instrument(
    name = "allocator.allocate",
    level = "debug",
    err,
    skip(request, capacity_of, rng),
    fields(total = request.total, sources = request.sources.len(), min = request.min),
)]
pub fn allocate<F, R>(
    request: &AllocationRequest<'_>,
    capacity_of: F,
    rng: &mut R,
) -> Result<Allocation, AllocationError>
where
    F: Fn(VertexId) -> usize,
    R: Rng + ?Sized,
{
    let AllocationRequest {
        total,
        sources,
        min,
        max,
        unique,
    } = *request;

    if total == 0 {
        return Ok(Allocation::zeroed(sources));
    }
    if sources.is_empty() {
        return Err(AllocationError::Infeasible {
            requested: total,
            allocated: 0,
        });
    }

    let ceiling = max.unwrap_or(usize::MAX);
    let capacities: Vec<usize> = sources.iter().map(|&source| capacity_of(source)).collect();
    let limits: Vec<usize> = capacities.iter().map(|&cap| cap.min(ceiling)).collect();
    let mut counts = vec![0_usize; sources.len()];
    let mut remaining = total;

    let floor = sources.len().saturating_mul(min);
    let mut floor_satisfied = floor <= total;
    if !floor_satisfied {
        error!(
            total,
            floor,
            sources = sources.len(),
            min,
            "per-source minimum exceeds the requested total"
        );
    }
    if min > 0 {
        let seeded = seed_floor(
            sources,
            &capacities,
            &limits,
            &mut counts,
            &mut remaining,
            min,
            unique,
        )?;
        floor_satisfied &= seeded;
    }

    let sources_len = sources.len();
    let cap = ceiling.min(total.div_euclid(sources_len));
    let step_cap = cap.saturating_sub(min).max(1);

    let mut round = 0_usize;
    while remaining > 0 {
        let headroom = counts
            .iter()
            .zip(&limits)
            .fold(0_usize, |acc, (count, limit)| {
                acc.saturating_add(limit.saturating_sub(*count))
            });
        if headroom == 0 {
            return Err(AllocationError::Infeasible {
                requested: total,
                allocated: total - remaining,
            });
        }
        round += 1;
        let round_cap = damped_cap(step_cap, round);
        for (count, limit) in counts.iter_mut().zip(&limits) {
            if remaining == 0 {
                break;
            }
            let room = limit.saturating_sub(*count);
            if room == 0 {
                continue;
            }
            let add = rng.gen_range(0..=round_cap).min(room).min(remaining);
            *count += add;
            remaining -= add;
        }
    }

    Ok(Allocation {
        entries: sources.iter().copied().zip(counts).collect(),
        total,
        floor_satisfied,
    })
}

fn seed_floor(
    sources: &[VertexId],
    capacities: &[usize],
    limits: &[usize],
    counts: &mut [usize],
    remaining: &mut usize,
    min: usize,
    unique: bool,
) -> Result<bool, AllocationError> {
    let mut complete = true;
    for (((source, capacity), limit), count) in sources
        .iter()
        .zip(capacities)
        .zip(limits)
        .zip(counts.iter_mut())
    {
        let wanted = min.min(*remaining);
        if wanted == 0 {
            break;
        }
        if unique && *capacity < wanted {
            return Err(AllocationError::InsufficientTargets {
                source_id: *source,
                requested: wanted,
                available: *capacity,
            });
        }
        let seeded = wanted.min(*limit);
        if seeded < wanted {
            error!(
                source_id = *source,
                requested = wanted,
                available = seeded,
                "source cannot host the per-source minimum"
            );
            complete = false;
        }
        *count = seeded;
        *remaining -= seeded;
    }
    Ok(complete)
}

fn damped_cap(step_cap: usize, round: usize) -> usize {
    if round <= DAMPED_ROUNDS && step_cap >= DAMPING_THRESHOLD {
        step_cap.saturating_mul(round).div_euclid(DAMPING_DENOMINATOR).max(1)
    } else {
        step_cap
    }
}

#[cfg(test)]
mod tests;
