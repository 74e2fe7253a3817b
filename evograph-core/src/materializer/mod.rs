//! Binding concrete targets to an allocation.
//!
//! Given the per-source counts produced by [`crate::allocate`], the
//! materializer chooses which target ids every source receives. Targets come
//! either from one pool shared by all sources or from a pool computed per
//! source. In unique mode a target is handed to at most one source per call,
//! and a shared pool shrinks by the targets it gave away so callers can carry
//! it into the next call.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use tracing::instrument;

use crate::{allocator::Allocation, id_range::VertexId};

/// Source id to ordered target ids.
pub type Adjacency = BTreeMap<VertexId, Vec<VertexId>>;

/// Errors returned by [`materialize`].
#[derive(Clone, Debug, Eq, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum MaterializeError {
    /// The pool ran out of distinct targets before a source was satisfied.
    #[error("source {source_id} needs {requested} targets but only {available} distinct ones remain")]
    InsufficientTargets {
        /// Source that could not be satisfied.
        source_id: VertexId,
        /// Count the source had to receive.
        requested: usize,
        /// Distinct targets that were still available to it.
        available: usize,
    },
}

impl MaterializeError {
    /// Returns the symbolic identifier for logging and metrics surfaces.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientTargets { .. } => "MATERIALIZE_INSUFFICIENT_TARGETS",
        }
    }
}

/// Where targets are drawn from.
pub enum TargetPool<'a> {
    /// One pool shared by all sources, in significant order. In unique mode
    /// the targets handed out are removed from it.
    Shared(&'a mut Vec<VertexId>),
    /// A pool computed for every source by an external provider.
    PerSource(&'a dyn Fn(VertexId) -> Vec<VertexId>),
}

/// Flags controlling [`materialize`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MaterializeOptions {
    /// A target may be handed to at most one source.
    pub unique: bool,
    /// Draw targets uniformly at random instead of in pool order.
    pub randomized: bool,
}

/// Binds `allocation` to concrete targets.
///
/// `exclude` lists, per source, targets the source must not receive again
/// (typically the targets it already holds). They seed the per-source used
/// set, so a returned list never repeats a target nor re-adds an excluded one.
///
/// # Errors
/// Returns [`MaterializeError::InsufficientTargets`] when a pool holds fewer
/// usable targets than a source's count.
///
/// # Examples
/// ```
/// use evograph_core::{Allocation, MaterializeOptions, TargetPool, materialize};
/// use rand::{SeedableRng, rngs::SmallRng};
///
/// let plan = Allocation::from_counts(vec![(0, 2), (1, 1)]);
/// let mut pool = vec![10, 11, 12, 13];
/// let options = MaterializeOptions { unique: true, randomized: false };
/// let edges = materialize(
///     &plan,
///     TargetPool::Shared(&mut pool),
///     None,
///     options,
///     &mut SmallRng::seed_from_u64(0),
/// )?;
/// assert_eq!(edges[&0], vec![10, 11]);
/// assert_eq!(edges[&1], vec![12]);
/// assert_eq!(pool, vec![13]);
/// # Ok::<(), evograph_core::MaterializeError>(())
/// ```
#[instrument(
    name = "materializer.materialize",
    level = "debug",
    err,
    skip(allocation, pool, exclude, rng),
    fields(total = allocation.total(), unique = options.unique, randomized = options.randomized),
)]
pub fn materialize<R>(
    allocation: &Allocation,
    pool: TargetPool<'_>,
    exclude: Option<&Adjacency>,
    options: MaterializeOptions,
    rng: &mut R,
) -> Result<Adjacency, MaterializeError>
where
    R: Rng + ?Sized,
{
    let excluded = |source: VertexId| -> HashSet<VertexId> {
        exclude
            .and_then(|lists| lists.get(&source))
            .map(|targets| targets.iter().copied().collect())
            .unwrap_or_default()
    };

    match pool {
        TargetPool::Shared(pool) => {
            let mut draw = SharedDraw::new(pool, options);
            let mut edges = Adjacency::new();
            for (source, count) in allocation.iter().filter(|(_, count)| *count > 0) {
                let targets = draw.take(source, count, excluded(source), rng)?;
                edges.insert(source, targets);
            }
            draw.finish();
            Ok(edges)
        }
        TargetPool::PerSource(provider) => {
            let mut claimed = HashSet::new();
            let mut edges = Adjacency::new();
            for (source, count) in allocation.iter().filter(|(_, count)| *count > 0) {
                let candidates: Vec<VertexId> = provider(source)
                    .into_iter()
                    .filter(|target| !claimed.contains(target))
                    .collect();
                let mut used = excluded(source);
                let targets = if options.randomized {
                    draw_random(source, &candidates, count, &mut used, rng)?
                } else {
                    draw_in_order(source, &candidates, count, &mut used)?
                };
                if options.unique {
                    claimed.extend(targets.iter().copied());
                }
                edges.insert(source, targets);
            }
            Ok(edges)
        }
    }
}

/// Draw state over a shared pool.
struct SharedDraw<'a> {
    pool: &'a mut Vec<VertexId>,
    options: MaterializeOptions,
    /// Targets consumed by earlier sources of this call (unique mode).
    taken: HashSet<VertexId>,
    /// Sequential mode: position the next source starts scanning from.
    cursor: usize,
}

impl<'a> SharedDraw<'a> {
    fn new(pool: &'a mut Vec<VertexId>, options: MaterializeOptions) -> Self {
        Self {
            pool,
            options,
            taken: HashSet::new(),
            cursor: 0,
        }
    }

    fn take<R: Rng + ?Sized>(
        &mut self,
        source: VertexId,
        count: usize,
        mut used: HashSet<VertexId>,
        rng: &mut R,
    ) -> Result<Vec<VertexId>, MaterializeError> {
        if self.options.unique {
            self.compact();
            used.extend(self.taken.iter().copied());
        }
        let targets = if self.options.randomized {
            draw_random(source, self.pool.as_slice(), count, &mut used, rng)?
        } else {
            self.take_in_order(source, count, &mut used)?
        };
        if self.options.unique {
            self.taken.extend(targets.iter().copied());
        }
        Ok(targets)
    }

    /// Scans the pool cyclically from the cursor, skipping used targets.
    fn take_in_order(
        &mut self,
        source: VertexId,
        count: usize,
        used: &mut HashSet<VertexId>,
    ) -> Result<Vec<VertexId>, MaterializeError> {
        let len = self.pool.len();
        let mut targets = Vec::with_capacity(count);
        let mut scanned = 0;
        while targets.len() < count && scanned < len {
            let index = (self.cursor + scanned).rem_euclid(len);
            scanned += 1;
            if let Some(&target) = self.pool.get(index)
                && used.insert(target)
            {
                targets.push(target);
            }
        }
        if targets.len() < count {
            return Err(MaterializeError::InsufficientTargets {
                source_id: source,
                requested: count,
                available: targets.len(),
            });
        }
        if len > 0 {
            self.cursor = (self.cursor + scanned).rem_euclid(len);
        }
        Ok(targets)
    }

    /// Drops consumed targets from the pool once they dominate it.
    fn compact(&mut self) {
        if self.taken.len().saturating_mul(2) > self.pool.len() {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.taken.is_empty() {
            return;
        }
        let taken = &self.taken;
        self.pool.retain(|target| !taken.contains(target));
        self.taken.clear();
        self.cursor = 0;
    }

    /// Leaves the caller's pool without the targets handed out in unique mode.
    fn finish(mut self) {
        if self.options.unique {
            self.flush();
        }
    }
}

fn draw_in_order(
    source: VertexId,
    candidates: &[VertexId],
    count: usize,
    used: &mut HashSet<VertexId>,
) -> Result<Vec<VertexId>, MaterializeError> {
    let targets: Vec<VertexId> = candidates
        .iter()
        .copied()
        .filter(|target| used.insert(*target))
        .take(count)
        .collect();
    if targets.len() < count {
        return Err(MaterializeError::InsufficientTargets {
            source_id: source,
            requested: count,
            available: targets.len(),
        });
    }
    Ok(targets)
}

/// Draws `count` targets uniformly; a collision walks the pool cyclically
/// from the drawn index to the next unused target.
fn draw_random<R: Rng + ?Sized>(
    source: VertexId,
    candidates: &[VertexId],
    count: usize,
    used: &mut HashSet<VertexId>,
    rng: &mut R,
) -> Result<Vec<VertexId>, MaterializeError> {
    let len = candidates.len();
    let mut targets = Vec::with_capacity(count);
    while targets.len() < count {
        let start = if len == 0 { 0 } else { rng.gen_range(0..len) };
        let found = (0..len)
            .map(|offset| (start + offset).rem_euclid(len))
            .filter_map(|index| candidates.get(index).copied())
            .find(|target| !used.contains(target));
        let Some(target) = found else {
            return Err(MaterializeError::InsufficientTargets {
                source_id: source,
                requested: count,
                available: targets.len(),
            });
        };
        used.insert(target);
        targets.push(target);
    }
    Ok(targets)
}

#[cfg(test)]
mod tests;
