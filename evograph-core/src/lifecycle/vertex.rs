use std::collections::BTreeSet;

use crate::id_range::{IdRange, VertexId};

/// Outcome of [`VertexLifecycle::remove`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Removal {
    /// Identities moved to `removed`, oldest first.
    pub ids: Vec<VertexId>,
    /// Removals that were asked for.
    pub requested: usize,
}

impl Removal {
    /// `true` when fewer identities were active than requested.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.ids.len() < self.requested
    }
}

/// Lifecycle of a vertex population.
///
/// Identities leave the available range from its head, so ascending order in
/// `active` is also creation order and FIFO removal pops the smallest ids.
///
/// # Examples
/// ```
/// use evograph_core::{IdRange, VertexLifecycle};
///
/// let range = IdRange::with_count(0, 10).expect("non-empty range");
/// let mut life = VertexLifecycle::new(range);
/// assert_eq!(life.add(4), vec![0, 1, 2, 3]);
/// assert_eq!(life.remove(2).ids, vec![0, 1]);
/// assert_eq!(life.active_len(), 2);
/// assert_eq!(life.available().map(|r| r.min()), Some(4));
/// ```
#[derive(Clone, Debug)]
pub struct VertexLifecycle {
    range: IdRange,
    next: Option<VertexId>,
    active: BTreeSet<VertexId>,
    removed: BTreeSet<VertexId>,
}

impl VertexLifecycle {
    /// Starts with every identity of `range` not yet available.
    #[must_use]
    pub fn new(range: IdRange) -> Self {
        Self {
            range,
            next: Some(range.min()),
            active: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// The identity range the tracker was created with.
    #[must_use]
    #[rustfmt::skip]
    pub const fn range(&self) -> IdRange { self.range }

    /// Identities that have not been created yet.
    #[must_use]
    pub fn available(&self) -> Option<IdRange> {
        let next = self.next?;
        let count = usize::try_from(self.range.max() - next).ok()?.checked_add(1)?;
        IdRange::with_count(next, count)
    }

    /// Activates up to `n` identities from the head of the available range.
    ///
    /// Returns the activated identities; fewer than `n` once the range is
    /// exhausted.
    pub fn add(&mut self, n: usize) -> Vec<VertexId> {
        let mut added = Vec::with_capacity(n);
        while added.len() < n {
            let Some(id) = self.next else {
                break;
            };
            self.next = (id < self.range.max()).then(|| id + 1);
            self.active.insert(id);
            added.push(id);
        }
        added
    }

    /// Removes the `n` oldest active identities.
    pub fn remove(&mut self, n: usize) -> Removal {
        let mut ids = Vec::with_capacity(n.min(self.active.len()));
        while ids.len() < n {
            let Some(id) = self.active.pop_first() else {
                break;
            };
            self.removed.insert(id);
            ids.push(id);
        }
        Removal { ids, requested: n }
    }

    /// Removes the listed identities that are currently active.
    ///
    /// Identities that are not active are ignored. Returns the removed ones in
    /// ascending order.
    pub fn remove_ids<I>(&mut self, ids: I) -> Vec<VertexId>
    where
        I: IntoIterator<Item = VertexId>,
    {
        let mut removed: Vec<VertexId> = ids
            .into_iter()
            .filter(|id| self.active.remove(id))
            .collect();
        removed.sort_unstable();
        self.removed.extend(removed.iter().copied());
        removed
    }

    /// Active identities in creation order.
    #[must_use]
    #[rustfmt::skip]
    pub const fn active(&self) -> &BTreeSet<VertexId> { &self.active }

    /// Removed identities.
    #[must_use]
    #[rustfmt::skip]
    pub const fn removed(&self) -> &BTreeSet<VertexId> { &self.removed }

    /// Whether `id` is currently active.
    #[must_use]
    pub fn is_active(&self, id: VertexId) -> bool {
        self.active.contains(&id)
    }

    /// Number of active identities.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of removed identities.
    #[must_use]
    pub fn removed_len(&self) -> usize {
        self.removed.len()
    }

    /// Identities created so far, active or removed.
    #[must_use]
    pub fn created(&self) -> usize {
        self.active.len() + self.removed.len()
    }

    /// Checks that every identity of the range sits in exactly one partition.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        let available = self.available();
        let disjoint = self.active.is_disjoint(&self.removed);
        let in_range = self
            .active
            .iter()
            .chain(&self.removed)
            .all(|id| self.range.contains(*id) && available.is_none_or(|free| !free.contains(*id)));
        let free = available.map_or(0, |free| free.count());
        let covered = self.created() + free == self.range.count();
        disjoint && in_range && covered
    }

    /// Drops the tracker, keeping the active and removed sets.
    #[must_use]
    pub fn into_parts(self) -> (BTreeSet<VertexId>, BTreeSet<VertexId>) {
        (self.active, self.removed)
    }
}
