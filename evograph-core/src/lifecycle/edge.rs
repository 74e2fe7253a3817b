use std::collections::{BTreeSet, VecDeque};

use crate::{id_range::VertexId, materializer::Adjacency};

/// Lifecycle of an edge population, keyed by source id.
///
/// A `(source, target)` pair is created at most once, so a removed edge never
/// becomes active again. Removal order follows creation order through a FIFO
/// queue whose stale entries are skipped lazily.
///
/// # Examples
/// ```
/// use evograph_core::EdgeLifecycle;
///
/// let mut edges = EdgeLifecycle::default();
/// edges.add(1, &[10, 11]);
/// edges.add(2, &[12]);
/// assert_eq!(edges.remove_source(1), vec![10, 11]);
/// assert_eq!(edges.edge_count(), 1);
/// assert!(edges.active().get(&1).is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct EdgeLifecycle {
    active: Adjacency,
    removed: Adjacency,
    queue: VecDeque<(VertexId, VertexId)>,
    created: usize,
    removed_count: usize,
}

impl EdgeLifecycle {
    /// Appends `targets` to the list of `source`.
    pub fn add(&mut self, source: VertexId, targets: &[VertexId]) {
        if targets.is_empty() {
            return;
        }
        self.active
            .entry(source)
            .or_default()
            .extend_from_slice(targets);
        self.queue
            .extend(targets.iter().map(|&target| (source, target)));
        self.created += targets.len();
    }

    /// Merges a materialised batch, source by source.
    pub fn add_all(&mut self, batch: &Adjacency) {
        for (&source, targets) in batch {
            self.add(source, targets);
        }
    }

    /// Removes exactly the listed targets from `source`.
    ///
    /// Targets `source` does not hold are ignored. Returns the removed ones in
    /// list order; the key is deleted once its list is empty.
    pub fn remove(&mut self, source: VertexId, targets: &[VertexId]) -> Vec<VertexId> {
        let Some(list) = self.active.get_mut(&source) else {
            return Vec::new();
        };
        let wanted: BTreeSet<VertexId> = targets.iter().copied().collect();
        let mut taken = Vec::new();
        list.retain(|target| {
            let hit = wanted.contains(target);
            if hit {
                taken.push(*target);
            }
            !hit
        });
        if list.is_empty() {
            self.active.remove(&source);
        }
        self.retire(source, &taken);
        taken
    }

    /// Removes every edge of `source`.
    pub fn remove_source(&mut self, source: VertexId) -> Vec<VertexId> {
        let Some(targets) = self.active.remove(&source) else {
            return Vec::new();
        };
        self.retire(source, &targets);
        targets
    }

    /// Removes every edge pointing at one of `targets`.
    pub fn remove_target_ids(&mut self, targets: &BTreeSet<VertexId>) -> Adjacency {
        let mut dropped = Adjacency::new();
        if targets.is_empty() {
            return dropped;
        }
        self.active.retain(|&source, list| {
            let mut taken = Vec::new();
            list.retain(|target| {
                let hit = targets.contains(target);
                if hit {
                    taken.push(*target);
                }
                !hit
            });
            if !taken.is_empty() {
                dropped.insert(source, taken);
            }
            !list.is_empty()
        });
        for (&source, taken) in &dropped {
            self.retire(source, taken);
        }
        dropped
    }

    /// Removes the `n` oldest active edges.
    pub fn remove_oldest(&mut self, n: usize) -> Adjacency {
        let mut dropped = Adjacency::new();
        let mut count = 0;
        while count < n {
            let Some((source, target)) = self.queue.pop_front() else {
                break;
            };
            let Some(list) = self.active.get_mut(&source) else {
                continue;
            };
            let Some(position) = list.iter().position(|&held| held == target) else {
                continue;
            };
            list.remove(position);
            if list.is_empty() {
                self.active.remove(&source);
            }
            self.removed.entry(source).or_default().push(target);
            self.removed_count += 1;
            dropped.entry(source).or_default().push(target);
            count += 1;
        }
        dropped
    }

    fn retire(&mut self, source: VertexId, targets: &[VertexId]) {
        if targets.is_empty() {
            return;
        }
        self.removed
            .entry(source)
            .or_default()
            .extend_from_slice(targets);
        self.removed_count += targets.len();
    }

    /// Active targets of `source`, in insertion order.
    #[must_use]
    pub fn targets_of(&self, source: VertexId) -> &[VertexId] {
        self.active.get(&source).map_or(&[][..], Vec::as_slice)
    }

    /// Number of active edges leaving `source`.
    #[must_use]
    pub fn degree(&self, source: VertexId) -> usize {
        self.targets_of(source).len()
    }

    /// Active and removed targets of `source`; neither may be re-added.
    #[must_use]
    pub fn history_of(&self, source: VertexId) -> Vec<VertexId> {
        let removed = self.removed.get(&source).map_or(&[][..], Vec::as_slice);
        self.targets_of(source)
            .iter()
            .chain(removed)
            .copied()
            .collect()
    }

    /// Active adjacency.
    #[must_use]
    #[rustfmt::skip]
    pub const fn active(&self) -> &Adjacency { &self.active }

    /// Removed adjacency.
    #[must_use]
    #[rustfmt::skip]
    pub const fn removed(&self) -> &Adjacency { &self.removed }

    /// Edges created so far, active or removed.
    #[must_use]
    #[rustfmt::skip]
    pub const fn created(&self) -> usize { self.created }

    /// Number of active edges.
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.created - self.removed_count
    }

    /// Number of removed edges.
    #[must_use]
    #[rustfmt::skip]
    pub const fn removed_count(&self) -> usize { self.removed_count }

    /// Checks that no pair is both active and removed and no pair repeats.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        let mut seen = BTreeSet::new();
        let pairs = self
            .active
            .iter()
            .chain(&self.removed)
            .flat_map(|(&source, targets)| targets.iter().map(move |&target| (source, target)));
        for pair in pairs {
            if !seen.insert(pair) {
                return false;
            }
        }
        let no_empty_keys = self.active.values().all(|targets| !targets.is_empty());
        no_empty_keys && seen.len() == self.created
    }

    /// Drops the tracker, keeping the active and removed adjacency.
    #[must_use]
    pub fn into_parts(self) -> (Adjacency, Adjacency) {
        (self.active, self.removed)
    }
}
