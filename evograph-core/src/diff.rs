//! Per-iteration diffs and the log exporters replay.
//!
//! Each population appends exactly one diff per iteration. Replaying the
//! first `k + 1` diffs (apply every `a`, then subtract every `r`) rebuilds
//! the active snapshot at iteration `k`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{id_range::VertexId, materializer::Adjacency};

/// A diff that can be applied to a snapshot.
pub trait Diff {
    /// State the diff mutates.
    type Snapshot: Default;

    /// Applies the additions, then the removals, to `snapshot`.
    fn apply(&self, snapshot: &mut Self::Snapshot);

    /// `true` when the diff neither adds nor removes anything.
    fn is_empty(&self) -> bool;
}

/// Vertex identities added and removed during one iteration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VertexDiff {
    /// Identities activated.
    #[serde(rename = "a", default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<VertexId>,
    /// Identities removed.
    #[serde(rename = "r", default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<VertexId>,
}

impl Diff for VertexDiff {
    type Snapshot = BTreeSet<VertexId>;

    fn apply(&self, snapshot: &mut Self::Snapshot) {
        snapshot.extend(self.added.iter().copied());
        for id in &self.removed {
            snapshot.remove(id);
        }
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Edges added and removed during one iteration, keyed by source.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EdgeDiff {
    /// Edges created.
    #[serde(rename = "a", default, skip_serializing_if = "Adjacency::is_empty")]
    pub added: Adjacency,
    /// Edges removed.
    #[serde(rename = "r", default, skip_serializing_if = "Adjacency::is_empty")]
    pub removed: Adjacency,
}

impl EdgeDiff {
    /// Records removals of `source`, merging with earlier ones.
    pub fn record_removed(&mut self, source: VertexId, targets: Vec<VertexId>) {
        if targets.is_empty() {
            return;
        }
        self.removed.entry(source).or_default().extend(targets);
    }

    /// Merges a batch of removals.
    pub fn record_removed_all(&mut self, batch: Adjacency) {
        for (source, targets) in batch {
            self.record_removed(source, targets);
        }
    }

    /// Merges a batch of additions.
    pub fn record_added_all(&mut self, batch: &Adjacency) {
        for (&source, targets) in batch {
            if !targets.is_empty() {
                self.added
                    .entry(source)
                    .or_default()
                    .extend_from_slice(targets);
            }
        }
    }

    /// Number of edges added.
    #[must_use]
    pub fn added_count(&self) -> usize {
        self.added.values().map(Vec::len).sum()
    }

    /// Number of edges removed.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.values().map(Vec::len).sum()
    }
}

impl Diff for EdgeDiff {
    type Snapshot = Adjacency;

    fn apply(&self, snapshot: &mut Self::Snapshot) {
        for (&source, targets) in &self.added {
            snapshot
                .entry(source)
                .or_default()
                .extend_from_slice(targets);
        }
        for (source, targets) in &self.removed {
            let Some(list) = snapshot.get_mut(source) else {
                continue;
            };
            list.retain(|target| !targets.contains(target));
            if list.is_empty() {
                snapshot.remove(source);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Ordered per-iteration diffs of one population.
///
/// # Examples
/// ```
/// use evograph_core::{DiffLog, VertexDiff};
///
/// let mut log = DiffLog::default();
/// log.push(VertexDiff { added: vec![1, 2, 3], removed: vec![] });
/// log.push(VertexDiff { added: vec![4], removed: vec![1] });
/// let snapshot = log.replay(1).expect("two iterations were logged");
/// assert_eq!(snapshot.into_iter().collect::<Vec<_>>(), vec![2, 3, 4]);
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DiffLog<D> {
    iter: Vec<D>,
}

impl<D> Default for DiffLog<D> {
    fn default() -> Self {
        Self { iter: Vec::new() }
    }
}

impl<D: Diff> DiffLog<D> {
    /// Appends the diff of the next iteration.
    pub fn push(&mut self, diff: D) {
        self.iter.push(diff);
    }

    /// Diff recorded for `iteration`.
    #[must_use]
    pub fn get(&self, iteration: usize) -> Option<&D> {
        self.iter.get(iteration)
    }

    /// Diff of the most recent iteration.
    #[must_use]
    pub fn last(&self) -> Option<&D> {
        self.iter.last()
    }

    /// Number of iterations logged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter.len()
    }

    /// `true` before the first iteration ran.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter.is_empty()
    }

    /// Diffs in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = &D> + '_ {
        self.iter.iter()
    }

    /// Rebuilds the active snapshot at the end of `iteration`.
    ///
    /// Returns `None` when `iteration` was not logged.
    #[must_use]
    pub fn replay(&self, iteration: usize) -> Option<D::Snapshot> {
        let diffs = self.iter.get(..=iteration)?;
        let mut snapshot = D::Snapshot::default();
        for diff in diffs {
            diff.apply(&mut snapshot);
        }
        Some(snapshot)
    }
}
