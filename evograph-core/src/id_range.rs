//! Dense identity ranges assigned to vertex populations.
//!
//! Every vertex population owns a contiguous, inclusive interval of integer
//! identities. Intervals are handed out by an [`IdCursor`] threaded across
//! populations in declaration order, so identities never overlap between
//! populations of the same scenario.

use std::{fmt, ops::RangeInclusive};

use serde::{Deserialize, Serialize};

/// Identity of a single vertex.
pub type VertexId = u64;

/// Contiguous inclusive interval `[min, max]` of vertex identities.
///
/// # Examples
/// ```
/// use evograph_core::IdRange;
///
/// let range = IdRange::with_count(10, 5).expect("non-empty range");
/// assert_eq!(range.min(), 10);
/// assert_eq!(range.max(), 14);
/// assert_eq!(range.count(), 5);
/// assert!(range.contains(12));
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct IdRange {
    min: VertexId,
    max: VertexId,
}

impl IdRange {
    /// Builds the range `[min, min + count - 1]`.
    ///
    /// Returns `None` when `count` is zero or the range would overflow.
    #[must_use]
    pub fn with_count(min: VertexId, count: usize) -> Option<Self> {
        let span = u64::try_from(count).ok()?.checked_sub(1)?;
        let max = min.checked_add(span)?;
        Some(Self { min, max })
    }

    /// Lowest identity in the range.
    #[must_use]
    #[rustfmt::skip]
    pub const fn min(&self) -> VertexId { self.min }

    /// Highest identity in the range.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max(&self) -> VertexId { self.max }

    /// Number of identities, `max - min + 1`.
    #[must_use]
    pub fn count(&self) -> usize {
        usize::try_from(self.max - self.min).map_or(usize::MAX, |span| span.saturating_add(1))
    }

    /// Returns `true` when `id` lies inside the range.
    #[must_use]
    pub const fn contains(&self, id: VertexId) -> bool {
        id >= self.min && id <= self.max
    }

    /// Iterates the identities in ascending order.
    pub fn iter(&self) -> RangeInclusive<VertexId> {
        self.min..=self.max
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

impl IntoIterator for IdRange {
    type Item = VertexId;
    type IntoIter = RangeInclusive<VertexId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Allocation cursor handing out consecutive [`IdRange`]s.
///
/// # Examples
/// ```
/// use evograph_core::IdCursor;
///
/// let mut cursor = IdCursor::default();
/// let first = cursor.allocate(3).expect("first range");
/// let second = cursor.allocate(2).expect("second range");
/// assert_eq!((first.min(), first.max()), (0, 2));
/// assert_eq!((second.min(), second.max()), (3, 4));
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IdCursor {
    next: VertexId,
}

impl IdCursor {
    /// Starts allocating at `first`.
    #[must_use]
    pub const fn starting_at(first: VertexId) -> Self {
        Self { next: first }
    }

    /// Reserves `count` identities and advances the cursor past them.
    ///
    /// Returns `None` for an empty request or when the identity space is
    /// exhausted; the cursor is left untouched in that case.
    pub fn allocate(&mut self, count: usize) -> Option<IdRange> {
        let range = IdRange::with_count(self.next, count)?;
        self.next = range.max.checked_add(1)?;
        Some(range)
    }

    /// The identity the next allocation will start from.
    #[must_use]
    #[rustfmt::skip]
    pub const fn peek(&self) -> VertexId { self.next }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case(0, 1, 0, 0)]
    #[case(0, 100, 0, 99)]
    #[case(42, 8, 42, 49)]
    fn with_count_builds_inclusive_bounds(
        #[case] min: VertexId,
        #[case] count: usize,
        #[case] expected_min: VertexId,
        #[case] expected_max: VertexId,
    ) {
        let range = IdRange::with_count(min, count).expect("range must be valid");
        assert_eq!(range.min(), expected_min);
        assert_eq!(range.max(), expected_max);
        assert_eq!(range.count(), count);
    }

    #[test]
    fn with_count_rejects_empty_ranges() {
        assert!(IdRange::with_count(5, 0).is_none());
    }

    #[test]
    fn with_count_rejects_overflow() {
        assert!(IdRange::with_count(u64::MAX, 2).is_none());
    }

    #[test]
    fn cursor_threads_ranges_without_overlap() {
        let mut cursor = IdCursor::starting_at(10);
        let ranges: Vec<_> = [4, 1, 6]
            .into_iter()
            .map(|count| cursor.allocate(count).expect("allocation must succeed"))
            .collect();
        assert_eq!(ranges[0].iter().collect::<Vec<_>>(), vec![10, 11, 12, 13]);
        assert_eq!(ranges[1].iter().collect::<Vec<_>>(), vec![14]);
        assert_eq!(ranges[2].min(), 15);
        assert_eq!(cursor.peek(), 21);
    }

    #[test]
    fn cursor_ignores_empty_requests() {
        let mut cursor = IdCursor::default();
        assert!(cursor.allocate(0).is_none());
        assert_eq!(cursor.peek(), 0);
    }
}
