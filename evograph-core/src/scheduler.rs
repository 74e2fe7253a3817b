//! Rate-controlled spreading of a quantity over the remaining iterations.

use serde::{Deserialize, Serialize};

/// Decides how many units a lifecycle transition admits per iteration.
///
/// Each scheduled quantity (vertex additions, vertex removals, edge additions,
/// edge removals) owns its own scheduler so carries never interfere.
///
/// * On the last remaining iteration every outstanding unit is emitted.
/// * While at least one unit per iteration remains, the floor of the rate is
///   emitted.
/// * Below one unit per iteration a single unit is emitted every
///   `remaining_iterations / remaining_units` iterations, remembered in a
///   carry until it fires.
///
/// # Examples
/// ```
/// use evograph_core::RateScheduler;
///
/// let mut scheduler = RateScheduler::default();
/// let mut remaining = 3;
/// let mut fired = Vec::new();
/// for iteration in 0..40 {
///     let due = scheduler.next(remaining, 40 - iteration, iteration);
///     if due > 0 {
///         fired.push(iteration);
///         remaining -= due;
///     }
/// }
/// assert_eq!(fired, vec![13, 27, 39]);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RateScheduler {
    add_on_iteration: Option<usize>,
}

impl RateScheduler {
    /// Units to emit at `iteration`, given what is still outstanding.
    pub fn next(
        &mut self,
        remaining_units: usize,
        remaining_iterations: usize,
        iteration: usize,
    ) -> usize {
        if remaining_units == 0 {
            self.add_on_iteration = None;
            return 0;
        }
        if remaining_iterations <= 1 {
            self.add_on_iteration = None;
            return remaining_units;
        }
        let steady = remaining_units.div_euclid(remaining_iterations);
        if steady > 0 {
            self.add_on_iteration = None;
            return steady;
        }
        let due = *self
            .add_on_iteration
            .get_or_insert(iteration + remaining_iterations.div_euclid(remaining_units));
        if iteration >= due {
            self.add_on_iteration = None;
            1
        } else {
            0
        }
    }

    /// Iteration at which the pending sparse unit fires, if one is pending.
    #[must_use]
    #[rustfmt::skip]
    pub const fn pending(&self) -> Option<usize> { self.add_on_iteration }
}
