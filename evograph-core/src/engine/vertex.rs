//! Per-iteration advancement of vertex populations.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use rand::rngs::SmallRng;

use crate::{
    allocator::{AllocationRequest, allocate},
    config::{EdgeConfig, VertexConfig, VertexTimeShift},
    diff::{DiffLog, EdgeDiff, VertexDiff},
    error::{Result, RunWarning},
    id_range::{IdRange, VertexId},
    lifecycle::VertexLifecycle,
    materializer::{MaterializeOptions, TargetPool, materialize},
    provider::VertexView,
    scheduler::RateScheduler,
};

use super::{
    Window,
    edge::EdgeState,
    failure::{allocation_failure, floor_shortfall, materialize_failure},
};

/// Mutable state of one vertex population during a run.
pub(super) struct VertexState {
    pub(super) name: Arc<str>,
    pub(super) config: VertexConfig,
    pub(super) life: VertexLifecycle,
    pub(super) store: DiffLog<VertexDiff>,
    adds: RateScheduler,
    removes: RateScheduler,
    rng: SmallRng,
}

/// What the parent population did during the current iteration.
pub(super) struct ParentSnapshot {
    pub(super) active: Vec<VertexId>,
    pub(super) removed: Vec<VertexId>,
}

impl VertexState {
    pub(super) fn new(config: VertexConfig, range: IdRange, rng: SmallRng) -> Self {
        Self {
            name: Arc::from(config.name.as_str()),
            config,
            life: VertexLifecycle::new(range),
            store: DiffLog::default(),
            adds: RateScheduler::default(),
            removes: RateScheduler::default(),
            rng,
        }
    }

    fn time_shift(&self) -> VertexTimeShift {
        self.config
            .time_shift
            .unwrap_or_else(|| VertexTimeShift::new(self.config.count, 0))
    }

    pub(super) fn view(&self) -> VertexView<'_> {
        VertexView::new(&self.name, self.life.range(), self.life.active())
    }

    /// Identities removed during the iteration that ran last.
    pub(super) fn removed_last(&self) -> &[VertexId] {
        self.store.last().map_or(&[][..], |diff| diff.removed.as_slice())
    }

    pub(super) fn snapshot(&self) -> ParentSnapshot {
        ParentSnapshot {
            active: self.life.active().iter().copied().collect(),
            removed: self.removed_last().to_vec(),
        }
    }

    fn due_additions(&mut self, window: Window) -> usize {
        let shift = self.time_shift();
        if window.is_first() {
            return if window.is_last() {
                shift.total()
            } else {
                shift.start
            };
        }
        let remaining = shift.total().saturating_sub(self.life.created());
        self.adds.next(remaining, window.remaining(), window.iteration)
    }

    fn due_removals(&mut self, window: Window) -> usize {
        let remove = self.time_shift().remove;
        if window.is_first() {
            return if window.is_last() { remove } else { 0 };
        }
        let remaining = remove.saturating_sub(self.life.removed_len());
        self.removes.next(remaining, window.remaining(), window.iteration)
    }

    fn remove_scheduled(
        &mut self,
        window: Window,
        diff: &mut VertexDiff,
    ) -> (Vec<VertexId>, Option<RunWarning>) {
        let due = self.due_removals(window);
        if due == 0 {
            return (Vec::new(), None);
        }
        let removal = self.life.remove(due);
        let warning = removal.is_short().then(|| RunWarning::UnderRemoval {
            entity: Arc::clone(&self.name),
            iteration: window.iteration,
            requested: removal.requested,
            removed: removal.ids.len(),
        });
        diff.removed.extend_from_slice(&removal.ids);
        (removal.ids, warning)
    }

    /// Advances a population without a parent.
    pub(super) fn step_root(&mut self, window: Window) -> Vec<RunWarning> {
        let mut diff = VertexDiff::default();
        let due = self.due_additions(window);
        diff.added = self.life.add(due);
        let (_, warning) = self.remove_scheduled(window, &mut diff);
        self.store.push(diff);
        warning.into_iter().collect()
    }

    /// Advances a child population together with the edge linking it to its
    /// parent.
    ///
    /// Order: cascade from removed parents, attach new children to active
    /// parents, then scheduled removals which also detach the children.
    pub(super) fn step_child(
        &mut self,
        window: Window,
        parent: &ParentSnapshot,
        link: &mut EdgeState,
    ) -> Result<Vec<RunWarning>> {
        let mut warnings = Vec::new();
        let mut diff = VertexDiff::default();
        let mut link_diff = EdgeDiff::default();
        let cascade = self
            .config
            .parent
            .as_ref()
            .is_none_or(|parent_link| parent_link.cascade);

        for &parent_id in &parent.removed {
            let freed = link.life.remove_source(parent_id);
            if cascade {
                diff.removed.extend(self.life.remove_ids(freed.iter().copied()));
            }
            link_diff.record_removed(parent_id, freed);
        }

        let due = self.due_additions(window);
        if due > 0 {
            diff.added = self.attach(
                window,
                due,
                &parent.active,
                link,
                &mut link_diff,
                &mut warnings,
            )?;
        }

        let (removed, warning) = self.remove_scheduled(window, &mut diff);
        warnings.extend(warning);
        if !removed.is_empty() {
            let detached: BTreeSet<VertexId> = removed.into_iter().collect();
            link_diff.record_removed_all(link.life.remove_target_ids(&detached));
        }

        self.store.push(diff);
        link.store.push(link_diff);
        Ok(warnings)
    }

    /// Creates up to `due` children and spreads them over active parents
    /// with headroom. Additions beyond the headroom are deferred.
    fn attach(
        &mut self,
        window: Window,
        due: usize,
        parents: &[VertexId],
        link: &mut EdgeState,
        link_diff: &mut EdgeDiff,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<Vec<VertexId>> {
        let edge: &EdgeConfig = &link.config;
        let min = if window.is_first() { edge.min } else { 0 };
        let headroom_of = |parent_id: VertexId| {
            edge.max
                .map_or(usize::MAX, |max| max.saturating_sub(link.life.degree(parent_id)))
        };
        let headroom = parents
            .iter()
            .fold(0_usize, |acc, &parent_id| acc.saturating_add(headroom_of(parent_id)));
        let realised = due.min(headroom);
        if realised < due {
            warnings.push(RunWarning::Deferred {
                entity: Arc::clone(&self.name),
                iteration: window.iteration,
                requested: due,
                realised,
            });
        }

        let children = self.life.add(realised);
        if children.is_empty() {
            return Ok(children);
        }

        let request = AllocationRequest {
            total: children.len(),
            sources: parents,
            min,
            max: edge.max,
            unique: true,
        };
        let pool_len = children.len();
        let plan = allocate(
            &request,
            |parent_id| headroom_of(parent_id).min(pool_len),
            &mut self.rng,
        )
        .map_err(|err| allocation_failure(&link.name, window.iteration, err))?;
        let floor = parents.len().saturating_mul(min);
        warnings.extend(floor_shortfall(&link.name, window.iteration, &plan, floor));

        let mut pool = children.clone();
        let options = MaterializeOptions {
            unique: true,
            randomized: edge.need_random,
        };
        let batch = materialize(&plan, TargetPool::Shared(&mut pool), None, options, &mut self.rng)
            .map_err(|err| materialize_failure(&link.name, window.iteration, err))?;

        link.life.add_all(&batch);
        link_diff.record_added_all(&batch);
        Ok(children)
    }

    /// Key data of a child population: child id to parent id.
    pub(super) fn key_data(link: &EdgeState) -> BTreeMap<VertexId, VertexId> {
        link.life
            .active()
            .iter()
            .chain(link.life.removed())
            .flat_map(|(&parent_id, children)| {
                children.iter().map(move |&child| (child, parent_id))
            })
            .collect()
    }

    /// Compares the produced quantities with the schedule.
    pub(super) fn deviations(&self) -> Vec<RunWarning> {
        let shift = self.time_shift();
        let checks = [
            ("created", shift.total(), self.life.created()),
            ("removed", shift.remove, self.life.removed_len()),
        ];
        checks
            .into_iter()
            .filter(|(_, configured, actual)| configured != actual)
            .map(|(quantity, configured, actual)| RunWarning::Deviation {
                entity: Arc::clone(&self.name),
                quantity,
                configured,
                actual,
            })
            .collect()
    }
}
