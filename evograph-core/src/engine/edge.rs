//! Per-iteration advancement of standalone edge populations.

use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use rand::rngs::SmallRng;
use tracing::debug;

use crate::{
    allocator::{AllocationRequest, allocate},
    config::{EdgeConfig, EdgeTimeShift},
    diff::{DiffLog, EdgeDiff},
    error::{Result, RunWarning},
    id_range::VertexId,
    lifecycle::EdgeLifecycle,
    materializer::{Adjacency, MaterializeOptions, TargetPool, materialize},
    provider::{ProviderContext, TargetProvider},
    scheduler::RateScheduler,
};

use super::{
    Window,
    failure::{allocation_failure, floor_shortfall, materialize_failure},
    vertex::VertexState,
};

/// Mutable state of one edge population during a run.
///
/// Parent-link edges only use `life` and `store`; their child population
/// drives them.
pub(super) struct EdgeState {
    pub(super) name: Arc<str>,
    pub(super) config: EdgeConfig,
    pub(super) life: EdgeLifecycle,
    pub(super) store: DiffLog<EdgeDiff>,
    pub(super) endpoints: (usize, usize),
    provider: Arc<dyn TargetProvider>,
    adds: RateScheduler,
    removes: RateScheduler,
    /// Targets held by some source, for unique populations.
    claimed: HashSet<VertexId>,
    rng: SmallRng,
}

/// Read-only inputs of a standalone edge step.
pub(super) struct EdgeInputs<'a> {
    pub(super) source: &'a VertexState,
    pub(super) target: &'a VertexState,
}

impl EdgeState {
    pub(super) fn new(
        config: EdgeConfig,
        endpoints: (usize, usize),
        provider: Arc<dyn TargetProvider>,
        rng: SmallRng,
    ) -> Self {
        Self {
            name: Arc::from(config.name.as_str()),
            config,
            life: EdgeLifecycle::default(),
            store: DiffLog::default(),
            endpoints,
            provider,
            adds: RateScheduler::default(),
            removes: RateScheduler::default(),
            claimed: HashSet::new(),
            rng,
        }
    }

    fn time_shift(&self) -> EdgeTimeShift {
        let total = self.config.count_all.unwrap_or(0);
        self.config
            .time_shift
            .unwrap_or_else(|| EdgeTimeShift::new(total, 0))
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
        let remaining = remove.saturating_sub(self.life.removed_count());
        self.removes.next(remaining, window.remaining(), window.iteration)
    }

    fn release(&mut self, dropped: &Adjacency) {
        if self.config.unique && self.config.reuse {
            for target in dropped.values().flatten() {
                self.claimed.remove(target);
            }
        }
    }

    /// Advances a standalone edge population by one iteration.
    ///
    /// Order: cascade from removed endpoints, scheduled removals, then
    /// scheduled additions.
    pub(super) fn step(
        &mut self,
        window: Window,
        inputs: &EdgeInputs<'_>,
    ) -> Result<Vec<RunWarning>> {
        let mut warnings = Vec::new();
        let mut diff = EdgeDiff::default();

        for &source in inputs.source.removed_last() {
            let targets = self.life.remove_source(source);
            if self.config.unique && self.config.reuse {
                for target in &targets {
                    self.claimed.remove(target);
                }
            }
            diff.record_removed(source, targets);
        }
        let gone: BTreeSet<VertexId> = inputs.target.removed_last().iter().copied().collect();
        let pruned = self.life.remove_target_ids(&gone);
        for target in &gone {
            self.claimed.remove(target);
        }
        diff.record_removed_all(pruned);

        let due = self.due_removals(window);
        if due > 0 {
            let dropped = self.life.remove_oldest(due);
            let removed: usize = dropped.values().map(Vec::len).sum();
            if removed < due {
                warnings.push(RunWarning::UnderRemoval {
                    entity: Arc::clone(&self.name),
                    iteration: window.iteration,
                    requested: due,
                    removed,
                });
            }
            self.release(&dropped);
            diff.record_removed_all(dropped);
        }

        let due = self.due_additions(window);
        if due > 0 {
            let ctx = ProviderContext::new(
                window.iteration,
                inputs.source.view(),
                inputs.target.view(),
            );
            let batch = self.grow(window, due, &ctx, &mut warnings)?;
            self.life.add_all(&batch);
            if self.config.unique {
                self.claimed.extend(batch.values().flatten().copied());
            }
            diff.record_added_all(&batch);
        }

        self.store.push(diff);
        Ok(warnings)
    }

    fn grow(
        &mut self,
        window: Window,
        due: usize,
        ctx: &ProviderContext<'_>,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<Adjacency> {
        let config = &self.config;
        let sources = self.provider.source_ids(config, ctx);
        if sources.is_empty() {
            debug!(
                edge = %self.name,
                iteration = window.iteration,
                due,
                "no active sources; deferring"
            );
            warnings.push(RunWarning::Deferred {
                entity: Arc::clone(&self.name),
                iteration: window.iteration,
                requested: due,
                realised: 0,
            });
            return Ok(Adjacency::new());
        }

        let min = if window.is_first() { config.min } else { 0 };
        let floor = sources.len().saturating_mul(min);

        let exclude: Adjacency = sources
            .iter()
            .map(|&source| (source, self.life.history_of(source)))
            .filter(|(_, history)| !history.is_empty())
            .collect();
        let claimed = &self.claimed;
        let unique = config.unique;
        // Providers may list a target twice; each counts once.
        let unclaimed = |targets: Vec<VertexId>| -> Vec<VertexId> {
            let mut seen = HashSet::with_capacity(targets.len());
            targets
                .into_iter()
                .filter(|target| !(unique && claimed.contains(target)))
                .filter(|target| seen.insert(*target))
                .collect()
        };
        let life = &self.life;
        let headroom = |source: VertexId, candidates: usize| {
            let degree_room = config
                .max
                .map_or(usize::MAX, |max| max.saturating_sub(life.degree(source)));
            candidates.min(degree_room)
        };
        let request = AllocationRequest {
            total: due,
            sources: &sources,
            min,
            max: config.max,
            unique,
        };
        let options = MaterializeOptions {
            unique,
            randomized: config.need_random,
        };
        let provider = Arc::clone(&self.provider);

        if config.elements_per_source {
            let candidates_of =
                |source: VertexId| unclaimed(provider.target_ids(config, Some(source), ctx));
            let capacity_of = |source: VertexId| {
                let held = exclude.get(&source);
                let fresh = candidates_of(source)
                    .into_iter()
                    .filter(|target| held.is_none_or(|held| !held.contains(target)))
                    .count();
                headroom(source, fresh)
            };
            let plan = allocate(&request, capacity_of, &mut self.rng)
                .map_err(|err| allocation_failure(&self.name, window.iteration, err))?;
            warnings.extend(floor_shortfall(&self.name, window.iteration, &plan, floor));
            materialize(
                &plan,
                TargetPool::PerSource(&candidates_of),
                Some(&exclude),
                options,
                &mut self.rng,
            )
            .map_err(|err| materialize_failure(&self.name, window.iteration, err))
        } else {
            let mut pool = unclaimed(provider.target_ids(config, None, ctx));
            let in_pool: HashSet<VertexId> = pool.iter().copied().collect();
            let capacity_of = |source: VertexId| {
                let held = exclude.get(&source).map_or(0, |held| {
                    held.iter().filter(|target| in_pool.contains(target)).count()
                });
                headroom(source, pool.len().saturating_sub(held))
            };
            let plan = allocate(&request, capacity_of, &mut self.rng)
                .map_err(|err| allocation_failure(&self.name, window.iteration, err))?;
            warnings.extend(floor_shortfall(&self.name, window.iteration, &plan, floor));
            materialize(
                &plan,
                TargetPool::Shared(&mut pool),
                Some(&exclude),
                options,
                &mut self.rng,
            )
            .map_err(|err| materialize_failure(&self.name, window.iteration, err))
        }
    }

    /// Compares the produced quantities with the schedule.
    pub(super) fn deviations(&self) -> Vec<RunWarning> {
        let shift = self.time_shift();
        let checks = [
            ("created", shift.total(), self.life.created()),
            ("removed", shift.remove, self.life.removed_count()),
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
