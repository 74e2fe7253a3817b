//! Pluggable sources of edge endpoints.
//!
//! An edge population asks its [`TargetProvider`] which sources may receive
//! edges and which targets they may point at. Providers see the simulation
//! only through a [`ProviderContext`] handed to every call, so several
//! simulations can share one registry.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use crate::{
    config::EdgeConfig,
    error::{Result, SimulationError},
    id_range::{IdRange, VertexId},
};

/// Name under which [`BlockProvider`] is registered by
/// [`ProviderRegistry::with_builtins`].
pub const BLOCK_PROVIDER: &str = "block";

/// Read-only view of a vertex population at the current iteration.
#[derive(Clone, Copy, Debug)]
pub struct VertexView<'a> {
    name: &'a str,
    id_range: IdRange,
    active: &'a BTreeSet<VertexId>,
}

impl<'a> VertexView<'a> {
    /// Creates a view over a population's active identities.
    #[must_use]
    pub const fn new(name: &'a str, id_range: IdRange, active: &'a BTreeSet<VertexId>) -> Self {
        Self {
            name,
            id_range,
            active,
        }
    }

    /// Population name.
    #[must_use]
    #[rustfmt::skip]
    pub const fn name(&self) -> &'a str { self.name }

    /// Identity range of the population.
    #[must_use]
    #[rustfmt::skip]
    pub const fn id_range(&self) -> IdRange { self.id_range }

    /// Identities active at the current iteration, ascending.
    #[must_use]
    #[rustfmt::skip]
    pub const fn active(&self) -> &'a BTreeSet<VertexId> { self.active }
}

/// Everything a provider may look at.
#[derive(Clone, Copy, Debug)]
pub struct ProviderContext<'a> {
    iteration: usize,
    source: VertexView<'a>,
    target: VertexView<'a>,
}

impl<'a> ProviderContext<'a> {
    /// Context for one edge population at `iteration`.
    #[must_use]
    pub const fn new(iteration: usize, source: VertexView<'a>, target: VertexView<'a>) -> Self {
        Self {
            iteration,
            source,
            target,
        }
    }

    /// Iteration being simulated.
    #[must_use]
    #[rustfmt::skip]
    pub const fn iteration(&self) -> usize { self.iteration }

    /// The edge's source population.
    #[must_use]
    #[rustfmt::skip]
    pub const fn source(&self) -> VertexView<'a> { self.source }

    /// The edge's target population.
    #[must_use]
    #[rustfmt::skip]
    pub const fn target(&self) -> VertexView<'a> { self.target }
}

/// Supplies sources and targets to an edge population.
///
/// Implementations must be deterministic for a given context; the engine
/// calls them from worker threads.
pub trait TargetProvider: Send + Sync {
    /// Sources that may receive new edges, in sweep order.
    fn source_ids(&self, edge: &EdgeConfig, ctx: &ProviderContext<'_>) -> Vec<VertexId>;

    /// Candidate targets, either shared (`source == None`) or for one source.
    fn target_ids(
        &self,
        edge: &EdgeConfig,
        source: Option<VertexId>,
        ctx: &ProviderContext<'_>,
    ) -> Vec<VertexId>;

    /// Number of candidate targets.
    ///
    /// The engine sizes capacities from [`TargetProvider::target_ids`] after
    /// dropping claimed and repeated targets, so this count is a convenience
    /// for callers inspecting a provider; overriding it does not change a
    /// run.
    fn target_count(
        &self,
        edge: &EdgeConfig,
        source: Option<VertexId>,
        ctx: &ProviderContext<'_>,
    ) -> usize {
        self.target_ids(edge, source, ctx).len()
    }
}

/// Default provider: every active source may point at every active target.
#[derive(Clone, Copy, Debug, Default)]
pub struct PopulationProvider;

impl TargetProvider for PopulationProvider {
    fn source_ids(&self, _edge: &EdgeConfig, ctx: &ProviderContext<'_>) -> Vec<VertexId> {
        ctx.source().active().iter().copied().collect()
    }

    fn target_ids(
        &self,
        _edge: &EdgeConfig,
        _source: Option<VertexId>,
        ctx: &ProviderContext<'_>,
    ) -> Vec<VertexId> {
        ctx.target().active().iter().copied().collect()
    }

    fn target_count(
        &self,
        _edge: &EdgeConfig,
        _source: Option<VertexId>,
        ctx: &ProviderContext<'_>,
    ) -> usize {
        ctx.target().active().len()
    }
}

/// Splits the target range into equal contiguous blocks, one per source
/// position, and offers each source the active targets of its block.
///
/// # Examples
/// ```
/// use std::collections::BTreeSet;
///
/// use evograph_core::{BlockProvider, EdgeConfig, IdRange, ProviderContext, TargetProvider, VertexView};
///
/// let sources: BTreeSet<u64> = (0..2).collect();
/// let targets: BTreeSet<u64> = (10..16).collect();
/// let ctx = ProviderContext::new(
///     0,
///     VertexView::new("owners", IdRange::with_count(0, 2).expect("range"), &sources),
///     VertexView::new("items", IdRange::with_count(10, 6).expect("range"), &targets),
/// );
/// let edge = EdgeConfig::new("owns", "owners", "items");
/// assert_eq!(BlockProvider.target_ids(&edge, Some(1), &ctx), vec![13, 14, 15]);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockProvider;

impl BlockProvider {
    fn block(source: VertexId, ctx: &ProviderContext<'_>) -> Option<IdRange> {
        let sources = ctx.source().id_range();
        let targets = ctx.target().id_range();
        if !sources.contains(source) {
            return None;
        }
        let width = targets.count().div_ceil(sources.count()).max(1);
        let position = usize::try_from(source - sources.min()).ok()?;
        let offset = u64::try_from(position.checked_mul(width)?).ok()?;
        let start = targets.min().checked_add(offset)?;
        if start > targets.max() {
            return None;
        }
        let available = usize::try_from(targets.max() - start).ok()?.saturating_add(1);
        IdRange::with_count(start, width.min(available))
    }
}

impl TargetProvider for BlockProvider {
    fn source_ids(&self, _edge: &EdgeConfig, ctx: &ProviderContext<'_>) -> Vec<VertexId> {
        ctx.source().active().iter().copied().collect()
    }

    fn target_ids(
        &self,
        _edge: &EdgeConfig,
        source: Option<VertexId>,
        ctx: &ProviderContext<'_>,
    ) -> Vec<VertexId> {
        let active = ctx.target().active();
        let Some(source) = source else {
            return active.iter().copied().collect();
        };
        Self::block(source, ctx).map_or_else(Vec::new, |block| {
            active.range(block.min()..=block.max()).copied().collect()
        })
    }
}

/// Named providers available to a simulation.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<Arc<str>, Arc<dyn TargetProvider>>,
}

impl ProviderRegistry {
    /// An empty registry; edges without a provider still use
    /// [`PopulationProvider`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// A registry holding the built-in named providers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(BLOCK_PROVIDER, Arc::new(BlockProvider));
        registry
    }

    /// Registers `provider` under `name`, returning the one it replaces.
    pub fn register(
        &mut self,
        name: &str,
        provider: Arc<dyn TargetProvider>,
    ) -> Option<Arc<dyn TargetProvider>> {
        self.providers.insert(Arc::from(name), provider)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Provider registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn TargetProvider>> {
        self.providers.get(name).cloned()
    }

    /// Provider for an edge: the named one, or [`PopulationProvider`].
    ///
    /// # Errors
    /// Returns [`SimulationError::CustomFunctionMissing`] when `name` is not
    /// registered.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn TargetProvider>> {
        match name {
            None => Ok(Arc::new(PopulationProvider)),
            Some(name) => self
                .get(name)
                .ok_or_else(|| SimulationError::CustomFunctionMissing {
                    name: Arc::from(name),
                }),
        }
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|name| &**name).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::{fixture, rstest};

    struct Sets {
        sources: BTreeSet<VertexId>,
        targets: BTreeSet<VertexId>,
    }

    #[fixture]
    fn sets() -> Sets {
        Sets {
            sources: (0..3).collect(),
            targets: (100..107).filter(|id| *id != 104).collect(),
        }
    }

    fn context(sets: &Sets) -> ProviderContext<'_> {
        ProviderContext::new(
            2,
            VertexView::new(
                "owners",
                IdRange::with_count(0, 3).expect("range"),
                &sets.sources,
            ),
            VertexView::new(
                "items",
                IdRange::with_count(100, 7).expect("range"),
                &sets.targets,
            ),
        )
    }

    fn edge() -> EdgeConfig {
        EdgeConfig::new("owns", "owners", "items")
    }

    #[rstest]
    fn population_provider_offers_active_ids(sets: Sets) {
        let ctx = context(&sets);
        assert_eq!(PopulationProvider.source_ids(&edge(), &ctx), vec![0, 1, 2]);
        assert_eq!(PopulationProvider.target_count(&edge(), Some(1), &ctx), 6);
        assert_eq!(ctx.iteration(), 2);
    }

    #[rstest]
    #[case::first_block(0, vec![100, 101, 102])]
    #[case::skips_inactive(1, vec![103, 105])]
    #[case::truncated_tail(2, vec![106])]
    #[case::outside_range(9, vec![])]
    fn block_provider_slices_target_range(
        sets: Sets,
        #[case] source: VertexId,
        #[case] expected: Vec<VertexId>,
    ) {
        let ctx = context(&sets);
        assert_eq!(BlockProvider.target_ids(&edge(), Some(source), &ctx), expected);
    }

    #[test]
    fn registry_resolves_builtins_and_reports_missing() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.contains(BLOCK_PROVIDER));
        assert!(registry.resolve(None).is_ok());
        assert!(registry.resolve(Some("block")).is_ok());
        let Err(err) = registry.resolve(Some("nope")) else {
            panic!("unregistered provider must fail");
        };
        assert_eq!(err.code().as_str(), "SIMULATION_CUSTOM_FUNCTION_MISSING");
    }

    #[test]
    fn registering_replaces_previous_provider() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.register("custom", Arc::new(PopulationProvider)).is_none());
        assert!(registry.register("custom", Arc::new(BlockProvider)).is_some());
        assert_eq!(registry.names(), vec!["custom"]);
        assert_eq!(format!("{registry:?}"), r#"ProviderRegistry { providers: ["custom"] }"#);
    }
}
