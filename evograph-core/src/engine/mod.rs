//! Time-shift engine: drives every population through the iterations.
//!
//! A [`Simulation`] is created by [`SimulationBuilder::build`], which
//! validates the scenario and assigns identity ranges. Each
//! [`Simulation::step`] then runs one iteration: vertex populations first,
//! parents before children (a child advances together with the edge linking
//! it to its parent), then the standalone edge populations, which are
//! independent of each other and may run on the rayon pool. The join of that
//! fan-out is the barrier before the next iteration.

mod edge;
mod failure;
mod rng;
mod vertex;

use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, instrument};

use crate::{
    config::{ScenarioConfig, ScenarioPlan, plan},
    error::{ConfigIssue, Result, RunWarning, SimulationError},
    id_range::IdCursor,
    lifecycle::{EdgeLifecycle, VertexLifecycle},
    observer::{
        IterationSummary, PopulationDelta, PopulationKind, SimulationObserver, TracingObserver,
    },
    population::{EdgePopulation, SimulationOutput, VertexPopulation},
    provider::ProviderRegistry,
};

use self::{
    edge::{EdgeInputs, EdgeState},
    rng::population_rng,
    vertex::VertexState,
};

/// How standalone edge populations of one iteration are advanced.
///
/// Both strategies produce identical output for the same seed.
///
/// # Examples
/// ```
/// use evograph_core::ExecutionStrategy;
///
/// assert_eq!(ExecutionStrategy::default(), ExecutionStrategy::Parallel);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExecutionStrategy {
    /// One population after the other on the calling thread.
    Sequential,
    /// Fan out over the rayon pool when the `parallel` feature is enabled;
    /// sequential otherwise.
    #[default]
    Parallel,
}

/// Position of an iteration inside the run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Window {
    pub(crate) iteration: usize,
    iterations: usize,
}

impl Window {
    const fn is_first(self) -> bool {
        self.iteration == 0
    }

    const fn is_last(self) -> bool {
        self.iteration + 1 >= self.iterations
    }

    /// Iterations left including this one.
    const fn remaining(self) -> usize {
        self.iterations.saturating_sub(self.iteration)
    }
}

/// Configures and constructs [`Simulation`] instances.
///
/// # Examples
/// ```
/// use evograph_core::{ExecutionStrategy, ScenarioConfig, SimulationBuilder, VertexConfig};
///
/// let scenario = ScenarioConfig::new(3).with_vertex(VertexConfig::new("users", 5));
/// let simulation = SimulationBuilder::new(scenario)
///     .with_seed(11)
///     .with_execution_strategy(ExecutionStrategy::Sequential)
///     .build()
///     .expect("scenario is valid");
/// assert_eq!(simulation.seed(), 11);
/// ```
#[derive(Clone)]
pub struct SimulationBuilder {
    config: ScenarioConfig,
    seed: Option<u64>,
    registry: ProviderRegistry,
    observer: Arc<dyn SimulationObserver>,
    execution_strategy: ExecutionStrategy,
}

impl SimulationBuilder {
    /// Starts from `config` with the built-in providers, a
    /// [`TracingObserver`] and the parallel strategy.
    #[must_use]
    pub fn new(config: ScenarioConfig) -> Self {
        Self {
            config,
            seed: None,
            registry: ProviderRegistry::with_builtins(),
            observer: Arc::new(TracingObserver),
            execution_strategy: ExecutionStrategy::default(),
        }
    }

    /// Overrides the seed declared by the scenario.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replaces the provider registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SimulationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Sets the execution strategy.
    #[must_use]
    pub fn with_execution_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.execution_strategy = strategy;
        self
    }

    /// Returns the configured execution strategy.
    #[must_use]
    pub fn execution_strategy(&self) -> ExecutionStrategy {
        self.execution_strategy
    }

    /// Validates the scenario and sets every population up.
    ///
    /// # Errors
    /// Returns [`SimulationError::ConfigInvalid`] with every validation
    /// finding, or [`SimulationError::CustomFunctionMissing`] when a provider
    /// disappears between validation and setup.
    #[instrument(name = "engine.build", level = "debug", err, skip(self))]
    pub fn build(self) -> Result<Simulation> {
        let plan = plan(&self.config, &self.registry)?;
        let seed = self.seed.unwrap_or(self.config.seed);

        let mut cursor = IdCursor::default();
        let mut vertices = Vec::with_capacity(self.config.vertices.len());
        for (index, vertex) in self.config.vertices.iter().enumerate() {
            let range = cursor.allocate(vertex.count).ok_or_else(|| {
                SimulationError::ConfigInvalid {
                    issues: vec![ConfigIssue::EmptyPopulation {
                        vertex: Arc::from(vertex.name.as_str()),
                    }],
                }
            })?;
            debug!(vertex = %vertex.name, %range, "assigned identity range");
            vertices.push(VertexState::new(vertex.clone(), range, population_rng(seed, index)));
        }

        let mut edges = Vec::with_capacity(self.config.edges.len());
        let pairs = self.config.edges.iter().zip(&plan.endpoints);
        for (index, (edge, endpoints)) in pairs.enumerate() {
            let provider = self.registry.resolve(edge.provider.as_deref())?;
            let rng = population_rng(seed, vertices.len() + index);
            edges.push(EdgeState::new(edge.clone(), *endpoints, provider, rng));
        }

        Ok(Simulation {
            seed,
            iterations: self.config.iterations,
            next_iteration: 0,
            plan,
            vertices,
            edges,
            observer: self.observer,
            execution_strategy: self.execution_strategy,
            warnings: Vec::new(),
            failure: None,
        })
    }
}

impl std::fmt::Debug for SimulationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationBuilder")
            .field("config", &self.config)
            .field("seed", &self.seed.unwrap_or(self.config.seed))
            .field("registry", &self.registry)
            .field("execution_strategy", &self.execution_strategy)
            .finish_non_exhaustive()
    }
}

/// A running simulation.
///
/// # Examples
/// ```
/// use evograph_core::{ScenarioConfig, SimulationBuilder, VertexConfig, VertexTimeShift};
///
/// let scenario = ScenarioConfig::new(10).with_vertex(
///     VertexConfig::new("users", 100)
///         .with_time_shift(VertexTimeShift::new(20, 80).with_remove(30)),
/// );
/// let output = SimulationBuilder::new(scenario).build()?.run()?;
/// let users = output.vertex("users").expect("declared population");
/// assert_eq!(users.active.len() + users.removed.len(), 100);
/// assert_eq!(users.removed.len(), 30);
/// # Ok::<(), evograph_core::SimulationError>(())
/// ```
pub struct Simulation {
    seed: u64,
    iterations: usize,
    next_iteration: usize,
    plan: ScenarioPlan,
    vertices: Vec<VertexState>,
    edges: Vec<EdgeState>,
    observer: Arc<dyn SimulationObserver>,
    execution_strategy: ExecutionStrategy,
    warnings: Vec<RunWarning>,
    /// First fatal error; the simulation never advances past it.
    failure: Option<SimulationError>,
}

impl Simulation {
    /// Seed every population generator was derived from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of iterations the run lasts.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Index of the iteration the next [`Simulation::step`] runs.
    #[must_use]
    pub const fn next_iteration(&self) -> usize {
        self.next_iteration
    }

    /// `true` once every iteration ran.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.next_iteration >= self.iterations
    }

    /// Warnings collected so far.
    #[must_use]
    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    /// Fatal error that stopped the run, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&SimulationError> {
        self.failure.as_ref()
    }

    /// Current lifecycle of the vertex population `name`.
    #[must_use]
    pub fn vertex_lifecycle(&self, name: &str) -> Option<&VertexLifecycle> {
        self.vertices
            .iter()
            .find(|state| &*state.name == name)
            .map(|state| &state.life)
    }

    /// Current lifecycle of the edge population `name`.
    #[must_use]
    pub fn edge_lifecycle(&self, name: &str) -> Option<&EdgeLifecycle> {
        self.edges
            .iter()
            .find(|state| &*state.name == name)
            .map(|state| &state.life)
    }

    /// Runs every remaining iteration and finalises the output.
    ///
    /// # Errors
    /// Returns the first fatal error.
    #[instrument(
        name = "engine.run",
        err,
        skip(self),
        fields(seed = self.seed, iterations = self.iterations),
    )]
    pub fn run(mut self) -> Result<SimulationOutput> {
        while self.step()?.is_some() {}
        Ok(self.finish())
    }

    /// Runs the next iteration and returns its index, or `None` once the run
    /// is complete.
    ///
    /// A fatal error leaves the failed iteration partially applied, so the
    /// simulation stops there: every later call returns the same error and
    /// the diff logs are never extended again.
    ///
    /// # Errors
    /// Returns [`SimulationError::AllocationInfeasible`] or
    /// [`SimulationError::InsufficientTargets`] when an edge population cannot
    /// be materialised, and that error again on any later call.
    #[instrument(
        name = "engine.step",
        level = "debug",
        err,
        skip(self),
        fields(iteration = self.next_iteration),
    )]
    pub fn step(&mut self) -> Result<Option<usize>> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.is_complete() {
            return Ok(None);
        }
        let window = Window {
            iteration: self.next_iteration,
            iterations: self.iterations,
        };
        self.observer.iteration_started(window.iteration);

        self.step_vertices(window)
            .and_then(|()| self.step_edges(window))
            .inspect_err(|err| self.failure = Some(err.clone()))?;

        self.next_iteration += 1;
        self.observer.iteration_finished(&self.summary(window.iteration));
        Ok(Some(window.iteration))
    }

    fn step_vertices(&mut self, window: Window) -> Result<()> {
        let order = self.plan.vertex_order.clone();
        for index in order {
            let parent_link = self.plan.parent_edge.get(index).copied().flatten();
            let warnings = match parent_link {
                None => match self.vertices.get_mut(index) {
                    Some(state) => state.step_root(window),
                    None => Vec::new(),
                },
                Some(edge_index) => self.step_child(window, index, edge_index)?,
            };
            self.record(warnings);
        }
        Ok(())
    }

    fn step_child(
        &mut self,
        window: Window,
        index: usize,
        edge_index: usize,
    ) -> Result<Vec<RunWarning>> {
        let Some(link) = self.edges.get_mut(edge_index) else {
            return Ok(Vec::new());
        };
        let parent_index = link.endpoints.0;
        let Some(parent) = self.vertices.get(parent_index).map(VertexState::snapshot) else {
            return Ok(Vec::new());
        };
        let Some(child) = self.vertices.get_mut(index) else {
            return Ok(Vec::new());
        };
        child.step_child(window, &parent, link)
    }

    fn step_edges(&mut self, window: Window) -> Result<()> {
        let vertices = &self.vertices;
        let link_child = &self.plan.link_child;
        let standalone = self
            .edges
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| link_child.get(*index).copied().flatten().is_none())
            .map(|(_, state)| state);
        let advance = |state: &mut EdgeState| -> Result<Vec<RunWarning>> {
            let (source, target) = state.endpoints;
            match (vertices.get(source), vertices.get(target)) {
                (Some(source), Some(target)) => state.step(window, &EdgeInputs { source, target }),
                _ => Ok(Vec::new()),
            }
        };

        let outcomes: Vec<Result<Vec<RunWarning>>> = match self.execution_strategy {
            ExecutionStrategy::Sequential => standalone.map(advance).collect(),
            ExecutionStrategy::Parallel => fan_out(standalone.collect(), &advance),
        };

        for outcome in outcomes {
            let warnings = outcome?;
            self.record(warnings);
        }
        Ok(())
    }

    fn record(&mut self, warnings: Vec<RunWarning>) {
        for warning in warnings {
            self.observer.warning(&warning);
            self.warnings.push(warning);
        }
    }

    fn summary(&self, iteration: usize) -> IterationSummary {
        let vertices = self.vertices.iter().map(|state| {
            let (added, removed) = state
                .store
                .last()
                .map_or((0, 0), |diff| (diff.added.len(), diff.removed.len()));
            PopulationDelta {
                name: Arc::clone(&state.name),
                kind: PopulationKind::Vertex,
                added,
                removed,
                active: state.life.active_len(),
            }
        });
        let edges = self.edges.iter().map(|state| {
            let (added, removed) = state
                .store
                .last()
                .map_or((0, 0), |diff| (diff.added_count(), diff.removed_count()));
            PopulationDelta {
                name: Arc::clone(&state.name),
                kind: PopulationKind::Edge,
                added,
                removed,
                active: state.life.edge_count(),
            }
        });
        IterationSummary {
            iteration,
            populations: vertices.chain(edges).collect(),
        }
    }

    /// Drops the transient lifecycle state and returns the populations.
    ///
    /// When every iteration ran, quantities that differ from the scenario are
    /// reported as [`RunWarning::Deviation`].
    #[must_use]
    pub fn finish(mut self) -> SimulationOutput {
        if self.is_complete() {
            let mut deviations: Vec<RunWarning> =
                self.vertices.iter().flat_map(VertexState::deviations).collect();
            for (index, state) in self.edges.iter().enumerate() {
                if self.plan.link_child.get(index).copied().flatten().is_none() {
                    deviations.extend(state.deviations());
                }
            }
            self.record(deviations);
        }

        let vertex_names: Vec<String> = self
            .vertices
            .iter()
            .map(|state| state.config.name.clone())
            .collect();
        let key_data: Vec<_> = self
            .plan
            .parent_edge
            .iter()
            .map(|link| {
                link.and_then(|edge_index| self.edges.get(edge_index))
                    .map(VertexState::key_data)
                    .unwrap_or_default()
            })
            .collect();
        let parents: Vec<Option<String>> = self
            .plan
            .parent_edge
            .iter()
            .map(|link| {
                link.and_then(|edge_index| self.edges.get(edge_index))
                    .and_then(|edge| vertex_names.get(edge.endpoints.0).cloned())
            })
            .collect();

        let vertices = self
            .vertices
            .into_iter()
            .zip(key_data)
            .zip(parents)
            .map(|((state, key_data), parent)| {
                let id_range = state.life.range();
                let (active, removed) = state.life.into_parts();
                VertexPopulation {
                    name: state.config.name,
                    id_range,
                    time_shift: state.config.time_shift,
                    parent,
                    key_data,
                    active,
                    removed,
                    store: state.store,
                }
            })
            .collect();
        let edges = self
            .edges
            .into_iter()
            .map(|state| {
                let (objects, removed) = state.life.into_parts();
                EdgePopulation {
                    name: state.config.name,
                    source: state.config.source,
                    target: state.config.target,
                    objects,
                    removed,
                    store: state.store,
                }
            })
            .collect();

        SimulationOutput {
            seed: self.seed,
            iterations: self.next_iteration,
            vertices,
            edges,
            warnings: self.warnings,
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: BTreeSet<&str> = self
            .vertices
            .iter()
            .map(|state| &*state.name)
            .chain(self.edges.iter().map(|state| &*state.name))
            .collect();
        f.debug_struct("Simulation")
            .field("seed", &self.seed)
            .field("iterations", &self.iterations)
            .field("next_iteration", &self.next_iteration)
            .field("populations", &names)
            .field("execution_strategy", &self.execution_strategy)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "parallel")]
fn fan_out<F>(states: Vec<&mut EdgeState>, advance: &F) -> Vec<Result<Vec<RunWarning>>>
where
    F: Fn(&mut EdgeState) -> Result<Vec<RunWarning>> + Sync,
{
    use rayon::prelude::*;

    states.into_par_iter().map(advance).collect()
}

#[cfg(not(feature = "parallel"))]
fn fan_out<F>(states: Vec<&mut EdgeState>, advance: &F) -> Vec<Result<Vec<RunWarning>>>
where
    F: Fn(&mut EdgeState) -> Result<Vec<RunWarning>> + Sync,
{
    states.into_iter().map(advance).collect()
}
