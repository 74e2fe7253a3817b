//! Scenario configuration.
//!
//! The model is plain serde data so front ends can load it from any format;
//! the CLI reads JSON. [`validate`] checks a scenario before anything runs.

mod validate;

use serde::{Deserialize, Serialize};

pub use self::validate::validate;
pub(crate) use self::validate::{ScenarioPlan, plan};

/// Seed used when a scenario does not name one.
pub const DEFAULT_SEED: u64 = 0x5EED_CAFE;

const fn default_seed() -> u64 {
    DEFAULT_SEED
}

const fn default_cascade() -> bool {
    true
}

/// A complete scenario: populations and the number of iterations to run.
///
/// # Examples
/// ```
/// use evograph_core::{EdgeConfig, ScenarioConfig, VertexConfig};
///
/// let scenario = ScenarioConfig::new(5)
///     .with_vertex(VertexConfig::new("users", 10))
///     .with_edge(EdgeConfig::new("follows", "users", "users").with_count_all(20));
/// assert_eq!(scenario.iterations, 5);
/// assert_eq!(scenario.vertices.len(), 1);
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Seed of every random draw in the run.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of iterations to simulate.
    pub iterations: usize,
    /// Vertex populations in declaration order.
    #[serde(default)]
    pub vertices: Vec<VertexConfig>,
    /// Edge populations in declaration order.
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
}

impl ScenarioConfig {
    /// Creates an empty scenario running `iterations` iterations.
    #[must_use]
    pub fn new(iterations: usize) -> Self {
        Self {
            seed: DEFAULT_SEED,
            iterations,
            vertices: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Overrides the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Appends a vertex population.
    #[must_use]
    pub fn with_vertex(mut self, vertex: VertexConfig) -> Self {
        self.vertices.push(vertex);
        self
    }

    /// Appends an edge population.
    #[must_use]
    pub fn with_edge(mut self, edge: EdgeConfig) -> Self {
        self.edges.push(edge);
        self
    }

    /// Looks a vertex population up by name.
    #[must_use]
    pub fn vertex(&self, name: &str) -> Option<&VertexConfig> {
        self.vertices.iter().find(|vertex| vertex.name == name)
    }

    /// Looks an edge population up by name.
    #[must_use]
    pub fn edge(&self, name: &str) -> Option<&EdgeConfig> {
        self.edges.iter().find(|edge| edge.name == name)
    }
}

/// A vertex population.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VertexConfig {
    /// Unique population name.
    pub name: String,
    /// Number of identities the population owns.
    pub count: usize,
    /// Creation and removal schedule; all identities are active from the
    /// first iteration when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_shift: Option<VertexTimeShift>,
    /// Parent relationship driving the population's presence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentLink>,
}

impl VertexConfig {
    /// A population of `count` identities without schedule or parent.
    #[must_use]
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            count,
            time_shift: None,
            parent: None,
        }
    }

    /// Attaches a schedule.
    #[must_use]
    pub fn with_time_shift(mut self, time_shift: VertexTimeShift) -> Self {
        self.time_shift = Some(time_shift);
        self
    }

    /// Attaches the population to the parent reached through `edge`.
    #[must_use]
    pub fn with_parent(mut self, parent: ParentLink) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Vertex schedule: `start` identities at iteration 0, `add` more and
/// `remove` of them spread over the remaining iterations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VertexTimeShift {
    /// Identities active after iteration 0.
    pub start: usize,
    /// Identities created afterwards.
    #[serde(default)]
    pub add: usize,
    /// Identities removed over the run.
    #[serde(default)]
    pub remove: usize,
    /// Removed identities consumers may recreate as new records. Carried
    /// through to the exported artifact; removal stays terminal.
    #[serde(default)]
    pub recur: usize,
}

impl VertexTimeShift {
    /// Schedule with `start` initial identities and `add` later ones.
    #[must_use]
    pub const fn new(start: usize, add: usize) -> Self {
        Self {
            start,
            add,
            remove: 0,
            recur: 0,
        }
    }

    /// Sets the removal quantity.
    #[must_use]
    pub const fn with_remove(mut self, remove: usize) -> Self {
        self.remove = remove;
        self
    }

    /// Sets the recur quantity.
    #[must_use]
    pub const fn with_recur(mut self, recur: usize) -> Self {
        self.recur = recur;
        self
    }

    /// `start + add`.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.start.saturating_add(self.add)
    }
}

/// Link from a child population to its parent.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParentLink {
    /// Edge population whose source is the parent and whose target is the
    /// child.
    pub edge: String,
    /// Remove children together with their parent.
    #[serde(default = "default_cascade")]
    pub cascade: bool,
}

impl ParentLink {
    /// A cascading link through `edge`.
    #[must_use]
    pub fn new(edge: impl Into<String>) -> Self {
        Self {
            edge: edge.into(),
            cascade: true,
        }
    }

    /// Sets whether children are removed with their parent.
    #[must_use]
    pub const fn with_cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }
}

/// An edge population between two vertex populations.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeConfig {
    /// Unique population name.
    pub name: String,
    /// Source vertex population.
    pub source: String,
    /// Target vertex population.
    pub target: String,
    /// Total number of edges to create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_all: Option<usize>,
    /// Per-source minimum.
    #[serde(default)]
    pub min: usize,
    /// Per-source maximum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
    /// A target may be held by at most one source at a time.
    #[serde(default)]
    pub unique: bool,
    /// Draw targets at random instead of in pool order.
    #[serde(default)]
    pub need_random: bool,
    /// Compute the target pool per source instead of sharing it.
    #[serde(default)]
    pub elements_per_source: bool,
    /// Return targets of removed edges to a unique pool.
    #[serde(default)]
    pub reuse: bool,
    /// Registered provider supplying sources and targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Creation and removal schedule; every edge is created at iteration 0
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_shift: Option<EdgeTimeShift>,
}

impl EdgeConfig {
    /// An edge population with default options.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            count_all: None,
            min: 0,
            max: None,
            unique: false,
            need_random: false,
            elements_per_source: false,
            reuse: false,
            provider: None,
            time_shift: None,
        }
    }

    /// Sets the total number of edges.
    #[must_use]
    pub const fn with_count_all(mut self, count_all: usize) -> Self {
        self.count_all = Some(count_all);
        self
    }

    /// Sets the per-source bounds.
    #[must_use]
    pub const fn with_bounds(mut self, min: usize, max: Option<usize>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Requires distinct targets.
    #[must_use]
    pub const fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Draws targets at random.
    #[must_use]
    pub const fn with_random(mut self, need_random: bool) -> Self {
        self.need_random = need_random;
        self
    }

    /// Computes the target pool per source.
    #[must_use]
    pub const fn with_elements_per_source(mut self, elements_per_source: bool) -> Self {
        self.elements_per_source = elements_per_source;
        self
    }

    /// Returns freed targets to a unique pool.
    #[must_use]
    pub const fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }

    /// Names the provider supplying sources and targets.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attaches a schedule.
    #[must_use]
    pub const fn with_time_shift(mut self, time_shift: EdgeTimeShift) -> Self {
        self.time_shift = Some(time_shift);
        self
    }
}

/// Edge schedule, interpreted like [`VertexTimeShift`] against `count_all`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeTimeShift {
    /// Edges created at iteration 0.
    pub start: usize,
    /// Edges created afterwards.
    #[serde(default)]
    pub add: usize,
    /// Edges removed over the run.
    #[serde(default)]
    pub remove: usize,
}

impl EdgeTimeShift {
    /// Schedule with `start` initial edges and `add` later ones.
    #[must_use]
    pub const fn new(start: usize, add: usize) -> Self {
        Self {
            start,
            add,
            remove: 0,
        }
    }

    /// Sets the removal quantity.
    #[must_use]
    pub const fn with_remove(mut self, remove: usize) -> Self {
        self.remove = remove;
        self
    }

    /// `start + add`.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.start.saturating_add(self.add)
    }
}
