//! Finalised populations handed to exporters.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    config::VertexTimeShift,
    diff::{DiffLog, EdgeDiff, VertexDiff},
    error::RunWarning,
    id_range::{IdRange, VertexId},
    materializer::Adjacency,
};

/// A vertex population after the last iteration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VertexPopulation {
    /// Population name.
    pub name: String,
    /// Identities owned by the population.
    pub id_range: IdRange,
    /// Schedule the population followed.
    pub time_shift: Option<VertexTimeShift>,
    /// Parent population name, for child populations.
    pub parent: Option<String>,
    /// Child id to parent id, for child populations.
    pub key_data: BTreeMap<VertexId, VertexId>,
    /// Identities active after the last iteration.
    pub active: BTreeSet<VertexId>,
    /// Identities removed during the run.
    pub removed: BTreeSet<VertexId>,
    /// One diff per iteration.
    pub store: DiffLog<VertexDiff>,
}

/// An edge population after the last iteration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EdgePopulation {
    /// Population name.
    pub name: String,
    /// Source vertex population.
    pub source: String,
    /// Target vertex population.
    pub target: String,
    /// Active adjacency after the last iteration.
    pub objects: Adjacency,
    /// Edges removed during the run.
    pub removed: Adjacency,
    /// One diff per iteration.
    pub store: DiffLog<EdgeDiff>,
}

impl EdgePopulation {
    /// Number of active edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }
}

/// Everything a finished simulation produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimulationOutput {
    /// Seed the run used.
    pub seed: u64,
    /// Iterations simulated.
    pub iterations: usize,
    /// Vertex populations in declaration order.
    pub vertices: Vec<VertexPopulation>,
    /// Edge populations in declaration order.
    pub edges: Vec<EdgePopulation>,
    /// Non-fatal conditions in the order they were detected.
    pub warnings: Vec<RunWarning>,
}

impl SimulationOutput {
    /// Vertex population named `name`.
    #[must_use]
    pub fn vertex(&self, name: &str) -> Option<&VertexPopulation> {
        self.vertices.iter().find(|population| population.name == name)
    }

    /// Edge population named `name`.
    #[must_use]
    pub fn edge(&self, name: &str) -> Option<&EdgePopulation> {
        self.edges.iter().find(|population| population.name == name)
    }

    /// `true` when the run completed without deviating from the scenario.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
