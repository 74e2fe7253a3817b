//! Views of a finished run for file writers.
//!
//! [`Artifact`] is the persisted shape of one population: identity metadata
//! plus either the child-to-parent `key_data` map or the `objects`
//! adjacency, together with the per-iteration diff log. [`DiffRows`] flattens
//! a diff log into one row per added or removed entity, in iteration order.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{
    config::VertexTimeShift,
    diff::{DiffLog, EdgeDiff, VertexDiff},
    id_range::{IdRange, VertexId},
    materializer::Adjacency,
    population::{EdgePopulation, SimulationOutput, VertexPopulation},
};

/// Serialisable per-population artifact borrowing from a
/// [`SimulationOutput`].
///
/// # Examples
/// ```
/// use evograph_core::{ScenarioConfig, SimulationBuilder, VertexConfig};
///
/// let scenario = ScenarioConfig::new(2).with_vertex(VertexConfig::new("users", 3));
/// let output = SimulationBuilder::new(scenario).build()?.run()?;
/// let artifacts: Vec<_> = output.artifacts().collect();
/// assert_eq!(artifacts.len(), 1);
/// assert_eq!(artifacts[0].name(), "users");
/// # Ok::<(), evograph_core::SimulationError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact<'a> {
    /// A vertex population.
    Vertex {
        /// Population name.
        name: &'a str,
        /// Identities owned by the population.
        id_range: IdRange,
        /// Number of identities in `id_range`.
        count: usize,
        /// Schedule the population followed.
        #[serde(skip_serializing_if = "Option::is_none")]
        time_shift: Option<&'a VertexTimeShift>,
        /// Parent population, for children.
        #[serde(skip_serializing_if = "Option::is_none")]
        parent: Option<&'a str>,
        /// Child id to parent id, for children.
        #[serde(skip_serializing_if = "no_key_data")]
        key_data: &'a BTreeMap<VertexId, VertexId>,
        /// Per-iteration diffs.
        time_shift_store: &'a DiffLog<VertexDiff>,
    },
    /// An edge population.
    Edge {
        /// Population name.
        name: &'a str,
        /// Source vertex population.
        source: &'a str,
        /// Target vertex population.
        target: &'a str,
        /// Active adjacency after the last iteration.
        objects: &'a Adjacency,
        /// Per-iteration diffs.
        time_shift_store: &'a DiffLog<EdgeDiff>,
    },
}

impl<'a> Artifact<'a> {
    /// Artifact of a vertex population.
    #[must_use]
    pub fn from_vertex(population: &'a VertexPopulation) -> Self {
        Self::Vertex {
            name: &population.name,
            id_range: population.id_range,
            count: population.id_range.count(),
            time_shift: population.time_shift.as_ref(),
            parent: population.parent.as_deref(),
            key_data: &population.key_data,
            time_shift_store: &population.store,
        }
    }

    /// Artifact of an edge population.
    #[must_use]
    pub fn from_edge(population: &'a EdgePopulation) -> Self {
        Self::Edge {
            name: &population.name,
            source: &population.source,
            target: &population.target,
            objects: &population.objects,
            time_shift_store: &population.store,
        }
    }

    /// Name of the population, used as the artifact file stem.
    #[must_use]
    pub const fn name(&self) -> &'a str {
        match self {
            Self::Vertex { name, .. } | Self::Edge { name, .. } => *name,
        }
    }

    /// Rows of the diff log.
    #[must_use]
    pub fn rows(&self) -> DiffRows<'a> {
        match *self {
            Self::Vertex {
                time_shift_store, ..
            } => DiffRows::for_vertices(time_shift_store),
            Self::Edge {
                time_shift_store, ..
            } => DiffRows::for_edges(time_shift_store),
        }
    }
}

fn no_key_data(key_data: &&BTreeMap<VertexId, VertexId>) -> bool {
    key_data.is_empty()
}

impl SimulationOutput {
    /// One artifact per population, vertices first, in declaration order.
    pub fn artifacts(&self) -> impl Iterator<Item = Artifact<'_>> + '_ {
        self.vertices
            .iter()
            .map(Artifact::from_vertex)
            .chain(self.edges.iter().map(Artifact::from_edge))
    }

    /// Artifact of the population named `name`.
    #[must_use]
    pub fn artifact(&self, name: &str) -> Option<Artifact<'_>> {
        self.artifacts().find(|artifact| artifact.name() == name)
    }
}

/// Whether a row records an addition or a removal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum DiffOp {
    /// The entity appeared.
    #[serde(rename = "a")]
    Add,
    /// The entity was removed.
    #[serde(rename = "r")]
    Remove,
}

impl DiffOp {
    /// Short tag used in the diff log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "a",
            Self::Remove => "r",
        }
    }
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One added or removed entity.
///
/// Vertex rows carry the identity in `id`; edge rows carry the source in
/// `id` and the target in `target`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct DiffRow {
    /// Iteration the change happened in.
    pub iteration: usize,
    /// Addition or removal.
    pub op: DiffOp,
    /// Vertex id, or edge source id.
    pub id: VertexId,
    /// Edge target id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<VertexId>,
}

impl fmt::Display for DiffRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.iteration, self.op, self.id)?;
        if let Some(target) = self.target {
            write!(f, "\t{target}")?;
        }
        Ok(())
    }
}

/// Pull-based iterator over the rows of a diff log.
///
/// Rows come in iteration order; within an iteration additions precede
/// removals. Build a new iterator to start over.
///
/// # Examples
/// ```
/// use evograph_core::{DiffLog, DiffOp, DiffRows, VertexDiff};
///
/// let mut log = DiffLog::default();
/// log.push(VertexDiff { added: vec![1, 2], removed: vec![] });
/// log.push(VertexDiff { added: vec![], removed: vec![1] });
/// let rows: Vec<_> = DiffRows::for_vertices(&log).collect();
/// assert_eq!(rows.len(), 3);
/// assert_eq!(rows[2].op, DiffOp::Remove);
/// assert_eq!(rows[2].to_string(), "1\tr\t1");
/// ```
pub struct DiffRows<'a> {
    inner: Box<dyn Iterator<Item = DiffRow> + 'a>,
}

impl<'a> DiffRows<'a> {
    /// Rows of a vertex diff log.
    #[must_use]
    pub fn for_vertices(log: &'a DiffLog<VertexDiff>) -> Self {
        let inner = log.iter().enumerate().flat_map(|(iteration, diff)| {
            let row = move |op| {
                move |&id: &VertexId| DiffRow {
                    iteration,
                    op,
                    id,
                    target: None,
                }
            };
            diff.added
                .iter()
                .map(row(DiffOp::Add))
                .chain(diff.removed.iter().map(row(DiffOp::Remove)))
        });
        Self {
            inner: Box::new(inner),
        }
    }

    /// Rows of an edge diff log, one per `(source, target)` pair.
    #[must_use]
    pub fn for_edges(log: &'a DiffLog<EdgeDiff>) -> Self {
        let inner = log.iter().enumerate().flat_map(|(iteration, diff)| {
            let rows = move |op, adjacency: &'a Adjacency| {
                adjacency.iter().flat_map(move |(&id, targets)| {
                    targets.iter().map(move |&target| DiffRow {
                        iteration,
                        op,
                        id,
                        target: Some(target),
                    })
                })
            };
            rows(DiffOp::Add, &diff.added).chain(rows(DiffOp::Remove, &diff.removed))
        });
        Self {
            inner: Box::new(inner),
        }
    }
}

impl Iterator for DiffRows<'_> {
    type Item = DiffRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for DiffRows<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffRows").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use crate::{
        config::{EdgeConfig, ParentLink, ScenarioConfig, VertexConfig, VertexTimeShift},
        engine::SimulationBuilder,
    };

    use super::*;

    fn output() -> SimulationOutput {
        let scenario = ScenarioConfig::new(3)
            .with_vertex(
                VertexConfig::new("accounts", 2)
                    .with_time_shift(VertexTimeShift::new(2, 0).with_remove(1)),
            )
            .with_vertex(VertexConfig::new("wallets", 4).with_parent(ParentLink::new("owns")))
            .with_edge(
                EdgeConfig::new("owns", "accounts", "wallets")
                    .with_count_all(4)
                    .with_bounds(2, Some(2)),
            );
        SimulationBuilder::new(scenario)
            .build()
            .and_then(|simulation| simulation.run())
            .expect("scenario runs")
    }

    #[test]
    fn vertex_artifact_carries_identity_and_key_data() {
        let output = output();
        let artifact = output.artifact("wallets").expect("wallets artifact");
        let value = serde_json::to_value(artifact).expect("artifact serialises");

        assert_eq!(value["kind"], json!("vertex"));
        assert_eq!(value["id_range"], json!({ "min": 2, "max": 5 }));
        assert_eq!(value["count"], json!(4));
        assert_eq!(value["parent"], json!("accounts"));
        assert_eq!(value["key_data"]["2"], json!(0));
        assert_eq!(value["time_shift_store"]["iter"][0]["a"], json!([2, 3, 4, 5]));
    }

    #[test]
    fn root_vertex_artifact_omits_child_fields() {
        let output = output();
        let value = serde_json::to_value(output.artifact("accounts").expect("accounts"))
            .expect("artifact serialises");
        assert!(value.get("parent").is_none());
        assert!(value.get("key_data").is_none());
        assert_eq!(value["time_shift"]["remove"], json!(1));
    }

    #[test]
    fn edge_artifact_carries_objects() {
        let output = output();
        let value = serde_json::to_value(output.artifact("owns").expect("owns"))
            .expect("artifact serialises");
        assert_eq!(value["kind"], json!("edge"));
        assert_eq!(value["source"], json!("accounts"));
        assert_eq!(value["objects"], json!({ "1": [4, 5] }));
    }

    #[test]
    fn artifacts_list_vertices_before_edges() {
        let output = output();
        let names: Vec<_> = output.artifacts().map(|artifact| artifact.name()).collect();
        assert_eq!(names, vec!["accounts", "wallets", "owns"]);
    }

    #[test]
    fn edge_rows_flatten_pairs() {
        let output = output();
        let owns = output.artifact("owns").expect("owns");
        let rows: Vec<_> = owns.rows().collect();

        let added: BTreeSet<_> = rows
            .iter()
            .filter(|row| row.op == DiffOp::Add)
            .map(|row| (row.id, row.target))
            .collect();
        assert_eq!(
            added,
            BTreeSet::from([(0, Some(2)), (0, Some(3)), (1, Some(4)), (1, Some(5))])
        );
        let removed: Vec<_> = rows.iter().filter(|row| row.op == DiffOp::Remove).collect();
        assert_eq!(removed.len(), 2);
        assert!(removed.iter().all(|row| row.iteration == 2 && row.id == 0));
        assert_eq!(
            removed.first().map(ToString::to_string).as_deref(),
            Some("2\tr\t0\t2")
        );
    }

    #[test]
    fn rows_restart_by_reconstruction() {
        let output = output();
        let wallets = output.artifact("wallets").expect("wallets");
        let first: Vec<_> = wallets.rows().collect();
        let second: Vec<_> = wallets.rows().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
    }
}
