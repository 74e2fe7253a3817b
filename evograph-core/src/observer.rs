//! Injected progress and warning reporting.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::RunWarning;

/// Whether a population holds vertices or edges.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PopulationKind {
    /// A vertex population.
    Vertex,
    /// An edge population.
    Edge,
}

impl PopulationKind {
    /// Lower-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Edge => "edge",
        }
    }
}

/// Changes one population went through during an iteration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PopulationDelta {
    /// Population name.
    pub name: Arc<str>,
    /// Vertex or edge population.
    pub kind: PopulationKind,
    /// Entities added.
    pub added: usize,
    /// Entities removed.
    pub removed: usize,
    /// Entities active after the iteration.
    pub active: usize,
}

/// Outcome of one iteration across all populations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IterationSummary {
    /// Iteration index.
    pub iteration: usize,
    /// One entry per population, vertices first, in declaration order.
    pub populations: Vec<PopulationDelta>,
}

impl IterationSummary {
    /// Entities added across populations of `kind`.
    #[must_use]
    pub fn added(&self, kind: PopulationKind) -> usize {
        self.of_kind(kind).map(|delta| delta.added).sum()
    }

    /// Entities removed across populations of `kind`.
    #[must_use]
    pub fn removed(&self, kind: PopulationKind) -> usize {
        self.of_kind(kind).map(|delta| delta.removed).sum()
    }

    fn of_kind(&self, kind: PopulationKind) -> impl Iterator<Item = &PopulationDelta> + '_ {
        self.populations
            .iter()
            .filter(move |delta| delta.kind == kind)
    }
}

/// Receives progress callbacks from a running simulation.
///
/// All methods default to doing nothing. Callbacks arrive from the thread
/// driving [`crate::Simulation::step`], never from workers.
pub trait SimulationObserver: Send + Sync {
    /// An iteration is about to run.
    fn iteration_started(&self, _iteration: usize) {}

    /// An iteration completed.
    fn iteration_finished(&self, _summary: &IterationSummary) {}

    /// A non-fatal condition was detected.
    fn warning(&self, _warning: &RunWarning) {}
}

/// Observer forwarding every callback to `tracing`, and to `metrics` when the
/// feature is enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl SimulationObserver for TracingObserver {
    fn iteration_started(&self, iteration: usize) {
        debug!(iteration, "iteration started");
    }

    fn iteration_finished(&self, summary: &IterationSummary) {
        info!(
            iteration = summary.iteration,
            vertices_added = summary.added(PopulationKind::Vertex),
            vertices_removed = summary.removed(PopulationKind::Vertex),
            edges_added = summary.added(PopulationKind::Edge),
            edges_removed = summary.removed(PopulationKind::Edge),
            "iteration finished"
        );
        for delta in &summary.populations {
            record_delta(delta);
        }
    }

    fn warning(&self, warning: &RunWarning) {
        warn!(entity = warning.entity(), detail = %warning, "simulation warning");
    }
}

/// Observer discarding every callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl SimulationObserver for NoopObserver {}

#[cfg(feature = "metrics")]
fn record_delta(delta: &PopulationDelta) {
    let (added, removed) = match delta.kind {
        PopulationKind::Vertex => (
            "evograph_vertices_added_total",
            "evograph_vertices_removed_total",
        ),
        PopulationKind::Edge => ("evograph_edges_added_total", "evograph_edges_removed_total"),
    };
    let entity = delta.name.to_string();
    metrics::counter!(added, "entity" => entity.clone()).increment(delta.added as u64);
    metrics::counter!(removed, "entity" => entity).increment(delta.removed as u64);
}

#[cfg(not(feature = "metrics"))]
fn record_delta(_delta: &PopulationDelta) {}

#[cfg(test)]
mod tests {
    use super::*;

    use evograph_test_support::tracing::RecordingLayer;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    fn summary() -> IterationSummary {
        IterationSummary {
            iteration: 4,
            populations: vec![
                PopulationDelta {
                    name: Arc::from("users"),
                    kind: PopulationKind::Vertex,
                    added: 5,
                    removed: 2,
                    active: 30,
                },
                PopulationDelta {
                    name: Arc::from("follows"),
                    kind: PopulationKind::Edge,
                    added: 7,
                    removed: 0,
                    active: 70,
                },
            ],
        }
    }

    #[test]
    fn summary_totals_by_kind() {
        let summary = summary();
        assert_eq!(summary.added(PopulationKind::Vertex), 5);
        assert_eq!(summary.removed(PopulationKind::Vertex), 2);
        assert_eq!(summary.added(PopulationKind::Edge), 7);
    }

    #[test]
    fn tracing_observer_logs_warnings_with_entity() {
        let layer = RecordingLayer::default();
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        tracing::subscriber::with_default(subscriber, || {
            TracingObserver.iteration_finished(&summary());
            TracingObserver.warning(&RunWarning::UnderRemoval {
                entity: Arc::from("users"),
                iteration: 4,
                requested: 3,
                removed: 1,
            });
        });

        let events = layer.events();
        let finished = events
            .iter()
            .find(|event| {
                event.fields.get("message").map(String::as_str) == Some("iteration finished")
            })
            .expect("iteration event recorded");
        assert_eq!(finished.fields.get("edges_added"), Some(&"7".to_owned()));

        let warning = events
            .iter()
            .find(|event| event.level == Level::WARN)
            .expect("warning recorded");
        assert_eq!(warning.fields.get("entity"), Some(&"users".to_owned()));
    }
}
