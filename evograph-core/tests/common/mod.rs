use std::sync::Mutex;

use evograph_core::{
    EdgeConfig, IterationSummary, ProviderContext, RunWarning, SimulationObserver,
    TargetProvider, VertexId,
};

/// Offers only the even-numbered active targets.
pub struct EvenTargets;

impl TargetProvider for EvenTargets {
    fn source_ids(&self, _edge: &EdgeConfig, ctx: &ProviderContext<'_>) -> Vec<VertexId> {
        ctx.source().active().iter().copied().collect()
    }

    fn target_ids(
        &self,
        _edge: &EdgeConfig,
        _source: Option<VertexId>,
        ctx: &ProviderContext<'_>,
    ) -> Vec<VertexId> {
        ctx.target()
            .active()
            .iter()
            .copied()
            .filter(|id| id % 2 == 0)
            .collect()
    }
}

/// Keeps every summary and warning it is handed.
#[derive(Default)]
pub struct CollectingObserver {
    pub summaries: Mutex<Vec<IterationSummary>>,
    pub warnings: Mutex<Vec<RunWarning>>,
}

impl SimulationObserver for CollectingObserver {
    fn iteration_finished(&self, summary: &IterationSummary) {
        self.summaries
            .lock()
            .expect("observer lock")
            .push(summary.clone());
    }

    fn warning(&self, warning: &RunWarning) {
        self.warnings
            .lock()
            .expect("observer lock")
            .push(warning.clone());
    }
}
