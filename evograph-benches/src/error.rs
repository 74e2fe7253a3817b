//! Benchmark setup error type.
//!
//! Setup helpers propagate failures with `?` instead of `.expect()`.

use evograph_core::{AllocationError, SimulationError};

/// Errors that may occur during benchmark setup.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Building or running a simulation failed.
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),
    /// A standalone allocation failed.
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),
    /// A zero value was passed where a non-zero integer was required.
    #[error("expected a non-zero value for {context}")]
    ZeroValue {
        /// A description of the parameter that was unexpectedly zero.
        context: &'static str,
    },
}
