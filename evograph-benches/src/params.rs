//! Benchmark parameter types.

use std::fmt;

/// Parameters for an allocator benchmark run.
#[derive(Clone, Debug)]
pub struct AllocatorBenchParams {
    /// Number of sources sharing the total.
    pub sources: usize,
    /// Endpoints to spread.
    pub total: usize,
    /// Whether targets must be distinct.
    pub unique: bool,
}

impl fmt::Display for AllocatorBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sources={},total={},unique={}",
            self.sources, self.total, self.unique
        )
    }
}

/// Parameters for a whole-simulation benchmark run.
#[derive(Clone, Debug)]
pub struct EngineBenchParams {
    /// Vertices in each of the two vertex populations.
    pub vertex_count: usize,
    /// Iterations to simulate.
    pub iterations: usize,
}

impl fmt::Display for EngineBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},iters={}", self.vertex_count, self.iterations)
    }
}
