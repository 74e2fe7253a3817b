//! Evograph core library.
//!
//! Synthesises vertex and edge populations and evolves them over discrete
//! iterations, recording one diff per population and iteration. Start with
//! [`ScenarioConfig`] and [`SimulationBuilder`]; the building blocks
//! ([`allocate`], [`materialize`], the lifecycle trackers and
//! [`RateScheduler`]) are public for callers composing their own drivers.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod allocator;
mod config;
mod diff;
mod engine;
mod error;
mod export;
mod id_range;
mod lifecycle;
mod materializer;
mod observer;
mod population;
mod provider;
mod scheduler;
#[cfg(test)]
mod test_utils;

pub use crate::{
    allocator::{Allocation, AllocationError, AllocationErrorCode, AllocationRequest, allocate},
    config::{
        DEFAULT_SEED, EdgeConfig, EdgeTimeShift, ParentLink, ScenarioConfig, VertexConfig,
        VertexTimeShift, validate,
    },
    diff::{Diff, DiffLog, EdgeDiff, VertexDiff},
    engine::{ExecutionStrategy, Simulation, SimulationBuilder},
    error::{
        ConfigIssue, ConfigIssueCode, Result, RunWarning, SimulationError, SimulationErrorCode,
    },
    export::{Artifact, DiffOp, DiffRow, DiffRows},
    id_range::{IdCursor, IdRange, VertexId},
    lifecycle::{EdgeLifecycle, Removal, VertexLifecycle},
    materializer::{Adjacency, MaterializeError, MaterializeOptions, TargetPool, materialize},
    observer::{
        IterationSummary, NoopObserver, PopulationDelta, PopulationKind, SimulationObserver,
        TracingObserver,
    },
    population::{EdgePopulation, SimulationOutput, VertexPopulation},
    provider::{
        BLOCK_PROVIDER, BlockProvider, PopulationProvider, ProviderContext, ProviderRegistry,
        TargetProvider, VertexView,
    },
    scheduler::RateScheduler,
};
