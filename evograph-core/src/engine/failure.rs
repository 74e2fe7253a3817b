//! Lifting allocator and materializer outcomes into run errors and warnings.

use std::sync::Arc;

use crate::{
    allocator::{Allocation, AllocationError},
    error::{RunWarning, SimulationError},
    materializer::MaterializeError,
};

/// Warning for a plan that left some source below its minimum.
pub(super) fn floor_shortfall(
    entity: &Arc<str>,
    iteration: usize,
    plan: &Allocation,
    floor: usize,
) -> Option<RunWarning> {
    (!plan.floor_satisfied()).then(|| RunWarning::FloorExceedsBudget {
        entity: Arc::clone(entity),
        iteration,
        total: plan.total(),
        floor,
    })
}

pub(super) fn allocation_failure(
    entity: &Arc<str>,
    iteration: usize,
    err: AllocationError,
) -> SimulationError {
    match err {
        AllocationError::Infeasible {
            requested,
            allocated,
        } => SimulationError::AllocationInfeasible {
            entity: Arc::clone(entity),
            iteration,
            requested,
            allocated,
        },
        AllocationError::InsufficientTargets {
            source_id,
            requested,
            available,
        } => SimulationError::InsufficientTargets {
            entity: Arc::clone(entity),
            iteration,
            source_id: Some(source_id),
            requested,
            available,
        },
    }
}

pub(super) fn materialize_failure(
    entity: &Arc<str>,
    iteration: usize,
    err: MaterializeError,
) -> SimulationError {
    match err {
        MaterializeError::InsufficientTargets {
            source_id,
            requested,
            available,
        } => SimulationError::InsufficientTargets {
            entity: Arc::clone(entity),
            iteration,
            source_id: Some(source_id),
            requested,
            available,
        },
    }
}
