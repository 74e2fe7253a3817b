//! Error and warning types for the evograph core library.
//!
//! Fatal conditions surface as [`SimulationError`]; individual validation
//! findings are [`ConfigIssue`]s batched inside
//! [`SimulationError::ConfigInvalid`]. Conditions the run recovers from are
//! reported as [`RunWarning`]s.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::id_range::VertexId;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this value."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// A single finding produced while validating a scenario configuration.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ConfigIssue {
    /// The scenario must simulate at least one iteration.
    #[error("iterations must be at least 1")]
    NoIterations,
    /// A population was declared without a name.
    #[error("{kind} #{index} has an empty name")]
    EmptyName {
        /// `"vertex"` or `"edge"`.
        kind: &'static str,
        /// Position of the declaration.
        index: usize,
    },
    /// Two populations of the same kind share a name.
    #[error("{kind} name `{name}` is declared more than once")]
    DuplicateName {
        /// `"vertex"` or `"edge"`.
        kind: &'static str,
        /// The repeated name.
        name: Arc<str>,
    },
    /// A vertex population must contain at least one identity.
    #[error("vertex `{vertex}` must have a count of at least 1")]
    EmptyPopulation {
        /// Offending vertex population.
        vertex: Arc<str>,
    },
    /// `start + add` does not match the configured total.
    #[error("`{entity}`: start ({start}) + add ({add}) must equal {expected}")]
    TimeShiftSum {
        /// Offending population.
        entity: Arc<str>,
        /// Configured start quantity.
        start: usize,
        /// Configured addition quantity.
        add: usize,
        /// The total the sum must match.
        expected: usize,
    },
    /// More removals were requested than entities will ever exist.
    #[error("`{entity}`: remove ({remove}) exceeds start + add ({total})")]
    RemoveExceedsTotal {
        /// Offending population.
        entity: Arc<str>,
        /// Configured removal quantity.
        remove: usize,
        /// `start + add`.
        total: usize,
    },
    /// `recur` may not exceed `remove`.
    #[error("vertex `{vertex}`: recur ({recur}) exceeds remove ({remove})")]
    RecurExceedsRemove {
        /// Offending vertex population.
        vertex: Arc<str>,
        /// Configured recur quantity.
        recur: usize,
        /// Configured removal quantity.
        remove: usize,
    },
    /// Per-source bounds are contradictory.
    #[error("edge `{edge}`: min ({min}) exceeds max ({max})")]
    MinExceedsMax {
        /// Offending edge population.
        edge: Arc<str>,
        /// Configured per-source minimum.
        min: usize,
        /// Configured per-source maximum.
        max: usize,
    },
    /// An edge refers to a vertex population that does not exist.
    #[error("edge `{edge}`: {role} vertex `{name}` does not exist")]
    UnknownVertex {
        /// Offending edge population.
        edge: Arc<str>,
        /// `"source"` or `"target"`.
        role: &'static str,
        /// The unresolved vertex name.
        name: Arc<str>,
    },
    /// Standalone edges need an explicit total.
    #[error("edge `{edge}` requires count_all")]
    MissingCountAll {
        /// Offending edge population.
        edge: Arc<str>,
    },
    /// A child vertex names a parent edge that does not exist.
    #[error("vertex `{vertex}`: parent edge `{edge}` does not exist")]
    UnknownParentEdge {
        /// Child vertex population.
        vertex: Arc<str>,
        /// The unresolved edge name.
        edge: Arc<str>,
    },
    /// The parent edge does not point at the child population.
    #[error("vertex `{vertex}`: parent edge `{edge}` targets `{target}` instead")]
    ParentEdgeTargetMismatch {
        /// Child vertex population.
        vertex: Arc<str>,
        /// The parent edge.
        edge: Arc<str>,
        /// The population the edge actually targets.
        target: Arc<str>,
    },
    /// Two children claim the same parent edge.
    #[error("edge `{edge}` is the parent edge of more than one vertex")]
    SharedParentEdge {
        /// The doubly-claimed edge.
        edge: Arc<str>,
    },
    /// A parent edge carries an option that only standalone edges support.
    #[error("parent edge `{edge}` may not set `{option}`")]
    ParentEdgeOption {
        /// The parent edge.
        edge: Arc<str>,
        /// The unsupported option.
        option: &'static str,
    },
    /// A parent edge declares a total different from the child count.
    #[error("parent edge `{edge}`: count_all ({count_all}) must equal the child count ({expected})")]
    ParentEdgeCount {
        /// The parent edge.
        edge: Arc<str>,
        /// Declared total.
        count_all: usize,
        /// Child population count.
        expected: usize,
    },
    /// Parent links form a cycle.
    #[error("vertex `{vertex}` is its own ancestor")]
    ParentCycle {
        /// A vertex on the cycle.
        vertex: Arc<str>,
    },
    /// A named provider is not registered.
    #[error("edge `{edge}`: custom function `{name}` is not registered")]
    CustomFunctionMissing {
        /// Offending edge population.
        edge: Arc<str>,
        /// The unresolved provider name.
        name: Arc<str>,
    },
}

define_error_codes! {
    /// Stable codes describing [`ConfigIssue`] variants.
    enum ConfigIssueCode for ConfigIssue {
        /// The scenario must simulate at least one iteration.
        NoIterations => NoIterations => "CONFIG_NO_ITERATIONS",
        /// A population was declared without a name.
        EmptyName => EmptyName { .. } => "CONFIG_EMPTY_NAME",
        /// Two populations of the same kind share a name.
        DuplicateName => DuplicateName { .. } => "CONFIG_DUPLICATE_NAME",
        /// A vertex population must contain at least one identity.
        EmptyPopulation => EmptyPopulation { .. } => "CONFIG_EMPTY_POPULATION",
        /// `start + add` does not match the configured total.
        TimeShiftSum => TimeShiftSum { .. } => "CONFIG_TIME_SHIFT_SUM",
        /// More removals were requested than entities will ever exist.
        RemoveExceedsTotal => RemoveExceedsTotal { .. } => "CONFIG_REMOVE_EXCEEDS_TOTAL",
        /// `recur` may not exceed `remove`.
        RecurExceedsRemove => RecurExceedsRemove { .. } => "CONFIG_RECUR_EXCEEDS_REMOVE",
        /// Per-source bounds are contradictory.
        MinExceedsMax => MinExceedsMax { .. } => "CONFIG_MIN_EXCEEDS_MAX",
        /// An edge refers to a vertex population that does not exist.
        UnknownVertex => UnknownVertex { .. } => "CONFIG_UNKNOWN_VERTEX",
        /// Standalone edges need an explicit total.
        MissingCountAll => MissingCountAll { .. } => "CONFIG_MISSING_COUNT_ALL",
        /// A child vertex names a parent edge that does not exist.
        UnknownParentEdge => UnknownParentEdge { .. } => "CONFIG_UNKNOWN_PARENT_EDGE",
        /// The parent edge does not point at the child population.
        ParentEdgeTargetMismatch => ParentEdgeTargetMismatch { .. } => "CONFIG_PARENT_EDGE_TARGET_MISMATCH",
        /// Two children claim the same parent edge.
        SharedParentEdge => SharedParentEdge { .. } => "CONFIG_SHARED_PARENT_EDGE",
        /// A parent edge carries an option that only standalone edges support.
        ParentEdgeOption => ParentEdgeOption { .. } => "CONFIG_PARENT_EDGE_OPTION",
        /// A parent edge declares a total different from the child count.
        ParentEdgeCount => ParentEdgeCount { .. } => "CONFIG_PARENT_EDGE_COUNT",
        /// Parent links form a cycle.
        ParentCycle => ParentCycle { .. } => "CONFIG_PARENT_CYCLE",
        /// A named provider is not registered.
        CustomFunctionMissing => CustomFunctionMissing { .. } => "CONFIG_CUSTOM_FUNCTION_MISSING",
    }
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fatal error produced while building or running a simulation.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SimulationError {
    /// The scenario failed validation; every finding is listed.
    #[error("configuration is invalid ({} issue(s)): {}", .issues.len(), join_issues(.issues))]
    ConfigInvalid {
        /// All findings of the validation pass.
        issues: Vec<ConfigIssue>,
    },
    /// The requested number of edge endpoints cannot be spread over the
    /// sources within their bounds.
    #[error(
        "`{entity}` at iteration {iteration}: cannot allocate {requested} endpoints, only {allocated} fit"
    )]
    AllocationInfeasible {
        /// Edge population being materialised.
        entity: Arc<str>,
        /// Iteration in which the allocation failed.
        iteration: usize,
        /// Requested total.
        requested: usize,
        /// Amount placed before the allocator ran out of capacity.
        allocated: usize,
    },
    /// Uniqueness was requested but not enough distinct targets exist.
    #[error(
        "`{entity}` at iteration {iteration}: {requested} distinct targets requested{}, only {available} available",
        source_suffix(.source_id)
    )]
    InsufficientTargets {
        /// Edge population being materialised.
        entity: Arc<str>,
        /// Iteration in which the pool ran dry.
        iteration: usize,
        /// Source whose request could not be met, when known.
        source_id: Option<VertexId>,
        /// Targets requested.
        requested: usize,
        /// Distinct targets that were available.
        available: usize,
    },
    /// A provider referenced by name is not registered.
    #[error("custom function `{name}` is not registered")]
    CustomFunctionMissing {
        /// The unresolved provider name.
        name: Arc<str>,
    },
}

fn source_suffix(source_id: &Option<VertexId>) -> String {
    source_id.map_or_else(String::new, |id| format!(" for source {id}"))
}

define_error_codes! {
    /// Stable codes describing [`SimulationError`] variants.
    enum SimulationErrorCode for SimulationError {
        /// The scenario failed validation.
        ConfigInvalid => ConfigInvalid { .. } => "SIMULATION_CONFIG_INVALID",
        /// The allocator could not reach the requested total.
        AllocationInfeasible => AllocationInfeasible { .. } => "SIMULATION_ALLOCATION_INFEASIBLE",
        /// Not enough distinct targets exist.
        InsufficientTargets => InsufficientTargets { .. } => "SIMULATION_INSUFFICIENT_TARGETS",
        /// A provider referenced by name is not registered.
        CustomFunctionMissing => CustomFunctionMissing { .. } => "SIMULATION_CUSTOM_FUNCTION_MISSING",
    }
}

impl SimulationError {
    /// Returns the validation findings when the error is
    /// [`SimulationError::ConfigInvalid`].
    #[must_use]
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            Self::ConfigInvalid { issues } => issues,
            _ => &[],
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, SimulationError>;

/// Non-fatal condition observed while running a simulation.
///
/// Warnings never abort a run; they mark places where the produced data
/// deviates from the configured quantities.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunWarning {
    /// Fewer entities were active than the scheduler asked to remove.
    UnderRemoval {
        /// Population being shrunk.
        entity: Arc<str>,
        /// Iteration of the shortfall.
        iteration: usize,
        /// Removals requested.
        requested: usize,
        /// Removals performed.
        removed: usize,
    },
    /// Scheduled additions could not be realised yet and were pushed to a
    /// later iteration.
    Deferred {
        /// Population being grown.
        entity: Arc<str>,
        /// Iteration of the deferral.
        iteration: usize,
        /// Additions requested.
        requested: usize,
        /// Additions performed.
        realised: usize,
    },
    /// The per-source minimum could not be honoured for every source.
    FloorExceedsBudget {
        /// Edge population being materialised.
        entity: Arc<str>,
        /// Iteration of the allocation.
        iteration: usize,
        /// Endpoints requested.
        total: usize,
        /// `sources * min`.
        floor: usize,
    },
    /// After the final iteration a quantity differs from its configuration.
    Deviation {
        /// Affected population.
        entity: Arc<str>,
        /// `"created"` or `"removed"`.
        quantity: &'static str,
        /// Configured amount.
        configured: usize,
        /// Amount actually produced.
        actual: usize,
    },
}

impl RunWarning {
    /// Name of the population the warning concerns.
    #[must_use]
    pub fn entity(&self) -> &str {
        match self {
            Self::UnderRemoval { entity, .. }
            | Self::Deferred { entity, .. }
            | Self::FloorExceedsBudget { entity, .. }
            | Self::Deviation { entity, .. } => entity,
        }
    }
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnderRemoval {
                entity,
                iteration,
                requested,
                removed,
            } => write!(
                f,
                "`{entity}` at iteration {iteration}: asked to remove {requested}, removed {removed}"
            ),
            Self::Deferred {
                entity,
                iteration,
                requested,
                realised,
            } => write!(
                f,
                "`{entity}` at iteration {iteration}: {realised} of {requested} additions realised, rest deferred"
            ),
            Self::FloorExceedsBudget {
                entity,
                iteration,
                total,
                floor,
            } => write!(
                f,
                "`{entity}` at iteration {iteration}: per-source minimum ({floor} endpoints) not met with {total} allocated"
            ),
            Self::Deviation {
                entity,
                quantity,
                configured,
                actual,
            } => write!(
                f,
                "`{entity}`: {quantity} {actual} instead of the configured {configured}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_lists_every_issue() {
        let err = SimulationError::ConfigInvalid {
            issues: vec![
                ConfigIssue::NoIterations,
                ConfigIssue::MissingCountAll {
                    edge: Arc::from("follows"),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("2 issue(s)"), "{message}");
        assert!(message.contains("iterations must be at least 1"));
        assert!(message.contains("edge `follows` requires count_all"));
        assert_eq!(err.code().as_str(), "SIMULATION_CONFIG_INVALID");
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn insufficient_targets_mentions_source_when_known() {
        let err = SimulationError::InsufficientTargets {
            entity: Arc::from("owns"),
            iteration: 3,
            source_id: Some(7),
            requested: 4,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "`owns` at iteration 3: 4 distinct targets requested for source 7, only 2 available"
        );
        assert_eq!(err.code(), SimulationErrorCode::InsufficientTargets);
    }

    #[test]
    fn issue_codes_are_stable() {
        let issue = ConfigIssue::CustomFunctionMissing {
            edge: Arc::from("e"),
            name: Arc::from("nope"),
        };
        assert_eq!(issue.code().as_str(), "CONFIG_CUSTOM_FUNCTION_MISSING");
        assert_eq!(issue.code().to_string(), "CONFIG_CUSTOM_FUNCTION_MISSING");
    }

    #[test]
    fn warnings_name_their_entity() {
        let warning = RunWarning::UnderRemoval {
            entity: Arc::from("users"),
            iteration: 2,
            requested: 5,
            removed: 3,
        };
        assert_eq!(warning.entity(), "users");
        assert!(warning.to_string().contains("asked to remove 5, removed 3"));
    }
}
