//! Scenario validation and the resolved plan the engine runs from.

use std::{collections::HashMap, sync::Arc};

use tracing::instrument;

use crate::{
    error::{ConfigIssue, Result, SimulationError},
    provider::ProviderRegistry,
};

use super::{EdgeConfig, ScenarioConfig, VertexConfig};

/// Name-resolved view of a valid scenario.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ScenarioPlan {
    /// Vertex indices with every parent before its children.
    pub(crate) vertex_order: Vec<usize>,
    /// Per vertex, the index of the edge linking it to its parent.
    pub(crate) parent_edge: Vec<Option<usize>>,
    /// Per edge, the child vertex it links, if it is a parent link.
    pub(crate) link_child: Vec<Option<usize>>,
    /// Per edge, the source and target vertex indices.
    pub(crate) endpoints: Vec<(usize, usize)>,
}

/// Validates `config` against the providers in `registry`.
///
/// # Errors
/// Returns [`SimulationError::ConfigInvalid`] listing every finding.
///
/// # Examples
/// ```
/// use evograph_core::{EdgeConfig, ProviderRegistry, ScenarioConfig, VertexConfig, validate};
///
/// let scenario = ScenarioConfig::new(3)
///     .with_vertex(VertexConfig::new("users", 4))
///     .with_edge(EdgeConfig::new("follows", "users", "ghosts"));
/// let err = validate(&scenario, &ProviderRegistry::with_builtins()).expect_err("two issues");
/// assert_eq!(err.issues().len(), 2);
/// ```
pub fn validate(config: &ScenarioConfig, registry: &ProviderRegistry) -> Result<()> {
    plan(config, registry).map(drop)
}

#[instrument(
    name = "config.validate",
    level = "debug",
    err,
    skip(config, registry),
    fields(vertices = config.vertices.len(), edges = config.edges.len()),
)]
pub(crate) fn plan(config: &ScenarioConfig, registry: &ProviderRegistry) -> Result<ScenarioPlan> {
    let mut issues = Vec::new();
    if config.iterations == 0 {
        issues.push(ConfigIssue::NoIterations);
    }

    let vertex_names = config.vertices.iter().map(|vertex| vertex.name.as_str());
    let vertex_index = index_names("vertex", vertex_names, &mut issues);
    let edge_names = config.edges.iter().map(|edge| edge.name.as_str());
    let edge_index = index_names("edge", edge_names, &mut issues);

    for vertex in &config.vertices {
        check_vertex(vertex, &mut issues);
    }

    let mut endpoints = Vec::with_capacity(config.edges.len());
    for edge in &config.edges {
        let source = resolve_vertex(&vertex_index, edge, "source", &edge.source, &mut issues);
        let target = resolve_vertex(&vertex_index, edge, "target", &edge.target, &mut issues);
        endpoints.push(source.zip(target));
        if let Some(max) = edge.max
            && edge.min > max
        {
            issues.push(ConfigIssue::MinExceedsMax {
                edge: name(&edge.name),
                min: edge.min,
                max,
            });
        }
        if let Some(provider) = &edge.provider
            && !registry.contains(provider)
        {
            issues.push(ConfigIssue::CustomFunctionMissing {
                edge: name(&edge.name),
                name: name(provider),
            });
        }
    }

    let mut parent_edge = vec![None; config.vertices.len()];
    let mut link_child = vec![None; config.edges.len()];
    for (child, vertex) in config.vertices.iter().enumerate() {
        let Some(link) = &vertex.parent else {
            continue;
        };
        let Some(&edge_idx) = edge_index.get(link.edge.as_str()) else {
            issues.push(ConfigIssue::UnknownParentEdge {
                vertex: name(&vertex.name),
                edge: name(&link.edge),
            });
            continue;
        };
        let Some(edge) = config.edges.get(edge_idx) else {
            continue;
        };
        if edge.target != vertex.name {
            issues.push(ConfigIssue::ParentEdgeTargetMismatch {
                vertex: name(&vertex.name),
                edge: name(&edge.name),
                target: name(&edge.target),
            });
            continue;
        }
        let Some(slot) = link_child.get_mut(edge_idx) else {
            continue;
        };
        if slot.is_some() {
            issues.push(ConfigIssue::SharedParentEdge {
                edge: name(&edge.name),
            });
            continue;
        }
        *slot = Some(child);
        check_link_edge(edge, vertex.count, &mut issues);
        if let Some(slot) = parent_edge.get_mut(child) {
            *slot = Some(edge_idx);
        }
    }

    for (edge, child) in config.edges.iter().zip(&link_child) {
        if child.is_none() {
            check_standalone_edge(edge, &mut issues);
        }
    }

    let parents: Vec<Option<usize>> = parent_edge
        .iter()
        .map(|link| {
            link.and_then(|edge_idx| endpoints.get(edge_idx).copied().flatten())
                .map(|(source, _)| source)
        })
        .collect();
    let vertex_order = order_parents_first(&parents, config, &mut issues);

    if !issues.is_empty() {
        return Err(SimulationError::ConfigInvalid { issues });
    }

    Ok(ScenarioPlan {
        vertex_order,
        parent_edge,
        link_child,
        endpoints: endpoints.into_iter().flatten().collect(),
    })
}

fn name(value: &str) -> Arc<str> {
    Arc::from(value)
}

fn index_names<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
    issues: &mut Vec<ConfigIssue>,
) -> HashMap<&'a str, usize> {
    let mut index = HashMap::new();
    for (position, entry) in names.enumerate() {
        if entry.trim().is_empty() {
            issues.push(ConfigIssue::EmptyName {
                kind,
                index: position,
            });
            continue;
        }
        if index.contains_key(entry) {
            issues.push(ConfigIssue::DuplicateName {
                kind,
                name: name(entry),
            });
        } else {
            index.insert(entry, position);
        }
    }
    index
}

fn resolve_vertex(
    index: &HashMap<&str, usize>,
    edge: &EdgeConfig,
    role: &'static str,
    vertex: &str,
    issues: &mut Vec<ConfigIssue>,
) -> Option<usize> {
    let found = index.get(vertex).copied();
    if found.is_none() {
        issues.push(ConfigIssue::UnknownVertex {
            edge: name(&edge.name),
            role,
            name: name(vertex),
        });
    }
    found
}

fn check_vertex(vertex: &VertexConfig, issues: &mut Vec<ConfigIssue>) {
    if vertex.count == 0 {
        issues.push(ConfigIssue::EmptyPopulation {
            vertex: name(&vertex.name),
        });
    }
    let Some(shift) = vertex.time_shift else {
        return;
    };
    if shift.total() != vertex.count {
        issues.push(ConfigIssue::TimeShiftSum {
            entity: name(&vertex.name),
            start: shift.start,
            add: shift.add,
            expected: vertex.count,
        });
    }
    if shift.remove > shift.total() {
        issues.push(ConfigIssue::RemoveExceedsTotal {
            entity: name(&vertex.name),
            remove: shift.remove,
            total: shift.total(),
        });
    }
    if shift.recur > shift.remove {
        issues.push(ConfigIssue::RecurExceedsRemove {
            vertex: name(&vertex.name),
            recur: shift.recur,
            remove: shift.remove,
        });
    }
}

fn check_standalone_edge(edge: &EdgeConfig, issues: &mut Vec<ConfigIssue>) {
    let Some(count_all) = edge.count_all else {
        issues.push(ConfigIssue::MissingCountAll {
            edge: name(&edge.name),
        });
        return;
    };
    let Some(shift) = edge.time_shift else {
        return;
    };
    if shift.total() != count_all {
        issues.push(ConfigIssue::TimeShiftSum {
            entity: name(&edge.name),
            start: shift.start,
            add: shift.add,
            expected: count_all,
        });
    }
    if shift.remove > shift.total() {
        issues.push(ConfigIssue::RemoveExceedsTotal {
            entity: name(&edge.name),
            remove: shift.remove,
            total: shift.total(),
        });
    }
}

fn check_link_edge(edge: &EdgeConfig, child_count: usize, issues: &mut Vec<ConfigIssue>) {
    let options = [
        ("time_shift", edge.time_shift.is_some()),
        ("provider", edge.provider.is_some()),
        ("elements_per_source", edge.elements_per_source),
        ("reuse", edge.reuse),
    ];
    for (option, set) in options {
        if set {
            issues.push(ConfigIssue::ParentEdgeOption {
                edge: name(&edge.name),
                option,
            });
        }
    }
    if let Some(count_all) = edge.count_all
        && count_all != child_count
    {
        issues.push(ConfigIssue::ParentEdgeCount {
            edge: name(&edge.name),
            count_all,
            expected: child_count,
        });
    }
}

/// Orders vertices so parents precede children, keeping declaration order
/// otherwise. Vertices on a parent cycle are reported and left out.
fn order_parents_first(
    parents: &[Option<usize>],
    config: &ScenarioConfig,
    issues: &mut Vec<ConfigIssue>,
) -> Vec<usize> {
    let mut placed = vec![false; parents.len()];
    let mut order = Vec::with_capacity(parents.len());
    loop {
        let before = order.len();
        for (vertex, parent) in parents.iter().enumerate() {
            let ready = parent.is_none_or(|p| placed.get(p).copied().unwrap_or(false));
            if ready && !placed.get(vertex).copied().unwrap_or(true) {
                if let Some(slot) = placed.get_mut(vertex) {
                    *slot = true;
                }
                order.push(vertex);
            }
        }
        if order.len() == before {
            break;
        }
    }

    for (vertex, is_placed) in placed.iter().enumerate() {
        if *is_placed || !on_cycle(vertex, parents) {
            continue;
        }
        if let Some(entry) = config.vertices.get(vertex) {
            issues.push(ConfigIssue::ParentCycle {
                vertex: name(&entry.name),
            });
        }
    }
    order
}

fn on_cycle(start: usize, parents: &[Option<usize>]) -> bool {
    let mut current = start;
    for _ in 0..parents.len() {
        match parents.get(current).copied().flatten() {
            Some(parent) if parent == start => return true,
            Some(parent) => current = parent,
            None => return false,
        }
    }
    false
}
