//! Dependency-graph resolution — execution ordering and reachability.
//!
//! Rules enforced at the sort boundary (re-checked even though `Workflow`
//! validates on insert):
//! 1. Node IDs must be unique.
//! 2. Every connection must reference valid node IDs on both sides.
//! 3. The directed graph must be acyclic.
//!
//! Ties among simultaneously-ready nodes are broken by original insertion
//! order, so sort output is reproducible given identical input.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use crate::{EngineError, Workflow};

/// Validate the workflow graph and return node IDs in execution order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownConnectionEndpoint`] if a connection references a
///   missing node.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic; the error
///   names a node left on the cycle.
pub fn topological_sort(workflow: &Workflow) -> Result<Vec<String>, EngineError> {
    let index = build_index(workflow)?;
    let adjacency = build_adjacency(workflow, &index)?;

    let n = index.ids.len();
    let mut in_degree = vec![0usize; n];
    for targets in &adjacency {
        for &t in targets {
            in_degree[t] += 1;
        }
    }

    // Kahn's algorithm with a min-heap keyed on insertion index, so the
    // ready node with the earliest insertion order is always dispatched
    // first.
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut sorted = Vec::with_capacity(n);
    while let Some(Reverse(current)) = ready.pop() {
        sorted.push(index.ids[current].clone());
        for &next in &adjacency[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if sorted.len() != n {
        // Every unprocessed node sits on (or downstream of) a cycle; report
        // the first one in insertion order.
        let node_id = in_degree
            .iter()
            .position(|&d| d > 0)
            .map(|i| index.ids[i].clone())
            .unwrap_or_default();
        return Err(EngineError::CycleDetected { node_id });
    }

    Ok(sorted)
}

/// Execution order limited to nodes reachable forward from `trigger`.
///
/// A run may be triggered from any node, not only graph roots; nodes not
/// downstream of the trigger are excluded from the schedule.
///
/// # Errors
/// [`EngineError::NodeNotFound`] if the trigger is absent, plus everything
/// [`topological_sort`] can return.
pub fn reachable_from(workflow: &Workflow, trigger: &str) -> Result<Vec<String>, EngineError> {
    let index = build_index(workflow)?;
    let start = *index
        .by_id
        .get(trigger)
        .ok_or_else(|| EngineError::NodeNotFound(trigger.to_owned()))?;

    let adjacency = build_adjacency(workflow, &index)?;

    let mut reachable = HashSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if reachable.insert(current) {
            queue.extend(&adjacency[current]);
        }
    }

    let order = topological_sort(workflow)?;
    Ok(order
        .into_iter()
        .filter(|id| reachable.contains(&index.by_id[id.as_str()]))
        .collect())
}

/// All transitive upstream dependencies of a node, in topological order.
pub fn dependencies_of(workflow: &Workflow, node_id: &str) -> Result<Vec<String>, EngineError> {
    let index = build_index(workflow)?;
    let start = *index
        .by_id
        .get(node_id)
        .ok_or_else(|| EngineError::NodeNotFound(node_id.to_owned()))?;

    // Reverse adjacency: target → sources.
    let mut incoming = vec![Vec::new(); index.ids.len()];
    for conn in workflow.connections() {
        let (from, to) = (index.by_id[conn.from.as_str()], index.by_id[conn.to.as_str()]);
        incoming[to].push(from);
    }

    let mut upstream = HashSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for &source in &incoming[current] {
            if upstream.insert(source) {
                queue.push_back(source);
            }
        }
    }

    let order = topological_sort(workflow)?;
    Ok(order
        .into_iter()
        .filter(|id| upstream.contains(&index.by_id[id.as_str()]))
        .collect())
}

/// Whether adding a connection `from → to` would create a cycle.
///
/// It would exactly when `from` is already reachable forward from `to`.
/// Intended for graph editors validating a connection before committing it.
pub fn would_create_cycle(workflow: &Workflow, from: &str, to: &str) -> Result<bool, EngineError> {
    if from == to {
        return Ok(true);
    }
    Ok(reachable_from(workflow, to)?.iter().any(|id| id == from))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct NodeIndex {
    /// Node IDs in insertion order.
    ids: Vec<String>,
    by_id: HashMap<String, usize>,
}

fn build_index(workflow: &Workflow) -> Result<NodeIndex, EngineError> {
    let mut ids = Vec::with_capacity(workflow.nodes().len());
    let mut by_id = HashMap::with_capacity(workflow.nodes().len());

    for (i, node) in workflow.nodes().iter().enumerate() {
        if by_id.insert(node.id().to_owned(), i).is_some() {
            return Err(EngineError::DuplicateNodeId(node.id().to_owned()));
        }
        ids.push(node.id().to_owned());
    }
    Ok(NodeIndex { ids, by_id })
}

fn build_adjacency(
    workflow: &Workflow,
    index: &NodeIndex,
) -> Result<Vec<Vec<usize>>, EngineError> {
    let mut adjacency = vec![Vec::new(); index.ids.len()];
    for conn in workflow.connections() {
        let from = *index.by_id.get(conn.from.as_str()).ok_or_else(|| {
            EngineError::UnknownConnectionEndpoint {
                node_id: conn.from.clone(),
                side: "from",
            }
        })?;
        let to = *index.by_id.get(conn.to.as_str()).ok_or_else(|| {
            EngineError::UnknownConnectionEndpoint {
                node_id: conn.to.clone(),
                side: "to",
            }
        })?;
        adjacency[from].push(to);
    }
    Ok(adjacency)
}
