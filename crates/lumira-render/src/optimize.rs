//! Graph rewrites run during the Scheduling phase, after validation and
//! before any task executes.

use std::collections::HashMap;

use lumira_graph::{TaskGraph, TaskId, TaskKind};

/// Fold chains of affine transform tasks into a single node carrying the
/// outer-then-inner matrix product.
///
/// A chain of N transform tasks is mathematically one transform; folding
/// it both skips N-1 intermediate surfaces and guarantees the composed
/// chain renders bit-identically to a single task carrying the product
/// matrix. A shared inner transform (more than one parent) is left
/// alone, since other parents still depend on its own result.
pub fn merge_transform_chains(graph: &mut TaskGraph, root: TaskId) {
    let parents = parent_counts(graph, root);
    let ids: Vec<TaskId> = graph.ids().collect();
    for id in ids {
        loop {
            let (outer, child) = match graph.get(id) {
                Some(node) => match (&node.kind, node.sub_task()) {
                    (TaskKind::Transform { matrix }, Some(child)) => (*matrix, child),
                    _ => break,
                },
                None => break,
            };
            if parents.get(&child).copied().unwrap_or(0) > 1 {
                break;
            }
            let (inner, inner_children) = match graph.get(child) {
                Some(node) => match &node.kind {
                    TaskKind::Transform { matrix } => (*matrix, node.children.clone()),
                    _ => break,
                },
                None => break,
            };
            let Some(node) = graph.get_mut(id) else {
                break;
            };
            node.kind = TaskKind::Transform { matrix: outer * inner };
            node.children = inner_children;
            tracing::trace!("folded transform {} into {}", child, id);
        }
    }
}

/// Number of reachable parent edges per node, starting from `root`.
fn parent_counts(graph: &TaskGraph, root: TaskId) -> HashMap<TaskId, usize> {
    let mut counts = HashMap::new();
    let mut visited = vec![false; graph.len()];
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if id.index() >= graph.len() || visited[id.index()] {
            continue;
        }
        visited[id.index()] = true;
        if let Some(node) = graph.get(id) {
            for &child in node.sub_tasks() {
                *counts.entry(child).or_insert(0) += 1;
                stack.push(child);
            }
        }
    }
    counts
}
