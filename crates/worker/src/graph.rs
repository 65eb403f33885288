//! Cycle safety on the augmented graph.
//!
//! A follow-on edge `(A, B)` is equivalent to a child edge from `A` to `B`,
//! plus an implied edge from every descendant of every child of `A` to `B`
//! (a follow-on cannot run until all of `A`'s children and their
//! descendants have finished). This check runs on the worker, against the
//! whole graph, because user code builds the graph dynamically each run.

use crate::error::WorkerError;
use std::collections::{HashMap, HashSet};
use trellis_core::JobStoreId;
use trellis_storage::JobStore;

type EdgeMap = HashMap<JobStoreId, Vec<JobStoreId>>;

fn literal_edges(store: &dyn JobStore) -> Result<EdgeMap, WorkerError> {
    let mut edges: EdgeMap = HashMap::new();
    for record in store.jobs()? {
        let successors: Vec<JobStoreId> =
            record.stack.iter().flat_map(|phase| phase.iter().map(|d| d.successor_job_store_id)).collect();
        edges.entry(record.job_store_id).or_default().extend(successors);
    }
    Ok(edges)
}

fn descendants(edges: &EdgeMap, start: JobStoreId) -> HashSet<JobStoreId> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if let Some(next) = edges.get(&node) {
            for &n in next {
                if seen.insert(n) {
                    stack.push(n);
                }
            }
        }
    }
    seen
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

fn visit(node: JobStoreId, edges: &EdgeMap, color: &mut HashMap<JobStoreId, Color>) -> bool {
    color.insert(node, Color::Gray);
    if let Some(next) = edges.get(&node) {
        for &n in next {
            match color.get(&n).copied().unwrap_or(Color::White) {
                Color::Gray => return true,
                Color::White => {
                    if visit(n, edges, color) {
                        return true;
                    }
                }
                Color::Black => {}
            }
        }
    }
    color.insert(node, Color::Black);
    false
}

fn has_cycle(edges: &EdgeMap) -> bool {
    let mut color: HashMap<JobStoreId, Color> = HashMap::new();
    let nodes: Vec<JobStoreId> = edges.keys().copied().chain(edges.values().flatten().copied()).collect();
    for node in &nodes {
        color.entry(*node).or_insert(Color::White);
    }
    for node in nodes {
        if color.get(&node).copied() == Some(Color::White) && visit(node, edges, &mut color) {
            return true;
        }
    }
    false
}

/// Check the whole graph, plus the newly declared children/follow-ons of
/// `parent`, for a cycle in the augmented graph. Fails the call with
/// [`WorkerError::CycleDetected`] if one exists.
pub fn check_augmented_graph_acyclic(
    store: &dyn JobStore,
    parent: JobStoreId,
    new_children: &[JobStoreId],
    new_follow_ons: &[JobStoreId],
) -> Result<(), WorkerError> {
    let mut edges = literal_edges(store)?;
    edges.entry(parent).or_default().extend(new_children.iter().copied());
    edges.entry(parent).or_default().extend(new_follow_ons.iter().copied());

    let mut implied = Vec::new();
    for &child in new_children {
        let mut reachable = descendants(&edges, child);
        reachable.insert(child); // a child is its own "zero-step descendant" for this rule
        for descendant in reachable {
            for &follow_on in new_follow_ons {
                implied.push((descendant, follow_on));
            }
        }
    }
    for (from, to) in implied {
        edges.entry(from).or_default().push(to);
    }

    if has_cycle(&edges) {
        Err(WorkerError::CycleDetected)
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
