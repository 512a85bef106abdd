//! # Depth-First Sequencer
//!
//! One canonical visiting order of a snapshot: start at root, children left to right,
//! each node once (a clone appears at its first position only). The order is computed
//! lazily and cached on the snapshot, so sorting any number of id sets against the same
//! snapshot walks the graph once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::graph::Graph;
use crate::node::{NodeId, ROOT_NODE_KEY};

/// Cached depth-first order of a snapshot
#[derive(Debug, Clone, Default)]
pub struct DepthFirstOrder {
    ids: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
}

impl DepthFirstOrder {
    fn new(ids: Vec<NodeId>) -> Self {
        let positions = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id.clone(), position))
            .collect();
        Self { ids, positions }
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }
}

/// Pre-order walk from `start_id`
pub fn dfs(graph: &Graph, start_id: &str) -> Vec<NodeId> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<&str> = vec![start_id];

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        order.push(id.to_string());

        // Reverse so the leftmost edge is popped first
        for child in graph.edges(id).iter().rev() {
            if !visited.contains(child.as_str()) {
                stack.push(child.as_str());
            }
        }
    }

    order
}

impl Graph {
    pub fn depth_first_order(&self) -> Arc<DepthFirstOrder> {
        self.order
            .get_or_init(|| Arc::new(DepthFirstOrder::new(dfs(self, ROOT_NODE_KEY))))
            .clone()
    }

    /// Sort an arbitrary set of ids into presentation order.
    ///
    /// Ids unreachable from root sort after the rest, by id.
    pub fn sort_ids_depth_first<I, S>(&self, ids: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        let order = self.depth_first_order();

        let mut sorted: Vec<NodeId> = ids.into_iter().map(Into::into).collect();
        sorted.sort_by(|a, b| {
            let position = |id: &str| order.position(id).unwrap_or(usize::MAX);
            position(a.as_str())
                .cmp(&position(b.as_str()))
                .then_with(|| a.cmp(b))
        });
        sorted.dedup();
        sorted
    }
}

/// Curried form mirroring how editor features call it: `sort_ids_depth_first(graph)(ids)`
pub fn sort_ids_depth_first(graph: &Graph) -> impl Fn(&HashSet<NodeId>) -> Vec<NodeId> + '_ {
    move |ids| graph.sort_ids_depth_first(ids.iter().cloned())
}
