//! Flat → hierarchical conversion.
//!
//! The graph is stored flat (id → node) and so is a clipboard payload. To re-insert a
//! copied subgraph with a single [`add`](crate::mutations::add) (and so a single diff),
//! the nodes are first rebuilt as a nested [`NewNode`] tree.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::graph::Graph;
use crate::mutations::{MutationError, NewNode};
use crate::node::{Node, NodeId};

/// Anything nodes can be looked up in by id
pub trait NodeLookup {
    fn lookup(&self, id: &str) -> Option<&Node>;
}

impl NodeLookup for Graph {
    fn lookup(&self, id: &str) -> Option<&Node> {
        self.get(id)
    }
}

impl NodeLookup for BTreeMap<NodeId, Node> {
    fn lookup(&self, id: &str) -> Option<&Node> {
        self.get(id)
    }
}

impl NodeLookup for HashMap<NodeId, Node> {
    fn lookup(&self, id: &str) -> Option<&Node> {
        self.get(id)
    }
}

/// Nest the subgraph below `node_id` into a tree.
///
/// A node reached a second time (a shared child, or a cycle in a malformed payload) is
/// emitted as a childless leaf instead of being walked again.
pub fn build_graph_from_nodes<L>(node_id: &str, nodes: &L) -> Result<NewNode, MutationError>
where
    L: NodeLookup + ?Sized,
{
    let mut visited = HashSet::new();
    build(node_id, nodes, &mut visited)
}

fn build<L>(node_id: &str, nodes: &L, visited: &mut HashSet<NodeId>) -> Result<NewNode, MutationError>
where
    L: NodeLookup + ?Sized,
{
    let node = nodes
        .lookup(node_id)
        .ok_or_else(|| MutationError::NodeNotFound(node_id.to_string()))?;

    let mut tree = NewNode::new(node.node_type, node.data.clone()).with_id(node_id);

    if !visited.insert(node_id.to_string()) {
        return Ok(tree);
    }

    tree.children = node
        .edges()
        .iter()
        .map(|child| build(child, nodes, visited))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(tree)
}
