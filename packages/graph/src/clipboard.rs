//! # Clipboard
//!
//! Copy captures a node and everything below it as a flat payload. Paste gives every
//! copied node a fresh id, re-links edges through the id map, nests the result with
//! the builder and inserts it with one `add`, so a paste is a single diff.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builder::build_graph_from_nodes;
use crate::graph::Graph;
use crate::ids::IdGenerator;
use crate::mutations::{add, MutationError, MutationResult, Relationships};
use crate::node::{Node, NodeId};

/// Data props that only mean something inside a template flow
pub const TEMPLATED_NODE_PROPS: [&str; 3] = [
    "isTemplatedNode",
    "templatedNodeInstructions",
    "areTemplatedNodeInstructionsRequired",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopiedNode {
    pub original_id: NodeId,
    pub node_data: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopiedPayload {
    pub root_id: NodeId,
    pub nodes: Vec<CopiedNode>,
    #[serde(default)]
    pub is_template: bool,
}

/// Capture `id` and all of its descendants (each once, in depth-first order)
pub fn copy_subgraph(graph: &Graph, id: &str, is_template: bool) -> Result<CopiedPayload, MutationError> {
    if !graph.contains(id) {
        return Err(MutationError::NodeNotFound(id.to_string()));
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![id];
    let mut nodes = Vec::new();

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        let Some(node) = graph.get(current) else {
            continue;
        };

        nodes.push(CopiedNode {
            original_id: current.to_string(),
            node_data: node.clone(),
        });
        stack.extend(node.edges().iter().rev().map(String::as_str));
    }

    debug!(root = id, nodes = nodes.len(), "copied subgraph");
    Ok(CopiedPayload {
        root_id: id.to_string(),
        nodes,
        is_template,
    })
}

/// Insert a copy of `payload` under `parent`, before `before` when given
pub fn paste_subgraph(
    graph: &Graph,
    payload: &CopiedPayload,
    parent: &str,
    before: Option<&str>,
    pasting_to_template: bool,
    ids: &mut dyn IdGenerator,
) -> MutationResult {
    if payload.nodes.is_empty() {
        return Ok((graph.clone(), Vec::new()));
    }

    let strip_templated = payload.is_template && !pasting_to_template;

    let id_map: HashMap<&str, NodeId> = payload
        .nodes
        .iter()
        .map(|copied| (copied.original_id.as_str(), ids.next_id()))
        .collect();

    let new_root = id_map
        .get(payload.root_id.as_str())
        .cloned()
        .ok_or_else(|| MutationError::NodeNotFound(payload.root_id.clone()))?;

    let new_nodes: HashMap<NodeId, Node> = payload
        .nodes
        .iter()
        .filter_map(|copied| {
            let new_id = id_map.get(copied.original_id.as_str())?.clone();
            let mut node = copied.node_data.clone();

            if strip_templated {
                if let Some(data) = node.data.as_mut() {
                    for prop in TEMPLATED_NODE_PROPS {
                        data.remove(prop);
                    }
                }
            }

            node.edges = node.edges.map(|edges| {
                edges
                    .iter()
                    .filter_map(|edge| id_map.get(edge.as_str()).cloned())
                    .collect()
            });

            Some((new_id, node))
        })
        .collect();

    let tree = build_graph_from_nodes(&new_root, &new_nodes)?;

    let relationships = Relationships {
        parent: Some(parent.to_string()),
        before: before.map(str::to_string),
    };
    add(graph, tree, relationships, ids)
}
