//! # Drafts
//!
//! A [`Draft`] is the scratch copy a mutation edits. It starts as a shallow copy of the
//! snapshot's node map (every node still shared through its `Arc`) and copies a node
//! only when it is written. Each primitive edit appends a forward patch and its exact
//! inverse to the draft's log, in the order the edits happen.
//!
//! Dropping a draft discards it; the source snapshot is never touched.

use std::sync::Arc;

use serde_json::Value;

use crate::graph::{self, Graph, Nodes};
use crate::mutations::MutationError;
use crate::node::{Node, NodeData, NodeId, ROOT_NODE_KEY};
use crate::patch::{json_path, Patch};

/// Scratch copy of a snapshot plus the log of edits applied to it
#[derive(Debug)]
pub(crate) struct Draft {
    nodes: Nodes,
    patches: Vec<Patch>,
    inverse: Vec<Patch>,
}

/// Result of finishing a draft: the new snapshot and the patch log
#[derive(Debug)]
pub(crate) struct Produced {
    pub graph: Graph,
    pub patches: Vec<Patch>,
    pub inverse: Vec<Patch>,
}

impl Draft {
    pub fn new(base: &Graph) -> Self {
        Self {
            nodes: base.shared_nodes().clone(),
            patches: Vec::new(),
            inverse: Vec::new(),
        }
    }

    pub fn finish(self) -> Produced {
        Produced {
            graph: Graph::from_shared(self.nodes),
            patches: self.patches,
            inverse: self.inverse,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edges(&self, id: &str) -> &[NodeId] {
        graph::edges_of(&self.nodes, id)
    }

    pub fn position_of(&self, parent: &str, child: &str) -> Option<usize> {
        self.edges(parent).iter().position(|id| id == child)
    }

    pub fn number_of_edges_to(&self, id: &str) -> usize {
        graph::number_of_edges_to(&self.nodes, id)
    }

    pub fn is_clone(&self, id: &str) -> bool {
        graph::is_clone(&self.nodes, id)
    }

    pub fn is_cyclic(&self) -> bool {
        graph::is_cyclic(&self.nodes)
    }

    pub fn is_valid_section_position(&self, parent: &str) -> bool {
        graph::is_valid_section_position(&self.nodes, parent)
    }

    pub fn misplaced_section(&self, from: &str) -> Option<(NodeId, NodeId)> {
        graph::misplaced_section(&self.nodes, from)
    }

    fn record(&mut self, forward: Patch, inverse: Patch) {
        self.patches.push(forward);
        self.inverse.push(inverse);
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node, MutationError> {
        self.nodes
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))
    }

    pub fn insert_node(&mut self, id: &str, node: Node) {
        let value = node.to_value();
        self.nodes.insert(id.to_string(), Arc::new(node));
        self.record(Patch::add(json_path![id], value), Patch::remove(json_path![id]));
    }

    pub fn delete_node(&mut self, id: &str) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        self.record(Patch::remove(json_path![id]), Patch::add(json_path![id], node.to_value()));
        Some(Arc::try_unwrap(node).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Insert `child` into `parent`'s edges at `index` (appending when `None`)
    pub fn insert_edge(
        &mut self,
        parent: &str,
        index: Option<usize>,
        child: &str,
    ) -> Result<(), MutationError> {
        let node = self.node_mut(parent)?;

        match node.edges.as_mut() {
            Some(edges) => {
                let index = index.unwrap_or(edges.len()).min(edges.len());
                edges.insert(index, child.to_string());
                self.record(
                    Patch::add(json_path![parent, "edges", index], Value::from(child)),
                    Patch::remove(json_path![parent, "edges", index]),
                );
            }
            None => {
                node.edges = Some(vec![child.to_string()]);
                self.record(
                    Patch::add(json_path![parent, "edges"], Value::from(vec![child])),
                    Patch::remove(json_path![parent, "edges"]),
                );
            }
        }

        Ok(())
    }

    /// Remove the edge at `index` from `parent`.
    ///
    /// Removing the last edge drops the `edges` key, except on root where an empty list
    /// is kept.
    pub fn remove_edge(&mut self, parent: &str, index: usize) -> Result<NodeId, MutationError> {
        let keep_empty = parent == ROOT_NODE_KEY;
        let node = self.node_mut(parent)?;

        let len = node.edges().len();
        if index >= len {
            return Err(MutationError::NotConnected {
                id: format!("#{}", index),
                parent: parent.to_string(),
            });
        }

        if len == 1 && !keep_empty {
            let removed = node.edges.take().unwrap_or_default();
            let child = removed[0].clone();
            self.record(
                Patch::remove(json_path![parent, "edges"]),
                Patch::add(json_path![parent, "edges"], Value::from(removed)),
            );
            return Ok(child);
        }

        let child = node
            .edges
            .as_mut()
            .map(|edges| edges.remove(index))
            .unwrap_or_default();
        self.record(
            Patch::remove(json_path![parent, "edges", index]),
            Patch::add(json_path![parent, "edges", index], Value::from(child.as_str())),
        );
        Ok(child)
    }

    /// Rearrange `parent`'s edges into `order` (same ids, new positions), recording one
    /// replacement per index that changed.
    pub fn reorder_edges(&mut self, parent: &str, order: Vec<NodeId>) -> Result<(), MutationError> {
        let node = self.node_mut(parent)?;
        let previous = node.edges.replace(order.clone()).unwrap_or_default();
        debug_assert_eq!(previous.len(), order.len());

        for (index, (old, new)) in previous.iter().zip(&order).enumerate() {
            if old != new {
                self.record(
                    Patch::replace(json_path![parent, "edges", index], Value::from(new.as_str())),
                    Patch::replace(json_path![parent, "edges", index], Value::from(old.as_str())),
                );
            }
        }

        Ok(())
    }

    /// Swap `parent`'s whole edge list for `edges`
    pub fn replace_edges(&mut self, parent: &str, edges: Vec<NodeId>) -> Result<(), MutationError> {
        let keep_empty = parent == ROOT_NODE_KEY;
        let node = self.node_mut(parent)?;

        if node.edges() == edges.as_slice() {
            return Ok(());
        }

        let previous = node.edges.take();
        let next = if edges.is_empty() && !keep_empty {
            None
        } else {
            Some(edges)
        };
        node.edges = next.clone();

        let at = json_path![parent, "edges"];
        match (previous, next) {
            (Some(old), Some(new)) => self.record(
                Patch::replace(at.clone(), Value::from(new)),
                Patch::replace(at, Value::from(old)),
            ),
            (None, Some(new)) => self.record(Patch::add(at.clone(), Value::from(new)), Patch::remove(at)),
            (Some(old), None) => self.record(Patch::remove(at.clone()), Patch::add(at, Value::from(old))),
            (None, None) => {}
        }

        Ok(())
    }

    /// Store `value` under `data[key]`, creating `data` when missing
    pub fn set_data_value(&mut self, id: &str, key: &str, value: Value) -> Result<(), MutationError> {
        let node = self.node_mut(id)?;

        let Some(data) = node.data.as_mut() else {
            let mut data = serde_json::Map::new();
            data.insert(key.to_string(), value);
            node.data = Some(data.clone());
            self.record(
                Patch::add(json_path![id, "data"], Value::Object(data)),
                Patch::remove(json_path![id, "data"]),
            );
            return Ok(());
        };

        match data.insert(key.to_string(), value.clone()) {
            None => self.record(
                Patch::add(json_path![id, "data", key], value),
                Patch::remove(json_path![id, "data", key]),
            ),
            Some(old) if old == value => {}
            Some(old) => self.record(
                Patch::replace(json_path![id, "data", key], value),
                Patch::replace(json_path![id, "data", key], old),
            ),
        }

        Ok(())
    }

    /// Swap the whole `data` object (`None` removes the key)
    pub fn replace_data(&mut self, id: &str, data: Option<NodeData>) -> Result<(), MutationError> {
        let node = self.node_mut(id)?;
        if node.data == data {
            return Ok(());
        }

        let previous = std::mem::replace(&mut node.data, data.clone());
        let at = json_path![id, "data"];
        match (previous, data) {
            (Some(old), Some(new)) => self.record(
                Patch::replace(at.clone(), Value::Object(new)),
                Patch::replace(at, Value::Object(old)),
            ),
            (None, Some(new)) => self.record(Patch::add(at.clone(), Value::Object(new)), Patch::remove(at)),
            (Some(old), None) => self.record(Patch::remove(at.clone()), Patch::add(at, Value::Object(old))),
            (None, None) => {}
        }

        Ok(())
    }

    /// Delete `data[key]`; removing the last key removes `data` altogether
    pub fn remove_data_value(&mut self, id: &str, key: &str) -> Result<(), MutationError> {
        let node = self.node_mut(id)?;

        let Some(data) = node.data.as_mut() else {
            return Ok(());
        };
        if !data.contains_key(key) {
            return Ok(());
        }

        if data.len() == 1 {
            let previous = node.data.take().unwrap_or_default();
            self.record(
                Patch::remove(json_path![id, "data"]),
                Patch::add(json_path![id, "data"], Value::Object(previous)),
            );
            return Ok(());
        }

        if let Some(old) = data.remove(key) {
            self.record(
                Patch::remove(json_path![id, "data", key]),
                Patch::add(json_path![id, "data", key], old),
            );
        }

        Ok(())
    }
}
