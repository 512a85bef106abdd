//! # Graph Snapshots
//!
//! A [`Graph`] is one immutable version of a flow. Nodes sit behind `Arc`, so a
//! snapshot produced by a mutation shares every untouched node with its predecessor;
//! only nodes the mutation edited are copied.
//!
//! The invariant predicates here (cycles, clone detection, section placement) are plain
//! functions over the node map so mutations can run them against a draft before it is
//! accepted.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::node::{ComponentType, Node, NodeId, ROOT_NODE_KEY};
use crate::sequencer::DepthFirstOrder;

pub(crate) type Nodes = BTreeMap<NodeId, Arc<Node>>;

/// Immutable flow snapshot
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Nodes,

    /// Depth-first order, computed on first use and kept for the life of the snapshot
    pub(crate) order: OnceLock<Arc<DepthFirstOrder>>,
}

impl Graph {
    /// Graph holding only a root with an empty edge list
    pub fn new() -> Self {
        Self::from_nodes([(ROOT_NODE_KEY.to_string(), Node::with_empty_edges())])
    }

    pub fn from_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, Node)>,
    {
        Self::from_shared(
            nodes
                .into_iter()
                .map(|(id, node)| (id, Arc::new(node)))
                .collect(),
        )
    }

    pub(crate) fn from_shared(nodes: Nodes) -> Self {
        Self {
            nodes,
            order: OnceLock::new(),
        }
    }

    pub(crate) fn shared_nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.nodes
                .iter()
                .map(|(id, node)| (id.clone(), node.to_value()))
                .collect::<Map<_, _>>(),
        )
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn root(&self) -> Option<&Node> {
        self.get(ROOT_NODE_KEY)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes
            .iter()
            .map(|(id, node)| (id.as_str(), node.as_ref()))
    }

    /// Child ids of `id` (empty when the node is missing or has no edges)
    pub fn edges(&self, id: &str) -> &[NodeId] {
        edges_of(&self.nodes, id)
    }

    /// Ids of every node with an edge to `id`
    pub fn parents_of(&self, id: &str) -> Vec<&str> {
        self.iter()
            .filter(|(_, node)| node.edges().iter().any(|edge| edge == id))
            .map(|(parent, _)| parent)
            .collect()
    }

    pub fn number_of_edges_to(&self, id: &str) -> usize {
        number_of_edges_to(&self.nodes, id)
    }

    /// Whether more than one parent references `id`
    pub fn is_clone(&self, id: &str) -> bool {
        is_clone(&self.nodes, id)
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic(&self.nodes)
    }

    pub fn is_valid_section_position(&self, parent: &str) -> bool {
        is_valid_section_position(&self.nodes, parent)
    }

    /// Non-root ids that cannot be reached from root by following edges
    pub fn unreachable_ids(&self) -> Vec<NodeId> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        if self.contains(ROOT_NODE_KEY) {
            seen.insert(ROOT_NODE_KEY);
            queue.push_back(ROOT_NODE_KEY);
        }

        while let Some(id) = queue.pop_front() {
            for child in self.edges(id) {
                if seen.insert(child.as_str()) {
                    queue.push_back(child.as_str());
                }
            }
        }

        self.ids()
            .filter(|id| !seen.contains(id))
            .map(str::to_string)
            .collect()
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl Serialize for Graph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Graph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let nodes = BTreeMap::<NodeId, Node>::deserialize(deserializer)?;
        Ok(Self::from_nodes(nodes))
    }
}

pub(crate) fn node_type_of(nodes: &Nodes, id: &str) -> Option<ComponentType> {
    nodes.get(id).and_then(|node| node.component_type())
}

pub(crate) fn edges_of<'a>(nodes: &'a Nodes, id: &str) -> &'a [NodeId] {
    nodes.get(id).map(|node| node.edges()).unwrap_or(&[])
}

pub(crate) fn number_of_edges_to(nodes: &Nodes, id: &str) -> usize {
    nodes
        .values()
        .filter(|node| node.edges().iter().any(|edge| edge == id))
        .count()
}

pub(crate) fn is_clone(nodes: &Nodes, id: &str) -> bool {
    nodes
        .values()
        .filter(|node| node.edges().iter().any(|edge| edge == id))
        .nth(1)
        .is_some()
}

/// Sections live on the main path: directly under root, or one level down inside a
/// folder that is itself directly under root.
pub(crate) fn is_valid_section_position(nodes: &Nodes, parent: &str) -> bool {
    parent == ROOT_NODE_KEY
        || (node_type_of(nodes, parent) == Some(ComponentType::InternalPortal)
            && edges_of(nodes, ROOT_NODE_KEY).iter().any(|id| id == parent))
}

/// First section reachable from `from` (inclusive) that is shared or sits outside the
/// main path, paired with the offending parent. A folder holding a section must itself
/// hang only off root.
pub(crate) fn misplaced_section(nodes: &Nodes, from: &str) -> Option<(NodeId, NodeId)> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![from];

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }

        if node_type_of(nodes, id) == Some(ComponentType::Section) {
            let parents: Vec<&str> = nodes
                .iter()
                .filter(|(_, node)| node.edges().iter().any(|edge| edge == id))
                .map(|(parent, _)| parent.as_str())
                .collect();

            let offending = match parents.as_slice() {
                [parent]
                    if is_valid_section_position(nodes, parent)
                        && (*parent == ROOT_NODE_KEY || !is_clone(nodes, parent)) =>
                {
                    None
                }
                [parent] => Some(*parent),
                [_, second, ..] => Some(*second),
                [] => None,
            };
            if let Some(parent) = offending {
                return Some((id.to_string(), parent.to_string()));
            }
        }

        stack.extend(edges_of(nodes, id).iter().map(String::as_str));
    }

    None
}

/// Depth-first colouring; a walk that reaches a node still on its own stack is a cycle.
pub(crate) fn is_cyclic(nodes: &Nodes) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        OnStack,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(nodes.len());

    for start in nodes.keys() {
        if marks.contains_key(start.as_str()) {
            continue;
        }

        marks.insert(start.as_str(), Mark::OnStack);
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];

        while let Some(&(id, next)) = stack.last() {
            match edges_of(nodes, id).get(next) {
                Some(child) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    match marks.get(child.as_str()) {
                        Some(Mark::OnStack) => return true,
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child.as_str(), Mark::OnStack);
                            stack.push((child.as_str(), 0));
                        }
                    }
                }
                None => {
                    marks.insert(id, Mark::Done);
                    stack.pop();
                }
            }
        }
    }

    false
}
