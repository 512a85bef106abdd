//! # Graph Mutations
//!
//! The six operations an editor performs on a flow. Each one is a pure function from a
//! snapshot to `(next snapshot, ops)`.
//!
//! ## Design Principles
//!
//! 1. **All or nothing**: the operation edits a [`Draft`]; any failure discards it and
//!    the caller's snapshot is untouched
//! 2. **Validated against the result**: cycle and placement checks run on the draft
//!    before it is accepted
//! 3. **Reachability by construction**: dropping the last edge to a node deletes it,
//!    and its children in turn once nothing else references them
//!
//! ## Mutation Semantics
//!
//! ### Add
//! - Appends to `parent` or inserts before a sibling
//! - Nested `children` are added in the same diff
//!
//! ### Clone
//! - Adds another parent to an existing node
//! - Sections and external portals are never shared
//!
//! ### Move
//! - Reorders within one parent, or detaches and re-attaches elsewhere
//!
//! ### Remove
//! - Detaches one edge; clones survive while any parent remains
//!
//! ### Update
//! - Merges sanitized data; with `remove_key_if_missing` the given data and children
//!   are authoritative
//!
//! ### Make Unique
//! - Replaces one reference to a shared subgraph with a private copy

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::draft::{Draft, Produced};
use crate::graph::Graph;
use crate::ids::IdGenerator;
use crate::node::{ComponentType, Node, NodeData, NodeId, ROOT_NODE_KEY};
use crate::ot::{ops_from_patches, Op};
use crate::sanitize::{is_something, sanitize_data, sanitize_value};

/// Snapshot and diff produced by a successful mutation
pub type MutationResult = Result<(Graph, Vec<Op>), MutationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("Before not found: {before} is not a child of {parent}")]
    BeforeNotFound { before: String, parent: String },

    #[error("{parent} does not connect to {id}")]
    NotConnected { id: String, parent: String },

    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("{parent} already connects to {id}")]
    DuplicateEdge { id: String, parent: String },

    #[error("Would create cycle")]
    CycleDetected,

    #[error("Section {id} cannot be placed under {parent}, sections belong on the main graph")]
    InvalidSectionPlacement { id: String, parent: String },

    #[error("{kind} {id} cannot be cloned")]
    Uncloneable { id: String, kind: &'static str },
}

/// Broad class of a [`MutationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A node, parent or sibling id is stale
    NotFound,
    /// The edit would break a structural rule
    InvalidStructure,
}

impl MutationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MutationError::NodeNotFound(_)
            | MutationError::ParentNotFound(_)
            | MutationError::BeforeNotFound { .. }
            | MutationError::NotConnected { .. } => ErrorKind::NotFound,
            MutationError::NodeExists(_)
            | MutationError::DuplicateEdge { .. }
            | MutationError::CycleDetected
            | MutationError::InvalidSectionPlacement { .. }
            | MutationError::Uncloneable { .. } => ErrorKind::InvalidStructure,
        }
    }
}

/// A node to insert, with any nested children.
///
/// This is also the hierarchical shape produced by
/// [`build_graph_from_nodes`](crate::builder::build_graph_from_nodes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NodeData>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NewNode>,
}

impl NewNode {
    pub fn new(node_type: Option<u16>, data: Option<NodeData>) -> Self {
        Self {
            node_type,
            data,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_children(mut self, children: Vec<NewNode>) -> Self {
        self.children = children;
        self
    }
}

/// Where [`add`] places the node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationships {
    /// Defaults to root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,

    /// Sibling to insert in front of; appends when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<NodeId>,
}

impl Relationships {
    pub fn under(parent: impl Into<NodeId>) -> Self {
        Self {
            parent: Some(parent.into()),
            before: None,
        }
    }

    pub fn before(mut self, before: impl Into<NodeId>) -> Self {
        self.before = Some(before.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneOptions {
    /// Defaults to root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_before: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOptions {
    /// Defaults to the current parent (a reorder)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_before: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOptions {
    /// Authoritative child list, honoured only with `remove_key_if_missing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NewNode>>,

    /// Treat `new_data` (and `children`) as the complete new state
    #[serde(default)]
    pub remove_key_if_missing: bool,
}

/// Run `recipe` against a draft of `graph` and translate its patch log into ops
fn produce<F>(graph: &Graph, recipe: F) -> MutationResult
where
    F: FnOnce(&mut Draft) -> Result<(), MutationError>,
{
    let mut draft = Draft::new(graph);
    recipe(&mut draft)?;

    let Produced {
        graph,
        patches,
        inverse,
    } = draft.finish();
    let ops = ops_from_patches(&patches, &inverse);

    debug!(patches = patches.len(), ops = ops.len(), "mutation produced");
    Ok((graph, ops))
}

fn ensure_acyclic(draft: &Draft) -> Result<(), MutationError> {
    if draft.is_cyclic() {
        Err(MutationError::CycleDetected)
    } else {
        Ok(())
    }
}

/// Every section at or below `id` keeps a single parent on the main path
fn ensure_sections_placed(draft: &Draft, id: &str) -> Result<(), MutationError> {
    match draft.misplaced_section(id) {
        Some((id, parent)) => Err(MutationError::InvalidSectionPlacement { id, parent }),
        None => Ok(()),
    }
}

fn before_index(draft: &Draft, parent: &str, before: Option<&str>) -> Result<Option<usize>, MutationError> {
    match before {
        None => Ok(None),
        Some(before) => draft
            .position_of(parent, before)
            .map(Some)
            .ok_or_else(|| MutationError::BeforeNotFound {
                before: before.to_string(),
                parent: parent.to_string(),
            }),
    }
}

fn is_section(node_type: Option<u16>) -> bool {
    node_type == Some(ComponentType::Section.code())
}

/// Insert `node` (and its children) under `parent`, returning its id
fn add_node(
    draft: &mut Draft,
    node: NewNode,
    parent: &str,
    before: Option<&str>,
    ids: &mut dyn IdGenerator,
) -> Result<NodeId, MutationError> {
    if !draft.contains(parent) {
        return Err(MutationError::ParentNotFound(parent.to_string()));
    }

    let NewNode {
        id,
        node_type,
        data,
        children,
    } = node;
    let id = id.unwrap_or_else(|| ids.next_id());

    if draft.contains(&id) {
        return Err(MutationError::NodeExists(id));
    }
    if is_section(node_type) && !draft.is_valid_section_position(parent) {
        return Err(MutationError::InvalidSectionPlacement {
            id,
            parent: parent.to_string(),
        });
    }
    let index = before_index(draft, parent, before)?;

    draft.insert_node(&id, Node::new(node_type, data.and_then(sanitize_data)));
    draft.insert_edge(parent, index, &id)?;

    for child in children {
        let existing = child.id.clone().filter(|child_id| draft.contains(child_id));
        match existing {
            Some(existing) => link_child(draft, &id, &existing)?,
            None => {
                add_node(draft, child, &id, None, ids)?;
            }
        }
    }

    Ok(id)
}

/// Reference an existing node from `parent`, making it a clone
fn link_child(draft: &mut Draft, parent: &str, id: &str) -> Result<(), MutationError> {
    if draft.position_of(parent, id).is_some() {
        return Err(MutationError::DuplicateEdge {
            id: id.to_string(),
            parent: parent.to_string(),
        });
    }
    if let Some(kind) = draft
        .get(id)
        .and_then(Node::component_type)
        .filter(|kind| !kind.is_cloneable())
    {
        return Err(MutationError::Uncloneable {
            id: id.to_string(),
            kind: kind.display_name(),
        });
    }

    draft.insert_edge(parent, None, id)
}

/// Add a new node (and any nested children) to the graph
#[instrument(level = "debug", skip_all, fields(id = ?node.id, parent = ?relationships.parent))]
pub fn add(
    graph: &Graph,
    node: NewNode,
    relationships: Relationships,
    ids: &mut dyn IdGenerator,
) -> MutationResult {
    let Relationships { parent, before } = relationships;
    let parent = parent.unwrap_or_else(|| ROOT_NODE_KEY.to_string());

    produce(graph, |draft| {
        if !draft.contains(ROOT_NODE_KEY) {
            draft.insert_node(ROOT_NODE_KEY, Node::with_empty_edges());
        }

        let id = add_node(draft, node, &parent, before.as_deref(), ids)?;
        ensure_acyclic(draft)?;
        ensure_sections_placed(draft, &id)
    })
}

/// Reference an existing node from another parent
#[instrument(level = "debug", skip(graph, options), fields(to_parent = ?options.to_parent))]
pub fn clone_node(graph: &Graph, id: &str, options: CloneOptions) -> MutationResult {
    let to_parent = options
        .to_parent
        .unwrap_or_else(|| ROOT_NODE_KEY.to_string());

    produce(graph, |draft| {
        let node_type = match draft.get(id) {
            Some(node) => node.component_type(),
            None => return Err(MutationError::NodeNotFound(id.to_string())),
        };
        if !draft.contains(&to_parent) {
            return Err(MutationError::ParentNotFound(to_parent.clone()));
        }
        if draft.position_of(&to_parent, id).is_some() {
            return Err(MutationError::DuplicateEdge {
                id: id.to_string(),
                parent: to_parent.clone(),
            });
        }
        if let Some(kind) = node_type.filter(|kind| !kind.is_cloneable()) {
            return Err(MutationError::Uncloneable {
                id: id.to_string(),
                kind: kind.display_name(),
            });
        }

        let index = before_index(draft, &to_parent, options.to_before.as_deref())?;
        draft.insert_edge(&to_parent, index, id)?;
        ensure_acyclic(draft)?;
        ensure_sections_placed(draft, id)
    })
}

/// Move the edge `parent → id` to `to_parent` (or to a new position in `parent`)
#[instrument(level = "debug", skip(graph, options), fields(to_parent = ?options.to_parent))]
pub fn move_node(graph: &Graph, id: &str, parent: &str, options: MoveOptions) -> MutationResult {
    let to_parent = options.to_parent.unwrap_or_else(|| parent.to_string());
    let to_before = options.to_before;

    produce(graph, |draft| {
        let node_type = match draft.get(id) {
            Some(node) => node.node_type,
            None => return Err(MutationError::NodeNotFound(id.to_string())),
        };
        if !draft.contains(parent) {
            return Err(MutationError::ParentNotFound(parent.to_string()));
        }
        if !draft.contains(&to_parent) {
            return Err(MutationError::ParentNotFound(to_parent.clone()));
        }
        if parent != to_parent && draft.position_of(&to_parent, id).is_some() {
            return Err(MutationError::DuplicateEdge {
                id: id.to_string(),
                parent: to_parent.clone(),
            });
        }
        if is_section(node_type) && !draft.is_valid_section_position(&to_parent) {
            return Err(MutationError::InvalidSectionPlacement {
                id: id.to_string(),
                parent: to_parent.clone(),
            });
        }

        let index = draft
            .position_of(parent, id)
            .ok_or_else(|| MutationError::NotConnected {
                id: id.to_string(),
                parent: parent.to_string(),
            })?;

        if parent == to_parent {
            let mut order: Vec<NodeId> = draft.edges(parent).to_vec();
            let moved = order.remove(index);
            let target = match to_before.as_deref() {
                Some(before) => order.iter().position(|edge| edge == before).ok_or_else(|| {
                    MutationError::BeforeNotFound {
                        before: before.to_string(),
                        parent: parent.to_string(),
                    }
                })?,
                None => order.len(),
            };
            order.insert(target, moved);
            draft.reorder_edges(parent, order)?;
        } else {
            draft.remove_edge(parent, index)?;
            let index = before_index(draft, &to_parent, to_before.as_deref())?;
            draft.insert_edge(&to_parent, index, id)?;
        }

        ensure_acyclic(draft)?;
        ensure_sections_placed(draft, id)
    })
}

/// Delete a node that nothing references any more, then its orphaned children
fn delete_unreferenced(draft: &mut Draft, id: &str) {
    let Some(node) = draft.delete_node(id) else {
        return;
    };
    debug!(id, "deleted unreferenced node");

    for child in node.edges() {
        if draft.contains(child) && draft.number_of_edges_to(child) == 0 {
            delete_unreferenced(draft, child);
        }
    }
}

fn remove_edge_to(draft: &mut Draft, id: &str, parent: &str) -> Result<(), MutationError> {
    if !draft.contains(id) {
        return Err(MutationError::NodeNotFound(id.to_string()));
    }
    if !draft.contains(parent) {
        return Err(MutationError::ParentNotFound(parent.to_string()));
    }

    let index = draft
        .position_of(parent, id)
        .ok_or_else(|| MutationError::NotConnected {
            id: id.to_string(),
            parent: parent.to_string(),
        })?;
    draft.remove_edge(parent, index)?;

    if draft.number_of_edges_to(id) == 0 {
        delete_unreferenced(draft, id);
    }

    Ok(())
}

/// Detach `id` from `parent`, deleting it if that was its last parent
#[instrument(level = "debug", skip(graph))]
pub fn remove(graph: &Graph, id: &str, parent: &str) -> MutationResult {
    produce(graph, |draft| {
        remove_edge_to(draft, id, parent)?;

        // A surviving clone may now hang only off a nested parent
        if draft.contains(id) {
            ensure_sections_placed(draft, id)?;
        }
        Ok(())
    })
}

/// Merged `data` of a node after applying `new_data`
fn merge_data(existing: Option<&NodeData>, new_data: &NodeData, remove_key_if_missing: bool) -> Option<NodeData> {
    let mut merged = existing.cloned().unwrap_or_default();

    if remove_key_if_missing {
        merged.retain(|key, _| is_something(new_data.get(key)));
    }

    for (key, value) in new_data {
        match sanitize_value(value.clone()) {
            Some(value) => {
                merged.insert(key.clone(), value);
            }
            None => {
                merged.remove(key);
            }
        }
    }

    (!merged.is_empty()).then_some(merged)
}

fn update_data(draft: &mut Draft, id: &str, new_data: &NodeData, remove_key_if_missing: bool) -> Result<(), MutationError> {
    let existing = draft
        .get(id)
        .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?
        .data
        .clone();
    let merged = merge_data(existing.as_ref(), new_data, remove_key_if_missing);

    match (existing, merged) {
        (Some(existing), Some(merged)) => {
            // Sets before removals so `data` never passes through empty
            for (key, value) in &merged {
                if existing.get(key) != Some(value) {
                    draft.set_data_value(id, key, value.clone())?;
                }
            }
            for key in existing.keys().filter(|key| !merged.contains_key(*key)) {
                draft.remove_data_value(id, key)?;
            }
            Ok(())
        }
        (existing, merged) => {
            if existing != merged {
                draft.replace_data(id, merged)?;
            }
            Ok(())
        }
    }
}

/// Make `id`'s children exactly `children`, in order
fn reconcile_children(
    draft: &mut Draft,
    id: &str,
    children: Vec<NewNode>,
    ids: &mut dyn IdGenerator,
) -> Result<(), MutationError> {
    let children: Vec<NewNode> = children
        .into_iter()
        .map(|mut child| {
            if child.id.is_none() {
                child.id = Some(ids.next_id());
            }
            child
        })
        .collect();
    let requested: Vec<NodeId> = children.iter().filter_map(|child| child.id.clone()).collect();
    if let Some(duplicate) = requested
        .iter()
        .enumerate()
        .find_map(|(index, child)| requested[..index].contains(child).then_some(child))
    {
        return Err(MutationError::DuplicateEdge {
            id: duplicate.clone(),
            parent: id.to_string(),
        });
    }
    let current: Vec<NodeId> = draft.edges(id).to_vec();

    // Requested children are linked before dropped ones go, so no cascade reaches them
    for child in children {
        let Some(child_id) = child.id.clone() else {
            continue;
        };

        if current.contains(&child_id) {
            let data = child.data.unwrap_or_default();
            update_data(draft, &child_id, &data, true)?;
        } else if draft.contains(&child_id) {
            link_child(draft, id, &child_id)?;
            let data = child.data.unwrap_or_default();
            update_data(draft, &child_id, &data, true)?;
        } else {
            add_node(draft, child, id, None, ids)?;
        }
    }

    for removed in current.iter().filter(|edge| !requested.contains(*edge)) {
        remove_edge_to(draft, removed, id)?;
    }

    draft.replace_edges(id, requested)?;
    ensure_acyclic(draft)?;
    ensure_sections_placed(draft, id)
}

/// Merge `new_data` into a node's data, optionally reconciling its children
#[instrument(level = "debug", skip(graph, new_data, options, ids), fields(remove_key_if_missing = options.remove_key_if_missing))]
pub fn update(
    graph: &Graph,
    id: &str,
    new_data: NodeData,
    options: UpdateOptions,
    ids: &mut dyn IdGenerator,
) -> MutationResult {
    let UpdateOptions {
        children,
        remove_key_if_missing,
    } = options;

    produce(graph, |draft| {
        if !draft.contains(id) {
            return Err(MutationError::NodeNotFound(id.to_string()));
        }

        if remove_key_if_missing {
            if let Some(children) = children {
                reconcile_children(draft, id, children, ids)?;
            }
        }

        update_data(draft, id, &new_data, remove_key_if_missing)
    })
}

fn duplicate_subgraph(
    draft: &mut Draft,
    id: &str,
    parent: &str,
    before: Option<usize>,
    ids: &mut dyn IdGenerator,
) -> Result<(), MutationError> {
    let node = draft
        .get(id)
        .cloned()
        .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;

    let new_id = ids.next_id();
    if draft.contains(&new_id) {
        return Err(MutationError::NodeExists(new_id));
    }

    draft.insert_node(&new_id, Node::new(node.node_type, node.data.clone()));
    draft.insert_edge(parent, before, &new_id)?;

    for child in node.edges() {
        if draft.is_clone(child) {
            // Shared branches are re-referenced rather than copied
            draft.insert_edge(&new_id, None, child)?;
        } else {
            duplicate_subgraph(draft, child, &new_id, None, ids)?;
        }
    }

    Ok(())
}

/// Replace the reference `parent → id` with a private deep copy of `id`'s subgraph
#[instrument(level = "debug", skip(graph, ids))]
pub fn make_unique(graph: &Graph, id: &str, parent: &str, ids: &mut dyn IdGenerator) -> MutationResult {
    produce(graph, |draft| {
        if !draft.contains(id) {
            return Err(MutationError::NodeNotFound(id.to_string()));
        }
        if !draft.contains(parent) {
            return Err(MutationError::ParentNotFound(parent.to_string()));
        }
        let index = draft
            .position_of(parent, id)
            .ok_or_else(|| MutationError::NotConnected {
                id: id.to_string(),
                parent: parent.to_string(),
            })?;

        duplicate_subgraph(draft, id, parent, Some(index), ids)?;
        remove_edge_to(draft, id, parent)
    })
}

/// A serialisable editor intent, applied with [`Mutation::apply`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    Add {
        node: NewNode,
        #[serde(default)]
        relationships: Relationships,
    },

    Clone {
        id: NodeId,
        #[serde(default)]
        options: CloneOptions,
    },

    Move {
        id: NodeId,
        parent: NodeId,
        #[serde(default)]
        options: MoveOptions,
    },

    Remove {
        id: NodeId,
        parent: NodeId,
    },

    Update {
        id: NodeId,
        data: NodeData,
        #[serde(default)]
        options: UpdateOptions,
    },

    MakeUnique {
        id: NodeId,
        #[serde(default = "root_id")]
        parent: NodeId,
    },
}

fn root_id() -> NodeId {
    ROOT_NODE_KEY.to_string()
}

impl Mutation {
    pub fn apply(&self, graph: &Graph, ids: &mut dyn IdGenerator) -> MutationResult {
        match self {
            Mutation::Add { node, relationships } => add(graph, node.clone(), relationships.clone(), ids),
            Mutation::Clone { id, options } => clone_node(graph, id, options.clone()),
            Mutation::Move { id, parent, options } => move_node(graph, id, parent, options.clone()),
            Mutation::Remove { id, parent } => remove(graph, id, parent),
            Mutation::Update { id, data, options } => update(graph, id, data.clone(), options.clone(), ids),
            Mutation::MakeUnique { id, parent } => make_unique(graph, id, parent, ids),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Add { .. } => "add",
            Mutation::Clone { .. } => "clone",
            Mutation::Move { .. } => "move",
            Mutation::Remove { .. } => "remove",
            Mutation::Update { .. } => "update",
            Mutation::MakeUnique { .. } => "makeUnique",
        }
    }
}
