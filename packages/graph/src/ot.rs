//! # OT Ops
//!
//! The diff of a mutation in the json0 vocabulary understood by the collaboration
//! channel: a path `p` plus one of `{oi}`, `{od}`, `{oi, od}`, `{li}`, `{ld}`, `{li, ld}`.
//!
//! ```text
//! Draft log (forward, inverse) ──► ops_from_patches ──► Vec<Op> ──► channel
//!                                                         │
//!                                              invert ◄───┴───► apply_ops
//! ```
//!
//! Paths that point *into* a node's `edges` list (`[id, "edges", i]`) become list ops;
//! everything else is an object op.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::graph::Graph;
use crate::patch::{display_path, Patch, PatchOp, Path, PathSegment};

/// One json0 primitive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Op {
    pub p: Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oi: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub od: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub li: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ld: Option<Value>,
}

/// Shape of an op, as far as the formatter and applier care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    ObjectInsert,
    ObjectDelete,
    ObjectReplace,
    ListInsert,
    ListDelete,
    ListReplace,
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpError {
    #[error("Op has an empty path")]
    EmptyPath,

    #[error("Op at {0} carries no instruction")]
    EmptyOp(String),

    #[error("Op mixes list and object instructions at {0}")]
    MixedOp(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Expected a list at {0}")]
    NotAList(String),

    #[error("Expected an object at {0}")]
    NotAnObject(String),

    #[error("Index {index} out of bounds at {path} (length {len})")]
    IndexOutOfBounds { path: String, index: usize, len: usize },

    #[error("Resulting document is not a graph: {0}")]
    InvalidDocument(String),
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match (&self.oi, &self.od, &self.li, &self.ld) {
            (Some(_), Some(_), _, _) => OpKind::ObjectReplace,
            (Some(_), None, _, _) => OpKind::ObjectInsert,
            (None, Some(_), _, _) => OpKind::ObjectDelete,
            (None, None, Some(_), Some(_)) => OpKind::ListReplace,
            (None, None, Some(_), None) => OpKind::ListInsert,
            (None, None, None, Some(_)) => OpKind::ListDelete,
            (None, None, None, None) => OpKind::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind() == OpKind::Empty
    }

    /// The op that undoes this one
    pub fn inverted(&self) -> Op {
        Op {
            p: self.p.clone(),
            oi: self.od.clone(),
            od: self.oi.clone(),
            li: self.ld.clone(),
            ld: self.li.clone(),
        }
    }
}

/// Whether a path addresses an element of a node's edge list
fn is_list_path(path: &[PathSegment]) -> bool {
    path.len() > 2 && path[1].is_key("edges")
}

/// Zip forward patches with their inverses into ops.
///
/// Both slices come from the same draft log, so entry `i` of one undoes entry `i` of the
/// other. Pairs that produce no instruction are dropped.
pub fn ops_from_patches(patches: &[Patch], inverse: &[Patch]) -> Vec<Op> {
    if patches.len() != inverse.len() {
        warn!(
            forward = patches.len(),
            inverse = inverse.len(),
            "patch log lengths differ, extra entries ignored"
        );
    }

    patches
        .iter()
        .zip(inverse)
        .filter_map(|(forward, undo)| {
            let op = op_from_pair(forward, undo);
            if op.is_empty() {
                warn!(path = %display_path(&forward.path), "dropping empty op");
                None
            } else {
                Some(op)
            }
        })
        .collect()
}

fn op_from_pair(forward: &Patch, undo: &Patch) -> Op {
    let inserted = match forward.op {
        PatchOp::Add | PatchOp::Replace => forward.value.clone(),
        PatchOp::Remove => None,
    };

    // A replace undone by a remove was really an insertion, so there is nothing to delete
    let deleted = match (forward.op, undo.op) {
        (PatchOp::Add, _) | (_, PatchOp::Remove) => None,
        _ => undo.value.clone(),
    };

    let mut op = Op {
        p: forward.path.clone(),
        ..Op::default()
    };

    if is_list_path(&forward.path) {
        op.li = inserted;
        op.ld = deleted;
    } else {
        op.oi = inserted;
        op.od = deleted;
    }

    op
}

/// Reverse an op list into its undo
pub fn invert(ops: &[Op]) -> Vec<Op> {
    ops.iter().rev().map(Op::inverted).collect()
}

/// Apply ops to a JSON document with json0 semantics
pub fn apply_ops(doc: &mut Value, ops: &[Op]) -> Result<(), OpError> {
    for op in ops {
        apply_op(doc, op)?;
    }
    Ok(())
}

fn apply_op(doc: &mut Value, op: &Op) -> Result<(), OpError> {
    let Some((last, parents)) = op.p.split_last() else {
        return Err(OpError::EmptyPath);
    };

    let kind = op.kind();
    let is_object_op = op.oi.is_some() || op.od.is_some();
    let is_list_op = op.li.is_some() || op.ld.is_some();
    if is_object_op && is_list_op {
        return Err(OpError::MixedOp(display_path(&op.p)));
    }

    let container = resolve_mut(doc, parents)?;

    match kind {
        OpKind::Empty => Err(OpError::EmptyOp(display_path(&op.p))),

        OpKind::ObjectInsert | OpKind::ObjectDelete | OpKind::ObjectReplace => {
            let map = container
                .as_object_mut()
                .ok_or_else(|| OpError::NotAnObject(display_path(parents)))?;
            let key = last.to_string();

            if op.od.is_some() && op.oi.is_none() {
                map.remove(&key)
                    .ok_or_else(|| OpError::PathNotFound(display_path(&op.p)))?;
            }
            if let Some(value) = &op.oi {
                map.insert(key, value.clone());
            }
            Ok(())
        }

        OpKind::ListInsert | OpKind::ListDelete | OpKind::ListReplace => {
            let list = container
                .as_array_mut()
                .ok_or_else(|| OpError::NotAList(display_path(parents)))?;
            let index = last
                .as_index()
                .ok_or_else(|| OpError::NotAnObject(display_path(&op.p)))?;

            let out_of_bounds = |len| OpError::IndexOutOfBounds {
                path: display_path(parents),
                index,
                len,
            };

            match (&op.li, &op.ld) {
                (Some(value), Some(_)) => {
                    let len = list.len();
                    let slot = list.get_mut(index).ok_or_else(|| out_of_bounds(len))?;
                    *slot = value.clone();
                }
                (Some(value), None) => {
                    if index > list.len() {
                        return Err(out_of_bounds(list.len()));
                    }
                    list.insert(index, value.clone());
                }
                (None, Some(_)) => {
                    if index >= list.len() {
                        return Err(out_of_bounds(list.len()));
                    }
                    list.remove(index);
                }
                (None, None) => return Err(OpError::EmptyOp(display_path(&op.p))),
            }
            Ok(())
        }
    }
}

fn resolve_mut<'v>(doc: &'v mut Value, path: &[PathSegment]) -> Result<&'v mut Value, OpError> {
    let mut current = doc;
    for (depth, segment) in path.iter().enumerate() {
        let next = match (current, segment) {
            (Value::Object(map), segment) => map.get_mut(&segment.to_string()),
            (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
            _ => None,
        };
        current = next.ok_or_else(|| OpError::PathNotFound(display_path(&path[..=depth])))?;
    }
    Ok(current)
}

impl Graph {
    /// New snapshot with `ops` applied
    pub fn apply_ops(&self, ops: &[Op]) -> Result<Graph, OpError> {
        let mut doc = self.to_value();
        apply_ops(&mut doc, ops)?;
        Graph::from_value(doc).map_err(|e| OpError::InvalidDocument(e.to_string()))
    }
}
