//! # PlanX Graph
//!
//! Flow graph engine for the PlanX editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ editor action                               │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ mutations: add / clone / move / remove /    │
//! │            update / make_unique             │
//! │  - edit a copy-on-write Draft               │
//! │  - validate cycles and placement            │
//! │  - log forward + inverse patches            │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ ot: patches → json0 ops (oi/od/li/ld)       │
//! └─────────────────────────────────────────────┘
//!           ↓                         ↓
//!   collaboration channel      summary: audit lines
//! ```
//!
//! ## Core Principles
//!
//! 1. **Snapshots are immutable**: every operation returns a new [`Graph`] that shares
//!    untouched nodes with the previous one
//! 2. **Deterministic**: the same snapshot, call and id generator give the same result
//! 3. **Reachability is structural**: nodes are deleted when their last edge goes
//! 4. **Ops are the contract**: the diff is the only thing other editors see
//!
//! ## Usage
//!
//! ```rust
//! use planx_graph::{add, format_ops, Graph, NewNode, Relationships, SequentialIds};
//! use serde_json::json;
//!
//! let graph = Graph::new();
//! let mut ids = SequentialIds::new("flow");
//!
//! let data = json!({ "text": "Q1" }).as_object().cloned();
//! let (graph, ops) = add(&graph, NewNode::new(Some(100), data), Relationships::default(), &mut ids)?;
//!
//! assert_eq!(graph.edges("_root"), ["flow-1"]);
//! assert_eq!(format_ops(&graph, &ops), vec![r#"Added Question "Q1""#]);
//! # Ok::<(), planx_graph::GraphError>(())
//! ```

mod builder;
mod clipboard;
mod config;
mod draft;
mod errors;
mod graph;
mod ids;
mod mutations;
mod node;
mod ot;
mod patch;
mod sanitize;
mod sequencer;
mod summary;

pub use builder::{build_graph_from_nodes, NodeLookup};
pub use clipboard::{copy_subgraph, paste_subgraph, CopiedNode, CopiedPayload, TEMPLATED_NODE_PROPS};
pub use config::{GraphConfig, SummaryConfig, DEFAULT_CONFIG_NAME};
pub use errors::GraphError;
pub use graph::Graph;
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use mutations::{
    add, clone_node, make_unique, move_node, remove, update, CloneOptions, ErrorKind, MoveOptions,
    Mutation, MutationError, MutationResult, NewNode, Relationships, UpdateOptions,
};
pub use node::{ComponentType, Node, NodeData, NodeId, ROOT_NODE_KEY};
pub use ot::{apply_ops, invert, ops_from_patches, Op, OpError, OpKind};
pub use patch::{display_path, Patch, PatchOp, Path, PathSegment};
pub use sanitize::{is_something, sanitize_data, sanitize_str, sanitize_value};
pub use sequencer::{dfs, sort_ids_depth_first, DepthFirstOrder};
pub use summary::{format_ops, format_ops_with};
