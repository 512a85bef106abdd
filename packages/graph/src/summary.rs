//! # Change Summaries
//!
//! Renders an op list as audit-log sentences such as
//! `Updated Checklist text from "Which fruits?" to "Which vegetables?"`.
//!
//! Node types are resolved against the snapshot first and then against whole nodes the
//! same op list inserts or deletes, so a summary reads the same whether it is produced
//! from the snapshot before or after the edit.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::SummaryConfig;
use crate::graph::Graph;
use crate::node::{ComponentType, ROOT_NODE_KEY};
use crate::ot::{Op, OpKind};
use crate::patch::PathSegment;

/// Payload fields a node's label is taken from, first present wins
const LABEL_FIELDS: [&str; 6] = ["title", "text", "content", "fn", "val", "flowId"];

/// Human-readable lines for `ops` with the default wording
pub fn format_ops(graph: &Graph, ops: &[Op]) -> Vec<String> {
    format_ops_with(graph, ops, &SummaryConfig::default())
}

pub fn format_ops_with(graph: &Graph, ops: &[Op], config: &SummaryConfig) -> Vec<String> {
    let formatter = Formatter::new(graph, ops, config);
    let mut output: Vec<String> = Vec::new();
    let mut last_reorder: Option<&[PathSegment]> = None;

    for op in ops {
        // A reorder touches several indices of one list; report it once
        if op.kind() == OpKind::ListReplace {
            let list = &op.p[..op.p.len().saturating_sub(1)];
            if last_reorder == Some(list) {
                continue;
            }
            last_reorder = Some(list);
        } else {
            last_reorder = None;
        }

        formatter.format(op, &mut output);
    }

    output
}

struct Formatter<'a> {
    graph: &'a Graph,
    ops: &'a [Op],
    config: &'a SummaryConfig,
    /// Ids whose whole node is inserted or deleted by this op list
    touched_nodes: HashSet<&'a str>,
}

impl<'a> Formatter<'a> {
    fn new(graph: &'a Graph, ops: &'a [Op], config: &'a SummaryConfig) -> Self {
        let touched_nodes = ops
            .iter()
            .filter(|op| op.p.len() == 1 && (op.oi.is_some() || op.od.is_some()))
            .filter_map(|op| op.p[0].as_key())
            .collect();

        Self {
            graph,
            ops,
            config,
            touched_nodes,
        }
    }

    fn format(&self, op: &Op, output: &mut Vec<String>) {
        let Some(id) = op.p.first().and_then(PathSegment::as_key) else {
            return;
        };
        let field = op.p.get(1).and_then(PathSegment::as_key);

        match op.kind() {
            OpKind::ObjectReplace => self.format_replace(id, op, output),
            OpKind::ObjectInsert => self.format_insert_or_delete(id, op, op.oi.as_ref(), "Added", output),
            OpKind::ObjectDelete => self.format_insert_or_delete(id, op, op.od.as_ref(), "Removed", output),
            OpKind::ListReplace => {
                if field == Some("edges") {
                    output.push(if id == ROOT_NODE_KEY {
                        "Re-ordered the root graph".to_string()
                    } else {
                        "Moved node".to_string()
                    });
                }
            }
            OpKind::ListInsert => {
                if let Some(child) = op.li.as_ref().and_then(Value::as_str) {
                    self.push_branch_line("Added", "to", child, output);
                }
            }
            OpKind::ListDelete => {
                if let Some(child) = op.ld.as_ref().and_then(Value::as_str) {
                    self.push_branch_line("Removed", "from", child, output);
                }
            }
            OpKind::Empty => {}
        }
    }

    fn format_replace(&self, id: &str, op: &Op, output: &mut Vec<String>) {
        let (Some(inserted), Some(deleted)) = (&op.oi, &op.od) else {
            return;
        };

        if op.p.len() == 1 {
            if let (Some(new_type), Some(old_type)) = (type_code(inserted), type_code(deleted)) {
                output.push(format!(
                    "Replaced {}{} with {}{}",
                    component_name("node", Some(old_type)),
                    quoted_label(deleted),
                    component_name("node", Some(new_type)),
                    quoted_label(inserted),
                ));
            }
            return;
        }

        let node_name = component_name("node", self.type_of(id));
        match (op.p.get(1).and_then(PathSegment::as_key), op.p.get(2)) {
            (Some("data"), Some(prop)) => {
                self.push_prop_update(&node_name, &prop.to_string(), deleted, inserted, output);
            }
            (Some("data"), None) => {
                let (Some(new), Some(old)) = (inserted.as_object(), deleted.as_object()) else {
                    return;
                };
                for (prop, value) in new {
                    match old.get(prop) {
                        None => self.push_prop_line("Added", &node_name, prop, value, output),
                        Some(previous) if previous != value => {
                            self.push_prop_update(&node_name, prop, previous, value, output)
                        }
                        Some(_) => {}
                    }
                }
                for (prop, value) in old.iter().filter(|(prop, _)| !new.contains_key(*prop)) {
                    self.push_prop_line("Removed", &node_name, prop, value, output);
                }
            }
            (Some("edges"), _) => {
                output.push(format!(
                    "Updated order of {} edges",
                    component_name("graph", self.type_of(id))
                ));
            }
            _ => {}
        }
    }

    fn format_insert_or_delete(
        &self,
        id: &str,
        op: &Op,
        value: Option<&Value>,
        verb: &str,
        output: &mut Vec<String>,
    ) {
        let Some(value) = value else {
            return;
        };

        if op.p.len() == 1 {
            if let Some(code) = type_code(value) {
                output.push(format!(
                    "{} {}{}",
                    verb,
                    component_name("node", Some(code)),
                    quoted_label(value)
                ));
            }
            return;
        }

        match (op.p.get(1).and_then(PathSegment::as_key), op.p.get(2)) {
            (Some("data"), Some(prop)) => {
                let node_name = component_name("node", self.type_of(id));
                self.push_prop_line(verb, &node_name, &prop.to_string(), value, output);
            }
            (Some("data"), None) => {
                let node_name = component_name("node", self.type_of(id));
                for (prop, value) in value.as_object().into_iter().flatten() {
                    self.push_prop_line(verb, &node_name, prop, value, output);
                }
            }
            (Some("edges"), None) => {
                let direction = if verb == "Added" { "to" } else { "from" };
                for child in value.as_array().into_iter().flatten().filter_map(Value::as_str) {
                    self.push_branch_line(verb, direction, child, output);
                }
            }
            _ => {}
        }
    }

    fn push_prop_line(&self, verb: &str, node_name: &str, prop: &str, value: &Value, output: &mut Vec<String>) {
        if self.config.is_verbatim(prop) {
            output.push(format!(
                "{} {} {} \"{}\"",
                verb,
                node_name,
                self.config.label(prop),
                display_value(value)
            ));
        } else {
            output.push(format!("{} {} {}", verb, node_name, self.config.label(prop)));
        }
    }

    fn push_prop_update(&self, node_name: &str, prop: &str, old: &Value, new: &Value, output: &mut Vec<String>) {
        if self.config.is_verbatim(prop) {
            output.push(format!(
                "Updated {} {} from \"{}\" to \"{}\"",
                node_name,
                self.config.label(prop),
                display_value(old),
                display_value(new)
            ));
        } else {
            output.push(format!("Updated {} {}", node_name, self.config.label(prop)));
        }
    }

    /// `Added X to branch` unless the child node itself is added or removed here
    fn push_branch_line(&self, verb: &str, direction: &str, child: &str, output: &mut Vec<String>) {
        if self.touched_nodes.contains(child) {
            return;
        }
        output.push(format!(
            "{} {} {} branch",
            verb,
            component_name("node", self.type_of(child)),
            direction
        ));
    }

    fn type_of(&self, id: &str) -> Option<u16> {
        if let Some(node_type) = self.graph.get(id).and_then(|node| node.node_type) {
            return Some(node_type);
        }

        self.ops
            .iter()
            .filter(|op| op.p.len() == 1 && op.p[0].is_key(id))
            .find_map(|op| op.oi.as_ref().or(op.od.as_ref()).and_then(type_code))
    }
}

fn type_code(value: &Value) -> Option<u16> {
    value
        .get("type")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
}

/// Editor-facing name of a type code, or `default` when there is none
fn component_name(default: &str, node_type: Option<u16>) -> String {
    node_type
        .and_then(ComponentType::from_code)
        .map(ComponentType::display_name)
        .unwrap_or(default)
        .to_string()
}

fn label(node: &Value) -> Option<String> {
    let data: &Map<String, Value> = node.get("data")?.as_object()?;
    LABEL_FIELDS
        .iter()
        .filter_map(|field| data.get(*field))
        .find(|value| is_truthy(value))
        .map(display_value)
}

/// `null`, `false`, zero and the empty string never serve as a label
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(true, |n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// ` "label"` with a leading space, or nothing when the node has no label
fn quoted_label(node: &Value) -> String {
    label(node)
        .map(|label| format!(" \"{}\"", label))
        .unwrap_or_default()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
