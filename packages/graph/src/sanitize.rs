//! Payload sanitization applied on every write to a node's `data`.
//!
//! Strings are trimmed and stripped of zero-width characters (and the `↵` glyph pasted
//! in from rich text). Empty strings, `null`, empty objects and empty lists count as
//! absent and are dropped rather than stored.

use serde_json::{Map, Value};

use crate::node::NodeData;

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{21B5}')
}

pub fn sanitize_str(s: &str) -> String {
    let visible: String = s.chars().filter(|c| !is_invisible(*c)).collect();
    visible.trim().to_string()
}

/// Sanitize a single value, returning `None` when it should be treated as absent.
pub fn sanitize_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = sanitize_str(&s);
            (!s.is_empty()).then_some(Value::String(s))
        }
        Value::Object(map) => sanitize_data(map).map(Value::Object),
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(sanitize_value).collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        other => Some(other),
    }
}

/// Sanitize a payload, returning `None` when nothing meaningful is left.
pub fn sanitize_data(data: Map<String, Value>) -> Option<NodeData> {
    let sanitized: NodeData = data
        .into_iter()
        .filter_map(|(key, value)| sanitize_value(value).map(|value| (key, value)))
        .collect();

    (!sanitized.is_empty()).then_some(sanitized)
}

/// Whether a (raw) value carries something worth storing
pub fn is_something(value: Option<&Value>) -> bool {
    value.cloned().and_then(sanitize_value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_drops_blank_and_invisible_strings() {
        let data = object(json!({
            "info": "\u{200B}\u{200B}",
            "policyRef": "\u{200B}\n",
            "empty": "\u{200B}",
            "another": "↵",
            "howMeasured": null,
            "text": "efef",
            "description": " \u{200B}",
        }));

        assert_eq!(sanitize_data(data), Some(object(json!({ "text": "efef" }))));
    }

    #[test]
    fn test_trims_and_strips_inside_strings() {
        assert_eq!(sanitize_str("  Which\u{200C} fruits?\u{FEFF} "), "Which fruits?");
    }

    #[test]
    fn test_nested_empty_objects_are_absent() {
        let data = object(json!({
            "nested": { "inner": { "blank": "  " } },
            "list": [""],
            "flag": false,
            "count": 0,
        }));

        assert_eq!(
            sanitize_data(data),
            Some(object(json!({ "flag": false, "count": 0 })))
        );
    }

    #[test]
    fn test_only_whitespace_yields_no_data() {
        let data = object(json!({ "a": " ", "b": {}, "c": { "d": "" } }));
        assert_eq!(sanitize_data(data), None);
    }

    #[test]
    fn test_idempotent() {
        let data = object(json!({
            "title": "  Title\u{200B} ",
            "options": [{ "val": " x " }, { "val": "" }],
            "meta": { "keep": 1, "drop": null },
        }));

        let once = sanitize_data(data).unwrap();
        let twice = sanitize_data(once.clone()).unwrap();
        assert_eq!(once, twice);
    }
}
