use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::GraphError;
use crate::ids::{RandomIds, DEFAULT_ID_ALPHABET, DEFAULT_ID_LENGTH};

pub const DEFAULT_CONFIG_NAME: &str = "planx-graph.config.json";

/// Engine configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    /// Length of generated node ids
    #[serde(default = "default_id_length")]
    pub id_length: usize,

    /// Characters generated node ids are drawn from
    #[serde(default = "default_id_alphabet")]
    pub id_alphabet: String,

    /// Change-summary wording
    #[serde(default)]
    pub summary: SummaryConfig,
}

fn default_id_length() -> usize {
    DEFAULT_ID_LENGTH
}

fn default_id_alphabet() -> String {
    DEFAULT_ID_ALPHABET.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryConfig {
    /// Props whose values are quoted in summary lines
    #[serde(default = "default_verbatim_props")]
    pub verbatim_props: Vec<String>,

    /// Friendly names for data props
    #[serde(default = "default_prop_labels")]
    pub prop_labels: BTreeMap<String, String>,
}

fn default_verbatim_props() -> Vec<String> {
    ["title", "text", "fn", "val"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_prop_labels() -> BTreeMap<String, String> {
    [
        ("fn", "data field"),
        ("val", "data field"),
        ("info", "help text (\"Why it matters\")"),
        ("howMeasured", "help text (\"How is it defined?\")"),
        ("policyRef", "help text source links"),
        ("definitionImg", "help text image"),
    ]
    .into_iter()
    .map(|(prop, label)| (prop.to_string(), label.to_string()))
    .collect()
}

impl SummaryConfig {
    pub fn is_verbatim(&self, prop: &str) -> bool {
        self.verbatim_props.iter().any(|p| p == prop)
    }

    /// Friendly name of a prop, falling back to the prop itself
    pub fn label<'a>(&'a self, prop: &'a str) -> &'a str {
        self.prop_labels.get(prop).map(String::as_str).unwrap_or(prop)
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            verbatim_props: default_verbatim_props(),
            prop_labels: default_prop_labels(),
        }
    }
}

impl GraphConfig {
    /// Load config from a directory, using defaults when no config file exists
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, GraphError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(content: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Random id generator configured with this id shape
    pub fn id_generator(&self) -> RandomIds {
        RandomIds::new().with_alphabet(&self.id_alphabet, self.id_length)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            id_length: default_id_length(),
            id_alphabet: default_id_alphabet(),
            summary: SummaryConfig::default(),
        }
    }
}
