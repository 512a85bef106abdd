//! # Nodes
//!
//! A flow is a flat map of node id → [`Node`]. Adjacency lives on each node as an
//! ordered `edges` list; there is no separate edge entity.
//!
//! The engine treats `type` and `data` as opaque. Only the handful of
//! [`ComponentType`]s that affect placement (sections, folders, flow references)
//! are interpreted, plus display names for change summaries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node identifier (opaque string, unique within a graph)
pub type NodeId = String;

/// Opaque node payload
pub type NodeData = Map<String, Value>;

/// Reserved id of the root node
pub const ROOT_NODE_KEY: &str = "_root";

/// A single question/logic unit of a flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Component type code
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<u16>,

    /// Type-specific payload (always sanitized when written by the engine)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NodeData>,

    /// Ordered child ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<NodeId>>,
}

impl Node {
    pub fn new(node_type: Option<u16>, data: Option<NodeData>) -> Self {
        Self {
            node_type,
            data,
            edges: None,
        }
    }

    /// Node with an empty (but present) edge list, the shape of a fresh root
    pub fn with_empty_edges() -> Self {
        Self {
            edges: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn edges(&self) -> &[NodeId] {
        self.edges.as_deref().unwrap_or(&[])
    }

    pub fn component_type(&self) -> Option<ComponentType> {
        self.node_type.and_then(ComponentType::from_code)
    }

    pub fn is_type(&self, kind: ComponentType) -> bool {
        self.node_type == Some(kind as u16)
    }

    /// JSON form used in patches and ops
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(node_type) = self.node_type {
            map.insert("type".to_string(), Value::from(node_type));
        }
        if let Some(data) = &self.data {
            map.insert("data".to_string(), Value::Object(data.clone()));
        }
        if let Some(edges) = &self.edges {
            map.insert(
                "edges".to_string(),
                Value::Array(edges.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }
}

/// Component kinds known to the engine.
///
/// Codes mirror the editor's component registry. Anything not listed is still a valid
/// node type; it simply has no display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ComponentType {
    Flow = 1,
    Result = 3,
    TaskList = 7,
    Notice = 8,
    FindProperty = 9,
    DrawBoundary = 10,
    PlanningConstraints = 11,
    PropertyInformation = 12,
    Question = 100,
    Checklist = 105,
    TextInput = 110,
    DateInput = 120,
    AddressInput = 130,
    ContactInput = 135,
    FileUpload = 140,
    FileUploadAndLabel = 145,
    NumberInput = 150,
    MapAndLabel = 155,
    Answer = 200,
    Content = 250,
    InternalPortal = 300,
    ExternalPortal = 310,
    Section = 360,
    SetValue = 380,
    Pay = 400,
    Filter = 500,
    Review = 600,
    Send = 650,
    Calculate = 700,
    Confirmation = 900,
}

impl ComponentType {
    pub fn from_code(code: u16) -> Option<Self> {
        use ComponentType::*;

        let kind = match code {
            1 => Flow,
            3 => Result,
            7 => TaskList,
            8 => Notice,
            9 => FindProperty,
            10 => DrawBoundary,
            11 => PlanningConstraints,
            12 => PropertyInformation,
            100 => Question,
            105 => Checklist,
            110 => TextInput,
            120 => DateInput,
            130 => AddressInput,
            135 => ContactInput,
            140 => FileUpload,
            145 => FileUploadAndLabel,
            150 => NumberInput,
            155 => MapAndLabel,
            200 => Answer,
            250 => Content,
            300 => InternalPortal,
            310 => ExternalPortal,
            360 => Section,
            380 => SetValue,
            400 => Pay,
            500 => Filter,
            600 => Review,
            650 => Send,
            700 => Calculate,
            900 => Confirmation,
            _ => return None,
        };
        Some(kind)
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    /// Registry name of the component
    pub fn name(self) -> &'static str {
        use ComponentType::*;

        match self {
            Flow => "Flow",
            Result => "Result",
            TaskList => "TaskList",
            Notice => "Notice",
            FindProperty => "FindProperty",
            DrawBoundary => "DrawBoundary",
            PlanningConstraints => "PlanningConstraints",
            PropertyInformation => "PropertyInformation",
            Question => "Question",
            Checklist => "Checklist",
            TextInput => "TextInput",
            DateInput => "DateInput",
            AddressInput => "AddressInput",
            ContactInput => "ContactInput",
            FileUpload => "FileUpload",
            FileUploadAndLabel => "FileUploadAndLabel",
            NumberInput => "NumberInput",
            MapAndLabel => "MapAndLabel",
            Answer => "Answer",
            Content => "Content",
            InternalPortal => "InternalPortal",
            ExternalPortal => "ExternalPortal",
            Section => "Section",
            SetValue => "SetValue",
            Pay => "Pay",
            Filter => "Filter",
            Review => "Review",
            Send => "Send",
            Calculate => "Calculate",
            Confirmation => "Confirmation",
        }
    }

    /// Name shown to editors; legacy portal kinds are presented as folders and flows
    pub fn display_name(self) -> &'static str {
        match self {
            ComponentType::InternalPortal => "Folder",
            ComponentType::ExternalPortal => "Flow",
            other => other.name(),
        }
    }

    /// Kinds that may never be referenced by more than one parent
    pub fn is_cloneable(self) -> bool {
        !matches!(self, ComponentType::Section | ComponentType::ExternalPortal)
    }
}
