//! Renderer-agnostic display graph
//!
//! These records are recomputed on every filter change and never mutated
//! in place. The JSON shape is versioned through [`GraphVersion`].

use serde::{Deserialize, Serialize};
use crate::config::ViewConfig;

/// What a display node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A modeled table
    Table,

    /// Non-interactive layer anchor, never part of an edge
    GroupLabel,
}

/// A node as handed to a rendering backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayNode {
    /// Composite `schema.name` key (or `group_<layer>` for group labels)
    pub id: String,

    pub label: String,

    /// Fill color (hex or rgba)
    pub color: String,

    /// Shape hint for the renderer
    pub shape: String,

    /// Tooltip text
    pub title: String,

    /// Layer the node is grouped under, if grouping is active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    pub kind: NodeKind,

    /// Manifest node ID backing this node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl DisplayNode {
    /// Create a table node
    pub fn table(
        id: impl Into<String>,
        node_id: impl Into<String>,
        color: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            color: color.into(),
            shape: "box".to_string(),
            title: title.into(),
            group: None,
            kind: NodeKind::Table,
            node_id: Some(node_id.into()),
        }
    }

    /// Create the label node anchoring a layer group
    pub fn group_label(layer: &str) -> Self {
        Self {
            id: format!("group_{}", layer),
            label: layer.to_uppercase(),
            color: "rgba(245, 245, 245, 0.3)".to_string(),
            shape: "box".to_string(),
            title: String::new(),
            group: Some(layer.to_string()),
            kind: NodeKind::GroupLabel,
            node_id: None,
        }
    }

    /// Set the group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn is_table(&self) -> bool {
        self.kind == NodeKind::Table
    }
}

/// A directed edge between two table nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayEdge {
    pub source: String,
    pub target: String,

    /// Draw an arrow at the target end
    pub arrow: bool,

    pub label: String,
}

impl DisplayEdge {
    /// A "references" edge from a dependent table to the table it reads from
    pub fn references(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            arrow: true,
            label: "references".to_string(),
        }
    }
}

/// Node and edge lists produced by the graph builder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayGraph {
    pub nodes: Vec<DisplayNode>,
    pub edges: Vec<DisplayEdge>,
}

impl DisplayGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Table nodes only (group labels excluded)
    pub fn tables(&self) -> impl Iterator<Item = &DisplayNode> {
        self.nodes.iter().filter(|n| n.is_table())
    }

    /// Group label nodes only
    pub fn group_labels(&self) -> impl Iterator<Item = &DisplayNode> {
        self.nodes.iter().filter(|n| !n.is_table())
    }

    /// Find a node by its display id
    pub fn node(&self, id: &str) -> Option<&DisplayNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Graph document schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl GraphVersion {
    /// Current graph document version
    pub const CURRENT: GraphVersion = GraphVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for GraphVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Display graph bundled with the widget configuration (graph.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub version: GraphVersion,

    /// Timestamp (ISO 8601)
    pub generated_at: String,

    /// Selected composite key, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,

    pub view: ViewConfig,

    pub graph: DisplayGraph,
}

impl GraphDocument {
    pub fn new(graph: DisplayGraph, view: ViewConfig) -> Self {
        Self {
            version: GraphVersion::CURRENT,
            generated_at: chrono::Utc::now().to_rfc3339(),
            selected: None,
            view,
            graph,
        }
    }

    /// Record the selection the graph was filtered by
    pub fn with_selected(mut self, selected: Option<String>) -> Self {
        self.selected = selected;
        self
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
