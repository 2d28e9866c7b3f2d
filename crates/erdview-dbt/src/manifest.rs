//! dbt manifest.json parsing
//!
//! Parses the subset of manifest.json needed to draw an ERD: nodes with
//! their columns and tests, plus the parent/child adjacency maps.
//! Unknown fields are ignored. Referential integrity between the maps and
//! `nodes` is not checked; consumers skip dangling IDs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Node ID prefix of modeled tables
pub const MODEL_PREFIX: &str = "model.";

/// Whether a node ID denotes a modeled table (as opposed to seeds, sources, tests)
pub fn is_model_id(node_id: &str) -> bool {
    node_id.starts_with(MODEL_PREFIX)
}

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    /// All nodes keyed by unique_id, in document order
    pub nodes: IndexMap<String, ManifestNode>,

    /// Parent map (node -> nodes it depends on)
    pub parent_map: IndexMap<String, Vec<String>>,

    /// Child map (node -> nodes that depend on it)
    pub child_map: IndexMap<String, Vec<String>>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Load manifest from any reader (e.g. an uploaded file)
    pub fn from_reader(mut reader: impl std::io::Read) -> Result<Self, ManifestError> {
        let mut contents = String::new();
        reader
            .read_to_string(&mut contents)
            .map_err(|e| ManifestError::IoError("<reader>".to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    ///
    /// Syntax errors are reported as [`ManifestError::ParseError`]; structural
    /// errors as [`ManifestError::Validation`] with the path of the offending
    /// entry. Missing `nodes`, `parent_map` or `child_map` keys read as empty.
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        let root: Value = serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;

        let Value::Object(mut root) = root else {
            return Err(ManifestError::validation("$", "expected a JSON object"));
        };

        let nodes = match root.remove("nodes") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::Object(raw)) => parse_nodes(raw)?,
            Some(_) => return Err(ManifestError::validation("nodes", "expected an object")),
        };

        let parent_map = parse_adjacency(&mut root, "parent_map")?;
        let child_map = parse_adjacency(&mut root, "child_map")?;

        tracing::debug!(
            nodes = nodes.len(),
            parents = parent_map.len(),
            children = child_map.len(),
            "parsed manifest"
        );

        Ok(Self {
            nodes,
            parent_map,
            child_map,
        })
    }

    /// Model nodes (prefix `model.`) in document order
    pub fn models(&self) -> impl Iterator<Item = (&str, &ManifestNode)> {
        self.nodes
            .iter()
            .filter(|(id, _)| is_model_id(id))
            .map(|(id, node)| (id.as_str(), node))
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    /// Nodes this node depends on, per parent_map
    pub fn parents(&self, unique_id: &str) -> &[String] {
        self.parent_map.get(unique_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Nodes depending on this node, per child_map
    pub fn children(&self, unique_id: &str) -> &[String] {
        self.child_map.get(unique_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Map a `schema.name` composite key back to a model node ID
    ///
    /// When several models share the key, the last one in document order
    /// wins, matching what the graph builder displays.
    pub fn resolve_model_id(&self, composite_key: &str) -> Option<&str> {
        self.models()
            .filter(|(_, node)| node.composite_key() == composite_key)
            .map(|(id, _)| id)
            .last()
    }

    /// Layers used by model nodes with their model counts, in first-seen order
    ///
    /// Models without a layer are counted under the empty string.
    pub fn layer_counts(&self) -> Vec<(String, usize)> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for (_, node) in self.models() {
            *counts.entry(node.layer().to_string()).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }
}

fn parse_nodes(raw: Map<String, Value>) -> Result<IndexMap<String, ManifestNode>, ManifestError> {
    let mut nodes = IndexMap::with_capacity(raw.len());
    for (id, value) in raw {
        let node: ManifestNode = serde_json::from_value(value)
            .map_err(|e| ManifestError::validation(format!("nodes.{}", id), e.to_string()))?;
        nodes.insert(id, node);
    }
    Ok(nodes)
}

fn parse_adjacency(
    root: &mut Map<String, Value>,
    key: &str,
) -> Result<IndexMap<String, Vec<String>>, ManifestError> {
    match root.remove(key) {
        None | Some(Value::Null) => Ok(IndexMap::new()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| ManifestError::validation(key, e.to_string())),
    }
}

/// Python-style truthiness of a metadata value
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn meta_str<'a>(meta: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(Value::as_str)
}

/// A node in the manifest (model, seed, source, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Node name (e.g., "stg_customers")
    pub name: String,

    /// Schema name
    pub schema: String,

    /// Database name
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Column definitions, in document order
    #[serde(default)]
    pub columns: IndexMap<String, ColumnInfo>,

    /// Referenced models, one name list per ref
    #[serde(default)]
    pub refs: Vec<Vec<String>>,

    /// Tests declared on this node
    #[serde(default)]
    pub tests: Vec<TestNode>,

    /// Free-form metadata (layer, dv_type, ...)
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ManifestNode {
    /// `schema.name` key used to identify tables in every view
    pub fn composite_key(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// `meta.layer`, or "" when absent
    pub fn layer(&self) -> &str {
        meta_str(&self.meta, "layer").unwrap_or("")
    }

    /// `meta.dv_type` (hub, link, satellite), or "" when absent
    pub fn dv_type(&self) -> &str {
        meta_str(&self.meta, "dv_type").unwrap_or("")
    }

    /// Description, or "" when absent
    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Column definition from manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub data_type: Option<String>,

    /// Free-form metadata (is_key, is_foreign_key, references, ...)
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ColumnInfo {
    /// Column is flagged as a primary key
    pub fn is_key(&self) -> bool {
        self.meta.get("is_key").map(is_truthy).unwrap_or(false)
    }

    /// Column is flagged as a foreign key
    pub fn is_foreign_key(&self) -> bool {
        self.meta.get("is_foreign_key").map(is_truthy).unwrap_or(false)
    }

    /// Referenced table (`meta.references`)
    pub fn references(&self) -> Option<&str> {
        meta_str(&self.meta, "references")
    }

    /// Referenced column (`meta.references_field`)
    pub fn references_field(&self) -> Option<&str> {
        meta_str(&self.meta, "references_field")
    }
}

/// Test metadata (name and keyword arguments)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    pub name: String,

    pub kwargs: std::collections::BTreeMap<String, String>,

    #[serde(default)]
    pub namespace: Option<String>,
}

impl TestMetadata {
    pub fn kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).map(String::as_str)
    }
}

/// A data test declared on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestNode {
    pub test_metadata: TestMetadata,

    /// Column the test applies to
    #[serde(default)]
    pub column_name: Option<String>,

    #[serde(default)]
    pub refs: Vec<Vec<String>>,
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),

    #[error("Invalid manifest at {path}: {message}")]
    Validation { path: String, message: String },
}

impl ManifestError {
    fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }
}
