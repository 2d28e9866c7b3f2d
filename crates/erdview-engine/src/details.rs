//! Detail view of a selected model

use serde::Serialize;
use serde_json::{Map, Value};

use erdview_dbt::{ColumnInfo, DependencyGraph, Manifest};

/// Key role of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyRole {
    #[serde(rename = "PK")]
    Primary,
    #[serde(rename = "FK")]
    Foreign,
    #[serde(rename = "")]
    Plain,
}

impl KeyRole {
    /// Role from column metadata: PK if `is_key`, else FK if `is_foreign_key`
    pub fn of(column: &ColumnInfo) -> Self {
        if column.is_key() {
            Self::Primary
        } else if column.is_foreign_key() {
            Self::Foreign
        } else {
            Self::Plain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "PK",
            Self::Foreign => "FK",
            Self::Plain => "",
        }
    }
}

impl std::fmt::Display for KeyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the column table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRow {
    pub name: String,

    /// Data type, or "unknown"
    pub data_type: String,

    pub description: String,

    pub key: KeyRole,

    /// `table.column` the column references, for foreign keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl ColumnRow {
    fn from_column(name: &str, column: &ColumnInfo) -> Self {
        let key = KeyRole::of(column);
        let references = (key == KeyRole::Foreign).then(|| {
            format!(
                "{}.{}",
                column.references().unwrap_or_default(),
                column.references_field().unwrap_or_default()
            )
        });

        Self {
            name: name.to_string(),
            data_type: column.data_type.clone().unwrap_or_else(|| "unknown".to_string()),
            description: column.description.clone().unwrap_or_default(),
            key,
            references,
        }
    }
}

/// Everything shown for a selected table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDetails {
    /// `schema.name`
    pub key: String,

    pub node_id: String,
    pub description: Option<String>,
    pub database: Option<String>,
    pub schema: String,

    /// Node metadata, unmodified
    pub meta: Map<String, Value>,

    pub columns: Vec<ColumnRow>,

    /// Tables listing this one as a parent
    pub referenced_by: Vec<String>,

    /// Tables this one lists as parents
    pub references: Vec<String>,
}

/// Build the detail view for a composite key
///
/// Returns `None` if no model has that key. Relationship entries whose node
/// is missing from the manifest are dropped.
pub fn model_details(manifest: &Manifest, key: &str) -> Option<ModelDetails> {
    let node_id = manifest.resolve_model_id(key)?;
    let node = manifest.get_node(node_id)?;
    let dag = DependencyGraph::from_manifest(manifest);

    let referenced_by = composite_keys(manifest, dag.dependents(node_id));
    let references = composite_keys(manifest, dag.parents(node_id).iter().map(String::as_str));

    Some(ModelDetails {
        key: node.composite_key(),
        node_id: node_id.to_string(),
        description: node.description.clone(),
        database: node.database.clone(),
        schema: node.schema.clone(),
        meta: node.meta.clone(),
        columns: node
            .columns
            .iter()
            .map(|(name, column)| ColumnRow::from_column(name, column))
            .collect(),
        referenced_by,
        references,
    })
}

fn composite_keys<'a>(manifest: &Manifest, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    ids.into_iter()
        .filter_map(|id| manifest.get_node(id))
        .map(|node| node.composite_key())
        .collect()
}
