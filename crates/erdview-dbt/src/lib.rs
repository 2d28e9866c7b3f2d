//! dbt manifest parsing and relationship derivation
//!
//! This crate handles:
//! - Parsing manifest.json into a typed, order-preserving model
//! - Parsing `ref('model')` expressions from test arguments
//! - Extracting column-level relationships from `relationships` tests
//! - Parent/child lookups used for selection and detail views

pub mod manifest;
pub mod refs;
pub mod relationships;
pub mod dag;

pub use manifest::{is_model_id, ColumnInfo, Manifest, ManifestError, ManifestNode, TestMetadata, TestNode, MODEL_PREFIX};
pub use refs::parse_ref;
pub use relationships::{extract_relationships, ColumnRef, ColumnRelationship, Relationships};
pub use dag::{connected_nodes, DependencyGraph, NodeId};
