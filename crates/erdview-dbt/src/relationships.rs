//! Relationship extraction from `relationships` tests
//!
//! A dbt `relationships` test on column `c` of model `m` with
//! `to: ref('other')` and `field: f` declares that `m.c` references
//! `other.f`. This is independent of parent_map/child_map, which record
//! any dependency, not just foreign keys.
//!
//! Two simplifications apply. Referenced models are assumed to live in the
//! referencing model's schema, so cross-schema refs resolve to a table that
//! may not exist; fixing that needs the full project graph, which the tests
//! alone do not carry. Tests without a `column_name` are skipped rather than
//! recorded with an empty source column.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::manifest::{Manifest, ManifestNode, TestNode};
use crate::refs::parse_ref;

/// Name of the dbt generic test declaring a foreign key
pub const RELATIONSHIPS_TEST: &str = "relationships";

/// A column of a table, addressed by composite key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnRef {
    /// `schema.name` of the table
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// One column-level foreign key: `source` references `target`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnRelationship {
    pub source: ColumnRef,
    pub target: ColumnRef,
}

/// Everything derived from relationship tests
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Relationships {
    /// Source table -> distinct target tables. Every model table has an entry.
    pub targets: IndexMap<String, BTreeSet<String>>,

    /// Source table -> (target table -> source column)
    ///
    /// When several columns of one table reference the same target table,
    /// only the last one is kept.
    pub labels: IndexMap<String, BTreeMap<String, String>>,

    /// Column-level relationships in extraction order
    pub columns: Vec<ColumnRelationship>,
}

impl Relationships {
    /// Target tables of a source table
    pub fn targets_of(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.targets.get(table)
    }

    /// Column label recorded for a (source, target) table pair
    pub fn label(&self, source: &str, target: &str) -> Option<&str> {
        self.labels
            .get(source)
            .and_then(|labels| labels.get(target))
            .map(String::as_str)
    }

    /// Columns of `table` that reference another table
    pub fn source_columns(&self, table: &str) -> HashSet<&str> {
        self.columns
            .iter()
            .filter(|rel| rel.source.table == table)
            .map(|rel| rel.source.column.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Extract relationships from every model node's `relationships` tests
///
/// Tests missing `to`, `field` or a column name, and `to` values that are
/// not `ref('...')`, are skipped. Non-model nodes are ignored.
pub fn extract_relationships(manifest: &Manifest) -> Relationships {
    let mut relationships = Relationships::default();

    for (node_id, node) in manifest.models() {
        let table = node.composite_key();
        relationships.targets.entry(table.clone()).or_default();
        relationships.labels.entry(table.clone()).or_default();

        for test in &node.tests {
            if test.test_metadata.name != RELATIONSHIPS_TEST {
                continue;
            }

            let Some(rel) = relationship_from_test(node, &table, test) else {
                tracing::debug!(node = node_id, "skipping unresolvable relationships test");
                continue;
            };

            if let Some(targets) = relationships.targets.get_mut(&table) {
                targets.insert(rel.target.table.clone());
            }
            if let Some(labels) = relationships.labels.get_mut(&table) {
                labels.insert(rel.target.table.clone(), rel.source.column.clone());
            }
            relationships.columns.push(rel);
        }
    }

    tracing::debug!(count = relationships.columns.len(), "extracted column relationships");

    relationships
}

fn relationship_from_test(node: &ManifestNode, table: &str, test: &TestNode) -> Option<ColumnRelationship> {
    let to = test.test_metadata.kwarg("to")?;
    let field = test.test_metadata.kwarg("field")?;
    let column = test.column_name.as_deref()?;
    let model_name = parse_ref(to)?;

    Some(ColumnRelationship {
        source: ColumnRef::new(table, column),
        target: ColumnRef::new(format!("{}.{}", node.schema, model_name), field),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manifest(json: serde_json::Value) -> Manifest {
        Manifest::from_str(&json.to_string()).unwrap()
    }

    fn rel_test(column: Option<&str>, kwargs: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "test_metadata": {"name": "relationships", "kwargs": kwargs},
            "column_name": column
        })
    }

    #[test]
    fn stg_customers_references_orders() {
        let manifest = manifest(serde_json::json!({
            "nodes": {
                "model.staging.stg_customers": {
                    "name": "stg_customers",
                    "schema": "staging",
                    "tests": [rel_test(Some("order_id"), serde_json::json!({"to": "ref('orders')", "field": "order_id"}))]
                }
            }
        }));

        let rels = extract_relationships(&manifest);

        assert_eq!(
            rels.columns,
            vec![ColumnRelationship {
                source: ColumnRef::new("staging.stg_customers", "order_id"),
                target: ColumnRef::new("staging.orders", "order_id"),
            }]
        );
        assert!(rels.targets_of("staging.stg_customers").unwrap().contains("staging.orders"));
        assert_eq!(rels.label("staging.stg_customers", "staging.orders"), Some("order_id"));
    }

    #[test]
    fn skips_incomplete_and_malformed_tests() {
        let manifest = manifest(serde_json::json!({
            "nodes": {
                "model.p.a": {
                    "name": "a",
                    "schema": "s",
                    "tests": [
                        rel_test(Some("x"), serde_json::json!({"field": "id"})),
                        rel_test(Some("x"), serde_json::json!({"to": "ref('b')"})),
                        rel_test(Some("x"), serde_json::json!({"to": "source('raw', 'b')", "field": "id"})),
                        rel_test(None, serde_json::json!({"to": "ref('b')", "field": "id"})),
                        {
                            "test_metadata": {"name": "not_null", "kwargs": {"to": "ref('b')", "field": "id"}},
                            "column_name": "x"
                        }
                    ]
                }
            }
        }));

        let rels = extract_relationships(&manifest);

        assert!(rels.is_empty());
        assert!(rels.targets_of("s.a").unwrap().is_empty());
    }

    #[test]
    fn ignores_non_model_nodes() {
        let manifest = manifest(serde_json::json!({
            "nodes": {
                "seed.p.a": {
                    "name": "a",
                    "schema": "s",
                    "tests": [rel_test(Some("x"), serde_json::json!({"to": "ref('b')", "field": "id"}))]
                }
            }
        }));

        let rels = extract_relationships(&manifest);

        assert!(rels.is_empty());
        assert!(rels.targets.is_empty());
    }

    #[test]
    fn last_label_wins_per_target_table() {
        let manifest = manifest(serde_json::json!({
            "nodes": {
                "model.p.link": {
                    "name": "link",
                    "schema": "core",
                    "tests": [
                        rel_test(Some("billing_customer_id"), serde_json::json!({"to": "ref('hub_customer')", "field": "customer_id"})),
                        rel_test(Some("shipping_customer_id"), serde_json::json!({"to": "ref('hub_customer')", "field": "customer_id"}))
                    ]
                }
            }
        }));

        let rels = extract_relationships(&manifest);

        assert_eq!(rels.columns.len(), 2);
        assert_eq!(rels.targets_of("core.link").unwrap().len(), 1);
        assert_eq!(rels.label("core.link", "core.hub_customer"), Some("shipping_customer_id"));
        assert_eq!(
            rels.source_columns("core.link"),
            ["billing_customer_id", "shipping_customer_id"].into_iter().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn extraction_is_deterministic() {
        let manifest = manifest(serde_json::json!({
            "nodes": {
                "model.p.z": {
                    "name": "z",
                    "schema": "s",
                    "tests": [
                        rel_test(Some("a_id"), serde_json::json!({"to": "ref('a')", "field": "id"})),
                        rel_test(Some("b_id"), serde_json::json!({"to": "ref('b')", "field": "id"}))
                    ]
                },
                "model.p.a": {
                    "name": "a",
                    "schema": "s",
                    "tests": [rel_test(Some("b_id"), serde_json::json!({"to": "ref('b')", "field": "id"}))]
                }
            }
        }));

        let first = extract_relationships(&manifest);
        let second = extract_relationships(&manifest);

        assert_eq!(first, second);
        let sources: Vec<String> = first.columns.iter().map(|r| r.source.to_string()).collect();
        assert_eq!(sources, vec!["s.z.a_id", "s.z.b_id", "s.a.b_id"]);
    }
}
