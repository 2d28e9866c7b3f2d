//! Parent/child lookups over the manifest's adjacency maps
//!
//! parent_map and child_map are taken as given. `dependents` is derived
//! from parent_map alone, so detail views stay correct even when the two
//! maps disagree.

use std::collections::{HashMap, HashSet};
use crate::manifest::Manifest;

/// Node identifier (unique_id from manifest)
pub type NodeId = String;

/// Dependency lookups borrowed from a manifest
#[derive(Debug, Clone)]
pub struct DependencyGraph<'a> {
    manifest: &'a Manifest,

    /// Reverse of parent_map: node -> nodes listing it as a parent
    dependents: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> DependencyGraph<'a> {
    /// Build lookups from a manifest
    pub fn from_manifest(manifest: &'a Manifest) -> Self {
        let mut dependents: HashMap<&'a str, Vec<&'a str>> = HashMap::new();

        for (node_id, parent_ids) in manifest.parent_map.iter() {
            for parent_id in parent_ids {
                let entry = dependents.entry(parent_id.as_str()).or_default();
                if !entry.contains(&node_id.as_str()) {
                    entry.push(node_id.as_str());
                }
            }
        }

        Self {
            manifest,
            dependents,
        }
    }

    /// Immediate parents (dependencies) of a node, per parent_map
    pub fn parents(&self, node_id: &str) -> &'a [NodeId] {
        self.manifest.parents(node_id)
    }

    /// Immediate children (dependents) of a node, per child_map
    pub fn children(&self, node_id: &str) -> &'a [NodeId] {
        self.manifest.children(node_id)
    }

    /// Nodes whose parent_map entry lists this node, in parent_map order
    pub fn dependents(&self, node_id: &str) -> Vec<&'a str> {
        self.dependents.get(node_id).cloned().unwrap_or_default()
    }

    /// Connectivity filter for a selection
    ///
    /// The selected node plus its immediate parents and children. `None`
    /// means no selection, so no filter applies.
    pub fn connected(&self, selected: Option<&str>) -> Option<HashSet<NodeId>> {
        let selected = selected?;

        let mut connected = HashSet::new();
        connected.insert(selected.to_string());
        connected.extend(self.parents(selected).iter().cloned());
        connected.extend(self.children(selected).iter().cloned());

        Some(connected)
    }
}

/// Connectivity filter for a selected node ID (see [`DependencyGraph::connected`])
pub fn connected_nodes(manifest: &Manifest, selected: Option<&str>) -> Option<HashSet<NodeId>> {
    DependencyGraph::from_manifest(manifest).connected(selected)
}
