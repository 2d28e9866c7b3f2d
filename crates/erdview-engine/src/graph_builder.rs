//! Display graph construction
//!
//! Converts a manifest into renderer-agnostic nodes and edges. Three
//! filters compose: the selected-layer set, an optional node-ID allow-set
//! (connectivity filter) and the `model.` prefix. An edge survives only if
//! both of its endpoints pass all three.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use erdview_core::{DisplayEdge, DisplayGraph, DisplayNode, Palette};
use erdview_dbt::{connected_nodes, is_model_id, Manifest, ManifestNode};

/// Filters applied when building a display graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFilter {
    /// Selected layers, in selection order. Empty selects every layer.
    layers: Vec<String>,

    /// Node IDs allowed through; `None` allows all
    allow: Option<HashSet<String>>,

    /// Emit layer label nodes when more than one layer is selected
    group_layers: bool,
}

impl Default for GraphFilter {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            allow: None,
            group_layers: true,
        }
    }
}

impl GraphFilter {
    /// A filter letting every model through
    pub fn all() -> Self {
        Self::default()
    }

    /// Select layers; duplicates are dropped, order is kept
    pub fn with_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers.clear();
        for layer in layers {
            let layer = layer.into();
            if !self.layers.contains(&layer) {
                self.layers.push(layer);
            }
        }
        self
    }

    /// Restrict to an explicit node-ID set
    pub fn with_allow(mut self, allow: Option<HashSet<String>>) -> Self {
        self.allow = allow;
        self
    }

    pub fn with_group_layers(mut self, group_layers: bool) -> Self {
        self.group_layers = group_layers;
        self
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn allow(&self) -> Option<&HashSet<String>> {
        self.allow.as_ref()
    }

    /// Several layers are shown at once, so nodes carry their layer as group
    fn multi_layer(&self) -> bool {
        self.layers.len() > 1
    }

    fn layer_selected(&self, layer: &str) -> bool {
        self.layers.is_empty() || self.layers.iter().any(|l| l == layer)
    }

    /// Whether a manifest node becomes a display node
    pub fn accepts(&self, node_id: &str, node: &ManifestNode) -> bool {
        is_model_id(node_id)
            && self.layer_selected(node.layer())
            && self.allow.as_ref().map_or(true, |allow| allow.contains(node_id))
    }
}

/// Build the display graph for a manifest
///
/// Pure function of its inputs. Models sharing a `schema.name` key collapse
/// into one node: the later model in document order wins and takes the
/// earlier one's position. Only the winning model's parent_map entries
/// produce edges. Parent IDs missing from `nodes` are skipped.
pub fn build_graph(manifest: &Manifest, filter: &GraphFilter, palette: &Palette) -> DisplayGraph {
    let mut nodes = Vec::new();

    if filter.group_layers && filter.multi_layer() {
        nodes.extend(filter.layers.iter().map(|layer| DisplayNode::group_label(layer)));
    }

    let mut tables: IndexMap<String, DisplayNode> = IndexMap::new();
    for (node_id, node) in manifest.models() {
        if !filter.accepts(node_id, node) {
            continue;
        }

        let key = node.composite_key();
        let color = palette.color_for(node.layer(), node.dv_type());
        let mut display = DisplayNode::table(key.clone(), node_id, color, node.description_or_empty());
        if filter.multi_layer() {
            display = display.with_group(node.layer());
        }

        if let Some(previous) = tables.insert(key, display) {
            tracing::debug!(
                key = %previous.id,
                replaced = previous.node_id.as_deref().unwrap_or_default(),
                by = node_id,
                "composite key collision, keeping later model"
            );
        }
    }
    nodes.extend(tables.into_values());

    let edges = table_edges(manifest, &nodes);

    tracing::debug!(nodes = nodes.len(), edges = edges.len(), "built display graph");

    DisplayGraph { nodes, edges }
}

/// Child -> parent edges between displayed tables
///
/// Endpoints are looked up by manifest ID among the displayed nodes, so a
/// model that lost a composite-key collision contributes no edges.
fn table_edges(manifest: &Manifest, nodes: &[DisplayNode]) -> Vec<DisplayEdge> {
    let shown: HashMap<&str, &str> = nodes
        .iter()
        .filter_map(|node| Some((node.node_id.as_deref()?, node.id.as_str())))
        .collect();

    let mut edges = Vec::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for (child_id, parent_ids) in manifest.parent_map.iter() {
        let Some(&source) = shown.get(child_id.as_str()) else {
            continue;
        };

        for parent_id in parent_ids {
            if manifest.get_node(parent_id).is_none() {
                tracing::debug!(child = %child_id, parent = %parent_id, "skipping dangling parent");
                continue;
            }
            let Some(&target) = shown.get(parent_id.as_str()) else {
                continue;
            };

            if seen.insert((source, target)) {
                edges.push(DisplayEdge::references(source, target));
            }
        }
    }

    edges
}

/// Build the graph for a selection state
///
/// `selected` is a composite `schema.name` key. When it resolves to a
/// model, only that model and its immediate parents and children are
/// shown; otherwise no connectivity filter applies. Any allow-set already
/// on `filter` is replaced.
pub fn build_view(
    manifest: &Manifest,
    selected: Option<&str>,
    filter: &GraphFilter,
    palette: &Palette,
) -> DisplayGraph {
    let selected_id = selected.and_then(|key| manifest.resolve_model_id(key));
    let filter = filter.clone().with_allow(connected_nodes(manifest, selected_id));

    build_graph(manifest, &filter, palette)
}

#[cfg(test)]
mod tests {
    use super::*;
    use erdview_core::NodeKind;
    use pretty_assertions::assert_eq;

    fn manifest(json: serde_json::Value) -> Manifest {
        Manifest::from_str(&json.to_string()).unwrap()
    }

    fn layered() -> Manifest {
        manifest(serde_json::json!({
            "nodes": {
                "model.p.raw_a": {"name": "raw_a", "schema": "raw", "meta": {"layer": "raw"}},
                "model.p.hub_a": {"name": "hub_a", "schema": "core", "meta": {"layer": "core", "dv_type": "hub"}, "description": "A hub"},
                "model.p.sat_a": {"name": "sat_a", "schema": "core", "meta": {"layer": "core", "dv_type": "satellite"}},
                "model.p.dim_a": {"name": "dim_a", "schema": "mart", "meta": {"layer": "mart"}},
                "seed.p.codes": {"name": "codes", "schema": "raw", "meta": {"layer": "raw"}}
            },
            "parent_map": {
                "model.p.hub_a": ["model.p.raw_a", "seed.p.codes"],
                "model.p.sat_a": ["model.p.hub_a"],
                "model.p.dim_a": ["model.p.hub_a", "model.p.sat_a", "model.p.gone"]
            },
            "child_map": {
                "model.p.raw_a": ["model.p.hub_a"],
                "model.p.hub_a": ["model.p.sat_a", "model.p.dim_a"],
                "model.p.sat_a": ["model.p.dim_a"]
            }
        }))
    }

    fn ids(graph: &DisplayGraph) -> Vec<&str> {
        graph.tables().map(|n| n.id.as_str()).collect()
    }

    fn edge_pairs(graph: &DisplayGraph) -> Vec<(&str, &str)> {
        graph.edges.iter().map(|e| (e.source.as_str(), e.target.as_str())).collect()
    }

    #[test]
    fn unfiltered_graph() {
        let graph = build_graph(&layered(), &GraphFilter::all(), &Palette::default());

        assert_eq!(ids(&graph), vec!["raw.raw_a", "core.hub_a", "core.sat_a", "mart.dim_a"]);
        assert_eq!(graph.group_labels().count(), 0);
        assert_eq!(
            edge_pairs(&graph),
            vec![
                ("core.hub_a", "raw.raw_a"),
                ("core.sat_a", "core.hub_a"),
                ("mart.dim_a", "core.hub_a"),
                ("mart.dim_a", "core.sat_a"),
            ]
        );
        assert!(graph.edges.iter().all(|e| e.arrow && e.label == "references"));
    }

    #[test]
    fn node_attributes() {
        let graph = build_graph(&layered(), &GraphFilter::all(), &Palette::default());

        let hub = graph.node("core.hub_a").unwrap();
        assert_eq!(hub.color, "#64B5F6");
        assert_eq!(hub.title, "A hub");
        assert_eq!(hub.node_id.as_deref(), Some("model.p.hub_a"));
        assert_eq!(hub.group, None);

        let sat = graph.node("core.sat_a").unwrap();
        assert_eq!(sat.color, "#FFD54F");
        assert_eq!(sat.title, "");
    }

    #[test]
    fn single_layer_filter() {
        let filter = GraphFilter::all().with_layers(["core"]);
        let graph = build_graph(&layered(), &filter, &Palette::default());

        assert_eq!(ids(&graph), vec!["core.hub_a", "core.sat_a"]);
        assert_eq!(edge_pairs(&graph), vec![("core.sat_a", "core.hub_a")]);
        assert_eq!(graph.group_labels().count(), 0);
    }

    #[test]
    fn two_layers_emit_group_labels() {
        let filter = GraphFilter::all().with_layers(["core", "mart"]);
        let manifest = layered();
        let graph = build_graph(&manifest, &filter, &Palette::default());

        let labels: Vec<&str> = graph.group_labels().map(|n| n.id.as_str()).collect();
        assert_eq!(labels, vec!["group_core", "group_mart"]);

        for node in graph.tables() {
            let source = manifest.get_node(node.node_id.as_deref().unwrap()).unwrap();
            assert!(["core", "mart"].contains(&source.layer()));
            assert_eq!(node.group.as_deref(), Some(source.layer()));
        }

        // group labels never take part in edges
        for edge in &graph.edges {
            assert!(!edge.source.starts_with("group_"));
            assert!(!edge.target.starts_with("group_"));
        }
    }

    #[test]
    fn grouping_can_be_disabled() {
        let filter = GraphFilter::all()
            .with_layers(["core", "mart"])
            .with_group_layers(false);
        let graph = build_graph(&layered(), &filter, &Palette::default());

        assert_eq!(graph.group_labels().count(), 0);
        assert!(graph.tables().all(|n| n.group.is_some()));
    }

    #[test]
    fn duplicate_layers_collapse() {
        let filter = GraphFilter::all().with_layers(["core", "core"]);
        assert_eq!(filter.layers(), ["core"]);

        let graph = build_graph(&layered(), &filter, &Palette::default());
        assert_eq!(graph.group_labels().count(), 0);
    }

    #[test]
    fn unknown_layer_matches_nothing() {
        let filter = GraphFilter::all().with_layers(["gold"]);
        let graph = build_graph(&layered(), &filter, &Palette::default());
        assert!(graph.is_empty());
    }

    #[test]
    fn layer_filter_is_monotonic() {
        let manifest = layered();
        let palette = Palette::default();
        let small = build_graph(&manifest, &GraphFilter::all().with_layers(["core"]), &palette);
        let large = build_graph(&manifest, &GraphFilter::all().with_layers(["core", "raw"]), &palette);

        let large_ids: HashSet<&str> = large.tables().map(|n| n.id.as_str()).collect();
        for node in small.tables() {
            assert!(large_ids.contains(node.id.as_str()));
        }
        for edge in &small.edges {
            assert!(large.edges.contains(edge));
        }
    }

    #[test]
    fn connectivity_filter() {
        let allow: HashSet<String> = ["model.p.sat_a", "model.p.hub_a", "model.p.dim_a"]
            .into_iter()
            .map(String::from)
            .collect();
        let filter = GraphFilter::all().with_allow(Some(allow));
        let graph = build_graph(&layered(), &filter, &Palette::default());

        assert_eq!(ids(&graph), vec!["core.hub_a", "core.sat_a", "mart.dim_a"]);
        assert_eq!(graph.edges.len(), 3);
    }

    #[test]
    fn no_allow_set_equals_all_ids() {
        let manifest = layered();
        let palette = Palette::default();
        let all_ids: HashSet<String> = manifest.nodes.keys().map(String::from).collect();

        let unfiltered = build_graph(&manifest, &GraphFilter::all(), &palette);
        let allow_all = build_graph(&manifest, &GraphFilter::all().with_allow(Some(all_ids)), &palette);

        assert_eq!(unfiltered, allow_all);
    }

    #[test]
    fn view_for_selection() {
        let manifest = layered();
        let graph = build_view(&manifest, Some("core.sat_a"), &GraphFilter::all(), &Palette::default());

        assert_eq!(ids(&graph), vec!["core.hub_a", "core.sat_a", "mart.dim_a"]);

        let unselected = build_view(&manifest, None, &GraphFilter::all(), &Palette::default());
        assert_eq!(unselected, build_graph(&manifest, &GraphFilter::all(), &Palette::default()));

        let unknown = build_view(&manifest, Some("nope.nope"), &GraphFilter::all(), &Palette::default());
        assert_eq!(unknown, unselected);
    }

    #[test]
    fn dangling_and_non_model_parents_are_skipped() {
        let graph = build_graph(&layered(), &GraphFilter::all(), &Palette::default());

        assert!(graph.edges.iter().all(|e| e.target != "raw.codes"));
        assert!(graph.edges.iter().all(|e| !e.target.contains("gone")));
    }

    #[test]
    fn composite_key_collision_last_wins() {
        let manifest = manifest(serde_json::json!({
            "nodes": {
                "model.p.first": {"name": "orders", "schema": "s", "description": "first"},
                "model.p.other": {"name": "other", "schema": "s"},
                "model.q.second": {"name": "orders", "schema": "s", "description": "second"}
            },
            "parent_map": {
                "model.p.other": ["model.p.first", "model.q.second"]
            }
        }));

        let graph = build_graph(&manifest, &GraphFilter::all(), &Palette::default());

        assert_eq!(ids(&graph), vec!["s.orders", "s.other"]);
        let orders = graph.node("s.orders").unwrap();
        assert_eq!(orders.title, "second");
        assert_eq!(orders.node_id.as_deref(), Some("model.q.second"));
        assert_eq!(orders.kind, NodeKind::Table);
        assert_eq!(edge_pairs(&graph), vec![("s.other", "s.orders")]);
    }

    #[test]
    fn collision_loser_contributes_no_edges() {
        let manifest = manifest(serde_json::json!({
            "nodes": {
                "model.p.old": {"name": "orders", "schema": "s"},
                "model.p.raw": {"name": "raw", "schema": "s"},
                "model.p.other": {"name": "other", "schema": "s"},
                "model.q.new": {"name": "orders", "schema": "s"}
            },
            "parent_map": {
                "model.p.old": ["model.p.raw"],
                "model.q.new": ["model.p.old", "model.p.other"]
            }
        }));

        let graph = build_graph(&manifest, &GraphFilter::all(), &Palette::default());

        assert_eq!(graph.node("s.orders").unwrap().node_id.as_deref(), Some("model.q.new"));
        assert_eq!(edge_pairs(&graph), vec![("s.orders", "s.other")]);
        assert!(graph.edges.iter().all(|e| e.source != e.target));
    }

    #[test]
    fn empty_manifest_builds_empty_graph() {
        let graph = build_graph(&Manifest::default(), &GraphFilter::all(), &Palette::default());
        assert!(graph.is_empty());
    }
}
