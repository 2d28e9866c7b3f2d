//! Standalone interactive page for a display graph
//!
//! Embeds the graph and view configuration as JSON and draws them with
//! vis-network. Clicking a table highlights it and shows its key; clicking
//! the canvas clears the selection when the view allows it.

use erdview_core::{DisplayGraph, ViewConfig};
use serde_json::json;

use crate::export::escape_html;

const VIS_NETWORK_URL: &str = "https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js";

/// Serialize for embedding inside a `<script>` element
fn script_json(value: &serde_json::Value) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// vis-network data sets for the graph
fn vis_data(graph: &DisplayGraph) -> serde_json::Value {
    let nodes: Vec<_> = graph
        .nodes
        .iter()
        .map(|node| {
            let mut entry = json!({
                "id": node.id,
                "label": node.label,
                "color": node.color,
                "shape": node.shape,
                "title": node.title,
            });
            if let Some(group) = &node.group {
                entry["group"] = json!(group);
            }
            if !node.is_table() {
                entry["physics"] = json!(false);
                entry["font"] = json!({"size": 20, "bold": true});
                entry["borderWidth"] = json!(0);
            }
            entry
        })
        .collect();

    let edges: Vec<_> = graph
        .edges
        .iter()
        .map(|edge| {
            let arrows = if edge.arrow { "to" } else { "" };
            json!({
                "from": edge.source,
                "to": edge.target,
                "label": edge.label,
                "arrows": arrows,
            })
        })
        .collect();

    json!({ "nodes": nodes, "edges": edges })
}

/// vis-network options derived from the view configuration
fn vis_options(view: &ViewConfig) -> serde_json::Value {
    let layout = if view.hierarchical_layout {
        json!({
            "hierarchical": {
                "enabled": true,
                "direction": view.layout_direction.as_str(),
                "sortMethod": "directed",
                "levelSeparation": 250,
                "nodeSpacing": 120
            }
        })
    } else {
        json!({})
    };

    json!({
        "layout": layout,
        "physics": { "enabled": !view.hierarchical_layout },
        "interaction": {
            "hover": true,
            "selectable": view.click_events,
            "selectConnectedEdges": view.node_highlight_on_select
        },
        "edges": {
            "arrows": { "to": { "enabled": view.directed } },
            "font": { "size": 10, "align": "middle" },
            "smooth": { "type": "cubicBezier" }
        },
        "nodes": {
            "font": { "face": "monospace" },
            "margin": 10,
            "color": { "highlight": { "background": view.highlight_color, "border": view.highlight_color } }
        }
    })
}

/// Render a self-contained HTML page for the graph
pub fn render_html(graph: &DisplayGraph, view: &ViewConfig, title: &str) -> Result<String, serde_json::Error> {
    let data = script_json(&vis_data(graph))?;
    let options = script_json(&vis_options(view))?;
    let behaviour = script_json(&json!({
        "clickEvents": view.click_events,
        "backgroundClears": view.background_click_clears_selection,
    }))?;
    let title = escape_html(title);

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{VIS_NETWORK_URL}"></script>
<style>
  body {{ margin: 0; font-family: sans-serif; }}
  header {{ padding: 8px 16px; border-bottom: 1px solid #ddd; }}
  #selected {{ color: #555; margin-left: 16px; }}
  #erd {{ width: 100vw; height: calc(100vh - 48px); }}
</style>
</head>
<body>
<header><strong>{title}</strong><span id="selected"></span></header>
<div id="erd"></div>
<script>
  const data = {data};
  const options = {options};
  const behaviour = {behaviour};
  const labels = new Set(data.nodes.filter(n => n.physics === false).map(n => n.id));
  const network = new vis.Network(
    document.getElementById("erd"),
    {{ nodes: new vis.DataSet(data.nodes), edges: new vis.DataSet(data.edges) }},
    options
  );
  const status = document.getElementById("selected");
  network.on("click", params => {{
    if (!behaviour.clickEvents) return;
    const node = params.nodes.find(id => !labels.has(id));
    if (node !== undefined) {{
      status.textContent = "selected: " + node;
    }} else if (params.nodes.length === 0 && behaviour.backgroundClears) {{
      network.unselectAll();
      status.textContent = "";
    }}
  }});
</script>
</body>
</html>
"#
    ))
}
