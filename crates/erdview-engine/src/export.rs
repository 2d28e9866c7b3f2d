//! Static ERD export through Graphviz
//!
//! Every model becomes an HTML-like table node (header, description, one
//! row per column with a port named after it); every column relationship
//! becomes a crow's-foot edge between the two column ports. Non-dot formats
//! are rendered by the `dot` executable inside a temporary directory that is
//! removed before returning, whatever the outcome.

use std::path::Path;
use std::process::Command;

use erdview_core::{DiagramFormat, ExportConfig};
use erdview_dbt::{extract_relationships, Manifest, ManifestNode, Relationships};

use crate::details::KeyRole;

const HEADER_COLOR: &str = "#4A90E2";
const COLUMN_HEADER_COLOR: &str = "#E3F2FD";
const NODE_FILL: &str = "#E8F4F9";
const EDGE_COLOR: &str = "#4A90E2";

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error during export: {0}")]
    Io(#[from] std::io::Error),

    #[error("Graphviz renderer '{binary}' could not be started: {source}")]
    RendererUnavailable {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Graphviz renderer failed ({status}): {stderr}")]
    RendererFailed { status: String, stderr: String },
}

/// Escape text for Graphviz HTML-like labels and HTML documents
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Quote a dot identifier
fn quote_id(id: &str) -> String {
    format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\""))
}

fn table_label(node: &ManifestNode, relationships: &Relationships) -> String {
    let key = node.composite_key();
    let fk_columns = relationships.source_columns(&key);

    let mut html = String::new();
    html.push_str("<<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\" CELLPADDING=\"4\">");
    html.push_str(&format!(
        "<TR><TD PORT=\"header\" BGCOLOR=\"{}\" COLSPAN=\"3\"><FONT COLOR=\"white\"><B>{}</B></FONT></TD></TR>",
        HEADER_COLOR,
        escape_html(&key)
    ));
    if let Some(description) = node.description.as_deref().filter(|d| !d.is_empty()) {
        html.push_str(&format!(
            "<TR><TD BGCOLOR=\"{}\" COLSPAN=\"3\"><FONT COLOR=\"white\" POINT-SIZE=\"10\">{}</FONT></TD></TR>",
            HEADER_COLOR,
            escape_html(description)
        ));
    }
    html.push_str(&format!(
        "<TR><TD BGCOLOR=\"{0}\"><B>Column</B></TD><TD BGCOLOR=\"{0}\"><B>Type</B></TD><TD BGCOLOR=\"{0}\"><B>Key</B></TD></TR>",
        COLUMN_HEADER_COLOR
    ));

    for (name, column) in node.columns.iter() {
        let role = match KeyRole::of(column) {
            KeyRole::Plain if fk_columns.contains(name.as_str()) => KeyRole::Foreign,
            role => role,
        };
        html.push_str(&format!(
            "<TR><TD PORT=\"{0}\" ALIGN=\"LEFT\">{0}</TD><TD ALIGN=\"LEFT\">{1}</TD><TD ALIGN=\"CENTER\">{2}</TD></TR>",
            escape_html(name),
            escape_html(column.data_type.as_deref().unwrap_or("unknown")),
            role
        ));
    }

    html.push_str("</TABLE>>");
    html
}

/// Render the static ERD as Graphviz dot source
///
/// One table node per model (in document order) and one edge per column
/// relationship, laid out left to right.
pub fn render_dot(manifest: &Manifest, relationships: &Relationships, config: &ExportConfig) -> String {
    let mut dot = String::new();

    dot.push_str(&format!("// {}\n", config.title.replace('\n', " ")));
    dot.push_str("digraph {\n");
    dot.push_str("\tgraph [nodesep=1.0 rankdir=LR ranksep=2.0 splines=ortho]\n");
    dot.push_str(&format!("\tnode [fillcolor=\"{}\" shape=plain style=filled]\n", NODE_FILL));

    for (_, node) in manifest.models() {
        dot.push_str(&format!(
            "\t{} [label={}]\n",
            quote_id(&node.composite_key()),
            table_label(node, relationships)
        ));
    }

    for rel in &relationships.columns {
        dot.push_str(&format!(
            "\t{}:{} -> {}:{} [arrowhead=crow arrowtail=none color=\"{}\" dir=both penwidth=1.5]\n",
            quote_id(&rel.source.table),
            quote_id(&rel.source.column),
            quote_id(&rel.target.table),
            quote_id(&rel.target.column),
            EDGE_COLOR
        ));
    }

    dot.push_str("}\n");
    dot
}

/// Render dot source into the requested format
///
/// `DiagramFormat::Dot` returns the source unchanged. Other formats run
/// the configured Graphviz binary in a temporary directory; nothing is
/// left on disk afterwards and no partial output is returned on failure.
pub fn render_diagram(dot: &str, format: DiagramFormat, config: &ExportConfig) -> Result<Vec<u8>, ExportError> {
    render_diagram_in(dot, format, config, &std::env::temp_dir())
}

/// [`render_diagram`] with the scratch directory created under `parent`
pub(crate) fn render_diagram_in(
    dot: &str,
    format: DiagramFormat,
    config: &ExportConfig,
    parent: &Path,
) -> Result<Vec<u8>, ExportError> {
    if format == DiagramFormat::Dot {
        return Ok(dot.as_bytes().to_vec());
    }

    let workdir = tempfile::Builder::new().prefix("erdview-").tempdir_in(parent)?;
    let source_path = workdir.path().join("erd.dot");
    let output_path = workdir.path().join(format!("erd.{}", format.as_str()));
    std::fs::write(&source_path, dot)?;

    run_renderer(&config.dot_binary, format, &source_path, &output_path)?;

    let bytes = std::fs::read(&output_path)?;
    tracing::debug!(format = %format, bytes = bytes.len(), "rendered diagram");

    workdir.close()?;
    Ok(bytes)
}

fn run_renderer(binary: &str, format: DiagramFormat, source: &Path, output: &Path) -> Result<(), ExportError> {
    let result = Command::new(binary)
        .arg(format!("-T{}", format.as_str()))
        .arg(source)
        .arg("-o")
        .arg(output)
        .output()
        .map_err(|source| ExportError::RendererUnavailable {
            binary: binary.to_string(),
            source,
        })?;

    if !result.status.success() {
        return Err(ExportError::RendererFailed {
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Extract relationships and render the full static diagram
pub fn export_diagram(manifest: &Manifest, format: DiagramFormat, config: &ExportConfig) -> Result<Vec<u8>, ExportError> {
    let relationships = extract_relationships(manifest);
    let dot = render_dot(manifest, &relationships, config);
    render_diagram(&dot, format, config)
}
