//! erdview engine - turning a manifest into diagrams
//!
//! This crate implements:
//! - Graph building with layer, connectivity and model filters
//! - Selection handling and the model detail view
//! - Static export (Graphviz) and interactive export (vis-network HTML)

pub mod graph_builder;
pub mod selection;
pub mod details;
pub mod export;
pub mod html;

pub use graph_builder::{build_graph, build_view, GraphFilter};
pub use selection::{Selection, SelectionEvent};
pub use details::{model_details, ColumnRow, KeyRole, ModelDetails};
pub use export::{export_diagram, render_diagram, render_dot, ExportError};
pub use html::render_html;
