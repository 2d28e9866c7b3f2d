//! erdview core
//!
//! Renderer-agnostic display types and configuration shared by the
//! manifest, engine and CLI crates.
//! Serialized field names of the display graph are part of the output format.

pub mod config;
pub mod graph;

pub use config::{Config, ConfigError, DiagramFormat, ExportConfig, LayerConfig, LayoutDirection, Palette, ViewConfig};
pub use graph::{DisplayEdge, DisplayGraph, DisplayNode, GraphDocument, GraphVersion, NodeKind};
