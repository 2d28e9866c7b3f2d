//! Configuration schema (erdview.toml)

use serde::{Deserialize, Serialize};

/// Fill colors used for table nodes
///
/// Colors are picked by layer; the `core` layer is further split by the
/// Data Vault type stored in `meta.dv_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub raw: String,
    pub staging: String,
    pub mart: String,
    pub hub: String,
    pub link: String,
    pub satellite: String,

    /// Used for unknown layers and for `core` nodes without a known dv_type
    pub default: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            raw: "#E0E0E0".to_string(),
            staging: "#FFFFFF".to_string(),
            mart: "#FFA726".to_string(),
            hub: "#64B5F6".to_string(),
            link: "#81C784".to_string(),
            satellite: "#FFD54F".to_string(),
            default: "#E3F2FD".to_string(),
        }
    }
}

impl Palette {
    /// Pick the fill color for a node's layer and Data Vault type
    pub fn color_for(&self, layer: &str, dv_type: &str) -> &str {
        match (layer, dv_type) {
            ("raw", _) => &self.raw,
            ("staging", _) => &self.staging,
            ("mart", _) => &self.mart,
            ("core", "hub") => &self.hub,
            ("core", "link") => &self.link,
            ("core", "satellite") => &self.satellite,
            _ => &self.default,
        }
    }
}

/// Direction of the hierarchical layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutDirection {
    /// Left to right
    #[default]
    LR,
    /// Right to left
    RL,
    /// Up to down
    UD,
    /// Down to up
    DU,
}

impl LayoutDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LR => "LR",
            Self::RL => "RL",
            Self::UD => "UD",
            Self::DU => "DU",
        }
    }
}

/// Style configuration handed to the interactive graph widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub directed: bool,
    pub hierarchical_layout: bool,
    pub layout_direction: LayoutDirection,
    pub node_highlight_on_select: bool,
    pub highlight_color: String,
    pub click_events: bool,

    /// A click on the empty canvas clears the current selection
    pub background_click_clears_selection: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            directed: true,
            hierarchical_layout: true,
            layout_direction: LayoutDirection::LR,
            node_highlight_on_select: true,
            highlight_color: "#F7A7A6".to_string(),
            click_events: true,
            background_click_clears_selection: true,
        }
    }
}

/// Output format of a static diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    /// Graphviz source, no renderer needed
    Dot,
    #[default]
    Pdf,
    Svg,
    Png,
}

impl DiagramFormat {
    /// Graphviz `-T` argument and file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::Pdf => "pdf",
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}

impl std::fmt::Display for DiagramFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DiagramFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dot" | "gv" => Ok(Self::Dot),
            "pdf" => Ok(Self::Pdf),
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            other => Err(ConfigError::ParseError(format!("unknown diagram format '{}'", other))),
        }
    }
}

/// Static export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Graphviz executable used to render non-dot formats
    pub dot_binary: String,

    pub default_format: DiagramFormat,

    /// Graph comment written into the dot source
    pub title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dot_binary: "dot".to_string(),
            default_format: DiagramFormat::Pdf,
            title: "DBT ERD".to_string(),
        }
    }
}

/// A selectable model layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Value matched against `meta.layer`
    pub name: String,

    /// Human readable title
    pub title: String,
}

impl LayerConfig {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
        }
    }
}

fn default_layers() -> Vec<LayerConfig> {
    vec![
        LayerConfig::new("raw", "Raw Layer"),
        LayerConfig::new("staging", "Staging Layer"),
        LayerConfig::new("core", "Data Vault Core"),
        LayerConfig::new("mart", "Mart Layer"),
    ]
}

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Emit one label node per layer when several layers are shown
    #[serde(default = "default_true")]
    pub group_layers: bool,

    /// Known layers, in display order
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerConfig>,

    #[serde(default)]
    pub palette: Palette,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_layers: true,
            layers: default_layers(),
            palette: Palette::default(),
            view: ViewConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Names of all configured layers
    pub fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name.clone()).collect()
    }

    /// Title of a layer, falling back to the raw name
    pub fn layer_title<'a>(&'a self, name: &'a str) -> &'a str {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.title.as_str())
            .unwrap_or(name)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
