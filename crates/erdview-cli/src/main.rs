use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use erdview_core::{Config, DiagramFormat, DisplayGraph, GraphDocument};
use erdview_dbt::{extract_relationships, Manifest};
use erdview_engine::{
    build_view, export_diagram, model_details, render_html, GraphFilter, KeyRole, ModelDetails,
};

/// erdview - Entity relationship diagrams for dbt projects
#[derive(Parser)]
#[command(name = "erdview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: erdview.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ManifestArgs {
    /// Path to dbt manifest.json
    #[arg(short = 'f', long, default_value = "target/manifest.json")]
    manifest: PathBuf,
}

#[derive(Args)]
struct ViewArgs {
    /// Layer to show (repeatable; default: first configured layer)
    #[arg(short, long = "layer")]
    layers: Vec<String>,

    /// Show every layer
    #[arg(long, conflicts_with = "layers")]
    all_layers: bool,

    /// Composite key (schema.name) of the selected table
    #[arg(short, long)]
    select: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the display graph as JSON
    Graph {
        #[command(flatten)]
        manifest: ManifestArgs,

        #[command(flatten)]
        view: ViewArgs,

        /// Write the graph document to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show details of a table
    Show {
        /// Composite key (schema.name)
        key: String,

        #[command(flatten)]
        manifest: ManifestArgs,

        /// Print the details as JSON
        #[arg(long)]
        json: bool,
    },

    /// List column relationships found in relationships tests
    Relationships {
        #[command(flatten)]
        manifest: ManifestArgs,
    },

    /// List layers used by models
    Layers {
        #[command(flatten)]
        manifest: ManifestArgs,
    },

    /// Export a static ERD through Graphviz
    Export {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Output format: dot, pdf, svg or png (default: from output extension)
        #[arg(long)]
        format: Option<DiagramFormat>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write an interactive HTML view
    Html {
        #[command(flatten)]
        manifest: ManifestArgs,

        #[command(flatten)]
        view: ViewArgs,

        /// Output file
        #[arg(short, long, default_value = "erd.html")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let verbose = cli.verbose;
    if let Err(err) = run(cli) {
        if verbose {
            eprintln!("{} {:?}", "Error:".red().bold(), err);
        } else {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Graph { manifest, view, output } => {
            graph_command(&config, &manifest.manifest, &view, output.as_deref(), cli.verbose)
        }
        Commands::Show { key, manifest, json } => {
            show_command(&key, &manifest.manifest, json, cli.verbose)
        }
        Commands::Relationships { manifest } => {
            relationships_command(&manifest.manifest, cli.verbose)
        }
        Commands::Layers { manifest } => {
            layers_command(&config, &manifest.manifest, cli.verbose)
        }
        Commands::Export { manifest, format, output } => {
            export_command(&config, &manifest.manifest, format, &output, cli.verbose)
        }
        Commands::Html { manifest, view, output } => {
            html_command(&config, &manifest.manifest, &view, &output, cli.verbose)
        }
    }
}

/// Load config from `--config`, else `erdview.toml` if present, else defaults
fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else if Path::new("erdview.toml").exists() {
        Config::from_file(Path::new("erdview.toml")).context("Failed to load erdview.toml")?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    Ok(config)
}

fn load_manifest(path: &Path, verbose: bool) -> Result<Manifest> {
    if verbose {
        eprintln!("{} {}", "Loading manifest from:".cyan(), path.display());
    }

    let manifest = Manifest::from_file(path).context("Error processing manifest file")?;
    tracing::debug!(path = %path.display(), nodes = manifest.nodes.len(), "loaded manifest");

    if verbose {
        eprintln!(
            "{} {} nodes ({} models)",
            "Loaded".cyan(),
            manifest.nodes.len(),
            manifest.models().count()
        );
    }

    Ok(manifest)
}

/// Layer filter for the view flags
///
/// Explicit layers win; `--all-layers` disables layer filtering; otherwise
/// the first configured layer is shown.
fn layer_filter(config: &Config, view: &ViewArgs) -> GraphFilter {
    let layers = if view.all_layers {
        Vec::new()
    } else if !view.layers.is_empty() {
        view.layers.clone()
    } else {
        config.layers.first().map(|l| l.name.clone()).into_iter().collect()
    };

    GraphFilter::all()
        .with_layers(layers)
        .with_group_layers(config.group_layers)
}

/// Build the display graph for the view flags, returning the resolved selection
fn view_graph(config: &Config, manifest: &Manifest, view: &ViewArgs) -> (DisplayGraph, Option<String>) {
    let selected = view.select.as_deref().filter(|key| {
        let known = manifest.resolve_model_id(key).is_some();
        if !known {
            tracing::warn!(key = %key, "no model with this key, showing all");
        }
        known
    });

    let filter = layer_filter(config, view);
    let graph = build_view(manifest, selected, &filter, &config.palette);

    (graph, selected.map(String::from))
}

/// Graph command - print the display graph document
fn graph_command(
    config: &Config,
    manifest_path: &Path,
    view: &ViewArgs,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let manifest = load_manifest(manifest_path, verbose)?;
    let (graph, selected) = view_graph(config, &manifest, view);

    if verbose {
        eprintln!(
            "{} {} tables, {} edges",
            "Built graph:".cyan(),
            graph.tables().count(),
            graph.edges.len()
        );
    }

    let document = GraphDocument::new(graph, config.view.clone()).with_selected(selected);

    match output {
        Some(path) => {
            document
                .save_to_file(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} {}", "Graph saved to:".green(), path.display());
        }
        None => println!("{}", document.to_json()?),
    }

    Ok(())
}

/// Show command - print the detail view of one table
fn show_command(key: &str, manifest_path: &Path, json: bool, verbose: bool) -> Result<()> {
    let manifest = load_manifest(manifest_path, verbose)?;

    let details = model_details(&manifest, key).ok_or_else(|| {
        anyhow::anyhow!("Model '{}' not found in manifest. Use the schema.name key (e.g. 'staging.{}')", key, key)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        print_details(&details);
    }

    Ok(())
}

fn print_details(details: &ModelDetails) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", details.key.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Node:".bold(), details.node_id);
    println!(
        "{} {}",
        "Description:".bold(),
        details.description.as_deref().unwrap_or("No description available")
    );
    println!("{} {}", "Database:".bold(), details.database.as_deref().unwrap_or("-"));
    println!("{} {}", "Schema:".bold(), details.schema);

    if !details.meta.is_empty() {
        println!("{}", "Metadata:".bold());
        for (key, value) in &details.meta {
            println!("  {}: {}", key, value);
        }
    }

    println!();
    println!("{}", "Columns:".bold());
    if details.columns.is_empty() {
        println!("  {}", "(none documented)".dimmed());
    }
    for column in &details.columns {
        let key = match column.key {
            KeyRole::Primary => column.key.as_str().yellow().bold(),
            KeyRole::Foreign => column.key.as_str().cyan().bold(),
            KeyRole::Plain => column.key.as_str().normal(),
        };
        print!("  {:<3} {:<24} {:<12}", key, column.name, column.data_type);
        if let Some(target) = &column.references {
            print!(" -> {}", target.cyan());
        }
        if !column.description.is_empty() {
            print!("  {}", column.description.dimmed());
        }
        println!();
    }

    println!();
    println!("{}", "Referenced by:".bold());
    print_key_list(&details.referenced_by);
    println!("{}", "References:".bold());
    print_key_list(&details.references);

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

fn print_key_list(keys: &[String]) {
    if keys.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for key in keys {
        println!("  - {}", key.green());
    }
}

/// Relationships command - list foreign keys inferred from tests
fn relationships_command(manifest_path: &Path, verbose: bool) -> Result<()> {
    let manifest = load_manifest(manifest_path, verbose)?;
    let relationships = extract_relationships(&manifest);

    if relationships.is_empty() {
        println!("{}", "No relationships tests found".yellow());
        return Ok(());
    }

    println!("{}", "Column relationships:".bold());
    for rel in &relationships.columns {
        println!("  {} {} {}", rel.source.to_string().green(), "->".dimmed(), rel.target);
    }

    println!();
    println!("{}", "Table references:".bold());
    for (table, targets) in relationships.targets.iter() {
        if targets.is_empty() {
            continue;
        }
        println!("  {}", table.green());
        for target in targets {
            let via = relationships.label(table, target).unwrap_or_default();
            println!("    -> {} (via {})", target, via);
        }
    }

    Ok(())
}

/// Layers command - list layers present in the manifest
fn layers_command(config: &Config, manifest_path: &Path, verbose: bool) -> Result<()> {
    let manifest = load_manifest(manifest_path, verbose)?;

    println!("{}", "Layers:".bold());
    for (layer, count) in manifest.layer_counts() {
        let name = if layer.is_empty() { "(none)".dimmed() } else { layer.as_str().green() };
        let title = if layer.is_empty() { "" } else { config.layer_title(&layer) };
        println!("  {:<12} {:>4} models  {}", name, count, title);
    }

    Ok(())
}

/// Format from an explicit flag, else the output extension, else the config
fn resolve_format(format: Option<DiagramFormat>, output: &Path, config: &Config) -> DiagramFormat {
    format
        .or_else(|| {
            output
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| ext.parse().ok())
        })
        .unwrap_or(config.export.default_format)
}

/// Export command - render the static diagram
fn export_command(
    config: &Config,
    manifest_path: &Path,
    format: Option<DiagramFormat>,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    let manifest = load_manifest(manifest_path, verbose)?;
    let format = resolve_format(format, output, config);

    if verbose {
        eprintln!("{} {} diagram...", "Rendering".cyan(), format);
    }

    let bytes = export_diagram(&manifest, format, &config.export)
        .with_context(|| format!("Failed to render {} diagram", format))?;
    std::fs::write(output, bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{} {}", "Diagram saved to:".green(), output.display());
    Ok(())
}

/// Html command - write the interactive page
fn html_command(
    config: &Config,
    manifest_path: &Path,
    view: &ViewArgs,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    let manifest = load_manifest(manifest_path, verbose)?;
    let (graph, _) = view_graph(config, &manifest, view);

    let html = render_html(&graph, &config.view, &config.export.title)?;
    std::fs::write(output, html)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{} {}", "Interactive view saved to:".green(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_args(layers: &[&str], all_layers: bool) -> ViewArgs {
        ViewArgs {
            layers: layers.iter().map(|l| l.to_string()).collect(),
            all_layers,
            select: None,
        }
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn default_layer_is_first_configured() {
        let config = Config::default();

        assert_eq!(layer_filter(&config, &view_args(&[], false)).layers(), ["raw"]);
        assert_eq!(layer_filter(&config, &view_args(&["core", "mart"], false)).layers(), ["core", "mart"]);
        assert!(layer_filter(&config, &view_args(&[], true)).layers().is_empty());
    }

    #[test]
    fn unknown_selection_shows_all() {
        let manifest = Manifest::from_str(
            r#"{"nodes": {
                "model.p.a": {"name": "a", "schema": "s"},
                "model.p.b": {"name": "b", "schema": "s"}
            }}"#,
        )
        .unwrap();
        let mut view = view_args(&[], true);
        view.select = Some("s.missing".to_string());

        let (graph, selected) = view_graph(&Config::default(), &manifest, &view);
        assert_eq!(selected, None);
        assert_eq!(graph.tables().count(), 2);

        view.select = Some("s.a".to_string());
        let (_, selected) = view_graph(&Config::default(), &manifest, &view);
        assert_eq!(selected.as_deref(), Some("s.a"));
    }

    #[test]
    fn format_resolution() {
        let config = Config::default();

        assert_eq!(resolve_format(Some(DiagramFormat::Png), Path::new("erd.svg"), &config), DiagramFormat::Png);
        assert_eq!(resolve_format(None, Path::new("erd.svg"), &config), DiagramFormat::Svg);
        assert_eq!(resolve_format(None, Path::new("erd.gv"), &config), DiagramFormat::Dot);
        assert_eq!(resolve_format(None, Path::new("erd"), &config), DiagramFormat::Pdf);
    }

    #[test]
    fn parses_export_flags() {
        let cli = Cli::try_parse_from(["erdview", "export", "--format", "svg", "-o", "erd.svg"]).unwrap();
        match cli.command {
            Commands::Export { format, output, manifest } => {
                assert_eq!(format, Some(DiagramFormat::Svg));
                assert_eq!(output, PathBuf::from("erd.svg"));
                assert_eq!(manifest.manifest, PathBuf::from("target/manifest.json"));
            }
            _ => panic!("expected export command"),
        }
    }

    #[test]
    fn layer_flags_conflict_with_all_layers() {
        let result = Cli::try_parse_from(["erdview", "graph", "--layer", "core", "--all-layers"]);
        assert!(result.is_err());
    }

    #[test]
    fn malformed_manifest_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{\"nodes\": {").unwrap();

        let err = load_manifest(&path, false).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.starts_with("Error processing manifest file: "));
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("erdview.toml");
        std::fs::write(&path, "group_layers = false\n").unwrap();

        let config = load_config(Some(&path), false).unwrap();
        assert!(!config.group_layers);
        assert!(load_config(Some(&dir.path().join("missing.toml")), false).is_err());
    }
}
