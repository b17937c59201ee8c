#![forbid(unsafe_code)]

//! MCM CLI - work with comment-encoded diagram models.
//!
//! # Commands
//!
//! - `extract`: Print the attributes of one element text as JSON
//! - `resolve`: Rebuild the graph from model, node and relation texts
//! - `align`: Move overlapping models of a configuration apart
//! - `export`: Merge a configuration into one namespaced super-model
//! - `import`: Split a super-model back into its models

use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcm_core::{Configuration, EngineConfig, GraphSnapshot};
use mcm_layout::align_models_with_config;
use mcm_parser::{
    SuperModel, export_configuration_with_config, extract_model_with_config,
    extract_with_config, import_configuration_with_config, parse_configuration_with_config,
};
use serde::Serialize;
use tracing::{debug, info};

/// MCM CLI - work with comment-encoded diagram models.
#[derive(Debug, Parser)]
#[command(
    name = "mcm-cli",
    version,
    about = "MCM CLI - extract, resolve and align comment-encoded diagram models"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging (can be repeated for more detail: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract attributes, styles and body from one element text.
    Extract {
        /// Input file path or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Use the model variant (no style map)
        #[arg(long)]
        model: bool,
    },

    /// Resolve node and relation texts into a graph snapshot.
    Resolve {
        /// Model text files
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Node text files
        #[arg(short, long = "node")]
        nodes: Vec<String>,

        /// Relation text files
        #[arg(short, long = "relation")]
        relations: Vec<String>,

        /// Configuration name
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Align the models of a configuration (JSON) so they no longer overlap.
    Align {
        /// Configuration JSON file or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Export a configuration (JSON) as a single super-model.
    Export {
        /// Configuration JSON file or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Import a super-model (JSON) back into a configuration.
    Import {
        /// Super-model JSON file or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Extract { input, model } => cmd_extract(&input, model, &config, cli.pretty),
        Command::Resolve {
            models,
            nodes,
            relations,
            name,
        } => cmd_resolve(&models, &nodes, &relations, &name, &config, cli.pretty),
        Command::Align { input } => cmd_align(&input, &config, cli.pretty),
        Command::Export { input } => cmd_export(&input, &config, cli.pretty),
        Command::Import { input } => cmd_import(&input, &config, cli.pretty),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let source =
        std::fs::read_to_string(path).context(format!("Failed to read config: {path}"))?;
    let config: EngineConfig =
        toml::from_str(&source).context(format!("Invalid config file: {path}"))?;
    debug!(?config, "loaded engine config");
    Ok(config)
}

fn load_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else if Path::new(input).exists() {
        std::fs::read_to_string(input).context(format!("Failed to read file: {input}"))
    } else {
        // Treat as inline element text
        Ok(input.to_string())
    }
}

/// Like [`load_input`] but never falls back to inline text, so a mistyped
/// path reports the missing file.
fn load_document(input: &str) -> Result<String> {
    if input == "-" {
        return load_input(input);
    }
    std::fs::read_to_string(input).context(format!("Failed to read file: {input}"))
}

fn load_files(paths: &[String]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| std::fs::read_to_string(path).context(format!("Failed to read file: {path}")))
        .collect()
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let mut output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    output.push('\n');
    io::stdout()
        .write_all(output.as_bytes())
        .context("Failed to write to stdout")
}

fn cmd_extract(input: &str, model: bool, config: &EngineConfig, pretty: bool) -> Result<()> {
    let source = load_input(input)?;
    if model {
        print_json(&extract_model_with_config(&source, config), pretty)
    } else {
        print_json(&extract_with_config(&source, config), pretty)
    }
}

fn cmd_resolve(
    models: &[String],
    nodes: &[String],
    relations: &[String],
    name: &str,
    config: &EngineConfig,
    pretty: bool,
) -> Result<()> {
    let model_texts = load_files(models)?;
    let node_texts = load_files(nodes)?;
    let relation_texts = load_files(relations)?;

    let configuration = parse_configuration_with_config(
        &model_texts,
        &node_texts,
        &relation_texts,
        name,
        None,
        config,
    )
    .map_err(|error| anyhow::anyhow!("{} ({})", error, error.code().as_str()))?;
    info!(
        models = configuration.models.len(),
        nodes = node_texts.len(),
        "resolved configuration"
    );
    print_json(&GraphSnapshot::from_configuration(&configuration), pretty)
}

fn load_configuration(input: &str) -> Result<Configuration> {
    let source = load_document(input)?;
    serde_json::from_str(&source).context("Invalid configuration JSON")
}

fn cmd_align(input: &str, config: &EngineConfig, pretty: bool) -> Result<()> {
    let mut configuration = load_configuration(input)?;
    let stats = align_models_with_config(&mut configuration.models, config);
    info!(
        overlapping = stats.overlapping_count,
        moved = stats.moved_count,
        "aligned models"
    );
    print_json(&configuration, pretty)
}

fn cmd_export(input: &str, config: &EngineConfig, pretty: bool) -> Result<()> {
    let configuration = load_configuration(input)?;
    print_json(
        &export_configuration_with_config(&configuration, config),
        pretty,
    )
}

fn cmd_import(input: &str, config: &EngineConfig, pretty: bool) -> Result<()> {
    let source = load_document(input)?;
    let super_model: SuperModel =
        serde_json::from_str(&source).context("Invalid super-model JSON")?;
    print_json(
        &import_configuration_with_config(&super_model, config),
        pretty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_reports_the_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("configuration.json");
        let path = path.to_string_lossy();

        let error = load_configuration(&path).expect_err("file does not exist");
        assert_eq!(error.to_string(), format!("Failed to read file: {path}"));
    }

    #[test]
    fn stored_configuration_loads() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("configuration.json");
        std::fs::write(&path, r#"{"name":"plant","version":null,"models":[]}"#)
            .expect("write configuration");

        let configuration =
            load_configuration(&path.to_string_lossy()).expect("configuration loads");
        assert_eq!(configuration.name, "plant");
    }

    #[test]
    fn element_text_may_still_be_inline() {
        let text = "// id: \"n\"\nNode\n";
        assert_eq!(load_input(text).expect("inline text"), text);
    }
}
