//! CLI for the churn feature matrix builder.
//!
//! This binary loads the source files from a data directory, builds the
//! per-customer feature matrix and writes it as CSV. It can also print the
//! lookback windows for an offset and list the registered feature blocks.

use anyhow::{Context, Result};
use churn_features::{
    BlockCategory, BlockRegistry, DEFAULT_OUTPUT, FeatureMatrixBuilder, PipelineConfig,
    load_sources, windows, write_matrix,
};
use clap::{Parser, Subcommand};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "churn-features")]
#[command(about = "Windowed feature matrix builder for churn classification", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the feature matrix from the source files
    Build {
        /// Directory holding the source files
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Days every window is shifted away from the anchor
        #[arg(long)]
        offset: Option<u32>,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output CSV path
        #[arg(long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        /// Keep entity_id as the last column
        #[arg(long)]
        keep_entity_id: bool,
    },
    /// Print the lookback windows for an offset
    Windows {
        /// Days every window is shifted away from the anchor
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// List the registered feature blocks
    Blocks,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            data_dir,
            offset,
            config,
            output,
            keep_entity_id,
        } => {
            let config = resolve_config(config, offset, keep_entity_id)?;
            build(&data_dir, config, &output)
        }
        Commands::Windows { offset } => print_windows(offset),
        Commands::Blocks => {
            list_blocks(&BlockRegistry::with_defaults(&PipelineConfig::default()));
            Ok(())
        }
    }
}

/// Load the configuration file, if any, and apply the command-line overrides.
fn resolve_config(
    path: Option<PathBuf>,
    offset: Option<u32>,
    keep_entity_id: bool,
) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(offset) = offset {
        config = config.with_offset(offset);
    }
    config.keep_entity_id |= keep_entity_id;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build(data_dir: &Path, config: PipelineConfig, output: &Path) -> Result<()> {
    let raw = load_sources(data_dir)
        .with_context(|| format!("loading sources from {}", data_dir.display()))?;
    let builder = FeatureMatrixBuilder::new(config);
    let mut matrix = builder.build_from_raw(raw).context("building feature matrix")?;
    let written = write_matrix(&mut matrix, output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(path = %written.display(), rows = matrix.height(), "done");
    Ok(())
}

/// Print every window as its day range relative to the anchor.
fn print_windows(offset: u32) -> Result<()> {
    let all = windows(offset).context("invalid offset")?;
    println!("Lookback windows (offset {offset} days)\n");
    for window in all {
        println!(
            "  {:<12} [anchor - {:>3}, anchor - {:>3})",
            window.period(),
            window.lower_days(),
            window.upper_days()
        );
    }
    Ok(())
}

/// List all blocks grouped by category.
fn list_blocks(registry: &BlockRegistry) {
    let mut by_category: HashMap<BlockCategory, Vec<_>> = HashMap::new();
    for info in registry.all_info() {
        by_category.entry(info.category).or_default().push(info);
    }

    println!("Feature blocks ({} total)\n", registry.len());

    let mut categories: Vec<_> = by_category.into_iter().collect();
    categories.sort_by_key(|(c, _)| c.to_string());

    for (category, blocks) in categories {
        println!("{category}:");
        for info in blocks {
            let anchor = info.anchor.map_or_else(|| "-".to_string(), |a| a.to_string());
            let policy = info.window_policy.map_or_else(|| "-".to_string(), |p| p.to_string());
            println!("  {} - {}", info.name, info.description);
            println!("    anchor: {anchor}, windows: {policy}");
        }
        println!();
    }
}
