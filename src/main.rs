use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use linkgraph::backend::{ExecutionMode, TableHandle};
use linkgraph::config::{CliConfig, LinkerConfig};
use linkgraph::{ColumnIdentifier, TableManager};

/// linkgraph - cached intermediate tables and graph metrics for record linkage
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file (environment variables are used otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file holding the input tables
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// How pipelines run: single or stepwise
    #[arg(long, global = true)]
    execution_mode: Option<ExecutionMode>,

    /// Run every pipeline statement separately (same as --execution-mode stepwise)
    #[arg(long, global = true)]
    debug: bool,

    /// Input table to concatenate (repeatable)
    #[arg(long = "input-table", global = true)]
    input_tables: Vec<String>,

    /// Alias for the input table at the same position (repeatable)
    #[arg(long = "input-alias", global = true)]
    input_aliases: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Size, edge count and density of every cluster
    ClusterMetrics {
        /// Scored edge table
        #[arg(long)]
        edges: String,
        /// Node to cluster assignment table
        #[arg(long)]
        clusters: String,
        /// Minimum match probability (inclusive)
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Degree of every node with at least one edge above the threshold
    NodeMetrics {
        #[arg(long)]
        edges: String,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Term frequencies of one column over the input tables
    TfTable {
        #[arg(long)]
        column: String,
    },
    /// Input tables with term frequency columns joined in
    ConcatWithTf {
        /// Column to add term frequencies for (repeatable)
        #[arg(long = "column", required = true)]
        columns: Vec<String>,
    },
    /// Drop every table created by linkgraph
    Cleanup,
}

impl From<&Cli> for CliConfig {
    fn from(cli: &Cli) -> Self {
        CliConfig {
            database_path: cli.database.clone(),
            execution_mode: cli.execution_mode,
            debug_mode: cli.debug,
            input_tables: cli.input_tables.clone(),
            input_table_aliases: cli.input_aliases.clone(),
            default_threshold: None,
        }
    }
}

fn print_rows(table: &TableHandle) -> anyhow::Result<()> {
    for row in table.rows()? {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize logger - defaults to WARN level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => LinkerConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => LinkerConfig::from_env().context("loading configuration from environment")?,
    };
    let config = base.merge_cli(CliConfig::from(&cli))?;
    log::debug!("Configuration: {:?}", config);

    let manager = TableManager::from_config(&config)?;

    match cli.command {
        Command::ClusterMetrics {
            edges,
            clusters,
            threshold,
        } => {
            let edges = manager.table(&edges)?;
            let clusters = manager.table(&clusters)?;
            let threshold = threshold.unwrap_or(config.default_threshold);
            let metrics = manager.compute_cluster_metrics(&edges, &clusters, threshold)?;
            print_rows(&metrics)?;
        }
        Command::NodeMetrics { edges, threshold } => {
            let edges = manager.table(&edges)?;
            let threshold = threshold.unwrap_or(config.default_threshold);
            let metrics = manager.compute_node_metrics(&edges, threshold)?;
            print_rows(&metrics)?;
        }
        Command::TfTable { column } => {
            let tf = manager.compute_tf_table(&ColumnIdentifier::new(column))?;
            print_rows(&tf)?;
        }
        Command::ConcatWithTf { columns } => {
            let columns: Vec<ColumnIdentifier> = columns.iter().map(ColumnIdentifier::new).collect();
            let table = manager.compute_df_concat_with_tf(&columns)?;
            print_rows(&table)?;
        }
        Command::Cleanup => {
            let dropped = manager.delete_tables_created_by_core()?;
            eprintln!("Dropped {} tables", dropped);
        }
    }

    Ok(())
}
