//! medrag: Question answering over a medical knowledge graph
//!
//! medrag loads disease records into a local Cypher graph and answers
//! natural-language questions by having a local model write the query and
//! explain the results.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::Config;
use medrag_chain::{
    LoggingBackend, OllamaBackend, SharedBackend, SharedGraphStore, ask_graphrag,
    ask_graphrag_with_path_using, initialize_rag_chain_with, wrap_store,
};
use medrag_graph::{GraphStore, load_file};

#[derive(Parser)]
#[command(name = "medrag")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to .medrag directory (default: search for .medrag/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Graph database path (overrides [graph] path)
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    /// Ollama model (overrides [ollama] model)
    #[arg(long, global = true, env = "MEDRAG_MODEL")]
    model: Option<String>,

    /// Ollama API base URL (overrides [ollama] base_url)
    #[arg(long, global = true, env = "MEDRAG_OLLAMA_URL")]
    ollama_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new .medrag directory with config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Load disease records from a JSON file into the graph
    Load {
        /// JSON array of {name, symptoms, treatments, causes} records
        file: PathBuf,
    },

    /// Print the graph schema given to the query generator
    Schema,

    /// Ask a question and print the answer
    Ask {
        question: String,
    },

    /// Ask a question and print the answer with its graph path
    Path {
        question: String,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },
}

const DEFAULT_CONFIG: &str = r#"# medrag configuration
# All paths are relative to this .medrag/ directory unless absolute

[graph]
path = "graph.db"  # Stored in .medrag/graph.db

[ollama]
base_url = "http://localhost:11434/v1"  # Or set MEDRAG_OLLAMA_URL
model = "llama3.1:8b"                   # Or set MEDRAG_MODEL
timeout_secs = 600
max_retries = 3

[chain]
top_k = 10
verbose = true
return_intermediate_steps = false
raw_result_keys = ["raw_query_result"]  # Add "data" for older chain outputs

# [logging]
# dir = "logs"  # Daily log files in .medrag/logs/
"#;

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize logging to stderr for interactive use.
fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(verbose))
        .init();
}

/// Initialize logging to daily rotating files in `logs_dir`.
fn init_file_logging(logs_dir: &Path, verbose: bool) {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        init_logging(verbose);
        return;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "medrag.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the writer thread
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(env_filter(verbose))
        .init();
}

/// Load config from an explicit directory or by walking up from the cwd.
///
/// Returns the config and the path to the `.medrag` directory, if any.
fn load_config(override_path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = override_path {
        let config_file = if path.is_dir() {
            Config::config_path(path)
        } else {
            path.clone()
        };
        let medrag_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.clone());

        let config = Config::from_file(&config_file)?;
        return Ok((config, Some(medrag_dir)));
    }

    match Config::find_and_load().context("Error searching for .medrag/config.toml")? {
        Some((config, medrag_dir)) => Ok((config, Some(medrag_dir))),
        None => Ok((Config::default(), None)),
    }
}

/// Apply command-line overrides and reject invalid settings.
fn apply_overrides(mut config: Config, cli: &Cli) -> Result<Config> {
    if let Some(ref model) = cli.model {
        config.ollama.model = model.clone();
    }
    if let Some(ref url) = cli.ollama_url {
        config.ollama.base_url = url.clone();
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(|e| format!("  {}", e)).collect();
        anyhow::bail!("Invalid configuration:\n{}", details.join("\n"));
    }
    Ok(config)
}

/// Open the graph store, which must already exist.
fn open_existing_store(path: &Path) -> Result<SharedGraphStore> {
    if !path.exists() {
        anyhow::bail!(
            "Graph database not found at {}. Run 'medrag load <file.json>' first.",
            path.display()
        );
    }
    info!("Opening graph store at {}", path.display());
    let store = GraphStore::open(path)
        .with_context(|| format!("Failed to open graph database: {}", path.display()))?;
    Ok(wrap_store(store))
}

fn create_backend(config: &Config) -> Result<SharedBackend> {
    let backend = OllamaBackend::new(config.ollama_config())
        .context("Failed to create Ollama backend")?;
    Ok(Arc::new(LoggingBackend::new(backend)))
}

fn init_config_dir(force: bool) -> Result<()> {
    let medrag_dir = PathBuf::from(config::MEDRAG_DIR);
    let config_path = Config::config_path(&medrag_dir);

    if config_path.exists() && !force {
        anyhow::bail!(".medrag/config.toml already exists. Use --force to overwrite.");
    }

    if !medrag_dir.exists() {
        std::fs::create_dir_all(&medrag_dir)?;
        info!("Created {}/", medrag_dir.display());
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    info!("Created {}", config_path.display());
    info!("Next steps:");
    info!("  1. Run 'medrag load data/diseases.json' to build the graph");
    info!("  2. Run 'medrag ask \"What are the symptoms of flu?\"'");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_dir) = load_config(cli.config.as_ref())?;

    match config.resolve_log_dir(config_dir.as_deref()) {
        Some(dir) => init_file_logging(&dir, cli.verbose),
        None => init_logging(cli.verbose),
    }
    if let Some(ref dir) = config_dir {
        info!("Found config at {}", dir.display());
    }

    let config = apply_overrides(config, &cli)?;
    let graph_path = cli
        .graph
        .clone()
        .unwrap_or_else(|| config.resolve_graph_path(config_dir.as_deref()));

    match cli.command {
        Commands::Init { force } => {
            init_config_dir(force)?;
        }

        Commands::Load { file } => {
            if let Some(parent) = graph_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            // GraphStore::open creates the database if it doesn't exist
            let store = GraphStore::open(&graph_path).with_context(|| {
                format!("Failed to open graph database: {}", graph_path.display())
            })?;

            info!("Loading {} -> {}", file.display(), graph_path.display());
            let stats = load_file(&store, &file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            let totals = store.stats()?;

            println!(
                "Loaded {} records ({} nodes, {} relationships) in {}ms",
                stats.records, stats.nodes_upserted, stats.relationships_added, stats.load_time_ms
            );
            println!(
                "Graph now has {} nodes and {} edges",
                totals.node_count, totals.edge_count
            );
        }

        Commands::Schema => {
            let store = open_existing_store(&graph_path)?;
            let guard = store
                .lock()
                .map_err(|e| anyhow::anyhow!("Graph store lock poisoned: {}", e))?;
            print!("{}", guard.schema());
        }

        Commands::Ask { question } => {
            let graph = open_existing_store(&graph_path)?;
            let chain =
                initialize_rag_chain_with(graph, create_backend(&config)?, config.chain_options())?;

            let outcome = ask_graphrag(&chain, &question).await;
            println!("{}", outcome);
        }

        Commands::Path { question, json } => {
            let graph = open_existing_store(&graph_path)?;
            let chain =
                initialize_rag_chain_with(graph, create_backend(&config)?, config.chain_options())?;

            let answer =
                ask_graphrag_with_path_using(&chain, &question, &config.path_options()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}", answer.answer);
                if !answer.graph_path.is_empty() {
                    println!();
                    println!("Graph path:");
                    for entry in &answer.graph_path {
                        println!(
                            "  {} -[{}]-> {}",
                            entry.node, entry.relation, entry.next_node
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
