use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use semindex_embed::ProviderKind;
use semindex_retriever::{
    CodeChunk, DirectoryWatcher, IndexConfig, IndexManager, ReindexDebouncer, find_top_chunks,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Semantic line-range search over a workspace.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workspace root; repeat for multi-root workspaces. The first root holds the cache.
    #[arg(short, long = "root", default_value = ".")]
    roots: Vec<PathBuf>,

    /// Embedding provider
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Embedding model name
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the remote embedding endpoint
    #[arg(long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index, reusing the cache when it is current
    Index {
        /// Ignore the cache and rebuild from scratch
        #[arg(long)]
        force: bool,
    },
    /// Find the line ranges most similar to a query
    Query {
        /// Natural-language query
        text: String,
        /// Number of results (1-20)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Keep the index current while files change
    Watch,
    /// Show index status
    Status {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Delete the live index and its cache
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct ChunkOutput {
    path: PathBuf,
    start_line0: usize,
    end_line0: usize,
    content: String,
}

impl From<CodeChunk> for ChunkOutput {
    fn from(chunk: CodeChunk) -> Self {
        Self {
            path: chunk.path,
            start_line0: chunk.start_line0,
            end_line0: chunk.end_line0,
            content: chunk.text,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<IndexConfig> {
    let primary = args
        .roots
        .first()
        .context("At least one --root is required")?;
    let mut config = IndexConfig::load(primary)?;

    if let Some(provider) = args.provider {
        config.embed.provider = provider;
    }
    if let Some(model) = &args.model {
        config.embedding_model = Some(model.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.embed = config.embed.with_endpoint(endpoint.as_str());
    }
    Ok(config.clamped())
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            token.cancel();
        }
    });
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let top_k_default = config.top_k;
    let manager = Arc::new(IndexManager::from_config(args.roots.clone(), config).await?);

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    match args.command {
        Commands::Index { force } => {
            let index = manager.build_or_get_index(force, &cancel).await?;
            println!(
                "Indexed {} chunks from {} files",
                index.chunks.len(),
                index.file_metadata.len()
            );
            println!("Cache location: {}", manager.cache().path().display());
            Ok(())
        }
        Commands::Query {
            text,
            top_k,
            format,
        } => {
            let index = manager.build_or_get_index(false, &cancel).await?;
            let chunks = find_top_chunks(&index, &text, top_k.unwrap_or(top_k_default), &cancel)
                .await?;
            let results: Vec<ChunkOutput> = chunks.into_iter().map(ChunkOutput::from).collect();

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} matches:", results.len());
                    for (rank, result) in results.iter().enumerate() {
                        println!(
                            "  {}. {} | Lines: {}-{}",
                            rank + 1,
                            result.path.display(),
                            result.start_line0 + 1,
                            result.end_line0 + 1
                        );
                    }
                }
                OutputFormat::Full => {
                    for result in &results {
                        println!("File: {}", result.path.display());
                        println!("Lines: {}-{}", result.start_line0 + 1, result.end_line0 + 1);
                        println!("Content:");
                        println!("{}", result.content);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::Watch => {
            manager.build_or_get_index(false, &cancel).await?;

            let (tx, rx) = flume::unbounded();
            let _watcher = DirectoryWatcher::watch(manager.roots(), tx)?;
            let debouncer = ReindexDebouncer::new(manager.config().debounce());
            println!(
                "Watching {} root(s), press Ctrl-C to stop",
                manager.roots().len()
            );
            debouncer.run(rx, Arc::clone(&manager), cancel).await;
            Ok(())
        }
        Commands::Status { format } => {
            let stats = manager.stats().await;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Phase: {}", stats.phase);
                    println!("Workspace key: {}", stats.workspace_key);
                    for root in &stats.roots {
                        println!("Root: {}", root.display());
                    }
                    println!(
                        "Cache: {} ({})",
                        stats.cache_path.display(),
                        if stats.cache_exists { "present" } else { "missing" }
                    );
                    if let Some(persisted) = manager.cache().load().await {
                        println!("Cached chunks: {}", persisted.documents.len());
                        println!("Cached files: {}", persisted.file_metadata.len());
                    }
                }
            }
            Ok(())
        }
        Commands::Clear => {
            manager.clear().await;
            println!("Cleared index at {}", manager.cache().path().display());
            Ok(())
        }
    }
}
