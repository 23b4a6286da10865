//! Mindgraph CLI - repository mindmaps as a persistent graph.
//!
//! Usage:
//!   mindgraph ingest <repo> <tree.json>   # Ingest a description tree
//!   mindgraph show <repo>                 # Project the graph
//!   mindgraph resolve <repo> <prompt>     # Match a prompt to graph nodes
//!   mindgraph stats <repo>                # Node/edge counts
//!   mindgraph delete <repo>               # Drop the repository's map
//!
//! The graph persists as a JSON snapshot under `.mindgraph/` so it
//! survives across invocations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mindgraph::{
    Config, MemoryBlobStore, MemoryStore, MindmapService, TreeNode,
};

#[derive(Parser)]
#[command(name = "mindgraph")]
#[command(about = "Mindgraph - repository mindmaps as a persistent graph", long_about = None)]
struct Cli {
    /// Directory holding the graph snapshot and config (default: current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a JSON description tree into a repository's map
    Ingest {
        /// Repository locator (URL or name)
        repo: String,

        /// Path to the tree JSON file
        tree: PathBuf,
    },

    /// Project a repository's map as JSON
    Show {
        /// Repository locator (URL or name)
        repo: String,
    },

    /// Resolve a free-text prompt to the map nodes it targets
    Resolve {
        /// Repository locator (URL or name)
        repo: String,

        /// The prompt to match
        prompt: String,
    },

    /// Show node and edge counts for a repository's map
    Stats {
        /// Repository locator (URL or name)
        repo: String,
    },

    /// Delete a repository's map entirely
    Delete {
        /// Repository locator (URL or name)
        repo: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let snapshot = cli.root.join(".mindgraph").join("store.json");
    let config = Config::load(&cli.root.join(".mindgraph").join("config.toml"))?;

    let store = Arc::new(MemoryStore::load(&snapshot).await?);
    let service = MindmapService::new(
        store.clone(),
        Arc::new(MemoryBlobStore::new()),
        config,
    );

    match cli.command {
        Commands::Ingest { repo, tree } => {
            let raw = tokio::fs::read_to_string(&tree)
                .await
                .with_context(|| format!("reading {}", tree.display()))?;
            let tree: TreeNode =
                serde_json::from_str(&raw).context("parsing description tree")?;

            let report = service.ingest_tree(&repo, &tree, None).await?;
            store.save(&snapshot).await?;
            println!(
                "created {} nodes ({} existing), {} edges, {} malformed skipped",
                report.nodes_created,
                report.nodes_existing,
                report.edges_created,
                report.skipped_malformed
            );
        }
        Commands::Show { repo } => {
            let view = service.project_graph(&repo).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Resolve { repo, prompt } => {
            let candidates = service.resolve_scope(&repo, &prompt).await?;
            if candidates.is_empty() {
                println!("no matching nodes");
            }
            for candidate in candidates {
                println!("{:.1}  {}  {}", candidate.score, candidate.key, candidate.label);
            }
        }
        Commands::Stats { repo } => {
            let map_id = service.map_id(&repo);
            let nodes = service.store().nodes_by_map(&map_id).await?;
            let edges = service.store().edges_by_map(&map_id).await?;
            println!("map:   {map_id}");
            println!("nodes: {}", nodes.len());
            println!("edges: {}", edges.len());
        }
        Commands::Delete { repo } => {
            let (nodes, edges) = service.delete_map(&repo).await?;
            store.save(&snapshot).await?;
            println!("deleted {nodes} nodes, {edges} edges");
        }
    }

    Ok(())
}
