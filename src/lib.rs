//! # Mindgraph
//!
//! Deduplicated knowledge-graph engine for AI-produced repository mindmaps.
//!
//! AI describes a repository as nested trees of labeled concepts; mindgraph
//! turns those descriptions into one persistent graph per repository. Every
//! key is derived deterministically from semantic content, so re-ingesting
//! an overlapping description merges into the existing graph instead of
//! duplicating it.
//!
//! ## Key Features
//!
//! - **Deterministic identity**: node, edge, and map keys are content
//!   hashes; replays are no-ops
//! - **Tree ingestion**: nested descriptions become `contains` hierarchies
//! - **Batch merge**: flat AI output upserts nodes and links, tolerating
//!   partial references
//! - **Projection**: heterogeneous stored file references normalized into
//!   one renderable shape, with flagged fuzzy backfill
//! - **Scope resolution**: free-text prompts matched to the graph nodes
//!   they target
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mindgraph::{
//!     Config, MemoryBlobStore, MemoryStore, MindmapService, TreeNode,
//! };
//!
//! # async fn run() -> mindgraph::Result<()> {
//! let service = MindmapService::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryBlobStore::new()),
//!     Config::default(),
//! );
//!
//! let tree = TreeNode::branch("Answer", vec![TreeNode::leaf("delete")]);
//! service
//!     .ingest_tree("https://github.com/user/repo", &tree, None)
//!     .await?;
//! let view = service.project_graph("https://github.com/user/repo").await?;
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod graph;
pub mod history;
pub mod identity;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use error::{MindgraphError, Result};

pub use blob::{BlobStore, FileMeta, MemoryBlobStore};
pub use config::{Config, FuzzyConfig, IngestConfig, ScopeConfig};
pub use fuzzy::{resolve_scope, suggest_files, FileSuggestion, ScopeCandidate};
pub use graph::{
    EdgeDoc, EdgeSpec, EdgeType, GraphBatch, GraphView, NodeDoc, NodeSpec, NodeType, RelatedFile,
    ResolvedFile, SuggestionPayload, SuggestionRecord, TreeNode,
};
pub use history::HistoryRecord;
pub use identity::{
    derive_edge_key, derive_map_id, derive_node_key, derive_suggestion_key, EdgeKey, MapId,
    NodeKey,
};
pub use service::MindmapService;
pub use store::{memory::MemoryStore, GraphStore};
