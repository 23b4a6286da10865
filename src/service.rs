//! Service facade — one long-lived handle over every graph operation.
//!
//! A process hosts exactly one [`MindmapService`] per store; it owns the
//! injected collaborators and hands each call to the matching engine.
//! Callers pass repository locators, not map ids — deriving the map id is
//! the facade's job, so every entry point scopes consistently.

use std::sync::Arc;

use tracing::info;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::error::Result;
use crate::fuzzy::{resolve_scope, ScopeCandidate};
use crate::graph::aggregate::{AggregateOutcome, SuggestionAggregator};
use crate::graph::ingest::{IngestReport, TreeIngestor};
use crate::graph::merge::{GraphBatch, GraphMerger, MergeOutcome};
use crate::graph::project::GraphProjector;
use crate::graph::suggest::{SuggestionOutcome, SuggestionPayload, SuggestionWriter};
use crate::graph::types::{GraphView, NodeType, ResolvedFile, TreeNode};
use crate::identity::{derive_map_id, MapId, NodeKey};
use crate::store::GraphStore;

/// Outbound traversal depth for bulk suggestion file gathering.
const GATHER_DEPTH: usize = 3;
/// Cap on files gathered for one bulk suggestion run.
const GATHER_LIMIT: usize = 20;

/// The mindmap graph engine behind one store and one blob store.
#[derive(Clone)]
pub struct MindmapService {
    store: Arc<dyn GraphStore>,
    blobs: Arc<dyn BlobStore>,
    config: Config,
    ingestor: TreeIngestor,
    merger: GraphMerger,
    projector: GraphProjector,
    aggregator: SuggestionAggregator,
    suggestions: SuggestionWriter,
}

impl MindmapService {
    pub fn new(store: Arc<dyn GraphStore>, blobs: Arc<dyn BlobStore>, config: Config) -> Self {
        Self {
            ingestor: TreeIngestor::new(store.clone(), config.ingest.clone()),
            merger: GraphMerger::new(store.clone()),
            projector: GraphProjector::new(store.clone(), blobs.clone(), config.fuzzy.clone()),
            aggregator: SuggestionAggregator::new(store.clone()),
            suggestions: SuggestionWriter::new(store.clone()),
            store,
            blobs,
            config,
        }
    }

    /// The map id this service derives for a repository locator.
    pub fn map_id(&self, repo_locator: &str) -> MapId {
        derive_map_id(repo_locator)
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Ingest a hierarchical description tree into the repository's map,
    /// optionally hanging its root below an existing node.
    pub async fn ingest_tree(
        &self,
        repo_locator: &str,
        tree: &TreeNode,
        parent: Option<&NodeKey>,
    ) -> Result<IngestReport> {
        let map_id = derive_map_id(repo_locator);
        let report = self.ingestor.ingest_tree(&map_id, tree, parent).await?;
        info!(
            map = %map_id,
            created = report.nodes_created,
            edges = report.edges_created,
            "ingested description tree"
        );
        Ok(report)
    }

    /// Merge a flat node/edge batch into the repository's map, with
    /// optional idempotency-token replay.
    pub async fn upsert_graph(
        &self,
        repo_locator: &str,
        batch: &GraphBatch,
        prompt: &str,
        token: Option<&str>,
    ) -> Result<MergeOutcome> {
        let map_id = derive_map_id(repo_locator);
        self.merger
            .upsert_graph_with_history(&map_id, batch, NodeType::Concept, prompt, token)
            .await
    }

    /// Project the repository's map into renderable node and edge lists.
    pub async fn project_graph(&self, repo_locator: &str) -> Result<GraphView> {
        self.projector
            .project_graph(&derive_map_id(repo_locator))
            .await
    }

    /// Resolve a free-text prompt to the map nodes it most plausibly
    /// targets. An empty result means no node scored, not an error.
    pub async fn resolve_scope(
        &self,
        repo_locator: &str,
        prompt: &str,
    ) -> Result<Vec<ScopeCandidate>> {
        let map_id = derive_map_id(repo_locator);
        let nodes = self.store.nodes_by_map(&map_id).await?;
        Ok(resolve_scope(
            nodes.iter(),
            prompt,
            self.config.scope.max_terms,
            self.config.scope.top_n,
        ))
    }

    /// Persist one generated suggestion, linked under a source node
    /// resolved from the target file.
    pub async fn create_suggestion(
        &self,
        repo_locator: &str,
        file_path: &str,
        prompt: &str,
        payload: &SuggestionPayload,
    ) -> Result<SuggestionOutcome> {
        let map_id = derive_map_id(repo_locator);
        let source = self
            .suggestions
            .resolve_source_node(&map_id, file_path)
            .await?;
        self.suggestions
            .create_suggestion(&map_id, repo_locator, file_path, prompt, Some(&source), payload)
            .await
    }

    /// Collect the code files under a node's subtree for a bulk
    /// suggestion run, resolved to full repository paths.
    pub async fn gather_files(
        &self,
        repo_locator: &str,
        start: &NodeKey,
    ) -> Result<Vec<(NodeKey, String)>> {
        let map_id = derive_map_id(repo_locator);
        let files = self.blobs.list_files(map_id.as_str()).await?;
        self.suggestions
            .gather_files(&map_id, start, &files, GATHER_DEPTH, GATHER_LIMIT)
            .await
    }

    /// Union-merge bulk suggestion results into the aggregate node under
    /// `parent_key`.
    pub async fn upsert_aggregate(
        &self,
        repo_locator: &str,
        parent_key: &NodeKey,
        items: Vec<ResolvedFile>,
        label: &str,
    ) -> Result<AggregateOutcome> {
        self.aggregator
            .upsert_aggregate(&derive_map_id(repo_locator), parent_key, items, label)
            .await
    }

    /// Remove every node, edge, and bookkeeping record of the
    /// repository's map. Returns `(nodes_removed, edges_removed)`.
    pub async fn delete_map(&self, repo_locator: &str) -> Result<(usize, usize)> {
        let map_id = derive_map_id(repo_locator);
        let removed = self.store.delete_map(&map_id).await?;
        info!(map = %map_id, nodes = removed.0, edges = removed.1, "deleted map");
        Ok(removed)
    }
}
