//! Tree ingestion — converts a nested label/children tree into a scoped
//! subgraph under one root.
//!
//! Keys are deterministic, so ingesting an overlapping or previously seen
//! tree merges with the existing subgraph instead of duplicating it:
//! existing nodes are left untouched and existing edges are not re-linked.
//! Write ordering is part of the contract — a node is always written before
//! the edge referencing it and before any of its children are processed, so
//! a partial failure can never orphan a child under a missing parent.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::IngestConfig;
use crate::error::{MindgraphError, Result};
use crate::graph::types::{EdgeDoc, EdgeType, NodeDoc, NodeType, TreeNode};
use crate::identity::{derive_edge_key, derive_node_key, MapId, NodeKey};
use crate::store::GraphStore;

/// What one `ingest_tree` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub nodes_created: usize,
    /// Nodes that already existed and were left untouched.
    pub nodes_existing: usize,
    pub edges_created: usize,
    /// Tree nodes dropped (with their subtrees) for missing labels.
    pub skipped_malformed: usize,
}

impl IngestReport {
    fn absorb(&mut self, other: IngestReport) {
        self.nodes_created += other.nodes_created;
        self.nodes_existing += other.nodes_existing;
        self.edges_created += other.edges_created;
        self.skipped_malformed += other.skipped_malformed;
    }
}

/// The tree ingestion engine. Cheap to clone; holds the injected store.
#[derive(Clone)]
pub struct TreeIngestor {
    store: Arc<dyn GraphStore>,
    config: IngestConfig,
}

impl TreeIngestor {
    pub fn new(store: Arc<dyn GraphStore>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    /// Ingest a tree under `map_id`, optionally hanging the root below an
    /// existing parent node.
    ///
    /// Sequential by default (deterministic depth-first write order).
    /// With `parallel` configured, sibling subtrees fan out across tasks
    /// while a semaphore caps concurrent store writes — the ceiling
    /// defaults low to protect the shared connection pool.
    pub async fn ingest_tree(
        &self,
        map_id: &MapId,
        tree: &TreeNode,
        parent: Option<&NodeKey>,
    ) -> Result<IngestReport> {
        let report = if self.config.parallel {
            let limiter = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
            self.clone()
                .ingest_parallel(map_id.clone(), tree.clone(), parent.cloned(), limiter)
                .await?
        } else {
            let mut report = IngestReport::default();
            self.ingest_sequential(map_id, tree, parent, &mut report)
                .await?;
            report
        };
        debug!(
            map = %map_id,
            created = report.nodes_created,
            existing = report.nodes_existing,
            edges = report.edges_created,
            skipped = report.skipped_malformed,
            "tree ingested"
        );
        Ok(report)
    }

    /// Write one tree node and, when a parent is given, the `contains`
    /// edge pointing at it. Returns `None` when the node is malformed.
    async fn write_node(
        &self,
        map_id: &MapId,
        node: &TreeNode,
        parent: Option<&NodeKey>,
        report: &mut IngestReport,
    ) -> Result<Option<NodeKey>> {
        let label = match node.label.as_deref().map(str::trim) {
            Some(l) if !l.is_empty() => l,
            _ => {
                warn!(map = %map_id, "tree node without label, dropping subtree");
                report.skipped_malformed += subtree_size(node);
                return Ok(None);
            }
        };

        let key = derive_node_key(map_id, NodeType::Concept.discriminator(), label);
        if self.store.has_node(&key).await? {
            report.nodes_existing += 1;
        } else {
            self.store
                .put_node(NodeDoc {
                    key: key.clone(),
                    map_id: map_id.clone(),
                    label: label.to_string(),
                    node_type: Some(NodeType::Concept),
                    related_files: node.related_files.clone(),
                    meta: None,
                })
                .await?;
            report.nodes_created += 1;
        }

        if let Some(parent) = parent {
            let edge_key = derive_edge_key(parent, &key, EdgeType::Contains.as_str());
            if !self.store.has_edge(&edge_key).await? {
                self.store
                    .put_edge(EdgeDoc {
                        key: edge_key,
                        map_id: map_id.clone(),
                        from_node: parent.clone(),
                        to_node: key.clone(),
                        edge_type: EdgeType::Contains,
                    })
                    .await?;
                report.edges_created += 1;
            }
        }

        Ok(Some(key))
    }

    fn ingest_sequential<'a>(
        &'a self,
        map_id: &'a MapId,
        node: &'a TreeNode,
        parent: Option<&'a NodeKey>,
        report: &'a mut IngestReport,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let Some(key) = self.write_node(map_id, node, parent, report).await? else {
                return Ok(());
            };
            for child in &node.children {
                self.ingest_sequential(map_id, child, Some(&key), report)
                    .await?;
            }
            Ok(())
        })
    }

    fn ingest_parallel(
        self,
        map_id: MapId,
        node: TreeNode,
        parent: Option<NodeKey>,
        limiter: Arc<Semaphore>,
    ) -> Pin<Box<dyn Future<Output = Result<IngestReport>> + Send + 'static>> {
        Box::pin(async move {
            let mut report = IngestReport::default();

            // The node and its inbound edge land before any fan-out; the
            // permit covers only this node's writes so deep trees cannot
            // deadlock the pool.
            let key = {
                let _permit = limiter
                    .acquire()
                    .await
                    .map_err(|e| MindgraphError::IngestFailed(e.to_string()))?;
                match self
                    .write_node(&map_id, &node, parent.as_ref(), &mut report)
                    .await?
                {
                    Some(key) => key,
                    None => return Ok(report),
                }
            };

            let mut children = JoinSet::new();
            for child in node.children {
                let engine = self.clone();
                let map_id = map_id.clone();
                let parent = key.clone();
                let limiter = limiter.clone();
                children.spawn(async move {
                    engine
                        .ingest_parallel(map_id, child, Some(parent), limiter)
                        .await
                });
            }

            // Structured join: every child must complete before the first
            // failure propagates. Store errors keep their variant so
            // callers can still match on them; IngestFailed is reserved
            // for panicked or cancelled child tasks.
            let mut first_failure: Option<MindgraphError> = None;
            while let Some(joined) = children.join_next().await {
                match joined {
                    Ok(Ok(child_report)) => report.absorb(child_report),
                    Ok(Err(e)) => {
                        first_failure.get_or_insert(e);
                    }
                    Err(join_err) => {
                        first_failure
                            .get_or_insert(MindgraphError::IngestFailed(join_err.to_string()));
                    }
                }
            }
            if let Some(failure) = first_failure {
                return Err(failure);
            }
            Ok(report)
        })
    }
}

fn subtree_size(node: &TreeNode) -> usize {
    1 + node.children.iter().map(subtree_size).sum::<usize>()
}
