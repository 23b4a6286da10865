//! Graph store abstraction — the persistence seam of the engine.
//!
//! The engine treats storage as a key-value document store with a couple of
//! secondary-index scans, not a relational engine. Everything goes through
//! the [`GraphStore`] trait so the backing implementation is injectable: a
//! long-lived service instance owns one `Arc<dyn GraphStore>` instead of the
//! process-wide handle the engine replaced.
//!
//! Failure semantics: implementations surface connectivity problems as
//! [`MindgraphError::StoreUnavailable`]; the engine propagates that
//! unchanged and never retries — retries belong to the transport layer.

pub mod memory;

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::suggest::SuggestionRecord;
use crate::graph::types::{EdgeDoc, EdgeType, NodeDoc};
use crate::history::HistoryRecord;
use crate::identity::{EdgeKey, MapId, NodeKey};

#[allow(unused_imports)]
use crate::error::MindgraphError;

/// Async document/edge store the graph engine runs against.
///
/// Upserts are insert-or-replace and never fail on a duplicate key; that is
/// what lets deterministic keys turn replays into no-ops. Any call may block
/// on network I/O, so callers must not hold in-process locks across awaits.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn has_node(&self, key: &NodeKey) -> Result<bool>;
    async fn get_node(&self, key: &NodeKey) -> Result<Option<NodeDoc>>;
    /// Insert-or-replace a node document.
    async fn put_node(&self, node: NodeDoc) -> Result<()>;

    async fn has_edge(&self, key: &EdgeKey) -> Result<bool>;
    /// Insert-or-replace an edge document.
    async fn put_edge(&self, edge: EdgeDoc) -> Result<()>;

    /// All nodes in one map. No ordering guarantee.
    async fn nodes_by_map(&self, map_id: &MapId) -> Result<Vec<NodeDoc>>;
    /// All edges in one map. No ordering guarantee.
    async fn edges_by_map(&self, map_id: &MapId) -> Result<Vec<EdgeDoc>>;
    /// Outbound edges of one node.
    async fn edges_from(&self, map_id: &MapId, from: &NodeKey) -> Result<Vec<EdgeDoc>>;

    /// Remove every node and edge of a map, plus its history bookkeeping.
    /// Returns `(nodes_removed, edges_removed)`.
    async fn delete_map(&self, map_id: &MapId) -> Result<(usize, usize)>;

    /// Append a prompt-history record.
    async fn append_history(&self, record: HistoryRecord) -> Result<()>;
    /// Look up a history record by its idempotency token.
    async fn find_history(&self, map_id: &MapId, token: &str) -> Result<Option<HistoryRecord>>;

    async fn has_suggestion(&self, key: &str) -> Result<bool>;
    async fn get_suggestion(&self, key: &str) -> Result<Option<SuggestionRecord>>;
    /// Insert-or-replace a suggestion record.
    async fn put_suggestion(&self, record: SuggestionRecord) -> Result<()>;

    /// Breadth-first walk over outbound edges, starting below `start`.
    ///
    /// Returns the visited nodes (the start node excluded), bounded by
    /// `max_depth` hops. `edge_filter = None` follows every edge type.
    async fn traverse_outbound(
        &self,
        map_id: &MapId,
        start: &NodeKey,
        max_depth: usize,
        edge_filter: Option<EdgeType>,
    ) -> Result<Vec<NodeDoc>> {
        let mut visited: HashSet<NodeKey> = HashSet::new();
        visited.insert(start.clone());

        let mut queue: VecDeque<(NodeKey, usize)> = VecDeque::new();
        queue.push_back((start.clone(), 0));

        let mut out = Vec::new();
        while let Some((key, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in self.edges_from(map_id, &key).await? {
                if let Some(filter) = edge_filter {
                    if edge.edge_type != filter {
                        continue;
                    }
                }
                if !visited.insert(edge.to_node.clone()) {
                    continue;
                }
                if let Some(node) = self.get_node(&edge.to_node).await? {
                    out.push(node);
                }
                queue.push_back((edge.to_node, depth + 1));
            }
        }
        Ok(out)
    }
}
