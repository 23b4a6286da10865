//! In-process graph store.
//!
//! Hash maps behind a `tokio::sync::RwLock`, with an optional JSON snapshot
//! on disk so the CLI can keep a graph across invocations. Collections are
//! implicit: a map exists from the moment its first node lands.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::graph::suggest::SuggestionRecord;
use crate::graph::types::{EdgeDoc, NodeDoc};
use crate::history::HistoryRecord;
use crate::identity::{EdgeKey, MapId, NodeKey};
use crate::store::GraphStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    nodes: HashMap<NodeKey, NodeDoc>,
    edges: HashMap<EdgeKey, EdgeDoc>,
    history: Vec<HistoryRecord>,
    #[serde(default)]
    suggestions: HashMap<String, SuggestionRecord>,
}

/// In-memory [`GraphStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a previously saved snapshot. A missing file yields an empty store.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = tokio::fs::read_to_string(path).await?;
        let collections: Collections = serde_json::from_str(&raw)?;
        debug!(
            nodes = collections.nodes.len(),
            edges = collections.edges.len(),
            "loaded store snapshot"
        );
        Ok(Self {
            inner: RwLock::new(collections),
        })
    }

    /// Write the current contents as a JSON snapshot.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let guard = self.inner.read().await;
        let raw = serde_json::to_string_pretty(&*guard)?;
        drop(guard);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn has_node(&self, key: &NodeKey) -> Result<bool> {
        Ok(self.inner.read().await.nodes.contains_key(key))
    }

    async fn get_node(&self, key: &NodeKey) -> Result<Option<NodeDoc>> {
        Ok(self.inner.read().await.nodes.get(key).cloned())
    }

    async fn put_node(&self, node: NodeDoc) -> Result<()> {
        self.inner.write().await.nodes.insert(node.key.clone(), node);
        Ok(())
    }

    async fn has_edge(&self, key: &EdgeKey) -> Result<bool> {
        Ok(self.inner.read().await.edges.contains_key(key))
    }

    async fn put_edge(&self, edge: EdgeDoc) -> Result<()> {
        self.inner.write().await.edges.insert(edge.key.clone(), edge);
        Ok(())
    }

    async fn nodes_by_map(&self, map_id: &MapId) -> Result<Vec<NodeDoc>> {
        Ok(self
            .inner
            .read()
            .await
            .nodes
            .values()
            .filter(|n| &n.map_id == map_id)
            .cloned()
            .collect())
    }

    async fn edges_by_map(&self, map_id: &MapId) -> Result<Vec<EdgeDoc>> {
        Ok(self
            .inner
            .read()
            .await
            .edges
            .values()
            .filter(|e| &e.map_id == map_id)
            .cloned()
            .collect())
    }

    async fn edges_from(&self, map_id: &MapId, from: &NodeKey) -> Result<Vec<EdgeDoc>> {
        Ok(self
            .inner
            .read()
            .await
            .edges
            .values()
            .filter(|e| &e.map_id == map_id && &e.from_node == from)
            .cloned()
            .collect())
    }

    async fn delete_map(&self, map_id: &MapId) -> Result<(usize, usize)> {
        let mut guard = self.inner.write().await;
        let nodes_before = guard.nodes.len();
        let edges_before = guard.edges.len();
        guard.nodes.retain(|_, n| &n.map_id != map_id);
        guard.edges.retain(|_, e| &e.map_id != map_id);
        guard.history.retain(|h| &h.map_id != map_id);
        guard.suggestions.retain(|_, s| &s.map_id != map_id);
        let removed = (
            nodes_before - guard.nodes.len(),
            edges_before - guard.edges.len(),
        );
        debug!(map = %map_id, nodes = removed.0, edges = removed.1, "deleted map");
        Ok(removed)
    }

    async fn append_history(&self, record: HistoryRecord) -> Result<()> {
        self.inner.write().await.history.push(record);
        Ok(())
    }

    async fn find_history(&self, map_id: &MapId, token: &str) -> Result<Option<HistoryRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .iter()
            .find(|h| &h.map_id == map_id && h.token.as_deref() == Some(token))
            .cloned())
    }

    async fn has_suggestion(&self, key: &str) -> Result<bool> {
        Ok(self.inner.read().await.suggestions.contains_key(key))
    }

    async fn get_suggestion(&self, key: &str) -> Result<Option<SuggestionRecord>> {
        Ok(self.inner.read().await.suggestions.get(key).cloned())
    }

    async fn put_suggestion(&self, record: SuggestionRecord) -> Result<()> {
        self.inner
            .write()
            .await
            .suggestions
            .insert(record.key.clone(), record);
        Ok(())
    }
}
