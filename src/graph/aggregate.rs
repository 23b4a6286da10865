//! Suggestion aggregation — one collection node per scope.
//!
//! Bulk suggestion runs produce one result per file; instead of littering
//! the map with sibling nodes, all results for a scope land in a single
//! aggregate node. Its key is derived from `(map_id, parent_key)` alone,
//! so every later run targets the same node and union-merges its items.
//!
//! The merge is a read-modify-write against one document and is not safe
//! under unmanaged concurrent callers for the same parent; the store's
//! last-write-wins is the only guarantee there.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::graph::types::{
    EdgeDoc, EdgeType, NodeDoc, NodeType, RelatedFile, ResolvedFile,
};
use crate::identity::{derive_edge_key, derive_node_key, MapId, NodeKey};
use crate::store::GraphStore;

/// What one aggregation call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOutcome {
    pub node_key: NodeKey,
    /// Item count after the merge.
    pub count: usize,
}

/// The aggregation engine. Cheap to clone; holds the injected store.
#[derive(Clone)]
pub struct SuggestionAggregator {
    store: Arc<dyn GraphStore>,
}

impl SuggestionAggregator {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Merge suggestion items into the aggregate node under `parent_key`.
    ///
    /// First call inserts the node and its edge from the parent; later
    /// calls union-merge: an incoming item replaces the stored one sharing
    /// its `suggestion_key` (or `file_path` when unkeyed), every other
    /// stored item is preserved.
    pub async fn upsert_aggregate(
        &self,
        map_id: &MapId,
        parent_key: &NodeKey,
        items: Vec<ResolvedFile>,
        label: &str,
    ) -> Result<AggregateOutcome> {
        let node_key = derive_node_key(
            map_id,
            NodeType::AggregatedSuggestions.discriminator(),
            parent_key.as_str(),
        );

        let merged = match self.store.get_node(&node_key).await? {
            Some(existing) => merge_items(existing.related_files, items),
            None => items,
        };
        let count = merged.len();

        self.store
            .put_node(NodeDoc {
                key: node_key.clone(),
                map_id: map_id.clone(),
                label: format!("{label} ({count})"),
                node_type: Some(NodeType::AggregatedSuggestions),
                related_files: merged.into_iter().map(RelatedFile::Resolved).collect(),
                meta: Some(serde_json::json!({ "count": count })),
            })
            .await?;

        let edge_key = derive_edge_key(parent_key, &node_key, EdgeType::Suggestion.as_str());
        if !self.store.has_edge(&edge_key).await? {
            self.store
                .put_edge(EdgeDoc {
                    key: edge_key,
                    map_id: map_id.clone(),
                    from_node: parent_key.clone(),
                    to_node: node_key.clone(),
                    edge_type: EdgeType::Suggestion,
                })
                .await?;
        }

        debug!(map = %map_id, parent = %parent_key, count, "aggregate upserted");
        Ok(AggregateOutcome { node_key, count })
    }
}

/// Identity of one item inside the aggregate: suggestion key when present,
/// file path otherwise.
fn item_identity(item: &ResolvedFile) -> &str {
    item.suggestion_key.as_deref().unwrap_or(&item.file_path)
}

fn merge_items(existing: Vec<RelatedFile>, incoming: Vec<ResolvedFile>) -> Vec<ResolvedFile> {
    // Stored aggregates hold object-form items, but tolerate bare refs
    // the way every other reader of related_files does.
    let mut merged: Vec<ResolvedFile> = existing
        .into_iter()
        .map(|entry| match entry {
            RelatedFile::Resolved(r) => r,
            RelatedFile::Ref(path) => ResolvedFile::new(path),
        })
        .collect();

    for item in incoming {
        match merged
            .iter_mut()
            .find(|held| item_identity(held) == item_identity(&item))
        {
            Some(held) => *held = item,
            None => merged.push(item),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn aggregator(store: &Arc<MemoryStore>) -> SuggestionAggregator {
        SuggestionAggregator::new(store.clone() as Arc<dyn GraphStore>)
    }

    fn item(path: &str, key: Option<&str>, status: &str) -> ResolvedFile {
        ResolvedFile {
            file_path: path.into(),
            suggestion_key: key.map(str::to_string),
            status: Some(status.into()),
            ..Default::default()
        }
    }

    async fn parent(store: &Arc<MemoryStore>, map: &MapId) -> NodeKey {
        let key = derive_node_key(map, "NODE", "scope");
        store
            .put_node(NodeDoc {
                key: key.clone(),
                map_id: map.clone(),
                label: "scope".into(),
                node_type: Some(NodeType::Concept),
                related_files: Vec::new(),
                meta: None,
            })
            .await
            .unwrap();
        key
    }

    #[tokio::test]
    async fn test_first_call_creates_node_and_edge() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let scope = parent(&store, &map).await;

        let outcome = aggregator(&store)
            .upsert_aggregate(
                &map,
                &scope,
                vec![item("A.java", Some("k1"), "created")],
                "AI suggestions",
            )
            .await
            .unwrap();

        assert_eq!(outcome.count, 1);
        let node = store.get_node(&outcome.node_key).await.unwrap().unwrap();
        assert_eq!(node.label, "AI suggestions (1)");
        assert_eq!(node.node_type, Some(NodeType::AggregatedSuggestions));
        assert_eq!(node.meta.unwrap()["count"], 1);

        let edges = store.edges_by_map(&map).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from_node, scope);
        assert_eq!(edges[0].to_node, outcome.node_key);
        assert_eq!(edges[0].edge_type, EdgeType::Suggestion);
    }

    #[tokio::test]
    async fn test_overlapping_item_takes_later_status() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let scope = parent(&store, &map).await;
        let engine = aggregator(&store);

        engine
            .upsert_aggregate(&map, &scope, vec![item("A.java", Some("k1"), "created")], "Label")
            .await
            .unwrap();

        let mut replacement = item("A.java", Some("k1"), "skipped");
        replacement.error = Some("x".into());
        let outcome = engine
            .upsert_aggregate(&map, &scope, vec![replacement], "Label")
            .await
            .unwrap();

        assert_eq!(outcome.count, 1, "no duplicate entry for k1");
        let node = store.get_node(&outcome.node_key).await.unwrap().unwrap();
        assert_eq!(node.related_files.len(), 1);
        match &node.related_files[0] {
            RelatedFile::Resolved(r) => {
                assert_eq!(r.status.as_deref(), Some("skipped"));
                assert_eq!(r.error.as_deref(), Some("x"));
            }
            RelatedFile::Ref(_) => panic!("aggregate item lost object form"),
        }
    }

    #[tokio::test]
    async fn test_unmatched_old_items_preserved() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let scope = parent(&store, &map).await;
        let engine = aggregator(&store);

        engine
            .upsert_aggregate(
                &map,
                &scope,
                vec![
                    item("A.java", Some("k1"), "created"),
                    item("B.java", Some("k2"), "created"),
                ],
                "Label",
            )
            .await
            .unwrap();

        let outcome = engine
            .upsert_aggregate(&map, &scope, vec![item("C.java", Some("k3"), "created")], "Label")
            .await
            .unwrap();

        assert_eq!(outcome.count, 3);
        let node = store.get_node(&outcome.node_key).await.unwrap().unwrap();
        assert_eq!(node.label, "Label (3)");
        let paths: Vec<&str> = node.related_files.iter().map(|f| f.path()).collect();
        assert_eq!(paths, vec!["A.java", "B.java", "C.java"]);
    }

    #[tokio::test]
    async fn test_unkeyed_items_merge_by_path() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let scope = parent(&store, &map).await;
        let engine = aggregator(&store);

        engine
            .upsert_aggregate(&map, &scope, vec![item("A.java", None, "created")], "Label")
            .await
            .unwrap();
        let outcome = engine
            .upsert_aggregate(&map, &scope, vec![item("A.java", None, "skipped")], "Label")
            .await
            .unwrap();

        assert_eq!(outcome.count, 1);
    }

    #[tokio::test]
    async fn test_one_aggregate_per_parent_ever() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let scope = parent(&store, &map).await;
        let engine = aggregator(&store);

        let first = engine
            .upsert_aggregate(&map, &scope, vec![item("A.java", Some("k1"), "created")], "First")
            .await
            .unwrap();
        let second = engine
            .upsert_aggregate(&map, &scope, vec![item("B.java", Some("k2"), "created")], "Second")
            .await
            .unwrap();

        assert_eq!(first.node_key, second.node_key);
        // Still a single edge from the parent.
        assert_eq!(store.edges_by_map(&map).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_aggregates_differ_across_parents() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = aggregator(&store);

        let scope_a = parent(&store, &map).await;
        let scope_b = derive_node_key(&map, "NODE", "other-scope");
        store
            .put_node(NodeDoc {
                key: scope_b.clone(),
                map_id: map.clone(),
                label: "other-scope".into(),
                node_type: Some(NodeType::Concept),
                related_files: Vec::new(),
                meta: None,
            })
            .await
            .unwrap();

        let a = engine
            .upsert_aggregate(&map, &scope_a, vec![], "Label")
            .await
            .unwrap();
        let b = engine
            .upsert_aggregate(&map, &scope_b, vec![], "Label")
            .await
            .unwrap();
        assert_ne!(a.node_key, b.node_key);
    }
}
