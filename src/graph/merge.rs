//! Graph upsert/merge — flat batches of node and edge descriptors.
//!
//! This is the write path behind "expand" and "refresh": the batch comes
//! out of an LLM and describes modifications, so unlike tree ingestion the
//! node writes use overwrite semantics (label/meta updates must take
//! effect). The output is noisy by nature; an edge referencing a node
//! nobody wrote is dropped silently, counted, and the merge carries on.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::graph::types::{EdgeDoc, EdgeType, NodeDoc, NodeType, RelatedFile};
use crate::history::HistoryRecord;
use crate::identity::{derive_edge_key, derive_node_key, MapId, NodeKey};
use crate::store::GraphStore;

/// One node descriptor in a merge batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Explicit key of an existing node; derived from the label when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<NodeKey>,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_files: Vec<RelatedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// One edge descriptor in a merge batch. Endpoints may reference nodes by
/// key or by batch label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<EdgeType>,
}

/// A flat (nodes, edges) batch to merge into a map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphBatch {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// What one merge call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Every node key the merge touched, for downstream highlighting.
    pub changed_nodes: Vec<NodeKey>,
    pub edges_written: usize,
    /// Edges skipped because an endpoint did not resolve to a known node.
    pub edges_dropped: usize,
    /// Node specs skipped for missing both key and label.
    pub nodes_skipped: usize,
    /// True when an idempotency token matched and the graph was untouched.
    pub replayed: bool,
}

/// The merge engine. Cheap to clone; holds the injected store.
#[derive(Clone)]
pub struct GraphMerger {
    store: Arc<dyn GraphStore>,
}

impl GraphMerger {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Merge a batch into `map_id`, deriving keys for unkeyed nodes from
    /// `(map_id, default_type, label)`.
    pub async fn upsert_graph(
        &self,
        map_id: &MapId,
        batch: &GraphBatch,
        default_type: NodeType,
    ) -> Result<MergeOutcome> {
        let mut outcome = MergeOutcome::default();
        // label -> key, for edges that reference nodes by batch label.
        let mut by_label: HashMap<String, NodeKey> = HashMap::new();

        for spec in &batch.nodes {
            let label = spec.label.trim();
            let key = match (&spec.key, label.is_empty()) {
                (Some(key), _) => key.clone(),
                (None, false) => derive_node_key(map_id, default_type.discriminator(), label),
                (None, true) => {
                    warn!(map = %map_id, "node spec without key or label, skipping");
                    outcome.nodes_skipped += 1;
                    continue;
                }
            };

            // Explicit-key updates may omit the label; keep the stored one.
            let label = if label.is_empty() {
                match self.store.get_node(&key).await? {
                    Some(existing) => existing.label,
                    None => {
                        warn!(map = %map_id, key = %key, "keyed node spec without label targets nothing, skipping");
                        outcome.nodes_skipped += 1;
                        continue;
                    }
                }
            } else {
                label.to_string()
            };

            self.store
                .put_node(NodeDoc {
                    key: key.clone(),
                    map_id: map_id.clone(),
                    label: label.clone(),
                    node_type: spec.node_type.or(Some(default_type)),
                    related_files: spec.related_files.clone(),
                    meta: spec.meta.clone(),
                })
                .await?;
            by_label.entry(label).or_insert_with(|| key.clone());
            if !outcome.changed_nodes.contains(&key) {
                outcome.changed_nodes.push(key);
            }
        }

        for spec in &batch.edges {
            let edge_type = spec.edge_type.unwrap_or_default();
            let from = self.resolve_endpoint(map_id, &spec.from, &by_label).await?;
            let to = self.resolve_endpoint(map_id, &spec.to, &by_label).await?;
            let (Some(from), Some(to)) = (from, to) else {
                // Documented tolerance for partial AI output.
                debug!(
                    map = %map_id,
                    from = %spec.from,
                    to = %spec.to,
                    "edge endpoint missing, dropping edge"
                );
                outcome.edges_dropped += 1;
                continue;
            };

            self.store
                .put_edge(EdgeDoc {
                    key: derive_edge_key(&from, &to, edge_type.as_str()),
                    map_id: map_id.clone(),
                    from_node: from,
                    to_node: to,
                    edge_type,
                })
                .await?;
            outcome.edges_written += 1;
        }

        debug!(
            map = %map_id,
            changed = outcome.changed_nodes.len(),
            edges = outcome.edges_written,
            dropped = outcome.edges_dropped,
            "graph batch merged"
        );
        Ok(outcome)
    }

    /// [`upsert_graph`](Self::upsert_graph) with prompt-history replay.
    ///
    /// When a token is supplied and a record with the same token already
    /// exists for this map, the recorded delta is returned and the graph
    /// is left untouched. Otherwise the merge runs and its delta is
    /// appended to the history.
    pub async fn upsert_graph_with_history(
        &self,
        map_id: &MapId,
        batch: &GraphBatch,
        default_type: NodeType,
        prompt: &str,
        token: Option<&str>,
    ) -> Result<MergeOutcome> {
        if let Some(token) = token {
            if let Some(record) = self.store.find_history(map_id, token).await? {
                debug!(map = %map_id, token, "replaying recorded merge");
                return Ok(MergeOutcome {
                    changed_nodes: record.changed_nodes,
                    replayed: true,
                    ..Default::default()
                });
            }
        }

        let outcome = self.upsert_graph(map_id, batch, default_type).await?;
        self.store
            .append_history(HistoryRecord::new(
                map_id.clone(),
                prompt,
                token.map(str::to_string),
                outcome.changed_nodes.clone(),
            ))
            .await?;
        Ok(outcome)
    }

    /// Resolve an edge endpoint reference to an existing node key.
    /// Accepts a batch label, a batch key, or the key of a stored node.
    async fn resolve_endpoint(
        &self,
        map_id: &MapId,
        reference: &str,
        by_label: &HashMap<String, NodeKey>,
    ) -> Result<Option<NodeKey>> {
        if let Some(key) = by_label.get(reference) {
            return Ok(Some(key.clone()));
        }
        let as_key = NodeKey(reference.to_string());
        if self.store.has_node(&as_key).await? {
            let in_map = self
                .store
                .get_node(&as_key)
                .await?
                .is_some_and(|n| &n.map_id == map_id);
            if in_map {
                return Ok(Some(as_key));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn merger(store: &Arc<MemoryStore>) -> GraphMerger {
        GraphMerger::new(store.clone() as Arc<dyn GraphStore>)
    }

    fn labeled(label: &str) -> NodeSpec {
        NodeSpec {
            label: label.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_merge_writes_nodes_and_edges() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let batch = GraphBatch {
            nodes: vec![labeled("Billing"), labeled("Invoice")],
            edges: vec![EdgeSpec {
                from: "Billing".into(),
                to: "Invoice".into(),
                edge_type: None,
            }],
        };

        let outcome = merger(&store)
            .upsert_graph(&map, &batch, NodeType::Concept)
            .await
            .unwrap();

        assert_eq!(outcome.changed_nodes.len(), 2);
        assert_eq!(outcome.edges_written, 1);
        assert_eq!(outcome.edges_dropped, 0);

        let edges = store.edges_by_map(&map).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::Related);
    }

    #[tokio::test]
    async fn test_merge_overwrites_label_and_meta() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = merger(&store);

        let first = GraphBatch {
            nodes: vec![labeled("Billing")],
            edges: vec![],
        };
        let outcome = engine
            .upsert_graph(&map, &first, NodeType::Concept)
            .await
            .unwrap();
        let key = outcome.changed_nodes[0].clone();

        // AI proposes a rename of the same node by explicit key.
        let rename = GraphBatch {
            nodes: vec![NodeSpec {
                key: Some(key.clone()),
                label: "Billing v2".into(),
                meta: Some(serde_json::json!({"refined": true})),
                ..Default::default()
            }],
            edges: vec![],
        };
        engine
            .upsert_graph(&map, &rename, NodeType::Concept)
            .await
            .unwrap();

        let node = store.get_node(&key).await.unwrap().unwrap();
        assert_eq!(node.label, "Billing v2");
        assert_eq!(node.meta.unwrap()["refined"], true);
    }

    #[tokio::test]
    async fn test_merge_same_batch_is_stable() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = merger(&store);
        let batch = GraphBatch {
            nodes: vec![labeled("A"), labeled("B")],
            edges: vec![EdgeSpec {
                from: "A".into(),
                to: "B".into(),
                edge_type: Some(EdgeType::Contains),
            }],
        };

        let first = engine
            .upsert_graph(&map, &batch, NodeType::Concept)
            .await
            .unwrap();
        let second = engine
            .upsert_graph(&map, &batch, NodeType::Concept)
            .await
            .unwrap();

        assert_eq!(first.changed_nodes, second.changed_nodes);
        assert_eq!(store.nodes_by_map(&map).await.unwrap().len(), 2);
        assert_eq!(store.edges_by_map(&map).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_endpoint_drops_edge_silently() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let batch = GraphBatch {
            nodes: vec![labeled("Real")],
            edges: vec![EdgeSpec {
                from: "Real".into(),
                to: "Phantom".into(),
                edge_type: None,
            }],
        };

        let outcome = merger(&store)
            .upsert_graph(&map, &batch, NodeType::Concept)
            .await
            .unwrap();
        assert_eq!(outcome.edges_written, 0);
        assert_eq!(outcome.edges_dropped, 1);
        assert!(store.edges_by_map(&map).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_resolves_against_stored_node() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = merger(&store);

        let seed = engine
            .upsert_graph(
                &map,
                &GraphBatch {
                    nodes: vec![labeled("Existing")],
                    edges: vec![],
                },
                NodeType::Concept,
            )
            .await
            .unwrap();
        let existing_key = seed.changed_nodes[0].clone();

        // New batch links to the stored node by its key.
        let batch = GraphBatch {
            nodes: vec![labeled("Fresh")],
            edges: vec![EdgeSpec {
                from: "Fresh".into(),
                to: existing_key.0.clone(),
                edge_type: None,
            }],
        };
        let outcome = engine
            .upsert_graph(&map, &batch, NodeType::Concept)
            .await
            .unwrap();
        assert_eq!(outcome.edges_written, 1);
    }

    #[tokio::test]
    async fn test_endpoint_in_other_map_is_missing() {
        let store = Arc::new(MemoryStore::new());
        let engine = merger(&store);

        let other = MapId("other".into());
        let seed = engine
            .upsert_graph(
                &other,
                &GraphBatch {
                    nodes: vec![labeled("Foreign")],
                    edges: vec![],
                },
                NodeType::Concept,
            )
            .await
            .unwrap();
        let foreign_key = seed.changed_nodes[0].clone();

        let map = MapId("repoX".into());
        let batch = GraphBatch {
            nodes: vec![labeled("Local")],
            edges: vec![EdgeSpec {
                from: "Local".into(),
                to: foreign_key.0.clone(),
                edge_type: None,
            }],
        };
        let outcome = engine
            .upsert_graph(&map, &batch, NodeType::Concept)
            .await
            .unwrap();
        assert_eq!(outcome.edges_dropped, 1, "cross-map endpoints never link");
    }

    #[tokio::test]
    async fn test_spec_without_key_or_label_skipped() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let batch = GraphBatch {
            nodes: vec![NodeSpec::default(), labeled("Fine")],
            edges: vec![],
        };

        let outcome = merger(&store)
            .upsert_graph(&map, &batch, NodeType::Concept)
            .await
            .unwrap();
        assert_eq!(outcome.nodes_skipped, 1);
        assert_eq!(outcome.changed_nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_history_token_replays_without_writes() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = merger(&store);
        let batch = GraphBatch {
            nodes: vec![labeled("Expand")],
            edges: vec![],
        };

        let first = engine
            .upsert_graph_with_history(&map, &batch, NodeType::Concept, "expand billing", Some("tok-1"))
            .await
            .unwrap();
        assert!(!first.replayed);

        // Same token, different batch: nothing new is written.
        let other = GraphBatch {
            nodes: vec![labeled("ShouldNotAppear")],
            edges: vec![],
        };
        let replay = engine
            .upsert_graph_with_history(&map, &other, NodeType::Concept, "expand billing", Some("tok-1"))
            .await
            .unwrap();

        assert!(replay.replayed);
        assert_eq!(replay.changed_nodes, first.changed_nodes);
        let labels: Vec<String> = store
            .nodes_by_map(&map)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.label)
            .collect();
        assert!(!labels.contains(&"ShouldNotAppear".to_string()));
    }
}
