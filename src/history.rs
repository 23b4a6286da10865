//! Prompt history bookkeeping.
//!
//! Every "expand" style merge can record what it changed, keyed by an
//! externally supplied idempotency token. Replaying a request with the same
//! token returns the recorded delta instead of touching the graph again.
//! Records are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{derive_node_key, MapId, NodeKey};

/// Append-only record of a natural-language request and its graph delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub key: NodeKey,
    pub map_id: MapId,
    pub prompt: String,
    /// Caller-supplied idempotency token, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Node keys touched by the merge this record describes.
    pub changed_nodes: Vec<NodeKey>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        map_id: MapId,
        prompt: impl Into<String>,
        token: Option<String>,
        changed_nodes: Vec<NodeKey>,
    ) -> Self {
        let prompt = prompt.into();
        // History keys reuse node key derivation with their own role tag;
        // tokenless records fall back to the prompt text.
        let discriminant = token.clone().unwrap_or_else(|| prompt.clone());
        let key = derive_node_key(&map_id, "HIST", &discriminant);
        Self {
            key,
            map_id,
            prompt,
            token,
            changed_nodes,
            created_at: Utc::now(),
        }
    }
}
