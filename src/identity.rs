//! Deterministic identity derivation for maps, nodes, and edges.
//!
//! Every key in the graph is a pure function of semantic content — never a
//! random ID. Re-deriving a key from the same inputs always yields the same
//! value, which is what makes replayed ingestion a no-op instead of a
//! duplicate. Keys are 12-hex-char truncations of a blake3 hash; collisions
//! are an accepted low-probability risk rather than a defended case.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width of a derived key, in hex characters.
const KEY_WIDTH: usize = 12;

/// Map id used when a repository locator is empty.
const UNKNOWN_MAP: &str = "unknown-repo";

/// A graph namespace, derived from a repository locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

/// Deterministic identifier of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub String);

/// Deterministic identifier of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeKey(pub String);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MapId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl NodeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EdgeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn short_hash(input: &str) -> String {
    let digest = blake3::hash(input.as_bytes());
    digest.to_hex().as_str()[..KEY_WIDTH].to_string()
}

/// Derive the map id for a repository locator.
///
/// The id is the last non-empty path segment with trailing slashes
/// stripped — `https://github.com/user/repo/` becomes `repo`. An empty
/// locator maps to a constant sentinel; that is a documented edge case,
/// not an error.
pub fn derive_map_id(repo_locator: &str) -> MapId {
    let trimmed = repo_locator.trim().trim_end_matches('/');
    let segment = trimmed.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
    if segment.is_empty() {
        MapId(UNKNOWN_MAP.to_string())
    } else {
        MapId(segment.to_string())
    }
}

/// Derive a node key from `(map_id, discriminator, label)`.
///
/// The discriminator keeps nodes playing different roles apart even when
/// their labels collide (a concept named "Billing" and a file node named
/// "Billing" get distinct keys).
pub fn derive_node_key(map_id: &MapId, discriminator: &str, label: &str) -> NodeKey {
    NodeKey(short_hash(&format!(
        "{}\u{1f}{}\u{1f}{}",
        map_id.0, discriminator, label
    )))
}

/// Derive the idempotence key of a code suggestion from what produced it:
/// the repository, the target file, and the prompt. Re-running the same
/// request lands on the same record.
pub fn derive_suggestion_key(repo_locator: &str, file_path: &str, prompt: &str) -> String {
    short_hash(&format!(
        "{repo_locator}\u{1f}{file_path}\u{1f}{prompt}"
    ))
}

/// Derive an edge key from the ordered `(from, to, edge_type)` triple.
pub fn derive_edge_key(from: &NodeKey, to: &NodeKey, edge_type: &str) -> EdgeKey {
    EdgeKey(short_hash(&format!(
        "{}\u{1f}{}\u{1f}{}",
        from.0, to.0, edge_type
    )))
}
