//! Core types for the mindmap graph.
//!
//! Defines node/edge documents as they live in the graph store, the
//! heterogeneous `related_files` representation, and the tree shape
//! consumed by ingestion.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::{EdgeKey, MapId, NodeKey};

/// The kind of a node in the mindmap graph.
///
/// The set is open on read: legacy documents may carry no type at all,
/// which is why [`NodeDoc::node_type`] is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A generic concept produced by summarization or manual input.
    Concept,
    /// A node standing in for one source file.
    File,
    /// A single AI code suggestion.
    Suggestion,
    /// One node collecting many per-file suggestion results.
    AggregatedSuggestions,
}

impl NodeType {
    /// The discriminator string mixed into node key derivation.
    pub fn discriminator(&self) -> &'static str {
        match self {
            NodeType::Concept => "NODE",
            NodeType::File => "FILE",
            NodeType::Suggestion => "SUGG",
            NodeType::AggregatedSuggestions => "AGG",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Concept => write!(f, "concept"),
            NodeType::File => write!(f, "file"),
            NodeType::Suggestion => write!(f, "suggestion"),
            NodeType::AggregatedSuggestions => write!(f, "aggregated_suggestions"),
        }
    }
}

/// The kind of an edge (relationship) in the mindmap graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Parent concept contains a child concept (tree structure).
    Contains,
    /// Source node branches to an AI suggestion node.
    Suggestion,
    /// Generic relation proposed by an expand/refresh batch.
    #[default]
    Related,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "contains",
            EdgeType::Suggestion => "suggestion",
            EdgeType::Related => "related",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a node's `related_files` list.
///
/// Stored documents are heterogeneous: older writers persisted bare file
/// names or paths, newer ones the object form. Both deserialize here; the
/// projection layer normalizes everything to [`ResolvedFile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelatedFile {
    /// Full object form.
    Resolved(ResolvedFile),
    /// Bare file name or path.
    Ref(String),
}

impl RelatedFile {
    /// The path (or bare name) this entry points at.
    pub fn path(&self) -> &str {
        match self {
            RelatedFile::Ref(p) => p,
            RelatedFile::Resolved(r) => &r.file_path,
        }
    }
}

/// The normalized object form of a related file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedFile {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Links a suggestion item back to its stored suggestion record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion_key: Option<String>,
    /// Per-item outcome inside an aggregate ("created", "skipped", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a bare ref could not be matched to a known repo file.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved: bool,
    /// Set when the association came from fuzzy matching, not ground truth.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suggested: bool,
}

impl ResolvedFile {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }
}

/// A node document as persisted in the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDoc {
    /// Deterministic key; never changes after creation.
    pub key: NodeKey,
    /// The namespace this node belongs to; never changes after creation.
    pub map_id: MapId,
    pub label: String,
    /// Absent for legacy/untyped documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_files: Vec<RelatedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// An edge document as persisted in the graph store. Directed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDoc {
    pub key: EdgeKey,
    pub map_id: MapId,
    pub from_node: NodeKey,
    pub to_node: NodeKey,
    pub edge_type: EdgeType,
}

/// A nested label/children tree, as produced by AI summarization or
/// manual input. Untrusted: `label` may be missing on any node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default, alias = "node", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_files: Vec<RelatedFile>,
}

impl TreeNode {
    /// A leaf with just a label — handy in tests and manual input.
    pub fn leaf(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn branch(label: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            label: Some(label.into()),
            children,
            related_files: Vec::new(),
        }
    }
}

/// A renderable projection of one map: plain node and edge lists.
/// Array order carries no meaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<NodeDoc>,
    pub edges: Vec<EdgeDoc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_related_file_both_shapes_deserialize() {
        let bare: RelatedFile = serde_json::from_str(r#""Answer.java""#).unwrap();
        assert_eq!(bare, RelatedFile::Ref("Answer.java".to_string()));

        let object: RelatedFile =
            serde_json::from_str(r#"{"file_path":"src/Answer.java","language":"java","size":120}"#)
                .unwrap();
        match object {
            RelatedFile::Resolved(r) => {
                assert_eq!(r.file_path, "src/Answer.java");
                assert_eq!(r.language.as_deref(), Some("java"));
                assert_eq!(r.size, Some(120));
            }
            RelatedFile::Ref(_) => panic!("object form parsed as bare ref"),
        }
    }

    #[test]
    fn test_tree_node_accepts_node_alias() {
        // The summarizer emits {"node": "...", "children": [...]}.
        let tree: TreeNode = serde_json::from_str(
            r#"{"node":"Answer","children":[{"node":"delete","children":[]}]}"#,
        )
        .unwrap();
        assert_eq!(tree.label.as_deref(), Some("Answer"));
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].label.as_deref(), Some("delete"));
    }

    #[test]
    fn test_node_doc_without_type_roundtrips() {
        let json = r#"{"key":"abc123","map_id":"repoX","label":"legacy"}"#;
        let node: NodeDoc = serde_json::from_str(json).unwrap();
        assert!(node.node_type.is_none());
        assert!(node.related_files.is_empty());

        let out = serde_json::to_string(&node).unwrap();
        assert!(!out.contains("node_type"));
    }
}
