//! Suggestion persistence — single AI code suggestions as graph nodes.
//!
//! The LLM generator itself is an external collaborator; this module only
//! persists what it returned. Everything is keyed deterministically from
//! what produced the suggestion, so retried requests land on the records
//! they already created instead of branching the map again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blob::FileMeta;
use crate::error::Result;
use crate::graph::types::{EdgeDoc, EdgeType, NodeDoc, NodeType, RelatedFile};
use crate::identity::{
    derive_edge_key, derive_node_key, derive_suggestion_key, MapId, NodeKey,
};
use crate::store::GraphStore;

/// File extensions the suggestion flows consider source code.
pub const CODE_EXTS: &[&str] = &[
    ".java", ".kt", ".py", ".ts", ".js", ".go", ".rb", ".cs", ".cpp", ".rs",
];

/// Suggested code bodies are capped at this many bytes before persisting.
const MAX_CODE_BYTES: usize = 80_000;

/// What the external suggestion generator returned for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionPayload {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub rationale: String,
}

/// A persisted suggestion, stored in the side collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub key: String,
    pub map_id: MapId,
    pub repo_locator: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_node_key: Option<NodeKey>,
    pub prompt: String,
    pub code: String,
    pub summary: String,
    pub rationale: String,
    /// "success" when the generator produced code, "failed" otherwise.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// What persisting one suggestion produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionOutcome {
    pub node_key: NodeKey,
    pub suggestion_key: String,
    pub label: String,
}

/// The suggestion persistence engine. Cheap to clone.
#[derive(Clone)]
pub struct SuggestionWriter {
    store: Arc<dyn GraphStore>,
}

impl SuggestionWriter {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Persist one generator result: the record, a suggestion node, and an
    /// edge branching off the source node. Every write is idempotent.
    pub async fn create_suggestion(
        &self,
        map_id: &MapId,
        repo_locator: &str,
        file_path: &str,
        prompt: &str,
        source_node: Option<&NodeKey>,
        payload: &SuggestionPayload,
    ) -> Result<SuggestionOutcome> {
        let suggestion_key = derive_suggestion_key(repo_locator, file_path, prompt);
        let status = if payload.code.trim().is_empty() {
            "failed"
        } else {
            "success"
        };

        let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
        let label = format!("[AI] {file_name} suggestion #{suggestion_key}");
        let node_key = derive_node_key(map_id, NodeType::Suggestion.discriminator(), &label);

        if !self.store.has_suggestion(&suggestion_key).await? {
            self.store
                .put_suggestion(SuggestionRecord {
                    key: suggestion_key.clone(),
                    map_id: map_id.clone(),
                    repo_locator: repo_locator.to_string(),
                    file_path: file_path.to_string(),
                    source_node_key: source_node.cloned(),
                    prompt: prompt.to_string(),
                    code: truncate_utf8(&payload.code, MAX_CODE_BYTES).to_string(),
                    summary: payload.summary.clone(),
                    rationale: payload.rationale.clone(),
                    status: status.to_string(),
                    created_at: Utc::now(),
                })
                .await?;
        }

        if !self.store.has_node(&node_key).await? {
            self.store
                .put_node(NodeDoc {
                    key: node_key.clone(),
                    map_id: map_id.clone(),
                    label: label.clone(),
                    node_type: Some(NodeType::Suggestion),
                    related_files: vec![RelatedFile::Ref(file_path.to_string())],
                    meta: Some(serde_json::json!({ "suggestion_key": suggestion_key })),
                })
                .await?;
        }

        if let Some(source) = source_node {
            let edge_key = derive_edge_key(source, &node_key, EdgeType::Suggestion.as_str());
            if !self.store.has_edge(&edge_key).await? {
                self.store
                    .put_edge(EdgeDoc {
                        key: edge_key,
                        map_id: map_id.clone(),
                        from_node: source.clone(),
                        to_node: node_key.clone(),
                        edge_type: EdgeType::Suggestion,
                    })
                    .await?;
            }
        }

        debug!(map = %map_id, key = %suggestion_key, status, "suggestion persisted");
        Ok(SuggestionOutcome {
            node_key,
            suggestion_key,
            label,
        })
    }

    /// Find the node a suggestion for `file_path` should branch from: any
    /// node already referencing the file, else a freshly created file node.
    pub async fn resolve_source_node(&self, map_id: &MapId, file_path: &str) -> Result<NodeKey> {
        for node in self.store.nodes_by_map(map_id).await? {
            if node.related_files.iter().any(|f| f.path() == file_path) {
                return Ok(node.key);
            }
        }

        let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
        let label = format!("[FILE] {file_name}");
        let key = derive_node_key(map_id, NodeType::File.discriminator(), &label);
        if !self.store.has_node(&key).await? {
            self.store
                .put_node(NodeDoc {
                    key: key.clone(),
                    map_id: map_id.clone(),
                    label,
                    node_type: Some(NodeType::File),
                    related_files: vec![RelatedFile::Ref(file_path.to_string())],
                    meta: None,
                })
                .await?;
        }
        Ok(key)
    }

    /// Collect deduplicated `(source_node, full_path)` pairs from a node
    /// and its outbound subtree — the input of bulk suggestion runs.
    pub async fn gather_files(
        &self,
        map_id: &MapId,
        start: &NodeKey,
        files: &[FileMeta],
        max_depth: usize,
        max_files: usize,
    ) -> Result<Vec<(NodeKey, String)>> {
        let Some(start_node) = self.store.get_node(start).await? else {
            return Ok(Vec::new());
        };
        let mut nodes = vec![start_node];
        nodes.extend(
            self.store
                .traverse_outbound(map_id, start, max_depth, None)
                .await?,
        );

        let mut out: Vec<(NodeKey, String)> = Vec::new();
        for node in &nodes {
            for entry in &node.related_files {
                let raw = entry.path();
                if !has_code_ext(raw) {
                    continue;
                }
                let full = resolve_full_path(files, raw).unwrap_or_else(|| raw.to_string());
                if out.iter().any(|(src, path)| src == start && path == &full) {
                    continue;
                }
                out.push((start.clone(), full));
                if out.len() >= max_files {
                    return Ok(out);
                }
            }
        }
        Ok(out)
    }
}

fn has_code_ext(path: &str) -> bool {
    let lowered = path.to_lowercase();
    CODE_EXTS.iter().any(|ext| lowered.ends_with(ext))
}

/// Truncate to a byte budget without splitting a UTF-8 sequence.
fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Rank score of a candidate path: main-tree paths first, test paths
/// last, shorter paths before longer ones.
fn path_rank(path: &str) -> (i32, usize) {
    let mut score = 0;
    if path.contains("src/main") {
        score -= 10;
    }
    if path.contains("/test/") || path.contains("src/test") {
        score += 10;
    }
    (score, path.len())
}

/// Resolve a bare file name to a full repository path.
///
/// Inputs that already carry a directory are taken as-is. Bare names are
/// matched against stored file metadata by suffix and ranked with
/// [`path_rank`]; no match yields `None`.
pub fn resolve_full_path(files: &[FileMeta], name_or_path: &str) -> Option<String> {
    if name_or_path.is_empty() {
        return None;
    }
    if name_or_path.contains('/') {
        return Some(name_or_path.to_string());
    }

    let mut candidates: Vec<&str> = files
        .iter()
        .map(|m| m.path.as_str())
        .filter(|p| {
            *p == name_or_path
                || p.ends_with(&format!("/{name_or_path}"))
                || p.ends_with(name_or_path)
        })
        .collect();
    candidates.sort_by_key(|p| path_rank(p));
    candidates.dedup();
    candidates.first().map(|p| p.to_string())
}

/// Pull the first code-file name out of a free-text prompt, if any.
pub fn extract_filename_from_prompt(prompt: &str) -> Option<String> {
    let is_path_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '.');
    for run in prompt.split(|c: char| !is_path_char(c)) {
        if run.is_empty() || !has_code_ext(run) {
            continue;
        }
        let name = run.rsplit('/').next().unwrap_or(run);
        return Some(name.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn writer(store: &Arc<MemoryStore>) -> SuggestionWriter {
        SuggestionWriter::new(store.clone() as Arc<dyn GraphStore>)
    }

    fn meta(path: &str) -> FileMeta {
        FileMeta {
            path: path.into(),
            language: None,
            size: None,
        }
    }

    #[tokio::test]
    async fn test_create_suggestion_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = writer(&store);
        let payload = SuggestionPayload {
            code: "class A {}".into(),
            summary: "tidied".into(),
            rationale: "less noise".into(),
        };

        let first = engine
            .create_suggestion(&map, "https://x/repoX", "src/A.java", "tidy", None, &payload)
            .await
            .unwrap();
        let replay = engine
            .create_suggestion(&map, "https://x/repoX", "src/A.java", "tidy", None, &payload)
            .await
            .unwrap();

        assert_eq!(first, replay);
        assert_eq!(store.nodes_by_map(&map).await.unwrap().len(), 1);
        let record = store
            .get_suggestion(&first.suggestion_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "success");
    }

    #[tokio::test]
    async fn test_empty_code_marks_failed() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let outcome = writer(&store)
            .create_suggestion(
                &map,
                "https://x/repoX",
                "src/A.java",
                "tidy",
                None,
                &SuggestionPayload::default(),
            )
            .await
            .unwrap();

        let record = store
            .get_suggestion(&outcome.suggestion_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "failed");
    }

    #[tokio::test]
    async fn test_suggestion_edge_from_source_node() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = writer(&store);

        let source = engine.resolve_source_node(&map, "src/A.java").await.unwrap();
        let outcome = engine
            .create_suggestion(
                &map,
                "https://x/repoX",
                "src/A.java",
                "tidy",
                Some(&source),
                &SuggestionPayload {
                    code: "x".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let edges = store.edges_by_map(&map).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from_node, source);
        assert_eq!(edges[0].to_node, outcome.node_key);
        assert_eq!(edges[0].edge_type, EdgeType::Suggestion);
    }

    #[tokio::test]
    async fn test_resolve_source_prefers_existing_reference() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = writer(&store);

        let existing = derive_node_key(&map, "NODE", "Answer");
        store
            .put_node(NodeDoc {
                key: existing.clone(),
                map_id: map.clone(),
                label: "Answer".into(),
                node_type: Some(NodeType::Concept),
                related_files: vec![RelatedFile::Ref("src/A.java".into())],
                meta: None,
            })
            .await
            .unwrap();

        let resolved = engine.resolve_source_node(&map, "src/A.java").await.unwrap();
        assert_eq!(resolved, existing);

        // An unreferenced file gets a fresh file node instead.
        let fresh = engine.resolve_source_node(&map, "src/B.java").await.unwrap();
        assert_ne!(fresh, existing);
        let node = store.get_node(&fresh).await.unwrap().unwrap();
        assert_eq!(node.node_type, Some(NodeType::File));
        assert_eq!(node.label, "[FILE] B.java");
    }

    #[tokio::test]
    async fn test_gather_files_walks_subtree() {
        let store = Arc::new(MemoryStore::new());
        let map = MapId("repoX".into());
        let engine = writer(&store);

        let parent_key = derive_node_key(&map, "NODE", "parent");
        let child_key = derive_node_key(&map, "NODE", "child");
        store
            .put_node(NodeDoc {
                key: parent_key.clone(),
                map_id: map.clone(),
                label: "parent".into(),
                node_type: Some(NodeType::Concept),
                related_files: vec![RelatedFile::Ref("A.java".into())],
                meta: None,
            })
            .await
            .unwrap();
        store
            .put_node(NodeDoc {
                key: child_key.clone(),
                map_id: map.clone(),
                label: "child".into(),
                node_type: Some(NodeType::Concept),
                related_files: vec![
                    RelatedFile::Ref("B.java".into()),
                    RelatedFile::Ref("notes.md".into()),
                ],
                meta: None,
            })
            .await
            .unwrap();
        store
            .put_edge(EdgeDoc {
                key: derive_edge_key(&parent_key, &child_key, "contains"),
                map_id: map.clone(),
                from_node: parent_key.clone(),
                to_node: child_key,
                edge_type: EdgeType::Contains,
            })
            .await
            .unwrap();

        let files = vec![meta("src/main/java/A.java"), meta("src/main/java/B.java")];
        let gathered = engine
            .gather_files(&map, &parent_key, &files, 3, 20)
            .await
            .unwrap();

        let paths: Vec<&str> = gathered.iter().map(|(_, p)| p.as_str()).collect();
        assert_eq!(paths, vec!["src/main/java/A.java", "src/main/java/B.java"]);
        // Non-code files never make it in.
        assert!(!paths.iter().any(|p| p.ends_with(".md")));
    }

    #[test]
    fn test_resolve_full_path_prefers_main_over_test() {
        let files = vec![
            meta("src/test/java/AController.java"),
            meta("src/main/java/AController.java"),
        ];
        assert_eq!(
            resolve_full_path(&files, "AController.java").as_deref(),
            Some("src/main/java/AController.java")
        );
    }

    #[test]
    fn test_resolve_full_path_passthrough_and_miss() {
        let files = vec![meta("src/main/java/A.java")];
        assert_eq!(
            resolve_full_path(&files, "lib/custom/Path.java").as_deref(),
            Some("lib/custom/Path.java")
        );
        assert!(resolve_full_path(&files, "Missing.java").is_none());
        assert!(resolve_full_path(&files, "").is_none());
    }

    #[test]
    fn test_extract_filename_from_prompt() {
        assert_eq!(
            extract_filename_from_prompt("please clean up src/main/java/Answer.java for me")
                .as_deref(),
            Some("Answer.java")
        );
        assert_eq!(
            extract_filename_from_prompt("refactor user_service.py").as_deref(),
            Some("user_service.py")
        );
        assert!(extract_filename_from_prompt("make everything faster").is_none());
    }

    #[test]
    fn test_truncate_utf8_respects_boundaries() {
        // '한' is 3 bytes; a 4-byte budget must not split the second char.
        let s = "한한";
        assert_eq!(truncate_utf8(s, 4), "한");
        assert_eq!(truncate_utf8(s, 6), "한한");
    }
}
