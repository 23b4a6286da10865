//! Graph projection — reconstructs a renderable graph for one map.
//!
//! Stored `related_files` lists are heterogeneous (bare names from old
//! writers, objects from new ones). Projection is the single place that
//! normalizes them: bare refs are resolved against a per-map filename
//! index built from the blob store, unresolved names are flagged rather
//! than dropped, and nodes left with no files at all get up to two fuzzy
//! associations marked `suggested` — never silently presented as truth.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::blob::{BlobStore, FileMeta};
use crate::config::FuzzyConfig;
use crate::error::Result;
use crate::fuzzy::suggest_files;
use crate::graph::types::{GraphView, NodeDoc, RelatedFile, ResolvedFile};
use crate::identity::{MapId, NodeKey};
use crate::store::GraphStore;

/// The projection engine. Cheap to clone; holds the injected stores.
#[derive(Clone)]
pub struct GraphProjector {
    store: Arc<dyn GraphStore>,
    blobs: Arc<dyn BlobStore>,
    config: FuzzyConfig,
}

impl GraphProjector {
    pub fn new(store: Arc<dyn GraphStore>, blobs: Arc<dyn BlobStore>, config: FuzzyConfig) -> Self {
        Self {
            store,
            blobs,
            config,
        }
    }

    /// Project one map into plain node and edge lists.
    ///
    /// Output ordering is not guaranteed; callers may rely on it for
    /// display only.
    pub async fn project_graph(&self, map_id: &MapId) -> Result<GraphView> {
        let edges = self.store.edges_by_map(map_id).await?;

        let mut referenced: HashSet<NodeKey> = HashSet::new();
        for edge in &edges {
            referenced.insert(edge.from_node.clone());
            referenced.insert(edge.to_node.clone());
        }

        let files = self.blobs.list_files(map_id.as_str()).await?;
        let index = FileIndex::build(&files);

        let mut nodes = Vec::with_capacity(referenced.len());
        for key in referenced {
            let Some(mut node) = self.store.get_node(&key).await? else {
                continue;
            };
            self.normalize_related_files(&mut node, &index);
            nodes.push(node);
        }

        debug!(
            map = %map_id,
            nodes = nodes.len(),
            edges = edges.len(),
            "projected graph"
        );
        Ok(GraphView { nodes, edges })
    }

    fn normalize_related_files(&self, node: &mut NodeDoc, index: &FileIndex) {
        let entries = std::mem::take(&mut node.related_files);
        let mut normalized: Vec<RelatedFile> = entries
            .into_iter()
            .map(|entry| match entry {
                RelatedFile::Resolved(r) => RelatedFile::Resolved(r),
                RelatedFile::Ref(name) => RelatedFile::Resolved(index.resolve(&name)),
            })
            .collect();

        if normalized.is_empty() {
            for suggestion in suggest_files(
                &node.label,
                index.paths(),
                self.config.threshold,
                self.config.max_suggestions,
            ) {
                let mut resolved = index.resolve(&suggestion.path);
                resolved.unresolved = false;
                resolved.suggested = true;
                normalized.push(RelatedFile::Resolved(resolved));
            }
        }

        node.related_files = normalized;
    }
}

/// Per-map lookup from bare file name to its stored metadata.
struct FileIndex<'a> {
    by_name: HashMap<&'a str, &'a FileMeta>,
    files: &'a [FileMeta],
}

impl<'a> FileIndex<'a> {
    fn build(files: &'a [FileMeta]) -> Self {
        let mut by_name: HashMap<&str, &FileMeta> = HashMap::new();
        for meta in files {
            let name = meta.path.rsplit('/').next().unwrap_or(&meta.path);
            // Ambiguous names keep the shortest (most canonical) path.
            by_name
                .entry(name)
                .and_modify(|held| {
                    if meta.path.len() < held.path.len() {
                        *held = meta;
                    }
                })
                .or_insert(meta);
        }
        Self { by_name, files }
    }

    fn paths(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.files.iter().map(|m| m.path.as_str())
    }

    /// Resolve a bare name or path to the object form. An unknown name
    /// keeps its original text and gets the `unresolved` flag.
    fn resolve(&self, name_or_path: &str) -> ResolvedFile {
        if let Some(meta) = self
            .files
            .iter()
            .find(|m| m.path == name_or_path)
            .or_else(|| {
                let name = name_or_path.rsplit('/').next().unwrap_or(name_or_path);
                self.by_name.get(name).copied()
            })
        {
            ResolvedFile {
                file_path: meta.path.clone(),
                language: meta.language.clone(),
                size: meta.size,
                ..Default::default()
            }
        } else {
            ResolvedFile {
                file_path: name_or_path.to_string(),
                unresolved: true,
                ..Default::default()
            }
        }
    }
}
