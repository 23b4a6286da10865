//! Blob store collaborator contract.
//!
//! The engine never fetches or unzips repositories itself; it consumes the
//! downloaded file bodies and metadata through this narrow seam. Projection
//! uses `list_files` to build its filename index; suggestion flows use
//! `file_content` to hand original code to the external generator.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// Metadata of one stored repository file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Key/value access to downloaded repository files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The raw body of `(repo_id, path)`, if stored.
    async fn file_content(&self, repo_id: &str, path: &str) -> Result<Option<String>>;
    /// Metadata of every stored file of a repository.
    async fn list_files(&self, repo_id: &str) -> Result<Vec<FileMeta>>;
}

/// In-memory [`BlobStore`] used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    files: RwLock<HashMap<(String, String), (FileMeta, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one file body with its metadata.
    pub async fn put_file(&self, repo_id: &str, meta: FileMeta, content: impl Into<String>) {
        self.files.write().await.insert(
            (repo_id.to_string(), meta.path.clone()),
            (meta, content.into()),
        );
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn file_content(&self, repo_id: &str, path: &str) -> Result<Option<String>> {
        Ok(self
            .files
            .read()
            .await
            .get(&(repo_id.to_string(), path.to_string()))
            .map(|(_, content)| content.clone()))
    }

    async fn list_files(&self, repo_id: &str) -> Result<Vec<FileMeta>> {
        Ok(self
            .files
            .read()
            .await
            .iter()
            .filter(|((repo, _), _)| repo == repo_id)
            .map(|(_, (meta, _))| meta.clone())
            .collect())
    }
}
