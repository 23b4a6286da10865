//! Engine configuration.
//!
//! Loaded from a TOML file; every field has a default so an absent file or
//! an empty table is valid. The ingest concurrency ceiling defaults low on
//! purpose — parallel ingestion exists to avoid exhausting the shared store
//! connection pool, not to saturate it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MindgraphError, Result};

/// Top-level configuration for the mindgraph engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub fuzzy: FuzzyConfig,
    pub scope: ScopeConfig,
}

/// Tree ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Fan sibling subtrees out across a bounded worker pool.
    pub parallel: bool,
    /// Concurrency ceiling for parallel ingestion.
    pub max_concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_concurrency: 3,
        }
    }
}

/// Fuzzy file-association settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Minimum Jaccard similarity for an accepted association.
    pub threshold: f32,
    /// Cap on suggested files per node.
    pub max_suggestions: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            threshold: crate::fuzzy::SIMILARITY_THRESHOLD,
            max_suggestions: crate::fuzzy::MAX_FILE_SUGGESTIONS,
        }
    }
}

/// Prompt-to-scope resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Salient-term cap extracted from one prompt.
    pub max_terms: usize,
    /// How many scope candidates to return.
    pub top_n: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            max_terms: crate::fuzzy::MAX_SCOPE_TERMS,
            top_n: 3,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| MindgraphError::Config(e.to_string()))
    }
}
