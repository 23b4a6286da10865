//! Error types for the mindgraph engine.
//!
//! The taxonomy follows the engine's propagation policy: storage failures
//! abort the whole operation and reach the caller unchanged; structural
//! problems local to one node or edge are tolerated in place (skipped and
//! counted) and never surface as errors.

use thiserror::Error;

/// All errors the mindgraph engine can return.
#[derive(Debug, Error)]
pub enum MindgraphError {
    /// The graph store could not be reached or failed mid-operation.
    /// Surfaced verbatim; the engine never retries internally.
    #[error("graph store unavailable: {0}")]
    StoreUnavailable(String),

    /// A whole input was unusable (not the per-node tolerance — a tree or
    /// batch that cannot be processed at all, e.g. a root missing its label).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A parallel ingestion worker failed; carries the first child failure.
    #[error("tree ingestion failed: {0}")]
    IngestFailed(String),

    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MindgraphError>;
