//! Graph module — the write and read paths of the mindmap engine.
//!
//! Provides the document model, tree ingestion, batch merge, projection,
//! suggestion persistence, and suggestion aggregation.

pub mod aggregate;
pub mod ingest;
pub mod merge;
pub mod project;
pub mod suggest;
pub mod types;

pub use aggregate::{AggregateOutcome, SuggestionAggregator};
pub use ingest::{IngestReport, TreeIngestor};
pub use merge::{EdgeSpec, GraphBatch, GraphMerger, MergeOutcome, NodeSpec};
pub use project::GraphProjector;
pub use suggest::{
    extract_filename_from_prompt, resolve_full_path, SuggestionOutcome, SuggestionPayload,
    SuggestionRecord, SuggestionWriter,
};
pub use types::{
    EdgeDoc, EdgeType, GraphView, NodeDoc, NodeType, RelatedFile, ResolvedFile, TreeNode,
};
