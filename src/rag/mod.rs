//! Law-text retrieval.
//!
//! This module provides:
//! - `DocumentChunk` and its content-derived id
//! - `ChunkStore` / `SqliteChunkStore`: embedded chunk persistence
//! - `VectorIndex` / `EmbeddingIndex`: text-level insert, delete and search
//! - `RetrievalEngine`: keyword search partitioned into title/body buckets
//! - `MergePolicy`: truncation of oversized buckets before prompting

pub mod chunk;
pub mod index;
pub mod ingest;
pub mod merge;
pub mod retrieval;
mod sqlite;
pub mod store;

pub use chunk::{chunk_id, DocumentChunk, Metadata};
pub use index::{EmbeddingIndex, IngestReport, VectorIndex};
pub use merge::MergePolicy;
pub use retrieval::{RetrievalEngine, RetrievalResult};
pub use sqlite::SqliteChunkStore;
pub use store::{ChunkStore, MetadataFilter, ScoredChunk};
