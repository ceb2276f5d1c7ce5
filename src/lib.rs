//! Chunkvault - embedded vector index paired with a durable chunk metadata store
//!
//! Chunkvault stores text chunks with their embeddings. Every chunk gets one
//! id shared by the vector index and the metadata store, and the two are kept
//! in id-sync across concurrent access, crashes and restarts.
//!
//! # Quick Start
//!
//! ```ignore
//! use chunkvault::{CompositeStore, Language, NewChunk, VaultConfig};
//!
//! let store = CompositeStore::open(dir, VaultConfig::new(384))?;
//! let id = store.insert(&embedding, NewChunk::new("text", Language::English, "a.txt", 0))?;
//! let hits = store.search(&query, 5)?;
//! store.close()?;
//! ```
//!
//! # Architecture
//!
//! - `chunkvault-index`: append-only vector heap with exact inner-product search
//! - `chunkvault-metadata`: SQLite-backed chunk rows
//! - `chunkvault-engine`: the [`CompositeStore`], configuration, reconciliation
//!   and the ingestion/retrieval helpers
//!
//! Only the engine API and the shared types are re-exported here.

pub use chunkvault_core::{
    ChunkKind, DocumentChunk, Language, Limits, NewChunk, SearchResult, StoreStats, VaultError,
    VaultResult, VectorId, DEFAULT_DIMENSION,
};
pub use chunkvault_engine::*;
pub use chunkvault_index::VectorIndex;
pub use chunkvault_metadata::MetadataStore;
