//! Storage engine for Chunkvault
//!
//! This crate coordinates the lower layers:
//! - CompositeStore: vector index + metadata store behind one API
//! - Configuration via `chunkvault.toml`
//! - Startup reconciliation of orphan vectors and dangling metadata
//! - Collaborators that sit in front of the store: embedding provider,
//!   ingestion, retrieval, text helpers
//!
//! The engine is the only component that knows about:
//! - The insert ordering between the two sub-stores
//! - The vector log and when it is reset
//! - Reconciliation policy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod ingest;
pub mod provider;
pub mod recovery;
pub mod retrieve;
pub mod store;
pub mod text;

pub use config::{
    ChunkingConfig, Durability, ReconcilePolicy, RetrievalConfig, VaultConfig, CONFIG_FILE_NAME,
};
pub use ingest::{IngestReport, IngestStatus, Ingestor};
pub use provider::{EmbeddingProvider, HashingEmbedder};
pub use recovery::ReconcileReport;
pub use retrieve::Retriever;
pub use store::CompositeStore;
pub use text::{chunk_text, create_snippet, detect_language};
