//! Core types for Chunkvault
//!
//! This crate defines the foundational types shared by the index, the
//! metadata store and the engine:
//! - VectorId: append-only identity shared by both sub-stores
//! - Language / ChunkKind: fixed-schema tagged metadata variants
//! - DocumentChunk / NewChunk: metadata rows
//! - SearchResult: a scored hit joined with its metadata
//! - VaultError: the error taxonomy
//! - Limits: input size limits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod search_types;
pub mod types;

pub use error::{VaultError, VaultResult};
pub use limits::{Limits, DEFAULT_DIMENSION};
pub use search_types::{SearchResult, StoreStats};
pub use types::{ChunkKind, DocumentChunk, Language, NewChunk, VectorId};
