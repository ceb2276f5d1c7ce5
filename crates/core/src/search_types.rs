//! Search result and statistics types

use crate::types::{DocumentChunk, Language, VectorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A scored hit joined with its metadata row
///
/// Results are ordered by score descending, ties broken by id ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id shared by vector and metadata
    pub id: VectorId,
    /// Inner product with the (normalized) query, in [-1, 1]
    pub score: f32,
    /// Chunk text
    pub text: String,
    /// Language of the text
    pub language: Language,
    /// Source filename
    pub filename: String,
    /// Position of the chunk within its source file
    pub chunk_index: u32,
    /// Commit time of the metadata row
    pub created_at: DateTime<Utc>,
}

impl SearchResult {
    /// Join a score with its metadata row
    pub fn from_chunk(score: f32, chunk: DocumentChunk) -> Self {
        SearchResult {
            id: chunk.id,
            score,
            text: chunk.text,
            language: chunk.language,
            filename: chunk.filename,
            chunk_index: chunk.chunk_index,
            created_at: chunk.created_at,
        }
    }

    /// Result ordering: score descending, then id ascending
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Point-in-time counts for a composite store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Metadata rows (content and placeholder)
    pub total_documents: usize,
    /// Vectors in the index
    pub total_vectors: usize,
    /// Configured dimension
    pub dimension: usize,
    /// Ids excluded from search (orphans and placeholders)
    pub excluded_ids: usize,
}
