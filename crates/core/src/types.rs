//! Core record types
//!
//! - VectorId: identity shared by the vector index and the metadata store
//! - Language: two-letter language tag of a chunk
//! - ChunkKind: content row vs. reconciliation placeholder
//! - NewChunk: chunk attributes supplied by the caller at insert time
//! - DocumentChunk: the persisted metadata row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vector identifier (position in the append-only index)
///
/// IMPORTANT: VectorIds are assigned only by the vector index, start at 0,
/// grow by exactly 1 per insert and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VectorId(pub u64);

impl VectorId {
    /// Create a new VectorId
    pub fn new(id: u64) -> Self {
        VectorId(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Position of this id in the index buffer
    pub fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for VectorId {
    fn from(id: u64) -> Self {
        VectorId(id)
    }
}

/// Language of a chunk's text
///
/// English and Japanese are the languages ingestion distinguishes; any other
/// two-letter code is carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// "en"
    #[default]
    English,
    /// "ja"
    Japanese,
    /// Any other lowercase two-letter code
    Other(String),
}

impl Language {
    /// Two-letter code for this language
    pub fn code(&self) -> &str {
        match self {
            Language::English => "en",
            Language::Japanese => "ja",
            Language::Other(code) => code,
        }
    }

    /// Parse a two-letter code (case-insensitive)
    ///
    /// Returns None unless the input is exactly two ASCII letters.
    pub fn parse(code: &str) -> Option<Self> {
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return None;
        }
        let lower = code.to_ascii_lowercase();
        Some(match lower.as_str() {
            "en" => Language::English,
            "ja" => Language::Japanese,
            _ => Language::Other(lower),
        })
    }

    /// The form `parse` yields for this language's code, e.g. `Other("EN")`
    /// becomes `English`. `None` if the code is not two ASCII letters.
    pub fn canonical(&self) -> Option<Language> {
        Language::parse(self.code())
    }

    /// True if this value survives a store round trip unchanged
    pub fn is_canonical(&self) -> bool {
        self.canonical().as_ref() == Some(self)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Kind of a metadata row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChunkKind {
    /// Regular chunk written by an insert
    #[default]
    Content,
    /// Row backfilled by reconciliation for an orphan vector.
    /// Never returned from search.
    Placeholder,
}

impl ChunkKind {
    /// Stable tag used in the metadata database
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Content => "content",
            ChunkKind::Placeholder => "placeholder",
        }
    }

    /// Parse the stable tag
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content" => Some(ChunkKind::Content),
            "placeholder" => Some(ChunkKind::Placeholder),
            _ => None,
        }
    }
}

/// Chunk attributes supplied by the caller; id and timestamp are assigned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChunk {
    /// Chunk text
    pub text: String,
    /// Language of the text
    pub language: Language,
    /// Source filename
    pub filename: String,
    /// Position of the chunk within its source file
    pub chunk_index: u32,
}

impl NewChunk {
    /// Create a new chunk description
    pub fn new(
        text: impl Into<String>,
        language: Language,
        filename: impl Into<String>,
        chunk_index: u32,
    ) -> Self {
        NewChunk {
            text: text.into(),
            language,
            filename: filename.into(),
            chunk_index,
        }
    }

    /// Replace the language by its canonical form when it has one.
    ///
    /// Codes that are not two ASCII letters are left as they are and later
    /// rejected by [`Limits::validate_chunk`](crate::Limits::validate_chunk).
    pub fn canonicalize(mut self) -> Self {
        if let Some(language) = self.language.canonical() {
            self.language = language;
        }
        self
    }

    /// Attach identity and creation time, producing the persisted row
    pub fn into_document(self, id: VectorId, created_at: DateTime<Utc>) -> DocumentChunk {
        DocumentChunk {
            id,
            text: self.text,
            language: self.language,
            filename: self.filename,
            chunk_index: self.chunk_index,
            created_at,
            kind: ChunkKind::Content,
        }
    }
}

/// Metadata row keyed by the same id as its vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Id shared with the vector index
    pub id: VectorId,
    /// Chunk text
    pub text: String,
    /// Language of the text
    pub language: Language,
    /// Source filename
    pub filename: String,
    /// Position of the chunk within its source file
    pub chunk_index: u32,
    /// Commit time
    pub created_at: DateTime<Utc>,
    /// Content row or reconciliation placeholder
    pub kind: ChunkKind,
}

impl DocumentChunk {
    /// Placeholder row for an orphan vector found during reconciliation
    pub fn placeholder(id: VectorId, created_at: DateTime<Utc>) -> Self {
        DocumentChunk {
            id,
            text: String::new(),
            language: Language::default(),
            filename: String::new(),
            chunk_index: 0,
            created_at,
            kind: ChunkKind::Placeholder,
        }
    }

    /// True for rows that may be returned from search
    pub fn is_searchable(&self) -> bool {
        self.kind == ChunkKind::Content
    }
}
