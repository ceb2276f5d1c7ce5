//! Document ingestion: chunk, embed, insert

use chunkvault_core::{Language, NewChunk, VaultError, VaultResult, VectorId};
use tracing::{info, warn};

use crate::config::ChunkingConfig;
use crate::provider::EmbeddingProvider;
use crate::store::CompositeStore;
use crate::text::{chunk_text, detect_language};

/// Outcome for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    /// Chunks were inserted
    Ingested,
    /// Nothing to insert (e.g. empty text)
    Skipped(String),
    /// Embedding or insertion failed
    Failed(String),
}

/// Per-document ingestion report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Source filename
    pub filename: String,
    /// What happened
    pub status: IngestStatus,
    /// Detected language
    pub language: Language,
    /// Ids of the inserted chunks, in chunk order
    pub ids: Vec<VectorId>,
}

impl IngestReport {
    /// Number of chunks inserted
    pub fn chunks_created(&self) -> usize {
        self.ids.len()
    }
}

/// Splits documents into chunks and stores their embeddings
pub struct Ingestor<'a> {
    store: &'a CompositeStore,
    provider: &'a dyn EmbeddingProvider,
    chunking: ChunkingConfig,
}

impl<'a> Ingestor<'a> {
    /// Create an ingestor using the store's chunking settings.
    ///
    /// Fails with `DimensionMismatch` if the provider and store disagree.
    pub fn new(store: &'a CompositeStore, provider: &'a dyn EmbeddingProvider) -> VaultResult<Self> {
        if provider.dimension() != store.dimension() {
            return Err(VaultError::dimension_mismatch(
                store.dimension(),
                provider.dimension(),
            ));
        }
        Ok(Ingestor {
            store,
            provider,
            chunking: store.config().chunking,
        })
    }

    /// Chunk, embed and insert one document, then persist the store.
    ///
    /// Empty or whitespace-only text is reported as skipped, not an error.
    /// All chunks of a document go in through one `insert_batch`.
    pub fn ingest_document(&self, filename: &str, text: &str) -> VaultResult<IngestReport> {
        let report = self.insert_document(filename, text)?;
        if report.status == IngestStatus::Ingested {
            self.store.persist()?;
        }
        Ok(report)
    }

    fn insert_document(&self, filename: &str, text: &str) -> VaultResult<IngestReport> {
        let language = detect_language(text);
        if text.trim().is_empty() {
            return Ok(IngestReport {
                filename: filename.to_string(),
                status: IngestStatus::Skipped("empty document".to_string()),
                language,
                ids: Vec::new(),
            });
        }

        let chunks = chunk_text(
            text,
            self.chunking.max_chunk_size,
            self.chunking.chunk_overlap,
        );
        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.provider.embed(&refs)?;
        if embeddings.len() != chunks.len() {
            return Err(VaultError::provider(format!(
                "provider returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let items = embeddings
            .into_iter()
            .zip(chunks)
            .enumerate()
            .map(|(i, (embedding, chunk))| {
                (
                    embedding,
                    NewChunk::new(chunk, language.clone(), filename, i as u32),
                )
            })
            .collect();
        let ids = self.store.insert_batch(items)?;

        info!(
            filename,
            chunks = ids.len(),
            language = %language,
            "Ingested document"
        );
        Ok(IngestReport {
            filename: filename.to_string(),
            status: IngestStatus::Ingested,
            language,
            ids,
        })
    }

    /// Ingest several documents and persist once at the end.
    ///
    /// A failing document is reported, not fatal. A failed final persist is
    /// returned as an error; the inserted chunks stay in the vector log.
    pub fn ingest_all<'d, I>(&self, documents: I) -> VaultResult<Vec<IngestReport>>
    where
        I: IntoIterator<Item = (&'d str, &'d str)>,
    {
        let reports: Vec<IngestReport> = documents
            .into_iter()
            .map(|(filename, text)| {
                self.insert_document(filename, text).unwrap_or_else(|e| {
                    warn!(filename, error = %e, "Failed to ingest document");
                    IngestReport {
                        filename: filename.to_string(),
                        status: IngestStatus::Failed(e.to_string()),
                        language: detect_language(text),
                        ids: Vec::new(),
                    }
                })
            })
            .collect();
        if reports.iter().any(|r| r.status == IngestStatus::Ingested) {
            self.store.persist()?;
        }
        Ok(reports)
    }
}
