//! Query-side helper: embed a question and search the store

use chunkvault_core::{SearchResult, VaultError, VaultResult};
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::provider::EmbeddingProvider;
use crate::store::CompositeStore;

/// Embeds queries and returns the closest chunks
pub struct Retriever<'a> {
    store: &'a CompositeStore,
    provider: &'a dyn EmbeddingProvider,
    retrieval: RetrievalConfig,
}

impl<'a> Retriever<'a> {
    /// Create a retriever using the store's retrieval settings.
    ///
    /// Fails with `DimensionMismatch` if the provider and store disagree.
    pub fn new(store: &'a CompositeStore, provider: &'a dyn EmbeddingProvider) -> VaultResult<Self> {
        if provider.dimension() != store.dimension() {
            return Err(VaultError::dimension_mismatch(
                store.dimension(),
                provider.dimension(),
            ));
        }
        Ok(Retriever {
            store,
            provider,
            retrieval: store.config().retrieval,
        })
    }

    /// Effective k: `None` means the default, anything else is clamped to `[1, max_top_k]`
    pub fn effective_top_k(&self, top_k: Option<usize>) -> usize {
        top_k
            .unwrap_or(self.retrieval.default_top_k)
            .clamp(1, self.retrieval.max_top_k)
    }

    /// Chunks most similar to `query`, best first
    pub fn retrieve(&self, query: &str, top_k: Option<usize>) -> VaultResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(VaultError::invalid_input("query text is empty"));
        }
        let k = self.effective_top_k(top_k);
        let embedding = self.provider.embed_one(query)?;
        let results = self.store.search(&embedding, k)?;
        debug!(k, returned = results.len(), "Retrieved chunks");
        Ok(results)
    }
}
