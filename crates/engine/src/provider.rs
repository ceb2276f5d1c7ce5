//! Embedding provider capability
//!
//! The store never computes embeddings itself. Hosts inject an
//! [`EmbeddingProvider`] into the ingestion and retrieval helpers; its
//! lifetime is owned by the host.

use chunkvault_core::{VaultError, VaultResult};
use xxhash_rust::xxh3::xxh3_64;

use crate::text::is_japanese_char;

/// Turns text into fixed-length vectors
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input in order
    fn embed(&self, texts: &[&str]) -> VaultResult<Vec<Vec<f32>>>;

    /// Embed a single text
    fn embed_one(&self, text: &str) -> VaultResult<Vec<f32>> {
        self.embed(&[text])?
            .pop()
            .ok_or_else(|| VaultError::provider("provider returned no embedding"))
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased words and individual Japanese characters are hashed into
/// signed buckets and the result is L2-normalized. Texts sharing terms get
/// high cosine similarity, which is enough for tests and offline use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-float vectors
    pub fn new(dimension: usize) -> VaultResult<Self> {
        if dimension == 0 {
            return Err(VaultError::invalid_input("embedding dimension must be at least 1"));
        }
        Ok(HashingEmbedder { dimension })
    }

    fn embed_text(&self, text: &str) -> VaultResult<Vec<f32>> {
        let mut vector = vec![0f32; self.dimension];
        let mut features = 0usize;
        for token in tokens(text) {
            let hash = xxh3_64(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
            features += 1;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if features == 0 || norm == 0.0 {
            return Err(VaultError::provider(format!(
                "no embeddable content in text of {} bytes",
                text.len()
            )));
        }
        for x in &mut vector {
            *x /= norm;
        }
        Ok(vector)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[&str]) -> VaultResult<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed_text(text)).collect()
    }
}

/// Lowercased alphanumeric words; each Japanese character is its own token
fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        if is_japanese_char(c) {
            if !word.is_empty() {
                out.push(std::mem::take(&mut word));
            }
            out.push(c.to_string());
        } else if c.is_alphanumeric() {
            word.extend(c.to_lowercase());
        } else if !word.is_empty() {
            out.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        out.push(word);
    }
    out
}
