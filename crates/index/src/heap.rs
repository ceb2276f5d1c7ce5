//! Vector Heap - Contiguous embedding storage
//!
//! VectorHeap stores embeddings back to back in a single `Vec<f32>`. The
//! index is append-only, so a vector's id is simply its slot number and no
//! id-to-offset map is needed.
//!
//! # Critical Invariants
//!
//! - `data.len()` is always a multiple of `dimension`
//! - VectorIds are NEVER reused: the next id is always `len()`
//! - Iteration is in ascending id order

use chunkvault_core::{VaultError, VaultResult, VectorId};

/// Contiguous append-only vector storage
///
/// Layout: `[v0_dim0, v0_dim1, ..., v0_dimN, v1_dim0, ...]`
#[derive(Debug, Clone)]
pub struct VectorHeap {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorHeap {
    /// Create an empty heap for vectors of `dimension` floats
    pub fn new(dimension: usize) -> Self {
        VectorHeap {
            dimension,
            data: Vec::new(),
        }
    }

    /// Rebuild a heap from a raw buffer (for snapshot load)
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> VaultResult<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(VaultError::corrupt(format!(
                "buffer of {} floats is not a whole number of {}-dim vectors",
                data.len(),
                dimension
            )));
        }
        Ok(VectorHeap { dimension, data })
    }

    /// Get the dimension of vectors in this heap
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Id the next push will receive
    pub fn next_id(&self) -> VectorId {
        VectorId::new(self.len() as u64)
    }

    /// Append a vector and return its id
    ///
    /// Caller guarantees `embedding.len() == dimension`.
    pub fn push(&mut self, embedding: &[f32]) -> VectorId {
        debug_assert_eq!(embedding.len(), self.dimension);
        let id = self.next_id();
        self.data.extend_from_slice(embedding);
        id
    }

    /// Get embedding by VectorId
    pub fn get(&self, id: VectorId) -> Option<&[f32]> {
        let start = id.as_index().checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    /// Iterate all vectors in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (VectorId, &[f32])> {
        self.data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(slot, embedding)| (VectorId::new(slot as u64), embedding))
    }

    /// Drop every vector with id >= `len`
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len.saturating_mul(self.dimension));
    }

    /// Get raw data slice (for snapshot serialization)
    pub fn raw_data(&self) -> &[f32] {
        &self.data
    }
}
