//! VectorIndex - append-only exact inner-product index
//!
//! ## Normalization
//!
//! `add` and `search` normalize their input: any finite, non-zero vector is
//! scaled to unit length, so scores are cosine similarities in [-1, 1].
//! Zero or non-finite vectors fail with `NotNormalized`; vectors of the wrong
//! length fail with `DimensionMismatch`. Both are rejected before mutation.
//!
//! ## Identity
//!
//! The id returned by `add` is the previous `count()`. Ids are never reused;
//! the only operation that shrinks the index is `truncate`, which startup
//! reconciliation uses to drop trailing vectors that never got metadata.

use std::path::Path;

use chunkvault_core::{Limits, VaultError, VaultResult, VectorId};
use tracing::debug;

use crate::brute_force;
use crate::distance::normalize;
use crate::heap::VectorHeap;
use crate::snapshot::{read_snapshot, write_snapshot};

/// Dense vector container with brute-force top-k search
#[derive(Debug, Clone)]
pub struct VectorIndex {
    heap: VectorHeap,
}

impl VectorIndex {
    /// Create an empty index for `dimension`-float vectors
    pub fn new(dimension: usize) -> VaultResult<Self> {
        Limits::default().validate_dimension(dimension)?;
        Ok(VectorIndex {
            heap: VectorHeap::new(dimension),
        })
    }

    /// Configured dimension
    pub fn dimension(&self) -> usize {
        self.heap.dimension()
    }

    /// Current number of vectors
    pub fn count(&self) -> usize {
        self.heap.len()
    }

    /// True when no vector has been added
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Id the next `add` will return
    pub fn next_id(&self) -> VectorId {
        self.heap.next_id()
    }

    /// Validate and normalize `vector` without touching the index
    pub fn prepare(&self, vector: &[f32]) -> VaultResult<Vec<f32>> {
        if vector.len() != self.dimension() {
            return Err(VaultError::dimension_mismatch(self.dimension(), vector.len()));
        }
        normalize(vector)
    }

    /// Append a vector and return its id
    pub fn add(&mut self, vector: &[f32]) -> VaultResult<VectorId> {
        let normalized = self.prepare(vector)?;
        Ok(self.heap.push(&normalized))
    }

    /// Stored (normalized) vector for `id`
    pub fn get(&self, id: VectorId) -> Option<&[f32]> {
        self.heap.get(id)
    }

    /// Top-k ids by descending inner product, ties by ascending id
    ///
    /// Returns at most `min(k, count())` results; an empty index or `k == 0`
    /// yields an empty vector rather than an error.
    pub fn search(&self, query: &[f32], k: usize) -> VaultResult<Vec<(VectorId, f32)>> {
        self.search_filtered(query, k, |_| true)
    }

    /// Like `search`, but ids for which `keep` returns false are skipped
    /// before ranking, so up to `k` kept ids are still returned.
    pub fn search_filtered<F>(
        &self,
        query: &[f32],
        k: usize,
        keep: F,
    ) -> VaultResult<Vec<(VectorId, f32)>>
    where
        F: Fn(VectorId) -> bool,
    {
        if k == 0 || self.is_empty() {
            // Malformed queries fail even when there is nothing to scan
            if query.len() != self.dimension() {
                return Err(VaultError::dimension_mismatch(self.dimension(), query.len()));
            }
            return Ok(Vec::new());
        }
        let query = self.prepare(query)?;
        let results = brute_force::search(&self.heap, &query, k, keep);
        debug!(k, returned = results.len(), scanned = self.count(), "Vector search");
        Ok(results)
    }

    /// Drop every vector with id >= `len`
    pub fn truncate(&mut self, len: usize) {
        self.heap.truncate(len);
    }

    /// Replay log records on top of the current contents.
    ///
    /// Records whose id is already present (covered by the snapshot) are
    /// skipped. A record that would leave a gap in the id sequence means the
    /// log does not belong to this snapshot and is `CorruptIndex`.
    /// Returns the number of vectors appended.
    pub fn replay<'a, I>(&mut self, records: I) -> VaultResult<usize>
    where
        I: IntoIterator<Item = &'a (VectorId, Vec<f32>)>,
    {
        let mut applied = 0;
        for (id, embedding) in records {
            let next = self.next_id();
            if *id < next {
                continue;
            }
            if *id > next {
                return Err(VaultError::corrupt(format!(
                    "vector log jumps from id {} to {}",
                    next, id
                )));
            }
            self.add(embedding)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Write the index to `path` (atomic replace)
    pub fn save(&self, path: &Path) -> VaultResult<()> {
        write_snapshot(path, self.dimension(), self.heap.raw_data())
    }

    /// Load an index from `path`, taking the dimension from the file header
    pub fn load(path: &Path) -> VaultResult<Self> {
        let snapshot = read_snapshot(path)?;
        Limits::default()
            .validate_dimension(snapshot.dimension)
            .map_err(|e| VaultError::corrupt(e.to_string()))?;
        Ok(VectorIndex {
            heap: VectorHeap::from_raw(snapshot.dimension, snapshot.data)?,
        })
    }

    /// Load an index from `path`, failing if its dimension is not `dimension`
    pub fn load_with_dimension(path: &Path, dimension: usize) -> VaultResult<Self> {
        let index = Self::load(path)?;
        if index.dimension() != dimension {
            return Err(VaultError::dimension_mismatch(dimension, index.dimension()));
        }
        Ok(index)
    }
}
