//! Brute-Force Vector Search
//!
//! Exact O(n·D) scan over every stored vector. No approximate structure is
//! maintained; every query sees every vector.
//!
//! Result ordering contract:
//! 1. Score descending (higher = more similar)
//! 2. VectorId ascending on equal scores
//! 3. Truncated to k

use std::cmp::Ordering;

use chunkvault_core::VectorId;

use crate::distance::dot_product;
use crate::heap::VectorHeap;

/// Ranking order for (id, score) pairs: score desc, id asc
pub fn rank(a: &(VectorId, f32), b: &(VectorId, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Top-k search over the heap, skipping ids for which `keep` returns false
///
/// `query` must already be unit length and of the heap's dimension.
pub fn search<F>(heap: &VectorHeap, query: &[f32], k: usize, keep: F) -> Vec<(VectorId, f32)>
where
    F: Fn(VectorId) -> bool,
{
    if k == 0 || heap.is_empty() {
        return Vec::new();
    }
    debug_assert_eq!(query.len(), heap.dimension());

    // heap.iter() yields ascending ids; scores are computed single-threaded
    let mut results: Vec<(VectorId, f32)> = heap
        .iter()
        .filter(|(id, _)| keep(*id))
        .map(|(id, embedding)| (id, dot_product(query, embedding)))
        .collect();

    if results.len() > k {
        results.select_nth_unstable_by(k - 1, rank);
        results.truncate(k);
    }
    results.sort_by(rank);
    results
}
