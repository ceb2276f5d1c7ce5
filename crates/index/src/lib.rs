//! Append-only dense vector index
//!
//! This crate provides the numeric half of the store:
//!
//! - **VectorIndex**: add / exact search / count / save / load
//! - **VectorHeap**: contiguous embedding storage, one slot per id
//! - **brute_force**: O(n·D) exact inner-product top-k search
//! - **snapshot**: checksummed on-disk image of the heap
//! - **VectorLog**: append-only record log for vectors added since the last snapshot
//!
//! Vectors are L2-normalized on the way in, so the inner product of two stored
//! vectors is their cosine similarity.

pub mod brute_force;
pub mod distance;
pub mod heap;
pub mod index;
pub mod log;
pub mod snapshot;

pub use heap::VectorHeap;
pub use index::VectorIndex;
pub use log::{LogReplay, VectorLog};
pub use snapshot::{INDEX_MAGIC, INDEX_VERSION};
