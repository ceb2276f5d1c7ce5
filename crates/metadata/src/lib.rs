//! Durable chunk metadata store
//!
//! Maps a `VectorId` to its `DocumentChunk` row in a SQLite database.
//!
//! - Every `put` is committed with `synchronous = FULL` before it returns
//! - Ids are write-once: a second `put` for the same id is `DuplicateId`
//! - One writer connection, a pool of reader connections (WAL journal mode)
//!   so lookups proceed in parallel with each other and with the writer

mod schema;
pub mod store;

pub use store::MetadataStore;

/// Default number of reader connections
pub const DEFAULT_READ_CONNECTIONS: usize = 4;
