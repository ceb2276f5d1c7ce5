//! MetadataStore - SQLite-backed chunk rows
//!
//! ## Durability
//!
//! The database runs in WAL journal mode with `synchronous = FULL`: a
//! committed `put` has reached disk before it returns. This is what lets the
//! composite store treat "metadata committed" as the point an insert becomes
//! real.
//!
//! ## Concurrency
//!
//! Writes go through a single connection behind a mutex (single writer).
//! Reads are served from a pool of read-only connections; WAL mode lets them
//! run in parallel with each other and with the writer, each seeing the last
//! committed state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chunkvault_core::{DocumentChunk, Limits, VaultError, VaultResult, VectorId};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::schema::{
    map_error, map_write_error, sql_id, RawRow, CREATE_TABLE, INSERT_ROW, SCHEMA_VERSION,
    SELECT_COLUMNS,
};

/// Max ids bound into a single `IN (...)` lookup
const LOOKUP_BATCH: usize = 500;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable id -> DocumentChunk store
pub struct MetadataStore {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
    limits: Limits,
}

impl MetadataStore {
    /// Open (or create) the database at `path` with `read_connections` readers
    pub fn open(path: &Path, read_connections: usize) -> VaultResult<Self> {
        if read_connections == 0 {
            return Err(VaultError::invalid_input(
                "metadata store needs at least one read connection",
            ));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer = Connection::open(path).map_err(map_error)?;
        writer.busy_timeout(BUSY_TIMEOUT).map_err(map_error)?;
        let mode: String = writer
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(map_error)?;
        writer
            .pragma_update(None, "synchronous", "FULL")
            .map_err(map_error)?;
        writer.execute_batch(CREATE_TABLE).map_err(map_error)?;

        let version: i64 = writer
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(map_error)?;
        if version == 0 {
            writer
                .pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(map_error)?;
        } else if version != SCHEMA_VERSION {
            return Err(VaultError::storage(format!(
                "unsupported metadata schema version {} (expected {})",
                version, SCHEMA_VERSION
            )));
        }

        let mut readers = Vec::with_capacity(read_connections);
        for _ in 0..read_connections {
            let reader = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(map_error)?;
            reader.busy_timeout(BUSY_TIMEOUT).map_err(map_error)?;
            readers.push(Mutex::new(reader));
        }

        let store = MetadataStore {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
            limits: Limits::default(),
        };
        info!(
            path = %path.display(),
            journal_mode = %mode,
            read_connections,
            "Metadata store opened"
        );
        Ok(store)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take a reader connection, preferring one that is idle
    fn reader(&self) -> MutexGuard<'_, Connection> {
        for conn in &self.readers {
            if let Some(guard) = conn.try_lock() {
                return guard;
            }
        }
        let slot = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        self.readers[slot].lock()
    }

    /// Insert a row; fails with `DuplicateId` if the id already exists.
    ///
    /// Durable when it returns.
    pub fn put(&self, chunk: &DocumentChunk) -> VaultResult<()> {
        self.limits
            .validate_chunk(&chunk.text, &chunk.filename, &chunk.language)?;
        let id = sql_id(chunk.id)?;
        let conn = self.writer.lock();
        insert_row(&conn, id, chunk)?;
        debug!(id = %chunk.id, filename = %chunk.filename, "Metadata row committed");
        Ok(())
    }

    /// Insert several rows in one transaction (all or nothing)
    pub fn put_batch(&self, chunks: &[DocumentChunk]) -> VaultResult<()> {
        for chunk in chunks {
            self.limits
                .validate_chunk(&chunk.text, &chunk.filename, &chunk.language)?;
            sql_id(chunk.id)?;
        }
        let mut conn = self.writer.lock();
        let tx = conn.transaction().map_err(map_error)?;
        for chunk in chunks {
            insert_row(&tx, sql_id(chunk.id)?, chunk)?;
        }
        tx.commit().map_err(map_error)?;
        debug!(rows = chunks.len(), "Metadata batch committed");
        Ok(())
    }

    /// Write placeholder rows for `ids` in one transaction
    pub fn put_placeholders(&self, ids: &[VectorId], created_at: DateTime<Utc>) -> VaultResult<()> {
        let rows: Vec<DocumentChunk> = ids
            .iter()
            .map(|&id| DocumentChunk::placeholder(id, created_at))
            .collect();
        self.put_batch(&rows)
    }

    /// Fetch one row; `NotFound` if absent
    pub fn get(&self, id: VectorId) -> VaultResult<DocumentChunk> {
        let key = sql_id(id)?;
        let conn = self.reader();
        let raw = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![key],
                RawRow::from_row,
            )
            .optional()
            .map_err(map_error)?;
        match raw {
            Some(raw) => raw.into_chunk(),
            None => Err(VaultError::NotFound(id)),
        }
    }

    /// Fetch many rows; ids without a row are omitted from the result
    pub fn get_many(&self, ids: &[VectorId]) -> VaultResult<HashMap<VectorId, DocumentChunk>> {
        let mut found = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(found);
        }

        let keys = ids
            .iter()
            .map(|&id| sql_id(id))
            .collect::<VaultResult<Vec<i64>>>()?;

        let conn = self.reader();
        for batch in keys.chunks(LOOKUP_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(",");
            let sql = format!("{} WHERE id IN ({})", SELECT_COLUMNS, placeholders);
            let mut stmt = conn.prepare_cached(&sql).map_err(map_error)?;
            let rows = stmt
                .query_map(params_from_iter(batch.iter()), RawRow::from_row)
                .map_err(map_error)?;
            for raw in rows {
                let chunk = raw.map_err(map_error)?.into_chunk()?;
                found.insert(chunk.id, chunk);
            }
        }
        Ok(found)
    }

    /// Number of rows (content and placeholder)
    pub fn count(&self) -> VaultResult<usize> {
        let conn = self.reader();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(map_error)?;
        Ok(n as usize)
    }

    /// All ids in ascending order
    pub fn ids(&self) -> VaultResult<Vec<VectorId>> {
        self.select_ids("SELECT id FROM chunks ORDER BY id")
    }

    /// Ids of placeholder rows in ascending order
    pub fn placeholder_ids(&self) -> VaultResult<Vec<VectorId>> {
        self.select_ids("SELECT id FROM chunks WHERE kind = 'placeholder' ORDER BY id")
    }

    fn select_ids(&self, sql: &str) -> VaultResult<Vec<VectorId>> {
        let conn = self.reader();
        let mut stmt = conn.prepare_cached(sql).map_err(map_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(map_error)?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(VectorId::new(id.map_err(map_error)? as u64));
        }
        Ok(ids)
    }

    /// Highest id present, if any
    pub fn max_id(&self) -> VaultResult<Option<VectorId>> {
        let conn = self.reader();
        let max: Option<i64> = conn
            .query_row("SELECT MAX(id) FROM chunks", [], |row| row.get(0))
            .map_err(map_error)?;
        Ok(max.map(|id| VectorId::new(id as u64)))
    }

    /// Delete every row with id >= `first`; returns rows removed
    pub fn delete_from(&self, first: VectorId) -> VaultResult<usize> {
        let key = sql_id(first)?;
        let conn = self.writer.lock();
        let removed = conn
            .execute("DELETE FROM chunks WHERE id >= ?1", params![key])
            .map_err(map_error)?;
        Ok(removed)
    }

    /// Checkpoint the write-ahead log into the main database file
    pub fn flush(&self) -> VaultResult<()> {
        let conn = self.writer.lock();
        conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))
            .map_err(map_error)?;
        Ok(())
    }

    /// Flush and release every connection
    pub fn close(self) -> VaultResult<()> {
        for reader in self.readers {
            reader
                .into_inner()
                .close()
                .map_err(|(_, e)| map_error(e))?;
        }
        let writer = self.writer.into_inner();
        writer
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .map_err(map_error)?;
        writer.close().map_err(|(_, e)| map_error(e))?;
        info!(path = %self.path.display(), "Metadata store closed");
        Ok(())
    }
}

fn insert_row(conn: &Connection, id: i64, chunk: &DocumentChunk) -> VaultResult<()> {
    conn.execute(
        INSERT_ROW,
        params![
            id,
            chunk.text,
            chunk.language.code(),
            chunk.filename,
            i64::from(chunk.chunk_index),
            chunk.created_at.to_rfc3339(),
            chunk.kind.as_str(),
        ],
    )
    .map_err(|e| map_write_error(e, chunk.id))?;
    Ok(())
}
