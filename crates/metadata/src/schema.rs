//! Table layout and row codec for the chunk table

use chrono::{DateTime, Utc};
use chunkvault_core::{ChunkKind, DocumentChunk, Language, VaultError, VaultResult, VectorId};
use rusqlite::ErrorCode;

/// Schema version stored in `PRAGMA user_version`
pub(crate) const SCHEMA_VERSION: i64 = 1;

pub(crate) const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS chunks (
        id          INTEGER PRIMARY KEY,
        text        TEXT    NOT NULL,
        language    TEXT    NOT NULL,
        filename    TEXT    NOT NULL,
        chunk_index INTEGER NOT NULL,
        created_at  TEXT    NOT NULL,
        kind        TEXT    NOT NULL DEFAULT 'content'
    );
    CREATE INDEX IF NOT EXISTS chunks_by_file ON chunks (filename, chunk_index);
";

pub(crate) const INSERT_ROW: &str = "INSERT INTO chunks \
     (id, text, language, filename, chunk_index, created_at, kind) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

pub(crate) const SELECT_COLUMNS: &str =
    "SELECT id, text, language, filename, chunk_index, created_at, kind FROM chunks";

/// Row exactly as stored; converted to a `DocumentChunk` outside the rusqlite closure
pub(crate) struct RawRow {
    pub id: i64,
    pub text: String,
    pub language: String,
    pub filename: String,
    pub chunk_index: i64,
    pub created_at: String,
    pub kind: String,
}

impl RawRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawRow {
            id: row.get(0)?,
            text: row.get(1)?,
            language: row.get(2)?,
            filename: row.get(3)?,
            chunk_index: row.get(4)?,
            created_at: row.get(5)?,
            kind: row.get(6)?,
        })
    }

    pub(crate) fn into_chunk(self) -> VaultResult<DocumentChunk> {
        let id = VectorId::new(u64::try_from(self.id).map_err(|_| invalid_row(self.id, "negative id"))?);
        let language = Language::parse(&self.language)
            .ok_or_else(|| invalid_row(self.id, &format!("language '{}'", self.language)))?;
        let chunk_index = u32::try_from(self.chunk_index)
            .map_err(|_| invalid_row(self.id, &format!("chunk_index {}", self.chunk_index)))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| invalid_row(self.id, &format!("created_at: {}", e)))?
            .with_timezone(&Utc);
        let kind = ChunkKind::parse(&self.kind)
            .ok_or_else(|| invalid_row(self.id, &format!("kind '{}'", self.kind)))?;

        Ok(DocumentChunk {
            id,
            text: self.text,
            language,
            filename: self.filename,
            chunk_index,
            created_at,
            kind,
        })
    }
}

fn invalid_row(id: i64, what: &str) -> VaultError {
    VaultError::storage(format!("row {} has invalid {}", id, what))
}

/// Convert a VectorId to the SQLite integer key
pub(crate) fn sql_id(id: VectorId) -> VaultResult<i64> {
    i64::try_from(id.as_u64())
        .map_err(|_| VaultError::invalid_input(format!("id {} exceeds the metadata key range", id)))
}

/// Map a rusqlite error, turning primary-key collisions into `DuplicateId`
pub(crate) fn map_write_error(err: rusqlite::Error, id: VectorId) -> VaultError {
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = &err {
        if ffi_err.code == ErrorCode::ConstraintViolation
            && ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return VaultError::DuplicateId(id);
        }
    }
    map_error(err)
}

/// Map any other rusqlite error to `Storage`
pub(crate) fn map_error(err: rusqlite::Error) -> VaultError {
    VaultError::storage(err.to_string())
}
