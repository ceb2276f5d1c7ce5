//! Append-only vector log
//!
//! Vectors added since the last snapshot are appended here when the store
//! runs with `always` durability, so an insert survives a crash even if
//! `persist()` was never called.
//!
//! ## File Format (Version 1)
//!
//! ```text
//! [magic "CVLG" 4B][version u32 LE][dimension u32 LE]
//! repeated:
//!   [id u64 LE][dimension * f32 LE][crc32 u32 LE over id + floats]
//! ```
//!
//! A record that is incomplete or fails its checksum marks the torn tail of
//! the log: it and everything after it is discarded on open.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use chunkvault_core::{VaultError, VaultResult, VectorId};
use tracing::warn;

/// Magic bytes identifying a vector log
pub const LOG_MAGIC: &[u8; 4] = b"CVLG";
/// Current log format version
pub const LOG_VERSION: u32 = 1;
/// Header size: magic(4) + version(4) + dimension(4)
pub const LOG_HEADER_SIZE: usize = 12;

/// Records recovered when a log is opened
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LogReplay {
    /// Intact records in append order
    pub records: Vec<(VectorId, Vec<f32>)>,
    /// Bytes discarded from a torn tail
    pub torn_bytes: u64,
}

/// Append-only log of (id, vector) records
pub struct VectorLog {
    path: PathBuf,
    file: File,
    dimension: usize,
    records: usize,
}

impl VectorLog {
    /// Open (or create) the log at `path`, returning it with its intact records
    pub fn open(path: &Path, dimension: usize) -> VaultResult<(Self, LogReplay)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut log = VectorLog {
            path: path.to_path_buf(),
            file,
            dimension,
            records: 0,
        };

        if bytes.len() < LOG_HEADER_SIZE {
            // Fresh file or a header torn during creation
            log.file.set_len(0)?;
            log.write_header()?;
            return Ok((log, LogReplay::default()));
        }

        if &bytes[0..4] != LOG_MAGIC {
            return Err(VaultError::corrupt(format!(
                "invalid vector log magic in {}",
                path.display()
            )));
        }
        let version = LittleEndian::read_u32(&bytes[4..8]);
        if version != LOG_VERSION {
            return Err(VaultError::corrupt(format!(
                "unsupported vector log version: {}",
                version
            )));
        }
        let logged_dim = LittleEndian::read_u32(&bytes[8..12]) as usize;
        if logged_dim != dimension {
            return Err(VaultError::dimension_mismatch(dimension, logged_dim));
        }

        let replay = log.scan(&bytes)?;
        log.records = replay.records.len();
        Ok((log, replay))
    }

    fn record_size(&self) -> usize {
        8 + self.dimension * 4 + 4
    }

    fn write_header(&mut self) -> VaultResult<()> {
        let mut header = [0u8; LOG_HEADER_SIZE];
        header[0..4].copy_from_slice(LOG_MAGIC);
        LittleEndian::write_u32(&mut header[4..8], LOG_VERSION);
        LittleEndian::write_u32(&mut header[8..12], self.dimension as u32);
        self.file.write_all(&header)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Parse records after the header, truncating a torn tail
    fn scan(&mut self, bytes: &[u8]) -> VaultResult<LogReplay> {
        let record_size = self.record_size();
        let mut replay = LogReplay::default();
        let mut pos = LOG_HEADER_SIZE;

        while pos + record_size <= bytes.len() {
            let record = &bytes[pos..pos + record_size];
            let payload_len = record_size - 4;
            let stored_crc = LittleEndian::read_u32(&record[payload_len..]);
            if crc32fast::hash(&record[..payload_len]) != stored_crc {
                break;
            }
            let id = VectorId::new(LittleEndian::read_u64(&record[0..8]));
            let mut embedding = vec![0f32; self.dimension];
            LittleEndian::read_f32_into(&record[8..payload_len], &mut embedding);
            replay.records.push((id, embedding));
            pos += record_size;
        }

        if pos < bytes.len() {
            replay.torn_bytes = (bytes.len() - pos) as u64;
            warn!(
                path = %self.path.display(),
                torn_bytes = replay.torn_bytes,
                intact_records = replay.records.len(),
                "Discarding torn vector log tail"
            );
            self.file.set_len(pos as u64)?;
            self.file.sync_all()?;
        }
        Ok(replay)
    }

    /// Append one record; with `sync` the record is on disk when this returns
    pub fn append(&mut self, id: VectorId, embedding: &[f32], sync: bool) -> VaultResult<()> {
        if embedding.len() != self.dimension {
            return Err(VaultError::dimension_mismatch(self.dimension, embedding.len()));
        }
        let payload_len = self.record_size() - 4;
        let mut buf = vec![0u8; self.record_size()];
        LittleEndian::write_u64(&mut buf[0..8], id.as_u64());
        LittleEndian::write_f32_into(embedding, &mut buf[8..payload_len]);
        let crc = crc32fast::hash(&buf[..payload_len]);
        LittleEndian::write_u32(&mut buf[payload_len..], crc);

        let result = self.write_record(&buf, sync);
        if result.is_err() {
            // A partial record would hide every later append on replay
            let end = (LOG_HEADER_SIZE + self.records * self.record_size()) as u64;
            if let Err(e) = self.file.set_len(end) {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to roll back partial log record"
                );
            }
            return result;
        }
        self.records += 1;
        Ok(())
    }

    fn write_record(&mut self, buf: &[u8], sync: bool) -> VaultResult<()> {
        self.file.write_all(buf)?;
        if sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Discard all records (called once a snapshot covers them)
    pub fn reset(&mut self) -> VaultResult<()> {
        self.file.set_len(LOG_HEADER_SIZE as u64)?;
        self.file.sync_all()?;
        self.records = 0;
        Ok(())
    }

    /// Drop every record after the first `records`
    pub fn truncate_records(&mut self, records: usize) -> VaultResult<()> {
        if records > self.records {
            return Err(VaultError::invalid_input(format!(
                "cannot truncate log of {} records to {}",
                self.records, records
            )));
        }
        self.file
            .set_len((LOG_HEADER_SIZE + records * self.record_size()) as u64)?;
        self.file.sync_all()?;
        self.records = records;
        Ok(())
    }

    /// Records appended since open or the last reset
    pub fn len(&self) -> usize {
        self.records
    }

    /// True when the log holds no records
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
