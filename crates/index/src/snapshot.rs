//! On-disk image of a vector heap.
//!
//! ## File Format (Version 1)
//!
//! ```text
//! [magic "CVIX" 4B]
//! [version u32 LE]
//! [dimension u32 LE]
//! [count u64 LE]      number of vectors
//! [body_crc u32 LE]   crc32 of the body
//! [body: count * dimension f32 LE]
//! ```
//!
//! The declared size (`HEADER_SIZE + count * dimension * 4`) must equal the
//! file length exactly; anything else is `CorruptIndex`. Files are written
//! with write-fsync-rename so a crash never leaves a half-written image under
//! the final name.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use chunkvault_core::{VaultError, VaultResult};

/// Magic bytes identifying a Chunkvault index file
pub const INDEX_MAGIC: &[u8; 4] = b"CVIX";
/// Current format version
pub const INDEX_VERSION: u32 = 1;
/// Header size: magic(4) + version(4) + dimension(4) + count(8) + crc(4)
pub const HEADER_SIZE: usize = 4 + 4 + 4 + 8 + 4;

/// Sibling path used while writing (`<path>.tmp`)
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Fsync the directory containing `path` so a rename is durable
pub(crate) fn sync_parent_dir(path: &Path) -> VaultResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && parent.exists() {
            File::open(parent)?.sync_all()?;
        }
    }
    Ok(())
}

/// Serialize header and body into one buffer
fn encode(dimension: usize, raw_data: &[f32]) -> VaultResult<Vec<u8>> {
    let dim32 = u32::try_from(dimension)
        .map_err(|_| VaultError::invalid_input(format!("dimension {} too large", dimension)))?;
    let count = (raw_data.len() / dimension) as u64;

    let mut body = vec![0u8; raw_data.len() * 4];
    LittleEndian::write_f32_into(raw_data, &mut body);
    let crc = crc32fast::hash(&body);

    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(INDEX_MAGIC);
    buf.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    buf.extend_from_slice(&dim32.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Write a snapshot of `raw_data` (whole vectors of `dimension` floats) to `path`
pub fn write_snapshot(path: &Path, dimension: usize, raw_data: &[f32]) -> VaultResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = encode(dimension, raw_data)?;
    let tmp = temp_path(path);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    sync_parent_dir(path)?;
    Ok(())
}

/// A decoded snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Declared dimension
    pub dimension: usize,
    /// Flat float buffer, `count * dimension` long
    pub data: Vec<f32>,
}

impl Snapshot {
    /// Number of vectors in the snapshot
    pub fn count(&self) -> usize {
        self.data.len() / self.dimension
    }
}

/// Decode and validate a snapshot image
pub fn decode_snapshot(bytes: &[u8]) -> VaultResult<Snapshot> {
    if bytes.len() < HEADER_SIZE {
        return Err(VaultError::corrupt(format!(
            "file is {} bytes, smaller than the {}-byte header",
            bytes.len(),
            HEADER_SIZE
        )));
    }
    if &bytes[0..4] != INDEX_MAGIC {
        return Err(VaultError::corrupt("invalid index magic"));
    }
    let version = LittleEndian::read_u32(&bytes[4..8]);
    if version != INDEX_VERSION {
        return Err(VaultError::corrupt(format!(
            "unsupported index version: {}",
            version
        )));
    }
    let dimension = LittleEndian::read_u32(&bytes[8..12]) as usize;
    if dimension == 0 {
        return Err(VaultError::corrupt("header declares dimension 0"));
    }
    let count = LittleEndian::read_u64(&bytes[12..20]);
    let stored_crc = LittleEndian::read_u32(&bytes[20..24]);

    let declared = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(dimension))
        .and_then(|floats| floats.checked_mul(4))
        .and_then(|body| body.checked_add(HEADER_SIZE))
        .ok_or_else(|| VaultError::corrupt(format!("declared count {} overflows", count)))?;
    if declared != bytes.len() {
        return Err(VaultError::corrupt(format!(
            "header declares {} bytes ({} x {} floats), file has {}",
            declared,
            count,
            dimension,
            bytes.len()
        )));
    }

    let body = &bytes[HEADER_SIZE..];
    let computed_crc = crc32fast::hash(body);
    if stored_crc != computed_crc {
        return Err(VaultError::corrupt(format!(
            "body checksum mismatch: stored {:08x}, computed {:08x}",
            stored_crc, computed_crc
        )));
    }

    let mut data = vec![0f32; body.len() / 4];
    LittleEndian::read_f32_into(body, &mut data);
    Ok(Snapshot { dimension, data })
}

/// Read and validate a snapshot file
pub fn read_snapshot(path: &Path) -> VaultResult<Snapshot> {
    let bytes = fs::read(path)?;
    decode_snapshot(&bytes)
}
