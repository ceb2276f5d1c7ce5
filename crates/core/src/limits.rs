//! Input limits
//!
//! Enforced by the index (dimension) and the metadata store (text size and
//! language code). Violations return `InvalidInput`.

use crate::error::{VaultError, VaultResult};
use crate::types::Language;

/// Default embedding dimension (MiniLM-class sentence embedders)
pub const DEFAULT_DIMENSION: usize = 384;

/// Size limits for vectors and chunk rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum vector dimension (default: 8192)
    pub max_dimension: usize,

    /// Maximum chunk text length in bytes (default: 1MB)
    pub max_text_bytes: usize,

    /// Maximum filename length in bytes (default: 4096)
    pub max_filename_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_dimension: 8192,
            max_text_bytes: 1024 * 1024,
            max_filename_bytes: 4096,
        }
    }
}

impl Limits {
    /// Validate a configured dimension
    pub fn validate_dimension(&self, dimension: usize) -> VaultResult<()> {
        if dimension == 0 || dimension > self.max_dimension {
            return Err(VaultError::invalid_input(format!(
                "dimension {} out of range 1..={}",
                dimension, self.max_dimension
            )));
        }
        Ok(())
    }

    /// Validate chunk text and filename sizes, and that the language code
    /// reads back as the same value
    pub fn validate_chunk(
        &self,
        text: &str,
        filename: &str,
        language: &Language,
    ) -> VaultResult<()> {
        if !language.is_canonical() {
            return Err(VaultError::invalid_input(format!(
                "language code '{}' is not a lowercase two-letter code",
                language.code()
            )));
        }
        if text.len() > self.max_text_bytes {
            return Err(VaultError::invalid_input(format!(
                "chunk text is {} bytes, limit {}",
                text.len(),
                self.max_text_bytes
            )));
        }
        if filename.len() > self.max_filename_bytes {
            return Err(VaultError::invalid_input(format!(
                "filename is {} bytes, limit {}",
                filename.len(),
                self.max_filename_bytes
            )));
        }
        Ok(())
    }
}
