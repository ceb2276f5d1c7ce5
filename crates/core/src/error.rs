//! Error types for Chunkvault
//!
//! A single taxonomy is shared by the vector index, the metadata store and the
//! composite store. The composite store propagates sub-store failures
//! unmodified; it adds no failure kinds of its own.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::VectorId;
use std::io;
use thiserror::Error;

/// Result type alias for Chunkvault operations
pub type VaultResult<T> = std::result::Result<T, VaultError>;

/// Error types for the vector index, metadata store and composite store
#[derive(Debug, Error)]
pub enum VaultError {
    /// Input vector length differs from the configured dimension.
    ///
    /// Always rejected before any mutation.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Configured dimension
        expected: usize,
        /// Length of the supplied vector
        got: usize,
    },

    /// Vector cannot be brought to unit length (zero norm or non-finite values)
    #[error("Vector cannot be normalized: {reason}")]
    NotNormalized {
        /// Why normalization failed
        reason: String,
    },

    /// Metadata row with this id already exists (ids are write-once)
    #[error("Duplicate id: {0}")]
    DuplicateId(VectorId),

    /// No metadata row with this id
    #[error("Id not found: {0}")]
    NotFound(VectorId),

    /// Persisted index file is malformed; the store must refuse to serve
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Metadata database error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure reported by an external collaborator (embedding provider)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Invalid caller input that is not a dimension problem
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl VaultError {
    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        VaultError::DimensionMismatch { expected, got }
    }

    /// Create a not-normalized error
    pub fn not_normalized(reason: impl Into<String>) -> Self {
        VaultError::NotNormalized {
            reason: reason.into(),
        }
    }

    /// Create a corrupt index error
    pub fn corrupt(message: impl Into<String>) -> Self {
        VaultError::CorruptIndex(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        VaultError::Storage(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        VaultError::Config(message.into())
    }

    /// Create a provider error
    pub fn provider(message: impl Into<String>) -> Self {
        VaultError::Provider(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        VaultError::InvalidInput(message.into())
    }

    /// True for `DimensionMismatch`
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, VaultError::DimensionMismatch { .. })
    }

    /// True for `DuplicateId`
    pub fn is_duplicate_id(&self) -> bool {
        matches!(self, VaultError::DuplicateId(_))
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound(_))
    }

    /// True for `CorruptIndex`
    pub fn is_corrupt(&self) -> bool {
        matches!(self, VaultError::CorruptIndex(_))
    }

    /// Whether the caller can reasonably retry or handle the failure.
    ///
    /// `CorruptIndex` and `DuplicateId` are fatal to the operation that hit them.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            VaultError::CorruptIndex(_) | VaultError::DuplicateId(_)
        )
    }
}
