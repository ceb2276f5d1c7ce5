//! Store configuration via `chunkvault.toml`
//!
//! On first open, a default `chunkvault.toml` is created in the data
//! directory. To change settings, edit the file and reopen the store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chunkvault_core::{VaultError, VaultResult, DEFAULT_DIMENSION};

/// Config file name placed in the store's data directory.
pub const CONFIG_FILE_NAME: &str = "chunkvault.toml";

/// When inserted vectors reach disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Every vector is appended to the log before its metadata is written,
    /// but the log is only synced at `persist()`. Survives process crashes;
    /// an OS crash can lose the unsynced tail, whose rows are then purged.
    Standard,
    /// Every vector is appended to a synced log before its metadata is written
    #[default]
    Always,
}

/// How startup reconciliation repairs orphan vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    /// Write a placeholder metadata row for each orphan
    #[default]
    Backfill,
    /// Drop trailing orphans from the index; interior orphans are backfilled
    Truncate,
}

/// `[retrieval]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// top_k used when the caller gives none
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Upper clamp for caller-supplied top_k
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

fn default_top_k() -> usize {
    3
}

fn default_max_top_k() -> usize {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

/// `[chunking]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        ChunkingConfig {
            max_chunk_size: default_max_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Store configuration loaded from `chunkvault.toml`.
///
/// # Example
///
/// ```toml
/// dimension = 384
/// durability = "standard"
/// reconcile = "truncate"
///
/// [retrieval]
/// default_top_k = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Embedding dimension shared by the provider and the index
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Index snapshot file name, relative to the data directory
    #[serde(default = "default_index_file")]
    pub index_file: String,
    /// Metadata database file name, relative to the data directory
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    /// `"standard"` or `"always"`
    #[serde(default)]
    pub durability: Durability,
    /// `"backfill"` or `"truncate"`
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
    /// Metadata reader connections
    #[serde(default = "default_read_connections")]
    pub read_connections: usize,
    /// Retrieval defaults
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Chunking defaults
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_index_file() -> String {
    "vectors.idx".to_string()
}

fn default_metadata_file() -> String {
    "metadata.db".to_string()
}

fn default_read_connections() -> usize {
    chunkvault_metadata::DEFAULT_READ_CONNECTIONS
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig {
            dimension: default_dimension(),
            index_file: default_index_file(),
            metadata_file: default_metadata_file(),
            durability: Durability::default(),
            reconcile: ReconcilePolicy::default(),
            read_connections: default_read_connections(),
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Default configuration with the given dimension
    pub fn new(dimension: usize) -> Self {
        VaultConfig {
            dimension,
            ..Default::default()
        }
    }

    /// Set the durability mode
    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Set the reconciliation policy
    pub fn with_reconcile(mut self, policy: ReconcilePolicy) -> Self {
        self.reconcile = policy;
        self
    }

    /// Set the metadata reader pool size
    pub fn with_read_connections(mut self, n: usize) -> Self {
        self.read_connections = n;
        self
    }

    /// Set retrieval defaults
    pub fn with_retrieval(mut self, default_top_k: usize, max_top_k: usize) -> Self {
        self.retrieval = RetrievalConfig {
            default_top_k,
            max_top_k,
        };
        self
    }

    /// Set chunking defaults
    pub fn with_chunking(mut self, max_chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunking = ChunkingConfig {
            max_chunk_size,
            chunk_overlap,
        };
        self
    }

    /// Check field ranges.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first invalid field.
    pub fn validate(&self) -> VaultResult<()> {
        if self.dimension == 0 {
            return Err(VaultError::config("dimension must be at least 1"));
        }
        if self.index_file.is_empty() || self.metadata_file.is_empty() {
            return Err(VaultError::config("index_file and metadata_file must be set"));
        }
        if self.index_file == self.metadata_file {
            return Err(VaultError::config(
                "index_file and metadata_file must differ",
            ));
        }
        if self.read_connections == 0 {
            return Err(VaultError::config("read_connections must be at least 1"));
        }
        if self.retrieval.max_top_k == 0 {
            return Err(VaultError::config("retrieval.max_top_k must be at least 1"));
        }
        if self.chunking.max_chunk_size == 0 {
            return Err(VaultError::config("chunking.max_chunk_size must be at least 1"));
        }
        if self.chunking.chunk_overlap >= self.chunking.max_chunk_size {
            return Err(VaultError::config(format!(
                "chunking.chunk_overlap ({}) must be smaller than max_chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.max_chunk_size
            )));
        }
        Ok(())
    }

    /// Index snapshot path inside `dir`
    pub fn index_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.index_file)
    }

    /// Vector log path inside `dir` (`<index_file>.log`)
    pub fn log_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.log", self.index_file))
    }

    /// Metadata database path inside `dir`
    pub fn metadata_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.metadata_file)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Chunkvault store configuration
#
# Embedding dimension. Must match the embedding provider and any existing
# index file in this directory.
dimension = 384

# File names inside the data directory
index_file = "vectors.idx"
metadata_file = "metadata.db"

# Durability mode: "always" (default) or "standard"
#   "always"   = every vector is appended to a synced log before its metadata
#   "standard" = vectors are logged before metadata but synced at persist();
#                an OS crash may roll back the most recent inserts
durability = "always"

# Orphan repair at startup: "backfill" (default) or "truncate"
#   "backfill" = write a placeholder row for each orphan vector
#   "truncate" = drop trailing orphan vectors from the index
reconcile = "backfill"

# Metadata reader connections
read_connections = 4

[retrieval]
default_top_k = 3
max_top_k = 10

[chunking]
max_chunk_size = 1000
chunk_overlap = 200
"#
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> VaultResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VaultError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: VaultConfig = toml::from_str(&content).map_err(|e| {
            VaultError::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> VaultResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                VaultError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Load `chunkvault.toml` from `dir`, creating it with defaults first if missing
    pub fn load_or_create(dir: &Path) -> VaultResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        Self::write_default_if_missing(&path)?;
        Self::from_file(&path)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> VaultResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VaultError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            VaultError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
