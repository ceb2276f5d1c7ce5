//! CompositeStore - the vector index and metadata store behind one API
//!
//! ## Insert ordering
//!
//! An insert holds the exclusive lock for its whole sequence:
//!
//! 1. `VectorIndex::add` assigns the id and commits the vector in memory
//! 2. the vector is appended to the vector log (synced with `always` durability)
//! 3. `MetadataStore::put` commits the row durably
//!
//! Searches take the shared lock, so they only ever observe states between
//! complete inserts: no vector is visible before its metadata is committed.
//! If step 2 fails, or step 3 fails with `DuplicateId`, the id is taken back
//! from the index and the log. Any other failure in step 3 leaves the vector
//! in the index as an orphan; it is added to the excluded set immediately and
//! repaired by reconciliation on next open.
//!
//! ## Persist ordering
//!
//! `persist` writes the index snapshot first, then resets the vector log,
//! then checkpoints metadata. On disk the index is therefore always a
//! superset of (or equal to) committed metadata.
//!
//! `parking_lot::RwLock` is task-fair, so a stream of searches cannot starve
//! an insert and vice versa.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use chunkvault_core::{
    DocumentChunk, Limits, NewChunk, SearchResult, StoreStats, VaultError, VaultResult, VectorId,
};
use chunkvault_index::{VectorIndex, VectorLog};
use chunkvault_metadata::MetadataStore;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{Durability, VaultConfig, CONFIG_FILE_NAME};
use crate::recovery::{reconcile, ReconcileReport};

#[cfg(feature = "failpoints")]
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory state guarded by the store lock
struct IndexState {
    index: VectorIndex,
    log: VectorLog,
    /// Orphans and placeholder rows; never returned from search
    excluded: BTreeSet<VectorId>,
}

/// Coordinated vector index + metadata store
pub struct CompositeStore {
    dir: PathBuf,
    config: VaultConfig,
    limits: Limits,
    state: RwLock<IndexState>,
    metadata: MetadataStore,
    report: ReconcileReport,
    #[cfg(feature = "failpoints")]
    failing_metadata_writes: AtomicUsize,
}

impl CompositeStore {
    /// Open (or create) a store in `dir` with an explicit configuration.
    ///
    /// Loads the index snapshot, replays the vector log, opens the metadata
    /// database and runs reconciliation before accepting writes. If
    /// reconciliation changed anything the repaired state is persisted.
    ///
    /// # Errors
    ///
    /// - `Config` if `config` is invalid
    /// - `CorruptIndex` if the snapshot or log is malformed
    /// - `DimensionMismatch` if the snapshot's dimension differs from `config.dimension`
    pub fn open(dir: &Path, config: VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(dir)?;

        let index_path = config.index_path(dir);
        let mut index = if index_path.exists() {
            VectorIndex::load_with_dimension(&index_path, config.dimension)?
        } else {
            VectorIndex::new(config.dimension)?
        };
        let snapshot_count = index.count();

        let mut report = ReconcileReport::default();
        let (log, replay) = VectorLog::open(&config.log_path(dir), config.dimension)?;
        report.log_records_replayed = index.replay(&replay.records)?;
        report.torn_log_bytes = replay.torn_bytes;

        let metadata =
            MetadataStore::open(&config.metadata_path(dir), config.read_connections)?;
        let excluded = reconcile(&mut index, &metadata, config.reconcile, &mut report)?;

        let mut state = IndexState {
            index,
            log,
            excluded,
        };

        if report.changed_state() {
            Self::persist_state(&mut state, &metadata, &index_path)?;
        }

        info!(
            dir = %dir.display(),
            dimension = config.dimension,
            snapshot_vectors = snapshot_count,
            vectors = state.index.count(),
            durability = ?config.durability,
            log = %state.log.path().display(),
            log_records_replayed = report.log_records_replayed,
            orphans = report.orphans_found(),
            "Composite store opened"
        );

        Ok(CompositeStore {
            dir: dir.to_path_buf(),
            config,
            limits: Limits::default(),
            state: RwLock::new(state),
            metadata,
            report,
            #[cfg(feature = "failpoints")]
            failing_metadata_writes: AtomicUsize::new(0),
        })
    }

    /// Open (or create) a store in `dir`, configured by its `chunkvault.toml`.
    ///
    /// A default config file is written on first open.
    pub fn open_dir(dir: &Path) -> VaultResult<Self> {
        let config = VaultConfig::load_or_create(dir)?;
        Self::open(dir, config)
    }

    /// Reopen an existing store from `dir`.
    ///
    /// Unlike [`open_dir`](Self::open_dir), a missing `chunkvault.toml` is an
    /// error rather than a fresh store.
    pub fn load(dir: &Path) -> VaultResult<Self> {
        let config = VaultConfig::from_file(&dir.join(CONFIG_FILE_NAME))?;
        Self::open(dir, config)
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Active configuration
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Configured vector dimension
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Number of vectors in the index (including excluded ones)
    pub fn count(&self) -> usize {
        self.state.read().index.count()
    }

    /// Report from the reconciliation pass run at open
    pub fn reconcile_report(&self) -> &ReconcileReport {
        &self.report
    }

    /// Insert a vector and its chunk; returns the shared id.
    ///
    /// The id is returned only after the metadata row is durably committed.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` / `NotNormalized` / `InvalidInput`: nothing changed
    /// - log failure or `DuplicateId`: the id is taken back, nothing changed
    /// - any other metadata failure: the vector is left as an excluded orphan
    pub fn insert(&self, vector: &[f32], chunk: NewChunk) -> VaultResult<VectorId> {
        let chunk = chunk.canonicalize();
        self.limits
            .validate_chunk(&chunk.text, &chunk.filename, &chunk.language)?;

        let mut state = self.state.write();
        let logged = state.log.len();
        let id = state.index.add(vector)?;
        let row = chunk.into_document(id, Utc::now());
        self.commit(&mut state, &[id], logged, std::slice::from_ref(&row))?;
        debug!(id = %id, filename = %row.filename, "Inserted chunk");
        Ok(id)
    }

    /// Insert several vectors under one lock scope and one metadata transaction.
    ///
    /// Every vector and chunk is validated before anything is mutated. Failures
    /// after that are handled as in [`insert`](Self::insert), for the whole batch.
    pub fn insert_batch(&self, items: Vec<(Vec<f32>, NewChunk)>) -> VaultResult<Vec<VectorId>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let items: Vec<(Vec<f32>, NewChunk)> = items
            .into_iter()
            .map(|(vector, chunk)| (vector, chunk.canonicalize()))
            .collect();

        let mut state = self.state.write();
        for (vector, chunk) in &items {
            state.index.prepare(vector)?;
            self.limits
                .validate_chunk(&chunk.text, &chunk.filename, &chunk.language)?;
        }

        let logged = state.log.len();
        let mut ids = Vec::with_capacity(items.len());
        let mut rows = Vec::with_capacity(items.len());
        let now = Utc::now();
        for (vector, chunk) in items {
            let id = state.index.add(&vector)?;
            ids.push(id);
            rows.push(chunk.into_document(id, now));
        }
        self.commit(&mut state, &ids, logged, &rows)?;
        debug!(first = %ids[0], count = ids.len(), "Inserted chunk batch");
        Ok(ids)
    }

    /// Top-k chunks most similar to `query`.
    ///
    /// Every result carries complete metadata. Orphans and placeholder rows
    /// are never returned.
    pub fn search(&self, query: &[f32], k: usize) -> VaultResult<Vec<SearchResult>> {
        let state = self.state.read();
        let hits = state
            .index
            .search_filtered(query, k, |id| !state.excluded.contains(&id))?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<VectorId> = hits.iter().map(|(id, _)| *id).collect();
        let mut rows = self.metadata.get_many(&ids)?;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|(id, score)| {
                rows.remove(&id)
                    .filter(DocumentChunk::is_searchable)
                    .map(|row| SearchResult::from_chunk(score, row))
            })
            .collect();
        debug!(k, returned = results.len(), "Composite search");
        Ok(results)
    }

    /// Metadata row for `id`; `NotFound` if absent
    pub fn get(&self, id: VectorId) -> VaultResult<DocumentChunk> {
        self.metadata.get(id)
    }

    /// Point-in-time counts
    pub fn stats(&self) -> VaultResult<StoreStats> {
        let state = self.state.read();
        Ok(StoreStats {
            total_documents: self.metadata.count()?,
            total_vectors: state.index.count(),
            dimension: state.index.dimension(),
            excluded_ids: state.excluded.len(),
        })
    }

    /// Write the index snapshot, then flush metadata.
    pub fn persist(&self) -> VaultResult<()> {
        let mut state = self.state.write();
        Self::persist_state(&mut state, &self.metadata, &self.config.index_path(&self.dir))
    }

    fn persist_state(
        state: &mut IndexState,
        metadata: &MetadataStore,
        index_path: &Path,
    ) -> VaultResult<()> {
        state.index.save(index_path)?;
        state.log.reset()?;
        metadata.flush()?;
        info!(
            path = %index_path.display(),
            vectors = state.index.count(),
            "Persisted vector index"
        );
        Ok(())
    }

    /// Persist and release both sub-stores
    pub fn close(self) -> VaultResult<()> {
        self.persist()?;
        drop(self.state);
        self.metadata.close()
    }

    /// Log and commit metadata for `ids`, freshly added to the index.
    ///
    /// `logged` is the log length before the ids were added.
    fn commit(
        &self,
        state: &mut IndexState,
        ids: &[VectorId],
        logged: usize,
        rows: &[DocumentChunk],
    ) -> VaultResult<()> {
        if let Err(e) = self.append_to_log(state, ids) {
            Self::take_back(state, ids, logged);
            return Err(e);
        }
        match self.write_metadata(rows) {
            Ok(()) => Ok(()),
            Err(e) if e.is_duplicate_id() => {
                warn!(first = %ids[0], error = %e, "Metadata id collision; insert rolled back");
                Self::take_back(state, ids, logged);
                Err(e)
            }
            Err(e) => {
                state.excluded.extend(ids.iter().copied());
                warn!(
                    first = %ids[0],
                    count = ids.len(),
                    error = %e,
                    "Metadata write failed; vectors left as orphans"
                );
                Err(e)
            }
        }
    }

    fn append_to_log(&self, state: &mut IndexState, ids: &[VectorId]) -> VaultResult<()> {
        let IndexState { index, log, .. } = state;
        let sync = self.config.durability == Durability::Always;
        for (i, id) in ids.iter().enumerate() {
            let vector = index.get(*id).ok_or(VaultError::NotFound(*id))?;
            log.append(*id, vector, sync && i + 1 == ids.len())?;
        }
        Ok(())
    }

    /// Remove `ids` (the tail of the index) from the index and the log.
    ///
    /// Nothing outside the write lock has seen them. If the log cannot be
    /// cut back they stay as excluded orphans so their ids are never reused.
    fn take_back(state: &mut IndexState, ids: &[VectorId], logged: usize) {
        match state.log.truncate_records(logged) {
            Ok(()) => state.index.truncate(ids[0].as_index()),
            Err(e) => {
                warn!(
                    first = %ids[0],
                    error = %e,
                    "Failed to roll back vector log; vectors left as orphans"
                );
                state.excluded.extend(ids.iter().copied());
            }
        }
    }

    fn write_metadata(&self, rows: &[DocumentChunk]) -> VaultResult<()> {
        #[cfg(feature = "failpoints")]
        {
            let injected = self
                .failing_metadata_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(VaultError::storage("injected metadata write failure"));
            }
        }
        match rows {
            [row] => self.metadata.put(row),
            _ => self.metadata.put_batch(rows),
        }
    }

    /// Make the next `n` metadata writes fail with a `Storage` error
    #[cfg(feature = "failpoints")]
    pub fn fail_next_metadata_writes(&self, n: usize) {
        self.failing_metadata_writes.store(n, Ordering::SeqCst);
    }
}
