//! Startup reconciliation of the vector index against the metadata store
//!
//! Inserts commit the vector before the metadata row, so after a crash or a
//! failed metadata write the two stores can disagree in two ways:
//!
//! - **Orphans**: vector ids below `count()` with no metadata row.
//!   Repaired according to [`ReconcilePolicy`].
//! - **Dangling rows**: metadata rows with id >= `count()`. These appear when
//!   a `standard` durability store loses unsynced vector log records in an OS
//!   crash while the rows were already committed. They are deleted, since no
//!   vector can ever match them.
//!
//! The outcome is a [`ReconcileReport`], never an error.

use std::collections::BTreeSet;

use chrono::Utc;
use chunkvault_core::{VaultResult, VectorId};
use chunkvault_index::VectorIndex;
use chunkvault_metadata::MetadataStore;
use tracing::{info, warn};

use crate::config::ReconcilePolicy;

/// Structured outcome of a startup reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Vector ids found without metadata, ascending
    pub orphan_ids: Vec<VectorId>,
    /// Orphans repaired with a placeholder row
    pub orphans_backfilled: usize,
    /// Trailing orphans dropped from the index
    pub orphans_truncated: usize,
    /// Metadata rows deleted because their vector was never persisted
    pub dangling_metadata_removed: usize,
    /// Vectors recovered from the vector log
    pub log_records_replayed: usize,
    /// Bytes discarded from a torn vector log tail
    pub torn_log_bytes: u64,
}

impl ReconcileReport {
    /// Number of orphan vectors found
    pub fn orphans_found(&self) -> usize {
        self.orphan_ids.len()
    }

    /// True when the two stores already agreed
    pub fn is_clean(&self) -> bool {
        self.orphan_ids.is_empty() && self.dangling_metadata_removed == 0
    }

    /// True when reconciliation or log replay changed on-disk state
    pub fn changed_state(&self) -> bool {
        !self.is_clean() || self.log_records_replayed > 0 || self.torn_log_bytes > 0
    }
}

/// Bring `metadata` and `index` back into id-sync.
///
/// Fills in the orphan/dangling fields of `report` and returns the ids that
/// must be excluded from search (every placeholder row).
pub fn reconcile(
    index: &mut VectorIndex,
    metadata: &MetadataStore,
    policy: ReconcilePolicy,
    report: &mut ReconcileReport,
) -> VaultResult<BTreeSet<VectorId>> {
    let count = index.count() as u64;

    report.dangling_metadata_removed = metadata.delete_from(VectorId::new(count))?;
    if report.dangling_metadata_removed > 0 {
        warn!(
            removed = report.dangling_metadata_removed,
            vector_count = count,
            "Removed metadata rows without persisted vectors"
        );
    }

    let present = metadata.ids()?;
    report.orphan_ids = missing_ids(&present, count);

    let mut to_backfill = report.orphan_ids.clone();
    if policy == ReconcilePolicy::Truncate {
        let keep = metadata.max_id()?.map(|id| id.as_u64() + 1).unwrap_or(0);
        if keep < count {
            index.truncate(keep as usize);
            report.orphans_truncated = (count - keep) as usize;
            to_backfill.retain(|id| id.as_u64() < keep);
        }
    }

    if !to_backfill.is_empty() {
        metadata.put_placeholders(&to_backfill, Utc::now())?;
        report.orphans_backfilled = to_backfill.len();
    }

    if report.orphans_found() > 0 {
        warn!(
            orphans = report.orphans_found(),
            backfilled = report.orphans_backfilled,
            truncated = report.orphans_truncated,
            policy = ?policy,
            "Repaired orphan vectors"
        );
    }

    let excluded: BTreeSet<VectorId> = metadata.placeholder_ids()?.into_iter().collect();
    info!(
        vectors = index.count(),
        excluded = excluded.len(),
        clean = report.is_clean(),
        "Reconciliation complete"
    );
    Ok(excluded)
}

/// Ids in `0..count` absent from the ascending list `present`
fn missing_ids(present: &[VectorId], count: u64) -> Vec<VectorId> {
    let mut missing = Vec::new();
    let mut next = present.iter().peekable();
    for id in 0..count {
        match next.peek() {
            Some(p) if p.as_u64() == id => {
                next.next();
            }
            _ => missing.push(VectorId::new(id)),
        }
    }
    missing
}
