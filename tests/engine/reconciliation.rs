//! Orphan vectors: exclusion at runtime, repair on reopen

use crate::common::*;
use chunkvault::ChunkKind;

/// Insert 0..n basis vectors with texts "c0", "c1", ...
fn fill(store: &CompositeStore, n: usize) {
    for i in 0..n {
        store
            .insert(&basis(TEST_DIM, i), chunk(&format!("c{}", i)))
            .unwrap();
    }
}

fn delete_metadata_row(test_store: &TestStore, id: u64) {
    let conn = rusqlite::Connection::open(test_store.metadata_path()).unwrap();
    let removed = conn
        .execute("DELETE FROM chunks WHERE id = ?1", [id as i64])
        .unwrap();
    assert_eq!(removed, 1);
}

#[test]
fn failed_metadata_write_leaves_excluded_orphan() {
    let test_store = TestStore::new();
    let store = test_store.store();
    fill(store, 2);

    store.fail_next_metadata_writes(1);
    let err = store.insert(&basis(TEST_DIM, 5), chunk("orphan")).unwrap_err();
    assert!(matches!(err, VaultError::Storage(_)));

    // The vector is committed but invisible
    assert_eq!(store.count(), 3);
    let stats = store.stats().unwrap();
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.excluded_ids, 1);
    let results = store.search(&basis(TEST_DIM, 5), 3).unwrap();
    assert!(results.iter().all(|r| r.id != VectorId::new(2)));
    assert_eq!(results.len(), 2);

    // Its id is never reused
    let next = store.insert(&basis(TEST_DIM, 6), chunk("after")).unwrap();
    assert_eq!(next, VectorId::new(3));
}

#[test]
fn orphan_is_reported_and_backfilled_on_reopen() {
    let mut test_store = TestStore::new();
    fill(test_store.store(), 2);
    test_store.store().fail_next_metadata_writes(1);
    assert!(test_store
        .store()
        .insert(&basis(TEST_DIM, 5), chunk("orphan"))
        .is_err());
    test_store
        .store()
        .insert(&basis(TEST_DIM, 6), chunk("after"))
        .unwrap();
    test_store.close();

    test_store.reopen();
    let store = test_store.store();
    let report = store.reconcile_report();
    assert_eq!(report.orphan_ids, vec![VectorId::new(2)]);
    assert_eq!(report.orphans_found(), 1);
    assert_eq!(report.orphans_backfilled, 1);
    assert_eq!(report.orphans_truncated, 0);

    let placeholder = store.get(VectorId::new(2)).unwrap();
    assert_eq!(placeholder.kind, ChunkKind::Placeholder);
    assert!(store
        .search(&basis(TEST_DIM, 5), 10)
        .unwrap()
        .iter()
        .all(|r| r.id != VectorId::new(2)));

    // A clean report once repaired
    test_store.reopen();
    assert!(test_store.store().reconcile_report().is_clean());
    assert_eq!(test_store.store().stats().unwrap().excluded_ids, 1);
}

#[test]
fn failed_batch_orphans_every_vector_in_it() {
    let mut test_store = TestStore::new();
    fill(test_store.store(), 1);
    test_store.store().fail_next_metadata_writes(1);
    let batch = (1..4).map(|i| (basis(TEST_DIM, i), chunk("batch"))).collect();
    assert!(test_store.store().insert_batch(batch).is_err());
    assert_eq!(test_store.store().stats().unwrap().excluded_ids, 3);
    test_store.close();

    test_store.reopen();
    assert_eq!(
        test_store.store().reconcile_report().orphan_ids,
        (1..4).map(VectorId::new).collect::<Vec<_>>()
    );
}

#[test]
fn missing_metadata_row_on_disk_is_repaired() {
    let mut test_store = TestStore::new();
    fill(test_store.store(), 4);
    test_store.close();
    delete_metadata_row(&test_store, 1);

    test_store.reopen();
    let store = test_store.store();
    assert_eq!(store.reconcile_report().orphan_ids, vec![VectorId::new(1)]);
    let results = store.search(&basis(TEST_DIM, 1), 4).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.id != VectorId::new(1)));
    assert_ranked(&results);
}

#[test]
fn placeholders_never_appear_in_search() {
    let mut test_store = TestStore::new();
    fill(test_store.store(), 3);
    test_store.close();
    delete_metadata_row(&test_store, 0);
    delete_metadata_row(&test_store, 2);

    test_store.reopen();
    let store = test_store.store();
    // Query aimed straight at the placeholder vectors
    for target in [0, 2] {
        let results = store.search(&basis(TEST_DIM, target), 3).unwrap();
        assert_eq!(ids_of(&results), vec![VectorId::new(1)]);
    }
    assert_eq!(store.stats().unwrap().total_documents, 3);
}

#[test]
fn truncate_policy_drops_trailing_orphans_only() {
    let mut test_store = TestStore::new();
    fill(test_store.store(), 5);
    test_store.close();
    // Interior orphan 1, trailing orphans 3 and 4
    for id in [1, 3, 4] {
        delete_metadata_row(&test_store, id);
    }

    test_store.reopen_with(VaultConfig::new(TEST_DIM).with_reconcile(ReconcilePolicy::Truncate));
    let store = test_store.store();
    let report = store.reconcile_report();
    assert_eq!(report.orphans_found(), 3);
    assert_eq!(report.orphans_truncated, 2);
    assert_eq!(report.orphans_backfilled, 1);
    assert_eq!(store.count(), 3);

    // Next id equals the new count
    let id = store.insert(&basis(TEST_DIM, 7), chunk("new")).unwrap();
    assert_eq!(id, VectorId::new(3));
    assert!(store
        .search(&basis(TEST_DIM, 1), 5)
        .unwrap()
        .iter()
        .all(|r| r.id != VectorId::new(1)));
}

#[test]
fn orphan_in_always_mode_is_repaired_without_persist() {
    let mut test_store = TestStore::new();
    fill(test_store.store(), 1);
    test_store.store().fail_next_metadata_writes(1);
    assert!(test_store
        .store()
        .insert(&basis(TEST_DIM, 3), chunk("orphan"))
        .is_err());
    test_store.crash();

    test_store.reopen();
    let report = test_store.store().reconcile_report();
    assert_eq!(report.log_records_replayed, 2);
    assert_eq!(report.orphan_ids, vec![VectorId::new(1)]);
    assert_eq!(test_store.store().count(), 2);
}
