//! Persist/load round trips, durability modes and corrupt files

use crate::common::*;
use std::fs;

#[test]
fn round_trip_preserves_count_and_results() {
    let mut test_store = TestStore::new();
    let mut rng = seeded_rng(7);
    for i in 0..10 {
        let v = random_unit_vector(&mut rng, TEST_DIM);
        test_store
            .store()
            .insert(&v, chunk_at("round.txt", i, &format!("chunk {}", i)))
            .unwrap();
    }
    let query = random_unit_vector(&mut rng, TEST_DIM);
    let before = test_store.store().search(&query, 5).unwrap();
    test_store.store().persist().unwrap();

    test_store.reopen();
    let store = test_store.store();
    assert_eq!(store.count(), 10);
    assert!(store.reconcile_report().is_clean());
    assert_eq!(store.search(&query, 5).unwrap(), before);
}

#[test]
fn close_persists() {
    let mut test_store = TestStore::new();
    test_store
        .store()
        .insert(&basis(TEST_DIM, 2), chunk("closed"))
        .unwrap();
    test_store.close();

    test_store.reopen();
    assert_eq!(test_store.store().count(), 1);
    assert_eq!(
        test_store.store().search(&basis(TEST_DIM, 2), 1).unwrap()[0].text,
        "closed"
    );
}

#[test]
fn inserts_after_reopen_continue_the_id_sequence() {
    let mut test_store = TestStore::new();
    for i in 0..3 {
        test_store.store().insert(&basis(TEST_DIM, i), chunk("a")).unwrap();
    }
    test_store.close();
    test_store.reopen();
    let id = test_store
        .store()
        .insert(&basis(TEST_DIM, 5), chunk("b"))
        .unwrap();
    assert_eq!(id, VectorId::new(3));
}

#[test]
fn always_durability_survives_crash_without_persist() {
    let mut test_store = TestStore::new();
    for i in 0..5 {
        test_store
            .store()
            .insert(&basis(TEST_DIM, i), chunk(&format!("logged {}", i)))
            .unwrap();
    }
    test_store.crash();

    test_store.reopen();
    let store = test_store.store();
    let report = store.reconcile_report();
    assert_eq!(report.log_records_replayed, 5);
    assert!(report.orphan_ids.is_empty());
    assert_eq!(store.count(), 5);
    assert_eq!(store.search(&basis(TEST_DIM, 4), 1).unwrap()[0].text, "logged 4");
}

#[test]
fn always_durability_discards_torn_log_tail() {
    let mut test_store = TestStore::new();
    test_store
        .store()
        .insert(&basis(TEST_DIM, 0), chunk("intact"))
        .unwrap();
    test_store.crash();

    let log_path = test_store.config.log_path(test_store.path());
    let mut bytes = fs::read(&log_path).unwrap();
    bytes.extend_from_slice(&[0xAB; 7]);
    fs::write(&log_path, bytes).unwrap();

    test_store.reopen();
    let report = test_store.store().reconcile_report();
    assert_eq!(report.torn_log_bytes, 7);
    assert_eq!(report.log_records_replayed, 1);
    assert_eq!(test_store.store().count(), 1);
}

#[test]
fn standard_durability_survives_process_crash() {
    let mut test_store = TestStore::new_standard();
    test_store
        .store()
        .insert(&basis(TEST_DIM, 0), chunk("persisted"))
        .unwrap();
    test_store.store().persist().unwrap();
    for i in 1..4 {
        test_store
            .store()
            .insert(&basis(TEST_DIM, i), chunk(&format!("acknowledged {}", i)))
            .unwrap();
    }
    test_store.crash();

    test_store.reopen();
    let store = test_store.store();
    let report = store.reconcile_report();
    assert_eq!(report.log_records_replayed, 3);
    assert_eq!(report.dangling_metadata_removed, 0);
    assert_eq!(store.count(), 4);
    for i in 1..4u64 {
        assert_eq!(
            store.get(VectorId::new(i)).unwrap().text,
            format!("acknowledged {}", i)
        );
    }
}

#[test]
fn default_store_keeps_acknowledged_inserts_after_crash() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = CompositeStore::open_dir(dir.path()).unwrap();
        let mut v = vec![0.0; store.dimension()];
        v[0] = 1.0;
        store.insert(&v, chunk("acknowledged")).unwrap()
    };

    let store = CompositeStore::open_dir(dir.path()).unwrap();
    assert_eq!(store.count(), 1);
    assert_eq!(store.reconcile_report().dangling_metadata_removed, 0);
    assert_eq!(store.get(id).unwrap().text, "acknowledged");
}

#[test]
fn lost_log_tail_removes_rows_without_vectors() {
    let mut test_store = TestStore::new_standard();
    test_store
        .store()
        .insert(&basis(TEST_DIM, 0), chunk("persisted"))
        .unwrap();
    test_store.store().persist().unwrap();
    for i in 1..4 {
        test_store
            .store()
            .insert(&basis(TEST_DIM, i), chunk("lost"))
            .unwrap();
    }
    test_store.crash();

    // Unsynced log records dropped by an OS crash: only the 12-byte header remains
    let log_path = test_store.config.log_path(test_store.path());
    fs::OpenOptions::new()
        .write(true)
        .open(&log_path)
        .unwrap()
        .set_len(12)
        .unwrap();

    test_store.reopen();
    let store = test_store.store();
    assert_eq!(store.reconcile_report().dangling_metadata_removed, 3);
    assert_eq!(store.count(), 1);
    assert_eq!(store.stats().unwrap().total_documents, 1);
    assert!(store
        .search(&basis(TEST_DIM, 2), 10)
        .unwrap()
        .iter()
        .all(|r| r.text == "persisted"));
}

#[test]
fn switching_durability_keeps_logged_inserts() {
    let mut test_store = TestStore::new();
    test_store
        .store()
        .insert(&basis(TEST_DIM, 0), chunk("a"))
        .unwrap();
    test_store.crash();

    test_store.reopen_with(VaultConfig::new(TEST_DIM).with_durability(Durability::Standard));
    assert_eq!(test_store.store().reconcile_report().log_records_replayed, 1);
    assert_eq!(test_store.store().count(), 1);
    assert!(test_store.index_path().exists());

    test_store
        .store()
        .insert(&basis(TEST_DIM, 1), chunk("b"))
        .unwrap();
    test_store.crash();
    test_store.reopen_with(VaultConfig::new(TEST_DIM));
    assert_eq!(test_store.store().count(), 2);
    assert_eq!(test_store.store().get(VectorId::new(1)).unwrap().text, "b");
}

#[test]
fn truncated_snapshot_refuses_to_load() {
    let mut test_store = TestStore::new();
    for i in 0..4 {
        test_store.store().insert(&basis(TEST_DIM, i), chunk("a")).unwrap();
    }
    test_store.close();

    let path = test_store.index_path();
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let result = CompositeStore::open(test_store.path(), test_store.config.clone());
    assert!(matches!(result, Err(VaultError::CorruptIndex(_))));
}

#[test]
fn flipped_snapshot_byte_refuses_to_load() {
    let mut test_store = TestStore::new();
    test_store.store().insert(&basis(TEST_DIM, 1), chunk("a")).unwrap();
    test_store.close();

    let path = test_store.index_path();
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x5A;
    fs::write(&path, bytes).unwrap();

    let result = CompositeStore::open(test_store.path(), test_store.config.clone());
    assert!(matches!(result, Err(VaultError::CorruptIndex(_))));
}

#[test]
fn snapshot_with_other_dimension_is_rejected() {
    let mut test_store = TestStore::new();
    test_store.store().insert(&basis(TEST_DIM, 1), chunk("a")).unwrap();
    test_store.close();

    let result = CompositeStore::open(test_store.path(), VaultConfig::new(TEST_DIM * 2));
    assert!(result.err().unwrap().is_dimension_mismatch());
}
