//! Concurrent inserters and searchers against one store

use crate::common::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use parking_lot::Mutex;

/// 8 inserters and 8 searchers share a store.
/// Assert: every search result has complete metadata, ids are unique and
/// increasing per thread, and the final count equals successful inserts.
#[test]
fn concurrent_inserts_and_searches_never_observe_orphans() {
    let num_inserters = 8;
    let num_searchers = 8;
    let inserts_per_thread = 25;

    let test_store = TestStore::new();
    let store = test_store.store();
    let barrier = Barrier::new(num_inserters + num_searchers);
    let inserting = AtomicBool::new(true);
    let inserters_done = AtomicUsize::new(0);

    let inserted: Vec<Vec<VectorId>> = thread::scope(|s| {
        let inserter_handles: Vec<_> = (0..num_inserters)
            .map(|t| {
                let barrier = &barrier;
                let inserting = &inserting;
                let inserters_done = &inserters_done;
                s.spawn(move || {
                    let mut rng = seeded_rng(t as u64);
                    barrier.wait();
                    let mut ids = Vec::with_capacity(inserts_per_thread);
                    for i in 0..inserts_per_thread {
                        let v = random_unit_vector(&mut rng, TEST_DIM);
                        let text = format!("t{}-{}", t, i);
                        let chunk = chunk_at("concurrent.txt", i as u32, &text);
                        ids.push(store.insert(&v, chunk).unwrap());
                    }
                    if inserters_done.fetch_add(1, Ordering::SeqCst) + 1 == num_inserters {
                        inserting.store(false, Ordering::SeqCst);
                    }
                    ids
                })
            })
            .collect();

        for t in 0..num_searchers {
            let barrier = &barrier;
            let inserting = &inserting;
            s.spawn(move || {
                let mut rng = seeded_rng(1000 + t as u64);
                barrier.wait();
                while inserting.load(Ordering::SeqCst) {
                    let query = random_unit_vector(&mut rng, TEST_DIM);
                    let results = store.search(&query, 5).unwrap();
                    assert_ranked(&results);
                    for r in &results {
                        assert!(r.text.starts_with('t'), "result {} without text", r.id);
                        assert_eq!(r.filename, "concurrent.txt");
                        let row = store.get(r.id).expect("metadata for a visible vector");
                        assert_eq!(row.text, r.text);
                    }
                }
            });
        }

        inserter_handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect()
    });

    for ids in &inserted {
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
    let all: BTreeSet<VectorId> = inserted.iter().flatten().copied().collect();
    let total = num_inserters * inserts_per_thread;
    assert_eq!(all.len(), total);
    assert_eq!(all, (0..total as u64).map(VectorId::new).collect());

    let stats = store.stats().unwrap();
    assert_eq!(stats.total_vectors, total);
    assert_eq!(stats.total_documents, total);
    assert_eq!(stats.excluded_ids, 0);
}

/// Searches racing with injected metadata failures never return the orphans.
#[test]
fn concurrent_searches_skip_orphans() {
    let test_store = TestStore::new();
    let store = test_store.store();
    let barrier = Barrier::new(5);
    let orphans = Mutex::new(Vec::new());

    thread::scope(|s| {
        s.spawn(|| {
            barrier.wait();
            for i in 0..40usize {
                if i % 4 == 0 {
                    store.fail_next_metadata_writes(1);
                }
                let v = basis(TEST_DIM, i);
                match store.insert(&v, chunk(&format!("t{}", i))) {
                    Ok(_) => {}
                    Err(e) => {
                        assert!(matches!(e, VaultError::Storage(_)));
                        orphans.lock().push(i);
                    }
                }
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                barrier.wait();
                for i in 0..200usize {
                    for r in store.search(&basis(TEST_DIM, i), 8).unwrap() {
                        assert!(store.get(r.id).unwrap().is_searchable());
                    }
                }
            });
        }
    });

    assert_eq!(orphans.lock().len(), 10);
    let stats = store.stats().unwrap();
    assert_eq!(stats.total_vectors, 40);
    assert_eq!(stats.total_documents, 30);
    assert_eq!(stats.excluded_ids, 10);
}
