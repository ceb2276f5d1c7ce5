//! Insert/search invariants of the composite store

use crate::common::*;
use proptest::prelude::*;

// ============================================================================
// Dimension invariant
// ============================================================================

#[test]
fn wrong_dimension_insert_changes_nothing() {
    let test_store = TestStore::new();
    let store = test_store.store();
    store.insert(&basis(TEST_DIM, 0), chunk("first")).unwrap();

    for len in [0, 1, TEST_DIM - 1, TEST_DIM + 1, 4 * TEST_DIM] {
        let err = store.insert(&vec![0.5; len], chunk("bad")).unwrap_err();
        assert!(
            matches!(err, VaultError::DimensionMismatch { expected, got } if expected == TEST_DIM && got == len),
            "len {} gave {:?}",
            len,
            err
        );
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.total_vectors, 1);
    assert_eq!(stats.total_documents, 1);
}

#[test]
fn wrong_dimension_query_is_rejected() {
    let test_store = TestStore::new();
    let store = test_store.store();
    // Even with nothing to search
    assert!(store.search(&[1.0, 0.0], 3).unwrap_err().is_dimension_mismatch());

    store.insert(&basis(TEST_DIM, 0), chunk("a")).unwrap();
    assert!(store
        .search(&vec![1.0; TEST_DIM + 1], 3)
        .unwrap_err()
        .is_dimension_mismatch());
}

// ============================================================================
// Id monotonicity
// ============================================================================

#[test]
fn ids_start_at_zero_and_increase_by_one() {
    let test_store = TestStore::new();
    let store = test_store.store();
    for expected in 0..20u64 {
        let id = store
            .insert(&basis(TEST_DIM, expected as usize), chunk("x"))
            .unwrap();
        assert_eq!(id, VectorId::new(expected));
    }

    let batch = store
        .insert_batch((0..5).map(|i| (basis(TEST_DIM, i), chunk("b"))).collect())
        .unwrap();
    assert_eq!(batch, (20..25).map(VectorId::new).collect::<Vec<_>>());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn successful_insert_ids_are_consecutive(lengths in prop::collection::vec(6usize..10, 1..30)) {
        let test_store = TestStore::new();
        let store = test_store.store();
        let mut ids = Vec::new();
        for len in lengths {
            if let Ok(id) = store.insert(&vec![0.25; len], chunk("p")) {
                ids.push(id);
            }
        }
        let expected: Vec<VectorId> = (0..ids.len() as u64).map(VectorId::new).collect();
        prop_assert_eq!(ids, expected);
        prop_assert_eq!(store.count(), store.stats().unwrap().total_documents);
    }
}

// ============================================================================
// Search correctness
// ============================================================================

#[test]
fn top_result_has_true_maximum_inner_product() {
    let test_store = TestStore::with_config(VaultConfig::new(3));
    let store = test_store.store();
    let vectors: [[f32; 3]; 4] = [
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.577, 0.577, 0.577],
    ];
    for (i, v) in vectors.iter().enumerate() {
        store.insert(v, chunk(&format!("v{}", i))).unwrap();
    }

    let queries: [[f32; 3]; 4] = [
        [0.9, 0.1, 0.05],
        [0.05, 0.2, 0.97],
        [0.5, 0.5, 0.45],
        [-1.0, 0.1, 0.0],
    ];
    for query in queries {
        let expected = (0..vectors.len())
            .max_by(|&a, &b| {
                dot(&query, &vectors[a])
                    .total_cmp(&dot(&query, &vectors[b]))
            })
            .unwrap();
        let top = store.search(&query, 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, VectorId::new(expected as u64), "query {:?}", query);
        assert_eq!(top[0].text, format!("v{}", expected));
    }
}

#[test]
fn top_k_over_random_vectors_matches_brute_force() {
    let dim = 16;
    let test_store = TestStore::with_config(VaultConfig::new(dim));
    let store = test_store.store();
    let mut rng = seeded_rng(0x5EED);

    let vectors: Vec<Vec<f32>> = (0..50).map(|_| random_unit_vector(&mut rng, dim)).collect();
    for (i, v) in vectors.iter().enumerate() {
        store.insert(v, chunk_at("random.txt", i as u32, "r")).unwrap();
    }

    for _ in 0..10 {
        let query = random_unit_vector(&mut rng, dim);
        let results = store.search(&query, 5).unwrap();
        assert_eq!(results.len(), 5);
        assert_ranked(&results);

        let mut reference: Vec<(usize, f32)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&query, v)))
            .collect();
        reference.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let expected: Vec<VectorId> = reference[..5]
            .iter()
            .map(|(i, _)| VectorId::new(*i as u64))
            .collect();
        assert_eq!(ids_of(&results), expected);

        for r in &results {
            assert!((-1.0..=1.0).contains(&r.score));
            assert_eq!(r.filename, "random.txt");
            assert_eq!(r.chunk_index as u64, r.id.as_u64());
        }
    }
}

#[test]
fn ties_are_broken_by_ascending_id() {
    let test_store = TestStore::new();
    let store = test_store.store();
    for _ in 0..4 {
        store.insert(&basis(TEST_DIM, 1), chunk("same")).unwrap();
    }
    store.insert(&basis(TEST_DIM, 2), chunk("other")).unwrap();

    let results = store.search(&basis(TEST_DIM, 1), 3).unwrap();
    assert_eq!(
        ids_of(&results),
        vec![VectorId::new(0), VectorId::new(1), VectorId::new(2)]
    );
}

#[test]
fn unnormalized_input_is_scaled() {
    let test_store = TestStore::new();
    let store = test_store.store();
    let mut v = basis(TEST_DIM, 3);
    v[3] = 40.0;
    store.insert(&v, chunk("big")).unwrap();

    let results = store.search(&basis(TEST_DIM, 3), 1).unwrap();
    assert!((results[0].score - 1.0).abs() < 1e-5);

    assert!(matches!(
        store.insert(&vec![0.0; TEST_DIM], chunk("zero")),
        Err(VaultError::NotNormalized { .. })
    ));
    let mut nan = basis(TEST_DIM, 0);
    nan[1] = f32::NAN;
    assert!(matches!(
        store.insert(&nan, chunk("nan")),
        Err(VaultError::NotNormalized { .. })
    ));
    assert_eq!(store.count(), 1);
}

// ============================================================================
// Empty index
// ============================================================================

#[test]
fn empty_store_search_returns_nothing_for_any_k() {
    let test_store = TestStore::new();
    let store = test_store.store();
    assert_eq!(store.count(), 0);
    for k in [0, 1, 5, 1000] {
        assert!(store.search(&basis(TEST_DIM, 0), k).unwrap().is_empty());
    }
}

#[test]
fn k_is_clamped_and_zero_returns_nothing() {
    let test_store = TestStore::new();
    let store = test_store.store();
    for i in 0..3 {
        store.insert(&basis(TEST_DIM, i), chunk("c")).unwrap();
    }
    assert_eq!(store.search(&basis(TEST_DIM, 0), 100).unwrap().len(), 3);
    assert!(store.search(&basis(TEST_DIM, 0), 0).unwrap().is_empty());
}

#[test]
fn get_missing_id_is_not_found() {
    let test_store = TestStore::new();
    let store = test_store.store();
    store.insert(&basis(TEST_DIM, 0), chunk("only")).unwrap();
    assert_eq!(store.get(VectorId::new(0)).unwrap().text, "only");
    assert!(store.get(VectorId::new(1)).unwrap_err().is_not_found());
}

#[test]
fn unreadable_language_code_is_rejected_before_insert() {
    let test_store = TestStore::new();
    let store = test_store.store();
    store.insert(&basis(TEST_DIM, 0), chunk("hello")).unwrap();

    let french = NewChunk::new("bonjour", Language::Other("fra".into()), "fr.txt", 0);
    let err = store.insert(&basis(TEST_DIM, 1), french).unwrap_err();
    assert!(matches!(err, VaultError::InvalidInput(_)));
    assert_eq!(store.count(), 1);

    // Every stored row still reads back
    let results = store.search(&basis(TEST_DIM, 0), 5).unwrap();
    assert_eq!(ids_of(&results), vec![VectorId::new(0)]);
    assert!(store.get(VectorId::new(1)).unwrap_err().is_not_found());

    let german = NewChunk::new("hallo", Language::Other("DE".into()), "de.txt", 0);
    let id = store.insert(&basis(TEST_DIM, 1), german).unwrap();
    assert_eq!(id, VectorId::new(1));
    assert_eq!(store.get(id).unwrap().language, Language::Other("de".into()));
}
