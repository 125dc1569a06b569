//! Property tests for the public key/value API.

use proptest::prelude::*;
use quarry_core::{Config, Database, OpenFlags, SeekMode};
use std::collections::BTreeMap;

fn db() -> Database {
    Database::open_with_config(
        ":mem:",
        OpenFlags::default(),
        Config::new().page_size(1024).cache_pages(16),
    )
    .unwrap()
}

fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..24)
}

fn arb_value() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..64),
        1 => prop::collection::vec(any::<u8>(), 500..3000),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn store_then_fetch_round_trips(entries in prop::collection::vec((arb_key(), arb_value()), 1..80)) {
        let db = db();
        let mut model = BTreeMap::new();
        for (k, v) in entries {
            db.store(&k, &v).unwrap();
            model.insert(k, v);
        }
        for (k, v) in &model {
            let fetched = db.fetch(k).unwrap();
            prop_assert_eq!(fetched.as_ref(), Some(v));
        }
        prop_assert_eq!(db.record_count().unwrap(), model.len() as u64);
    }

    #[test]
    fn appends_concatenate(key in arb_key(), parts in prop::collection::vec(arb_value(), 1..6)) {
        let db = db();
        for part in &parts {
            db.append(&key, part).unwrap();
        }
        prop_assert_eq!(db.fetch(&key).unwrap(), Some(parts.concat()));
    }

    #[test]
    fn rolled_back_writes_are_invisible(
        before in prop::collection::btree_map(arb_key(), arb_value(), 0..40),
        during in prop::collection::vec((arb_key(), arb_value()), 1..40),
        deletes in prop::collection::vec(arb_key(), 0..10),
    ) {
        let db = db();
        for (k, v) in &before {
            db.store(k, v).unwrap();
        }
        db.begin().unwrap();
        for (k, v) in &during {
            db.store(k, v).unwrap();
        }
        for k in &deletes {
            db.delete(k).unwrap();
        }
        db.rollback().unwrap();

        let after: BTreeMap<Vec<u8>, Vec<u8>> =
            db.cursor().unwrap().into_iter().map(Result::unwrap).collect();
        prop_assert_eq!(after, before);
        db.verify().unwrap();
    }

    #[test]
    fn cursor_walks_both_directions(keys in prop::collection::btree_set(arb_key(), 0..120)) {
        let db = db();
        for k in &keys {
            db.store(k, b"").unwrap();
        }
        let mut cursor = db.cursor().unwrap();
        let mut backward = Vec::new();
        let mut more = cursor.last().unwrap();
        while more {
            backward.push(cursor.key().unwrap());
            more = cursor.previous().unwrap();
        }
        backward.reverse();
        prop_assert_eq!(backward, keys.iter().cloned().collect::<Vec<_>>());

        for k in &keys {
            prop_assert!(cursor.seek(k, SeekMode::Exact).unwrap());
        }
    }
}

#[test]
fn deleted_key_reads_as_absent() {
    let db = db();
    db.store(b"a", b"1").unwrap();
    assert!(db.delete(b"a").unwrap());
    assert_eq!(db.fetch(b"a").unwrap(), None);
    assert!(!db.exists(b"a").unwrap());
}
