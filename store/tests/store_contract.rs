//! Behavioral parity across both backends: every assertion here runs against
//! the KV store and the document store through the same `dyn Store` surface.

use std::sync::Arc;
use store::{keys, DocStore, EventBus, KeySchema, KvStore, ListOptions, Store, StoreError, WriteOp};

fn backends() -> Vec<(&'static str, Arc<dyn Store>)> {
    let kv = KvStore::temp("contract", Arc::new(EventBus::new())).unwrap();
    let doc = DocStore::new(KeySchema::v1(), Arc::new(EventBus::new()));
    vec![("kv", kv as Arc<dyn Store>), ("doc", doc as Arc<dyn Store>)]
}

#[test]
fn crud_errors_are_uniform() {
    for (name, store) in backends() {
        let key = keys::account_key("alice");

        assert!(!store.has(&key).unwrap(), "{name}");
        assert!(store.get(&key).unwrap_err().is_not_found(), "{name}");
        assert!(store.update(&key, b"v").unwrap_err().is_not_found(), "{name}");
        assert!(store.delete(&key).unwrap_err().is_not_found(), "{name}");

        store.insert(&key, b"v1").unwrap();
        assert!(store.insert(&key, b"v2").unwrap_err().is_already_exists(), "{name}");
        assert_eq!(store.get(&key).unwrap(), b"v1", "{name}");

        store.update(&key, b"v2").unwrap();
        assert_eq!(store.get(&key).unwrap(), b"v2", "{name}");

        store.upsert(&key, b"v3").unwrap();
        store.upsert(&keys::account_key("bob"), b"b1").unwrap();
        assert_eq!(store.get(&key).unwrap(), b"v3", "{name}");

        store.delete(&key).unwrap();
        assert!(!store.has(&key).unwrap(), "{name}");
    }
}

fn seed_operations(store: &dyn Store, address: &str, heights: &[u64]) {
    for h in heights {
        let key = keys::operation_account_key(address, *h, &format!("op{h}"));
        store.insert(&key, format!("v{h}").as_bytes()).unwrap();
    }
}

#[test]
fn iterator_respects_prefix_order_and_limit() {
    for (name, store) in backends() {
        seed_operations(store.as_ref(), "alice", &[3, 1, 5, 2, 4]);
        seed_operations(store.as_ref(), "bob", &[1, 2]);

        let prefix = keys::operation_account_prefix("alice");
        let all: Vec<_> = store.iterator(&prefix, ListOptions::new()).unwrap().collect();
        assert_eq!(all.len(), 5, "{name}");
        let heights: Vec<Vec<u8>> = all.iter().map(|e| e.key.clone()).collect();
        let mut sorted = heights.clone();
        sorted.sort();
        assert_eq!(heights, sorted, "{name}: ascending key order");
        assert!(all.iter().all(|e| e.key.starts_with(&prefix)), "{name}: prefix isolation");

        let reversed: Vec<_> = store
            .iterator(&prefix, ListOptions::new().reverse(true))
            .unwrap()
            .map(|e| e.key)
            .collect();
        let mut expected = heights.clone();
        expected.reverse();
        assert_eq!(reversed, expected, "{name}: descending order");

        let limited: Vec<_> = store
            .iterator(&prefix, ListOptions::new().limit(2))
            .unwrap()
            .collect();
        assert_eq!(limited.len(), 2, "{name}");
        assert_eq!(limited[0].value, b"v1", "{name}");
    }
}

#[test]
fn cursor_pagination_has_no_gaps_and_no_overlap() {
    for (name, store) in backends() {
        seed_operations(store.as_ref(), "alice", &[1, 2, 3, 4, 5, 6, 7]);
        let prefix = keys::operation_account_prefix("alice");
        let full: Vec<_> = store
            .iterator(&prefix, ListOptions::new())
            .unwrap()
            .map(|e| e.key)
            .collect();

        for reverse in [false, true] {
            let mut paged = Vec::new();
            let mut cursor: Option<Vec<u8>> = None;
            loop {
                let mut opts = ListOptions::new().reverse(reverse).limit(3);
                if let Some(c) = &cursor {
                    opts = opts.cursor(c.clone());
                }
                let page: Vec<_> = store.iterator(&prefix, opts).unwrap().map(|e| e.key).collect();
                if page.is_empty() {
                    break;
                }
                cursor = page.last().cloned();
                paged.extend(page);
            }
            let mut expected = full.clone();
            if reverse {
                expected.reverse();
            }
            assert_eq!(paged, expected, "{name}: reverse={reverse}");
        }
    }
}

#[test]
fn apply_is_all_or_nothing() {
    for (name, store) in backends() {
        let existing = keys::account_key("taken");
        store.insert(&existing, b"v").unwrap();

        let fresh = keys::account_key("fresh");
        let err = store
            .apply(vec![
                WriteOp::Insert { key: fresh.clone(), value: b"a".to_vec() },
                WriteOp::Insert { key: existing.clone(), value: b"b".to_vec() },
            ])
            .unwrap_err();
        assert!(err.is_already_exists(), "{name}");
        assert!(!store.has(&fresh).unwrap(), "{name}: earlier op must not land");
        assert_eq!(store.get(&existing).unwrap(), b"v", "{name}");

        let err = store
            .apply(vec![
                WriteOp::Upsert { key: fresh.clone(), value: b"a".to_vec() },
                WriteOp::Delete { key: keys::account_key("ghost") },
            ])
            .unwrap_err();
        assert!(err.is_not_found(), "{name}");
        assert!(!store.has(&fresh).unwrap(), "{name}");
    }
}

#[test]
fn doc_store_rejects_unregistered_prefixes_uniformly() {
    let doc = DocStore::new(KeySchema::v1(), Arc::new(EventBus::new()));
    let err = doc.insert(b"zz-key", b"v").unwrap_err();
    assert!(matches!(err, StoreError::UnknownNamespace(_)));
    assert!(matches!(
        doc.iterator(b"zz", ListOptions::new()).unwrap_err(),
        StoreError::UnknownNamespace(_)
    ));
}
