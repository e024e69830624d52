//! Batch lifecycle: buffering, atomic write, cancellation, and the two event
//! phases around the commit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use store::{
    keys, publish, Account, Batch, Event, EventBus, EventKind, HookOutput, IndexHook, KvStore,
    Store, StoreError, WriteOp,
};

fn account(address: &str) -> Account {
    Account {
        address: address.to_string(),
        balance: 100,
        sequence_id: 1,
        linked: None,
        created_height: 1,
    }
}

#[test]
fn buffered_writes_are_invisible_until_write() {
    let store = KvStore::temp("batch_vis", Arc::new(EventBus::new())).unwrap();
    let key = keys::account_key("alice");

    let mut batch = Batch::new(store.clone() as Arc<dyn Store>);
    batch.insert(&key, b"v").unwrap();

    assert!(!store.has(&key).unwrap());
    assert!(!batch.has(&key).unwrap(), "batch reads see committed state only");

    batch.write().unwrap();
    assert_eq!(store.get(&key).unwrap(), b"v");
}

#[test]
fn cancel_discards_everything_and_closes_the_batch() {
    let store = KvStore::temp("batch_cancel", Arc::new(EventBus::new())).unwrap();
    let key = keys::account_key("alice");

    let mut batch = Batch::new(store.clone() as Arc<dyn Store>);
    batch.insert(&key, b"v").unwrap();
    batch.event(Event::AccountSaved(account("alice")));
    batch.cancel();

    assert!(!store.has(&key).unwrap());
    assert!(matches!(batch.insert(&key, b"v").unwrap_err(), StoreError::BatchClosed));
    assert!(matches!(batch.write().unwrap_err(), StoreError::BatchClosed));
}

#[test]
fn duplicate_insert_fails_inside_the_batch() {
    let store = KvStore::temp("batch_dup", Arc::new(EventBus::new())).unwrap();
    let key = keys::account_key("alice");

    let mut batch = Batch::new(store.clone() as Arc<dyn Store>);
    batch.insert(&key, b"v1").unwrap();
    assert!(batch.insert(&key, b"v2").unwrap_err().is_already_exists());

    store.insert(&keys::account_key("bob"), b"b").unwrap();
    assert!(batch.insert(&keys::account_key("bob"), b"b2").unwrap_err().is_already_exists());
}

#[test]
fn update_and_delete_accept_keys_buffered_earlier() {
    let store = KvStore::temp("batch_chain", Arc::new(EventBus::new())).unwrap();
    let key = keys::account_key("alice");

    let mut batch = Batch::new(store.clone() as Arc<dyn Store>);
    batch.insert(&key, b"v1").unwrap();
    batch.update(&key, b"v2").unwrap();
    batch.write().unwrap();
    assert_eq!(store.get(&key).unwrap(), b"v2");
}

/// Hook that indexes saved accounts under a height key, used to observe the
/// before-commit phase.
struct CountingHook {
    derived: Arc<AtomicUsize>,
    fail: bool,
}

impl IndexHook for CountingHook {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn derive(&self, _store: &dyn Store, event: &Event) -> Result<HookOutput, StoreError> {
        let Event::AccountSaved(acc) = event else {
            return Ok(HookOutput::none());
        };
        if self.fail {
            return Err(StoreError::DecodeValueFailed("boom".into()));
        }
        self.derived.fetch_add(1, Ordering::SeqCst);
        Ok(HookOutput::with_ops(vec![WriteOp::Upsert {
            key: keys::block_height_key(acc.created_height),
            value: acc.address.as_bytes().to_vec(),
        }]))
    }
}

#[test]
fn hooks_join_the_commit_and_subscribers_run_after() {
    let bus = Arc::new(EventBus::new());
    let derived = Arc::new(AtomicUsize::new(0));
    bus.register_hook(Box::new(CountingHook { derived: derived.clone(), fail: false }));
    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let delivered = delivered.clone();
        bus.subscribe(Some(EventKind::AccountSaved), move |_| {
            delivered.fetch_add(1, Ordering::SeqCst);
        });
    }

    let store = KvStore::temp("batch_phases", bus).unwrap();
    let mut batch = Batch::new(store.clone() as Arc<dyn Store>);
    let acc = account("alice");
    acc.upsert(&mut batch).unwrap();

    assert_eq!(derived.load(Ordering::SeqCst), 0, "hooks wait for write()");
    assert_eq!(delivered.load(Ordering::SeqCst), 0);

    batch.write().unwrap();

    assert_eq!(derived.load(Ordering::SeqCst), 1);
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(store.get(&keys::block_height_key(1)).unwrap(), b"alice");
}

#[test]
fn publish_runs_hooks_atomically_and_delivers_after() {
    let bus = Arc::new(EventBus::new());
    let derived = Arc::new(AtomicUsize::new(0));
    bus.register_hook(Box::new(CountingHook { derived: derived.clone(), fail: false }));
    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let delivered = delivered.clone();
        bus.subscribe(Some(EventKind::AccountSaved), move |_| {
            delivered.fetch_add(1, Ordering::SeqCst);
        });
    }

    let store = KvStore::temp("publish_phases", bus).unwrap();
    publish(store.as_ref(), Event::AccountSaved(account("alice"))).unwrap();

    assert_eq!(derived.load(Ordering::SeqCst), 1);
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(store.get(&keys::block_height_key(1)).unwrap(), b"alice");
}

#[test]
fn publish_with_a_failing_hook_applies_and_delivers_nothing() {
    let bus = Arc::new(EventBus::new());
    bus.register_hook(Box::new(CountingHook { derived: Arc::new(AtomicUsize::new(0)), fail: true }));
    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let delivered = delivered.clone();
        bus.subscribe(None, move |_| {
            delivered.fetch_add(1, Ordering::SeqCst);
        });
    }

    let store = KvStore::temp("publish_fail", bus).unwrap();
    let err = publish(store.as_ref(), Event::AccountSaved(account("alice"))).unwrap_err();
    assert!(matches!(err, StoreError::Hook { hook: "counting", .. }));
    assert!(!store.has(&keys::block_height_key(1)).unwrap());
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_hook_aborts_the_batch_and_delivers_nothing() {
    let bus = Arc::new(EventBus::new());
    bus.register_hook(Box::new(CountingHook { derived: Arc::new(AtomicUsize::new(0)), fail: true }));
    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let delivered = delivered.clone();
        bus.subscribe(None, move |_| {
            delivered.fetch_add(1, Ordering::SeqCst);
        });
    }

    let store = KvStore::temp("batch_hook_fail", bus).unwrap();
    let mut batch = Batch::new(store.clone() as Arc<dyn Store>);
    let acc = account("alice");
    acc.upsert(&mut batch).unwrap();

    let err = batch.write().unwrap_err();
    assert!(matches!(err, StoreError::Hook { hook: "counting", .. }));
    assert!(!store.has(&keys::account_key("alice")).unwrap(), "entity op must not land");
    assert_eq!(delivered.load(Ordering::SeqCst), 0, "nothing delivered on failure");

    // the failed batch is closed; retrying must not report a silent success
    assert!(matches!(batch.write().unwrap_err(), StoreError::BatchClosed));
    assert!(matches!(batch.insert(&keys::account_key("bob"), b"b").unwrap_err(), StoreError::BatchClosed));
}
