//! The backend-agnostic storage contract.
//!
//! Keys and values are byte strings; the bincode codec helpers below carry
//! typed entities through it. Backends must produce identical externally
//! observable semantics for every method here.

use crate::errors::StoreError;
use crate::events::{Event, EventBus};
use crate::iter::{EntryIter, ListOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One buffered mutation. Preconditions are re-checked by the backend inside
/// the same transaction that applies the op, so check and write cannot race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Fails the whole apply with `AlreadyExists` when the key is present.
    Insert { key: Vec<u8>, value: Vec<u8> },
    /// Fails the whole apply with `NotFound` when the key is absent.
    Update { key: Vec<u8>, value: Vec<u8> },
    /// Insert-or-replace, last write wins.
    Upsert { key: Vec<u8>, value: Vec<u8> },
    /// Fails the whole apply with `NotFound` when the key is absent.
    Delete { key: Vec<u8> },
}

impl WriteOp {
    pub fn key(&self) -> &[u8] {
        match self {
            WriteOp::Insert { key, .. }
            | WriteOp::Update { key, .. }
            | WriteOp::Upsert { key, .. }
            | WriteOp::Delete { key } => key,
        }
    }
}

pub trait Store: Send + Sync {
    fn has(&self, key: &[u8]) -> Result<bool, StoreError>;

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Lazy, finite, one-shot scan of `(key, value)` pairs under `prefix`,
    /// lexicographic ascending (or descending per `opts.reverse`), resuming
    /// strictly past `opts.cursor`, capped at `opts.limit` (0 = unbounded).
    fn iterator(&self, prefix: &[u8], opts: ListOptions) -> Result<EntryIter, StoreError>;

    /// Apply a buffered op list atomically: either every op lands or none
    /// does, and no reader ever observes a subset.
    fn apply(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    fn bus(&self) -> &EventBus;

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.apply(vec![WriteOp::Insert { key: key.to_vec(), value: value.to_vec() }])
    }

    fn update(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.apply(vec![WriteOp::Update { key: key.to_vec(), value: value.to_vec() }])
    }

    fn upsert(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.apply(vec![WriteOp::Upsert { key: key.to_vec(), value: value.to_vec() }])
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.apply(vec![WriteOp::Delete { key: key.to_vec() }])
    }
}

/// Publish an event outside a batch: hooks fire immediately, their derived
/// ops are applied atomically, then the event (and any follow-ups,
/// transitively) is delivered to after-commit subscribers.
pub fn publish(store: &dyn Store, event: Event) -> Result<(), StoreError> {
    let mut queue = vec![event];
    let mut i = 0;
    while i < queue.len() {
        let out = store.bus().run_hooks(store, &queue[i])?;
        if !out.ops.is_empty() {
            store.apply(out.ops)?;
        }
        queue.extend(out.follow_ups);
        i += 1;
    }
    for ev in &queue {
        store.bus().deliver(ev);
    }
    Ok(())
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serde::encode_to_vec(value, bincode::config::standard())?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| StoreError::DecodeValueFailed(e.to_string()))
}

pub fn get_as<T: DeserializeOwned>(store: &dyn Store, key: &[u8]) -> Result<T, StoreError> {
    decode(&store.get(key)?)
}

pub fn insert_as<T: Serialize>(store: &dyn Store, key: &[u8], value: &T) -> Result<(), StoreError> {
    store.insert(key, &encode(value)?)
}
