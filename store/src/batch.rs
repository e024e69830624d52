//! Buffered transaction over any [`Store`] backend.
//!
//! Writes buffer in memory and stay invisible to every reader, including the
//! batch's own reads, until `write()` applies them atomically. Events queued
//! during the batch fire in two phases around that apply: index hooks before
//! (their derived ops join the same transaction), subscribers strictly after.

use crate::errors::StoreError;
use crate::events::Event;
use crate::iter::{EntryIter, ListOptions};
use crate::store::{Store, WriteOp};
use std::sync::Arc;

pub struct Batch {
    store: Arc<dyn Store>,
    ops: Vec<WriteOp>,
    events: Vec<Event>,
    closed: bool,
}

impl Batch {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Batch { store, ops: Vec::new(), events: Vec::new(), closed: false }
    }

    /// Reads re-check the underlying store; buffered writes are invisible.
    pub fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.store.has(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.store.get(key)
    }

    pub fn iterator(&self, prefix: &[u8], opts: ListOptions) -> Result<EntryIter, StoreError> {
        self.store.iterator(prefix, opts)
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        // Front-load the duplicate error; apply() re-checks atomically.
        if self.buffers_key(key) || self.store.has(key)? {
            return Err(StoreError::already_exists(key));
        }
        self.ops.push(WriteOp::Insert { key: key.to_vec(), value: value.to_vec() });
        Ok(())
    }

    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        if !self.buffers_key(key) && !self.store.has(key)? {
            return Err(StoreError::not_found(key));
        }
        self.ops.push(WriteOp::Update { key: key.to_vec(), value: value.to_vec() });
        Ok(())
    }

    pub fn upsert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        self.ops.push(WriteOp::Upsert { key: key.to_vec(), value: value.to_vec() });
        Ok(())
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        if !self.buffers_key(key) && !self.store.has(key)? {
            return Err(StoreError::not_found(key));
        }
        self.ops.push(WriteOp::Delete { key: key.to_vec() });
        Ok(())
    }

    /// Queue an event; hooks and subscribers fire only on `write()`.
    pub fn event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.events.is_empty()
    }

    /// Run hooks for every queued event (transitively, follow-ups included),
    /// fold their derived ops into the buffer, apply everything atomically,
    /// then deliver the processed events. Nothing is delivered on failure and
    /// the batch closes either way; a failed batch cannot be retried.
    pub fn write(&mut self) -> Result<(), StoreError> {
        self.check_open()?;
        self.closed = true;
        let mut queue = std::mem::take(&mut self.events);
        let mut i = 0;
        while i < queue.len() {
            let out = self.store.bus().run_hooks(self.store.as_ref(), &queue[i])?;
            self.ops.extend(out.ops);
            queue.extend(out.follow_ups);
            i += 1;
        }
        let ops = std::mem::take(&mut self.ops);
        if !ops.is_empty() {
            self.store.apply(ops)?;
        }
        for event in &queue {
            self.store.bus().deliver(event);
        }
        Ok(())
    }

    /// Discard buffered ops and queued events without applying them.
    pub fn cancel(&mut self) {
        self.ops.clear();
        self.events.clear();
        self.closed = true;
    }

    fn buffers_key(&self, key: &[u8]) -> bool {
        self.ops.iter().any(|op| op.key() == key)
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::BatchClosed)
        } else {
            Ok(())
        }
    }
}
