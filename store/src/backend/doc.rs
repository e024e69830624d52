//! In-process document store backend.
//!
//! Each registered two-byte namespace maps to a distinct collection; keys
//! whose prefix has no registered collection are rejected. The byte-level
//! contract is identical to the KV backend; on top of it the collections can
//! be queried with the document filter grammar produced by the query builder.

use crate::errors::StoreError;
use crate::events::EventBus;
use crate::iter::{apply_options, Entry, EntryIter, ListOptions};
use crate::keys::{KeySchema, Namespace};
use crate::query::eval::matches;
use crate::store::{Store, WriteOp};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

type Collection = BTreeMap<Vec<u8>, Vec<u8>>;

pub struct DocStore {
    collections: RwLock<HashMap<[u8; 2], Collection>>,
    schema: KeySchema,
    bus: Arc<EventBus>,
}

impl DocStore {
    pub fn new(schema: KeySchema, bus: Arc<EventBus>) -> Arc<Self> {
        let mut collections = HashMap::new();
        for ns in schema.namespaces() {
            collections.insert(ns.code(), Collection::new());
        }
        Arc::new(DocStore { collections: RwLock::new(collections), schema, bus })
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// Decode every value in the namespace as a JSON document and return the
    /// ones matching the compiled filter.
    pub fn find(
        &self,
        ns: Namespace,
        filter: &serde_json::Value,
    ) -> Result<Vec<(Vec<u8>, serde_json::Value)>, StoreError> {
        let collections = self.collections.read().unwrap();
        let collection = collections
            .get(&ns.code())
            .ok_or_else(|| StoreError::UnknownNamespace(String::from_utf8_lossy(&ns.code()).into_owned()))?;
        let mut found = Vec::new();
        for (key, value) in collection {
            let doc: serde_json::Value = serde_json::from_slice(value)
                .map_err(|e| StoreError::DecodeValueFailed(e.to_string()))?;
            if matches(filter, &doc) {
                found.push((key.clone(), doc));
            }
        }
        Ok(found)
    }

    fn code_of(&self, key: &[u8]) -> Result<[u8; 2], StoreError> {
        self.schema.namespace_of(key).map(|ns| ns.code())
    }
}

impl Store for DocStore {
    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        let code = self.code_of(key)?;
        let collections = self.collections.read().unwrap();
        Ok(collections.get(&code).is_some_and(|c| c.contains_key(key)))
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        let code = self.code_of(key)?;
        let collections = self.collections.read().unwrap();
        collections
            .get(&code)
            .and_then(|c| c.get(key).cloned())
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn iterator(&self, prefix: &[u8], opts: ListOptions) -> Result<EntryIter, StoreError> {
        let code = self.code_of(prefix)?;
        let collections = self.collections.read().unwrap();
        let collection = match collections.get(&code) {
            Some(c) => c,
            None => return Ok(EntryIter::empty()),
        };
        let entries: Vec<Entry> = collection
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| Entry::new(k.clone(), v.clone()))
            .collect();
        Ok(EntryIter::new(apply_options(entries, &opts)))
    }

    fn apply(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().unwrap();
        // Validate against an overlay first; a precondition failure anywhere
        // must leave the store untouched.
        let mut overlay: HashMap<Vec<u8>, Option<Vec<u8>>> = HashMap::new();
        let mut order: Vec<Vec<u8>> = Vec::new();
        for op in &ops {
            let code = self.code_of(op.key())?;
            let exists = match overlay.get(op.key()) {
                Some(state) => state.is_some(),
                None => collections.get(&code).is_some_and(|c| c.contains_key(op.key())),
            };
            match op {
                WriteOp::Insert { key, value } => {
                    if exists {
                        return Err(StoreError::already_exists(key));
                    }
                    if overlay.insert(key.clone(), Some(value.clone())).is_none() {
                        order.push(key.clone());
                    }
                }
                WriteOp::Update { key, value } => {
                    if !exists {
                        return Err(StoreError::not_found(key));
                    }
                    if overlay.insert(key.clone(), Some(value.clone())).is_none() {
                        order.push(key.clone());
                    }
                }
                WriteOp::Upsert { key, value } => {
                    if overlay.insert(key.clone(), Some(value.clone())).is_none() {
                        order.push(key.clone());
                    }
                }
                WriteOp::Delete { key } => {
                    if !exists {
                        return Err(StoreError::not_found(key));
                    }
                    if overlay.insert(key.clone(), None).is_none() {
                        order.push(key.clone());
                    }
                }
            }
        }
        for key in order {
            let code = [key[0], key[1]];
            let collection = collections.entry(code).or_default();
            match overlay.remove(&key).flatten() {
                Some(value) => {
                    collection.insert(key, value);
                }
                None => {
                    collection.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn bus(&self) -> &EventBus {
        &self.bus
    }
}
