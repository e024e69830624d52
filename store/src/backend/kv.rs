//! Embedded ordered KV backend over redb.
//!
//! The whole keyspace lives in one table; namespaces are carried in the
//! two-byte key prefix and prefix scans become half-open key ranges.

use crate::errors::StoreError;
use crate::events::EventBus;
use crate::iter::{Entry, EntryIter, ListOptions};
use crate::keys::{schema_meta_key, KeySchema};
use crate::store::{Store, WriteOp};
use redb::{Database, ReadableTable, TableDefinition};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records_v1");

pub struct KvStore {
    db: Database,
    schema: KeySchema,
    bus: Arc<EventBus>,
}

impl KvStore {
    pub fn open(path: impl AsRef<Path>, schema: KeySchema, bus: Arc<EventBus>) -> Result<Arc<Self>, StoreError> {
        let db = Database::create(path)?;
        let store = KvStore { db, schema, bus };
        store.init_schema()?;
        Ok(Arc::new(store))
    }

    /// Throwaway store under the system temp dir, for tests.
    pub fn temp(prefix: &str, bus: Arc<EventBus>) -> Result<Arc<Self>, StoreError> {
        let dir = std::env::temp_dir().join("digest-store");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}_{}.redb", prefix, rand::random::<u64>()));
        KvStore::open(path, KeySchema::v1(), bus)
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// Persist the schema version on first open, verify it afterwards.
    fn init_schema(&self) -> Result<(), StoreError> {
        let key = schema_meta_key();
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(RECORDS)?;
            let stored = table.get(key.as_slice())?.map(|g| g.value().first().copied().unwrap_or(0));
            match stored {
                Some(stored) => {
                    if stored != self.schema.version() {
                        return Err(StoreError::SchemaMismatch {
                            stored,
                            expected: self.schema.version(),
                        });
                    }
                }
                None => {
                    table.insert(key.as_slice(), [self.schema.version()].as_slice())?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl Store for KvStore {
    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(RECORDS)?;
        Ok(table.get(key)?.is_some())
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(RECORDS)?;
        match table.get(key)? {
            Some(guard) => Ok(guard.value().to_vec()),
            None => Err(StoreError::not_found(key)),
        }
    }

    fn iterator(&self, prefix: &[u8], opts: ListOptions) -> Result<EntryIter, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(RECORDS)?;

        // Bound the scan by the cursor where possible so a paginated reader
        // never walks entries it has already consumed.
        let mut lower = Bound::Included(prefix.to_vec());
        let mut upper = match upper_bound(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        if let Some(cursor) = &opts.cursor {
            if opts.reverse {
                upper = Bound::Excluded(cursor.clone());
            } else {
                lower = Bound::Excluded(cursor.clone());
            }
        }

        let range = table.range::<&[u8]>((as_bound(&lower), as_bound(&upper)))?;
        let limit = opts.limit as usize;
        let mut entries = Vec::new();
        if opts.reverse {
            for item in range.rev() {
                let (k, v) = item?;
                entries.push(Entry::new(k.value().to_vec(), v.value().to_vec()));
                if limit > 0 && entries.len() == limit {
                    break;
                }
            }
        } else {
            for item in range {
                let (k, v) = item?;
                entries.push(Entry::new(k.value().to_vec(), v.value().to_vec()));
                if limit > 0 && entries.len() == limit {
                    break;
                }
            }
        }
        Ok(EntryIter::new(entries))
    }

    fn apply(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(RECORDS)?;
            for op in &ops {
                match op {
                    WriteOp::Insert { key, value } => {
                        if table.get(key.as_slice())?.is_some() {
                            return Err(StoreError::already_exists(key));
                        }
                        table.insert(key.as_slice(), value.as_slice())?;
                    }
                    WriteOp::Update { key, value } => {
                        if table.get(key.as_slice())?.is_none() {
                            return Err(StoreError::not_found(key));
                        }
                        table.insert(key.as_slice(), value.as_slice())?;
                    }
                    WriteOp::Upsert { key, value } => {
                        table.insert(key.as_slice(), value.as_slice())?;
                    }
                    WriteOp::Delete { key } => {
                        if table.remove(key.as_slice())?.is_none() {
                            return Err(StoreError::not_found(key));
                        }
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn bus(&self) -> &EventBus {
        &self.bus
    }
}

fn as_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(b) => Bound::Included(b.as_slice()),
        Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Smallest key strictly greater than every key starting with `prefix`.
fn upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last < 0xff {
            *last += 1;
            return Some(end);
        }
        end.pop();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_increments_with_carry() {
        assert_eq!(upper_bound(b"bn"), Some(b"bo".to_vec()));
        assert_eq!(upper_bound(&[0x61, 0xff]), Some(vec![0x62]));
        assert_eq!(upper_bound(&[0xff, 0xff]), None);
    }

    #[test]
    fn schema_version_is_verified_on_reopen() {
        let dir = std::env::temp_dir().join("digest-store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("schema_check_{}.redb", rand::random::<u64>()));
        {
            let store = KvStore::open(&path, KeySchema::v1(), Arc::new(EventBus::new())).unwrap();
            drop(store);
        }
        // reopening with the same schema succeeds and the version byte survived
        let store = KvStore::open(&path, KeySchema::v1(), Arc::new(EventBus::new())).unwrap();
        let meta = store.get(&schema_meta_key()).unwrap();
        assert_eq!(meta, vec![KeySchema::v1().version()]);
    }
}
