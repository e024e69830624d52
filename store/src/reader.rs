//! Read-side accessors over the committed store.
//!
//! Point lookups decode the primary record directly; listing goes through a
//! secondary-index scan and resolves each index row back to its entity. Every
//! listed item carries the index key it came from, which doubles as the
//! resume cursor for the next page.

use crate::errors::StoreError;
use crate::iter::{EntryIter, ListOptions};
use crate::keys;
use crate::model::{Account, Block, Operation, Transaction};
use crate::store::{self, Store};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// One page of entities resolved from an index scan. Yields the entity
/// together with the index key to pass as `ListOptions::cursor` to resume
/// strictly after it.
pub struct Page<T> {
    store: Arc<dyn Store>,
    entries: EntryIter,
    primary_key: fn(&str) -> Vec<u8>,
    _entity: PhantomData<T>,
}

impl<T: DeserializeOwned> Iterator for Page<T> {
    type Item = Result<(T, Vec<u8>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        let item = String::from_utf8(entry.value)
            .map_err(|e| StoreError::DecodeValueFailed(e.to_string()))
            .and_then(|hash| store::get_as::<T>(self.store.as_ref(), &(self.primary_key)(&hash)))
            .map(|entity| (entity, entry.key));
        Some(item)
    }
}

#[derive(Clone)]
pub struct Reader {
    store: Arc<dyn Store>,
}

impl Reader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Reader { store }
    }

    pub fn account(&self, address: &str) -> Result<Account, StoreError> {
        store::get_as(self.store.as_ref(), &keys::account_key(address))
    }

    pub fn block_by_hash(&self, hash: &str) -> Result<Block, StoreError> {
        store::get_as(self.store.as_ref(), &keys::block_hash_key(hash))
    }

    pub fn block_by_height(&self, height: u64) -> Result<Block, StoreError> {
        let hash = self.indexed_hash(&keys::block_height_key(height))?;
        self.block_by_hash(&hash)
    }

    /// Highest-height block, found by a reverse scan over the height index.
    pub fn last_block(&self) -> Result<Block, StoreError> {
        let prefix = keys::Namespace::BlockHeight.prefix();
        let mut iter = self
            .store
            .iterator(&prefix, ListOptions::default().reverse(true).limit(1))?;
        match iter.next() {
            Some(entry) => {
                let hash = String::from_utf8(entry.value)
                    .map_err(|e| StoreError::DecodeValueFailed(e.to_string()))?;
                self.block_by_hash(&hash)
            }
            None => Err(StoreError::not_found(&prefix)),
        }
    }

    pub fn transaction(&self, hash: &str) -> Result<Transaction, StoreError> {
        store::get_as(self.store.as_ref(), &keys::transaction_hash_key(hash))
    }

    pub fn operation(&self, hash: &str) -> Result<Operation, StoreError> {
        store::get_as(self.store.as_ref(), &keys::operation_hash_key(hash))
    }

    /// Operations touching `address`, in block order.
    pub fn operations_by_account(
        &self,
        address: &str,
        opts: ListOptions,
    ) -> Result<Page<Operation>, StoreError> {
        self.page(&keys::operation_account_prefix(address), opts, keys::operation_hash_key)
    }

    /// Transactions touching `address` as source or operation target.
    pub fn transactions_by_account(
        &self,
        address: &str,
        opts: ListOptions,
    ) -> Result<Page<Transaction>, StoreError> {
        self.page(&keys::transaction_account_prefix(address), opts, keys::transaction_hash_key)
    }

    pub fn transactions_by_source(
        &self,
        source: &str,
        opts: ListOptions,
    ) -> Result<Page<Transaction>, StoreError> {
        self.page(&keys::transaction_source_prefix(source), opts, keys::transaction_hash_key)
    }

    pub fn transactions_in_block(
        &self,
        height: u64,
        opts: ListOptions,
    ) -> Result<Page<Transaction>, StoreError> {
        self.page(&keys::transaction_block_prefix(height), opts, keys::transaction_hash_key)
    }

    fn indexed_hash(&self, index_key: &[u8]) -> Result<String, StoreError> {
        let value = self.store.get(index_key)?;
        String::from_utf8(value).map_err(|e| StoreError::DecodeValueFailed(e.to_string()))
    }

    fn page<T: DeserializeOwned>(
        &self,
        prefix: &[u8],
        opts: ListOptions,
        primary_key: fn(&str) -> Vec<u8>,
    ) -> Result<Page<T>, StoreError> {
        let entries = self.store.iterator(prefix, opts)?;
        Ok(Page {
            store: Arc::clone(&self.store),
            entries,
            primary_key,
            _entity: PhantomData,
        })
    }
}
