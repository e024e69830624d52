#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use digest::errors::DigestError;
use digest::provider::{
    remote_account_key, remote_block_height_key, remote_transaction_key, RemoteAccount,
    RemoteBlock, RemoteOperation, RemoteTransaction,
};
use digest::rpc::{Page, PageItem, PageOptions, SnapshotRpc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use store::{register_default_hooks, EventBus, KvStore};

/// In-memory stand-in for the node's snapshot RPC: one open snapshot at a
/// time over a sorted key space.
pub struct MockSnapshotRpc {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
    open: RwLock<Option<String>>,
    next_id: AtomicU64,
    iterator_calls: AtomicUsize,
}

impl MockSnapshotRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(MockSnapshotRpc {
            records: RwLock::new(BTreeMap::new()),
            open: RwLock::new(None),
            next_id: AtomicU64::new(1),
            iterator_calls: AtomicUsize::new(0),
        })
    }

    pub fn put_block(&self, block: &RemoteBlock) {
        self.put(remote_block_height_key(block.height), serde_json::to_vec(block).unwrap());
    }

    pub fn put_transaction(&self, tx: &RemoteTransaction) {
        self.put(remote_transaction_key(&tx.hash), serde_json::to_vec(tx).unwrap());
    }

    pub fn put_account(&self, account: &RemoteAccount) {
        self.put(remote_account_key(&account.address), serde_json::to_vec(account).unwrap());
    }

    pub fn put(&self, key: String, value: Vec<u8>) {
        self.records.write().unwrap().insert(key, value);
    }

    pub fn remove(&self, key: &str) {
        self.records.write().unwrap().remove(key);
    }

    /// Drop the open handle as if the node expired it.
    pub fn forget_snapshot(&self) {
        self.open.write().unwrap().take();
    }

    pub fn iterator_calls(&self) -> usize {
        self.iterator_calls.load(Ordering::SeqCst)
    }

    fn check(&self, snapshot: &str) -> Result<(), DigestError> {
        match self.open.read().unwrap().as_deref() {
            Some(open) if open == snapshot => Ok(()),
            _ => Err(DigestError::custom(format!("unknown snapshot: {snapshot}"))),
        }
    }
}

#[async_trait]
impl SnapshotRpc for MockSnapshotRpc {
    async fn open_snapshot(&self) -> Result<String, DigestError> {
        let id = format!("snap-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        *self.open.write().unwrap() = Some(id.clone());
        Ok(id)
    }

    async fn release_snapshot(&self, snapshot: &str) -> Result<bool, DigestError> {
        let mut open = self.open.write().unwrap();
        if open.as_deref() == Some(snapshot) {
            open.take();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn has(&self, snapshot: &str, key: &str) -> Result<bool, DigestError> {
        self.check(snapshot)?;
        Ok(self.records.read().unwrap().contains_key(key))
    }

    async fn get(&self, snapshot: &str, key: &str) -> Result<Vec<u8>, DigestError> {
        self.check(snapshot)?;
        self.records
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| DigestError::custom(format!("key not found: {key}")))
    }

    async fn get_iterator(
        &self,
        snapshot: &str,
        prefix: &str,
        opts: PageOptions,
    ) -> Result<Page, DigestError> {
        self.check(snapshot)?;
        self.iterator_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read().unwrap();
        let mut items: Vec<PageItem> = records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| PageItem { key: k.clone(), value: BASE64.encode(v) })
            .collect();
        if opts.reverse {
            items.reverse();
        }
        if let Some(cursor) = &opts.cursor {
            items.retain(|item| {
                if opts.reverse {
                    item.key < *cursor
                } else {
                    item.key > *cursor
                }
            });
        }
        if opts.limit > 0 && items.len() as u64 > opts.limit {
            items.truncate(opts.limit as usize);
        }
        Ok(Page { limit: opts.limit, items })
    }
}

/// Deterministic single-transaction block: alice pays bob `height` at each
/// height.
pub fn chain_block(height: u64) -> (RemoteBlock, RemoteTransaction) {
    let tx_hash = format!("tx{height}");
    let block = RemoteBlock {
        height,
        hash: format!("blk{height}"),
        prev_hash: if height <= 1 { String::new() } else { format!("blk{}", height - 1) },
        proposer: "validator".into(),
        proposed_time: format!("2026-01-01T00:00:{:02}Z", height % 60),
        transactions: vec![tx_hash.clone()],
        proposer_transaction: String::new(),
    };
    let tx = RemoteTransaction {
        hash: tx_hash,
        source: "alice".into(),
        fee: 1,
        amount: height,
        created: block.proposed_time.clone(),
        confirmed: block.proposed_time.clone(),
        operations: vec![RemoteOperation {
            kind: "payment".into(),
            source: "alice".into(),
            target: "bob".into(),
            sequence_id: height,
            linked: None,
            amount: height,
        }],
    };
    (block, tx)
}

pub fn seed_chain(rpc: &MockSnapshotRpc, to_height: u64) {
    for height in 1..=to_height {
        let (block, tx) = chain_block(height);
        rpc.put_block(&block);
        rpc.put_transaction(&tx);
    }
    rpc.put_account(&RemoteAccount {
        address: "alice".into(),
        balance: 1_000,
        sequence_id: to_height,
        linked: None,
        created_height: 1,
    });
    rpc.put_account(&RemoteAccount {
        address: "bob".into(),
        balance: 500,
        sequence_id: 0,
        linked: None,
        created_height: 1,
    });
}

pub fn temp_store(prefix: &str) -> Arc<KvStore> {
    let bus = Arc::new(EventBus::new());
    register_default_hooks(&bus);
    KvStore::temp(prefix, bus).unwrap()
}
