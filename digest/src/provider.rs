//! Remote ledger access on top of the snapshot RPC.
//!
//! [`RemoteLedger`] owns at most one open snapshot handle and exposes typed
//! reads of the node's key layout. [`RemotePages`] pulls prefix scans page by
//! page, carrying the cursor forward so a long backfill never refetches what
//! it already consumed.

use crate::errors::DigestError;
use crate::rpc::{PageItem, PageOptions, SnapshotRpc};
use store::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use store::model::{Block, Operation, OperationKind, Transaction};
use tokio::sync::RwLock;

pub const BLOCK_HEIGHT_PREFIX: &str = "block/height/";

/// Heights are zero-padded so the remote iterator walks them in numeric order.
pub fn remote_block_height_key(height: u64) -> String {
    format!("{}{:020}", BLOCK_HEIGHT_PREFIX, height)
}

pub fn remote_transaction_key(hash: &str) -> String {
    format!("transaction/{}", hash)
}

pub fn remote_account_key(address: &str) -> String {
    format!("account/{}", address)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteBlock {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    pub proposer: String,
    pub proposed_time: String,
    #[serde(default)]
    pub transactions: Vec<String>,
    #[serde(default)]
    pub proposer_transaction: String,
}

impl RemoteBlock {
    pub fn into_block(self) -> Block {
        Block {
            height: self.height,
            hash: self.hash,
            prev_hash: self.prev_hash,
            proposer: self.proposer,
            proposed_time: self.proposed_time,
            transactions: self.transactions,
            proposer_transaction: self.proposer_transaction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteOperation {
    pub kind: String,
    pub source: String,
    pub target: String,
    pub sequence_id: u64,
    #[serde(default)]
    pub linked: Option<String>,
    pub amount: u64,
}

impl RemoteOperation {
    fn kind(&self) -> Result<OperationKind, DigestError> {
        match self.kind.as_str() {
            "create_account" => Ok(OperationKind::CreateAccount),
            "payment" => Ok(OperationKind::Payment),
            other => Err(DigestError::custom(format!("unknown operation kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTransaction {
    pub hash: String,
    pub source: String,
    pub fee: u64,
    pub amount: u64,
    pub created: String,
    pub confirmed: String,
    #[serde(default)]
    pub operations: Vec<RemoteOperation>,
}

impl RemoteTransaction {
    /// Flatten into the local transaction plus one operation per embedded
    /// remote operation, hashed by position within the transaction.
    pub fn into_entities(
        self,
        block_height: u64,
        raw: Vec<u8>,
        fee_collecting: bool,
    ) -> Result<(Transaction, Vec<Operation>), DigestError> {
        let mut operations = Vec::with_capacity(self.operations.len());
        for (index, op) in self.operations.iter().enumerate() {
            operations.push(Operation {
                hash: Operation::compose_hash(&self.hash, index),
                tx_hash: self.hash.clone(),
                kind: op.kind()?,
                source: op.source.clone(),
                target: op.target.clone(),
                sequence_id: op.sequence_id,
                linked: op.linked.clone(),
                amount: op.amount,
                block_height,
                raw: serde_json::to_vec(op)?,
            });
        }
        let tx = Transaction::new(
            self.hash,
            block_height,
            self.source,
            self.fee,
            self.amount,
            self.created,
            self.confirmed,
            operations.iter().map(|op| op.hash.clone()).collect(),
            raw,
            fee_collecting,
        );
        Ok((tx, operations))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub address: String,
    pub balance: u64,
    pub sequence_id: u64,
    #[serde(default)]
    pub linked: Option<String>,
    pub created_height: u64,
}

impl RemoteAccount {
    pub fn into_account(self) -> store::Account {
        store::Account {
            address: self.address,
            balance: self.balance,
            sequence_id: self.sequence_id,
            linked: self.linked,
            created_height: self.created_height,
        }
    }
}

/// Session over one snapshot of the upstream ledger. All reads require an
/// open snapshot; opening twice or reading without one is an error.
pub struct RemoteLedger {
    rpc: Arc<dyn SnapshotRpc>,
    snapshot: RwLock<Option<String>>,
    page_size: u64,
}

impl RemoteLedger {
    pub fn new(rpc: Arc<dyn SnapshotRpc>, page_size: u64) -> Self {
        RemoteLedger { rpc, snapshot: RwLock::new(None), page_size }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub async fn open(&self) -> Result<(), DigestError> {
        let mut snapshot = self.snapshot.write().await;
        if let Some(existing) = snapshot.as_ref() {
            return Err(DigestError::ProviderAlreadyOpen(existing.clone()));
        }
        *snapshot = Some(self.rpc.open_snapshot().await?);
        Ok(())
    }

    pub async fn close(&self) -> Result<(), DigestError> {
        let handle = self.snapshot.write().await.take().ok_or(DigestError::ProviderNotOpened)?;
        if !self.rpc.release_snapshot(&handle).await? {
            warn!("snapshot {} was already gone on release", handle);
        }
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    async fn snapshot_id(&self) -> Result<String, DigestError> {
        self.snapshot.read().await.clone().ok_or(DigestError::ProviderNotOpened)
    }

    pub async fn has(&self, key: &str) -> Result<bool, DigestError> {
        let snapshot = self.snapshot_id().await?;
        self.rpc.has(&snapshot, key).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<(T, Vec<u8>), DigestError> {
        let snapshot = self.snapshot_id().await?;
        let raw = self.rpc.get(&snapshot, key).await?;
        let value = serde_json::from_slice(&raw)?;
        Ok((value, raw))
    }

    pub async fn block_at(&self, height: u64) -> Result<RemoteBlock, DigestError> {
        Ok(self.get_json(&remote_block_height_key(height)).await?.0)
    }

    pub async fn transaction(&self, hash: &str) -> Result<(RemoteTransaction, Vec<u8>), DigestError> {
        self.get_json(&remote_transaction_key(hash)).await
    }

    pub async fn account(&self, address: &str) -> Result<RemoteAccount, DigestError> {
        Ok(self.get_json(&remote_account_key(address)).await?.0)
    }

    /// Paged scan under `prefix`, yielding at most `budget` items (0 = no
    /// cap), resuming strictly past `opts.cursor`.
    pub fn pages(&self, prefix: String, opts: PageOptions, budget: u64) -> RemotePages<'_> {
        RemotePages {
            ledger: self,
            prefix,
            reverse: opts.reverse,
            cursor: opts.cursor,
            buf: VecDeque::new(),
            yielded: 0,
            budget,
            done: false,
        }
    }
}

/// Pull-based paged iterator over one remote prefix. A page shorter than the
/// requested size means the prefix is exhausted.
pub struct RemotePages<'a> {
    ledger: &'a RemoteLedger,
    prefix: String,
    reverse: bool,
    cursor: Option<String>,
    buf: VecDeque<PageItem>,
    yielded: u64,
    budget: u64,
    done: bool,
}

impl RemotePages<'_> {
    pub async fn next_item(&mut self) -> Result<Option<PageItem>, DigestError> {
        loop {
            if self.budget > 0 && self.yielded >= self.budget {
                return Ok(None);
            }
            if let Some(item) = self.buf.pop_front() {
                self.yielded += 1;
                return Ok(Some(item));
            }
            if self.done {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    async fn fetch_page(&mut self) -> Result<(), DigestError> {
        let snapshot = self.ledger.snapshot_id().await?;
        let mut opts = PageOptions::new().reverse(self.reverse).limit(self.ledger.page_size);
        if let Some(cursor) = &self.cursor {
            opts = opts.cursor(cursor.clone());
        }
        let page = self.ledger.rpc.get_iterator(&snapshot, &self.prefix, opts).await?;
        if (page.items.len() as u64) < self.ledger.page_size {
            self.done = true;
        }
        if let Some(last) = page.items.last() {
            self.cursor = Some(last.key.clone());
        }
        self.buf.extend(page.items);
        if self.buf.is_empty() {
            self.done = true;
        }
        Ok(())
    }
}
