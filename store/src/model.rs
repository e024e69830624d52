//! Canonical ledger entities and their save operations.
//!
//! Entities are bincode-encoded under their primary key; every save queues
//! the matching domain event so the registered index hooks can fan the write
//! out into secondary records inside the same batch.

use crate::batch::Batch;
use crate::errors::StoreError;
use crate::events::Event;
use crate::keys;
use crate::store::{self, Store};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    pub proposer: String,
    pub proposed_time: String,
    pub transactions: Vec<String>,
    pub proposer_transaction: String,
}

impl Block {
    /// Insert-once; a block is created exactly once per height by the digest.
    pub fn save(&self, batch: &mut Batch) -> Result<(), StoreError> {
        batch.insert(&keys::block_hash_key(&self.hash), &store::encode(self)?)?;
        batch.event(Event::BlockSaved(self.clone()));
        Ok(())
    }

    pub fn exists(store: &dyn Store, hash: &str) -> Result<bool, StoreError> {
        store.has(&keys::block_hash_key(hash))
    }

    /// Every transaction hash carried by the block, proposer transaction included.
    pub fn transaction_hashes(&self) -> impl Iterator<Item = &String> {
        self.transactions
            .iter()
            .chain(Some(&self.proposer_transaction).filter(|h| !h.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub block_height: u64,
    pub source: String,
    pub fee: u64,
    pub amount: u64,
    pub created: String,
    pub confirmed: String,
    pub operations: Vec<String>,
    /// Encoded transaction body, kept verbatim for re-parsing.
    pub raw: Vec<u8>,
    /// True for the proposer transaction that collects the block's fees.
    pub fee_collecting: bool,
    #[serde(skip)]
    all_accounts: OnceCell<Vec<String>>,
}

/// The slice of the raw body `all_accounts` needs back out.
#[derive(Deserialize)]
struct RawBody {
    #[serde(default)]
    operations: Vec<RawOperation>,
}

#[derive(Deserialize)]
struct RawOperation {
    target: String,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hash: String,
        block_height: u64,
        source: String,
        fee: u64,
        amount: u64,
        created: String,
        confirmed: String,
        operations: Vec<String>,
        raw: Vec<u8>,
        fee_collecting: bool,
    ) -> Self {
        Transaction {
            hash,
            block_height,
            source,
            fee,
            amount,
            created,
            confirmed,
            operations,
            raw,
            fee_collecting,
            all_accounts: OnceCell::new(),
        }
    }

    /// Accounts touched by this transaction: the source unless the
    /// transaction is fee-collecting, plus every operation's target.
    /// Re-parsed from the raw body lazily and cached per instance.
    pub fn all_accounts(&self) -> &[String] {
        self.all_accounts.get_or_init(|| {
            let mut accounts: Vec<String> = Vec::new();
            if !self.fee_collecting {
                accounts.push(self.source.clone());
            }
            if let Ok(body) = serde_json::from_slice::<RawBody>(&self.raw) {
                for op in body.operations {
                    if !accounts.contains(&op.target) {
                        accounts.push(op.target);
                    }
                }
            }
            accounts
        })
    }

    pub fn save(&self, batch: &mut Batch) -> Result<(), StoreError> {
        batch.insert(&keys::transaction_hash_key(&self.hash), &store::encode(self)?)?;
        batch.event(Event::TransactionSaved(self.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    CreateAccount,
    Payment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Composite: owning transaction hash + zero-padded index within it.
    pub hash: String,
    pub tx_hash: String,
    pub kind: OperationKind,
    pub source: String,
    pub target: String,
    pub sequence_id: u64,
    /// Linked account, set for account-creation operations.
    pub linked: Option<String>,
    pub amount: u64,
    pub block_height: u64,
    pub raw: Vec<u8>,
}

impl Operation {
    pub fn compose_hash(tx_hash: &str, index: usize) -> String {
        format!("{}-{:04}", tx_hash, index)
    }

    /// Source and target, deduplicated.
    pub fn participants(&self) -> Vec<&str> {
        if self.source == self.target {
            vec![self.source.as_str()]
        } else {
            vec![self.source.as_str(), self.target.as_str()]
        }
    }

    pub fn save(&self, batch: &mut Batch) -> Result<(), StoreError> {
        batch.insert(&keys::operation_hash_key(&self.hash), &store::encode(self)?)?;
        batch.event(Event::OperationSaved(self.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub balance: u64,
    pub sequence_id: u64,
    pub linked: Option<String>,
    pub created_height: u64,
}

impl Account {
    /// Insert-or-update, last write wins.
    pub fn upsert(&self, batch: &mut Batch) -> Result<(), StoreError> {
        batch.upsert(&keys::account_key(&self.address), &store::encode(self)?)?;
        batch.event(Event::AccountSaved(self.clone()));
        Ok(())
    }
}
