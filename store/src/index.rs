//! Default secondary-index hooks.
//!
//! Each hook turns one entity event into the derived index records that make
//! the reader's lookups possible. Index values hold the primary entity hash,
//! never the entity itself, so an index row stays a constant-size pointer.

use crate::errors::StoreError;
use crate::events::{Event, EventBus, HookOutput, IndexHook};
use crate::keys;
use crate::store::{Store, WriteOp};

fn insert(key: Vec<u8>, hash: &str) -> WriteOp {
    WriteOp::Insert { key, value: hash.as_bytes().to_vec() }
}

/// height -> block hash
pub struct BlockIndexHook;

impl IndexHook for BlockIndexHook {
    fn name(&self) -> &'static str {
        "block_index"
    }

    fn derive(&self, _store: &dyn Store, event: &Event) -> Result<HookOutput, StoreError> {
        let Event::BlockSaved(block) = event else {
            return Ok(HookOutput::none());
        };
        Ok(HookOutput::with_ops(vec![insert(
            keys::block_height_key(block.height),
            &block.hash,
        )]))
    }
}

/// block / source / touched-account -> transaction hash
pub struct TransactionIndexHook;

impl IndexHook for TransactionIndexHook {
    fn name(&self) -> &'static str {
        "transaction_index"
    }

    fn derive(&self, _store: &dyn Store, event: &Event) -> Result<HookOutput, StoreError> {
        let Event::TransactionSaved(tx) = event else {
            return Ok(HookOutput::none());
        };
        let mut ops = vec![
            insert(keys::transaction_block_key(tx.block_height, &tx.hash), &tx.hash),
            insert(keys::transaction_source_key(&tx.source, tx.block_height, &tx.hash), &tx.hash),
        ];
        for account in tx.all_accounts() {
            ops.push(insert(
                keys::transaction_account_key(account, tx.block_height, &tx.hash),
                &tx.hash,
            ));
        }
        Ok(HookOutput { ops, follow_ups: Vec::new() })
    }
}

/// participant -> operation hash, plus a `NewOperation` follow-up per
/// participant for live watchers.
pub struct OperationIndexHook;

impl IndexHook for OperationIndexHook {
    fn name(&self) -> &'static str {
        "operation_index"
    }

    fn derive(&self, _store: &dyn Store, event: &Event) -> Result<HookOutput, StoreError> {
        let Event::OperationSaved(op) = event else {
            return Ok(HookOutput::none());
        };
        let mut out = HookOutput::none();
        for participant in op.participants() {
            out.ops.push(insert(
                keys::operation_account_key(participant, op.block_height, &op.hash),
                &op.hash,
            ));
            out.follow_ups.push(Event::NewOperation {
                address: participant.to_string(),
                operation: op.clone(),
            });
        }
        Ok(out)
    }
}

/// Accounts are keyed by address directly, nothing derived.
pub struct AccountHook;

impl IndexHook for AccountHook {
    fn name(&self) -> &'static str {
        "account_index"
    }

    fn derive(&self, _store: &dyn Store, _event: &Event) -> Result<HookOutput, StoreError> {
        Ok(HookOutput::none())
    }
}

pub fn register_default_hooks(bus: &EventBus) {
    bus.register_hook(Box::new(BlockIndexHook));
    bus.register_hook(Box::new(TransactionIndexHook));
    bus.register_hook(Box::new(OperationIndexHook));
    bus.register_hook(Box::new(AccountHook));
}
