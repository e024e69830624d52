//! Parallel block digestion.
//!
//! The engine partitions a height range into contiguous chunks and feeds them
//! to a pool of workers. Each block lands through its own batch, so a worker
//! failure never leaves a half-written block behind; the first error stops
//! dispatch and bubbles out of `run`.

use crate::errors::DigestError;
use crate::provider::{remote_block_height_key, RemoteBlock, RemoteLedger, BLOCK_HEIGHT_PREFIX};
use crate::rpc::PageOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::{info, warn, Batch, Block, Store};
use tokio::sync::{mpsc, Mutex};

#[derive(Clone)]
pub struct Digest {
    ledger: Arc<RemoteLedger>,
    store: Arc<dyn Store>,
    max_workers: usize,
}

impl Digest {
    pub fn new(ledger: Arc<RemoteLedger>, store: Arc<dyn Store>, max_workers: usize) -> Self {
        Digest { ledger, store, max_workers: max_workers.max(1) }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    /// Digest every block with height in `[start, end)`. With `initialize`
    /// set, the accounts touched by each transaction are fetched from the
    /// remote snapshot and upserted alongside it.
    pub async fn run(&self, start: u64, end: u64, initialize: bool) -> Result<(), DigestError> {
        if start >= end {
            return Ok(());
        }
        let chunk = self.ledger.page_size().max(1);
        let mut ranges = Vec::new();
        let mut lo = start;
        while lo < end {
            let hi = (lo + chunk).min(end);
            ranges.push((lo, hi));
            lo = hi;
        }
        let workers = ranges.len().clamp(1, self.max_workers);
        info!("digesting blocks [{}, {}) with {} workers", start, end, workers);

        let (work_tx, work_rx) = mpsc::channel::<(u64, u64)>(workers);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (err_tx, mut err_rx) = mpsc::unbounded_channel::<DigestError>();
        let failed = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let engine = self.clone();
            let work_rx = Arc::clone(&work_rx);
            let err_tx = err_tx.clone();
            let failed = Arc::clone(&failed);
            handles.push(tokio::spawn(async move {
                loop {
                    let range = { work_rx.lock().await.recv().await };
                    let Some((lo, hi)) = range else { break };
                    if let Err(e) = engine.digest_range(lo, hi, initialize).await {
                        failed.store(true, Ordering::SeqCst);
                        let _ = err_tx.send(e);
                        break;
                    }
                }
            }));
        }
        drop(err_tx);

        for range in ranges {
            if failed.load(Ordering::SeqCst) {
                break;
            }
            if work_tx.send(range).await.is_err() {
                break;
            }
        }
        drop(work_tx);

        for handle in handles {
            handle.await?;
        }
        match err_rx.recv().await {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Walk the remote height index across `[lo, hi)` and digest each block.
    async fn digest_range(&self, lo: u64, hi: u64, initialize: bool) -> Result<(), DigestError> {
        let mut opts = PageOptions::new();
        if lo > 0 {
            opts = opts.cursor(remote_block_height_key(lo - 1));
        }
        let mut pages = self.ledger.pages(BLOCK_HEIGHT_PREFIX.to_string(), opts, hi - lo);
        while let Some(item) = pages.next_item().await? {
            let remote: RemoteBlock = serde_json::from_slice(&item.decoded()?)?;
            if remote.height >= hi {
                break;
            }
            self.digest_block(remote, initialize).await?;
        }
        Ok(())
    }

    async fn digest_block(&self, remote: RemoteBlock, initialize: bool) -> Result<(), DigestError> {
        if Block::exists(self.store.as_ref(), &remote.hash)? {
            info!("block {} at height {} already digested, skipping", remote.hash, remote.height);
            return Ok(());
        }
        let block = remote.into_block();
        let tx_hashes: Vec<String> = block.transaction_hashes().cloned().collect();
        let height = block.height;
        let proposer_tx = block.proposer_transaction.clone();

        let mut batch = Batch::new(self.store());
        block.save(&mut batch)?;
        for hash in tx_hashes {
            let (remote_tx, raw) = self.ledger.transaction(&hash).await?;
            let fee_collecting = hash == proposer_tx;
            let (tx, operations) = remote_tx.into_entities(height, raw, fee_collecting)?;
            tx.save(&mut batch)?;
            for op in &operations {
                op.save(&mut batch)?;
            }
            if initialize {
                for address in tx.all_accounts() {
                    let account = self.ledger.account(address).await?.into_account();
                    account.upsert(&mut batch)?;
                }
            }
        }
        match batch.write() {
            Ok(()) => Ok(()),
            // another worker got the block in first
            Err(e) if e.is_already_exists() => {
                warn!("block at height {} was digested concurrently: {}", height, e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
