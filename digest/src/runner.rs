//! Keeps the local store in step with the remote ledger.
//!
//! The runner boots by backfilling whatever the local store is missing, then
//! polls the remote tip. Small gaps are followed synchronously within the
//! poll tick; a gap past `far_block_height` is only digested when
//! `force_follow` is set, as a background task, so a stalled deployment
//! cannot silently pin a poll tick for hours.

use crate::engine::Digest;
use crate::errors::DigestError;
use crate::provider::{RemoteBlock, RemoteLedger, BLOCK_HEIGHT_PREFIX};
use crate::rpc::PageOptions;
use crate::settings::DigestSettings;
use std::sync::{Arc, Mutex, RwLock};
use store::{error, info, warn, Reader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Backfilling,
    CaughtUp,
    Following,
    SteadyPoll,
}

#[derive(Debug, Clone, Default)]
struct Cursors {
    last_local: u64,
    stored_remote: Option<(u64, String)>,
}

pub struct Runner {
    digest: Digest,
    ledger: Arc<RemoteLedger>,
    settings: DigestSettings,
    phase: Arc<RwLock<Phase>>,
    cursors: Arc<RwLock<Cursors>>,
    backfill: Mutex<Option<JoinHandle<Result<(), DigestError>>>>,
}

impl Runner {
    pub fn new(digest: Digest, ledger: Arc<RemoteLedger>, settings: DigestSettings) -> Self {
        Runner {
            digest,
            ledger,
            settings,
            phase: Arc::new(RwLock::new(Phase::Idle)),
            cursors: Arc::new(RwLock::new(Cursors::default())),
            backfill: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read().unwrap()
    }

    pub fn last_local(&self) -> u64 {
        self.cursors.read().unwrap().last_local
    }

    /// Remote tip as of the last poll, height and hash.
    pub fn stored_remote(&self) -> Option<(u64, String)> {
        self.cursors.read().unwrap().stored_remote.clone()
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.write().unwrap() = phase;
    }

    /// Height of the highest locally digested block, 0 for an empty store.
    pub fn local_tip(&self) -> Result<u64, DigestError> {
        match Reader::new(self.digest.store()).last_block() {
            Ok(block) => Ok(block.height),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Highest block in the open remote snapshot, via a reverse scan of the
    /// remote height index.
    pub async fn remote_tip(&self) -> Result<(u64, String), DigestError> {
        let mut pages =
            self.ledger.pages(BLOCK_HEIGHT_PREFIX.to_string(), PageOptions::new().reverse(true), 1);
        let item = pages
            .next_item()
            .await?
            .ok_or_else(|| DigestError::custom("remote ledger has no blocks"))?;
        let block: RemoteBlock = serde_json::from_slice(&item.decoded()?)?;
        let tip = (block.height, block.hash);
        self.cursors.write().unwrap().stored_remote = Some(tip.clone());
        Ok(tip)
    }

    /// Bring an out-of-date store up to the remote tip. An empty store gets a
    /// full initializing backfill, account states included; a store already
    /// at the tip goes straight to steady polling.
    pub async fn boot(&self) -> Result<Phase, DigestError> {
        let local = self.local_tip()?;
        let (tip, _) = self.remote_tip().await?;
        if local >= tip {
            self.cursors.write().unwrap().last_local = local;
            self.set_phase(Phase::SteadyPoll);
            info!("local store already at remote tip {}", tip);
            return Ok(self.phase());
        }
        let initialize = local == 0;
        let start = if initialize { 0 } else { local + 1 };
        self.set_phase(Phase::Backfilling);
        info!("backfilling from height {} to remote tip {} (initialize: {})", start, tip, initialize);
        self.digest.run(start, tip + 1, initialize).await?;
        self.cursors.write().unwrap().last_local = tip;
        self.set_phase(Phase::CaughtUp);
        Ok(self.phase())
    }

    /// True while a force-followed background digest started by an earlier
    /// tick has not been reaped yet.
    pub fn backfill_in_flight(&self) -> bool {
        self.backfill.lock().unwrap().is_some()
    }

    /// Take the background digest handle once the task ran to completion,
    /// leaving a still-running task in place.
    fn finished_backfill(&self) -> Option<JoinHandle<Result<(), DigestError>>> {
        let mut slot = self.backfill.lock().unwrap();
        match slot.take() {
            Some(handle) if handle.is_finished() => Some(handle),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// One poll step. A far-behind gap is digested by at most one background
    /// task at a time; its outcome surfaces through a later tick.
    pub async fn tick(&self) -> Result<(), DigestError> {
        if let Some(handle) = self.finished_backfill() {
            handle.await??;
        } else if self.backfill_in_flight() {
            return Ok(());
        }
        let (tip, _) = self.remote_tip().await?;
        let local = self.last_local();
        if tip <= local {
            self.set_phase(Phase::SteadyPoll);
            return Ok(());
        }
        let gap = tip - local;
        if gap >= self.settings.far_block_height {
            if !self.settings.force_follow {
                warn!(
                    "local tip {} is {} blocks behind remote tip {}, refusing to follow (enable force_follow to override)",
                    local, gap, tip
                );
                return Ok(());
            }
            self.set_phase(Phase::Backfilling);
            let digest = self.digest.clone();
            let cursors = Arc::clone(&self.cursors);
            let phase = Arc::clone(&self.phase);
            let handle = tokio::spawn(async move {
                digest.run(local + 1, tip + 1, false).await?;
                cursors.write().unwrap().last_local = tip;
                *phase.write().unwrap() = Phase::CaughtUp;
                Ok(())
            });
            *self.backfill.lock().unwrap() = Some(handle);
            return Ok(());
        }
        self.set_phase(Phase::Following);
        self.digest.run(local + 1, tip + 1, false).await?;
        self.cursors.write().unwrap().last_local = tip;
        self.set_phase(Phase::CaughtUp);
        Ok(())
    }

    pub async fn poll_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.settings.poll_interval_ms);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutting down poll loop ...");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("poll tick failed: {}", e);
                    }
                }
            }
        }
    }

    pub fn ledger(&self) -> Arc<RemoteLedger> {
        Arc::clone(&self.ledger)
    }
}
