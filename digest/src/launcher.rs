use crate::engine::Digest;
use crate::errors::DigestError;
use crate::provider::RemoteLedger;
use crate::rpc::HttpSnapshotRpc;
use crate::runner::Runner;
use crate::settings::AppConfig;
use std::sync::Arc;
use store::{error, info, register_default_hooks, EventBus, KeySchema, KvStore, Store};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Wire the whole pipeline and run it until SIGINT or SIGTERM.
pub async fn launch(config_path: &str) -> Result<(), DigestError> {
    let config = AppConfig::new(config_path)?;

    let bus = Arc::new(EventBus::new());
    register_default_hooks(&bus);
    let store = KvStore::open(&config.store.db_path, KeySchema::v1(), bus)?;

    let rpc = Arc::new(HttpSnapshotRpc::new(
        config.remote.endpoint.clone(),
        config.remote.retry_attempts,
        config.remote.retry_delay_ms,
    ));
    let ledger = Arc::new(RemoteLedger::new(rpc, config.remote.page_size));
    ledger.open().await?;

    let digest = Digest::new(Arc::clone(&ledger), store as Arc<dyn Store>, config.digest.max_workers);
    let runner = Runner::new(digest, Arc::clone(&ledger), config.digest.clone());

    let phase = runner.boot().await?;
    info!("boot finished in phase {:?}", phase);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
            let _ = shutdown_tx.send(true);
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
            let _ = shutdown_tx.send(true);
        }
        _ = runner.poll_loop(shutdown_rx.clone()) => {}
    }

    if let Err(e) = ledger.close().await {
        error!("failed to release remote snapshot: {}", e);
    }
    Ok(())
}
