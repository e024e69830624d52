//! Digest pipeline: pulls blocks, transactions, operations and account
//! states out of a remote ledger node's snapshot RPC and lands them in the
//! local read-optimized store.

pub mod engine;
pub mod errors;
pub mod launcher;
pub mod provider;
pub mod retry;
pub mod rpc;
pub mod runner;
pub mod settings;

pub use engine::Digest;
pub use errors::DigestError;
pub use provider::{RemoteAccount, RemoteBlock, RemoteLedger, RemoteOperation, RemotePages, RemoteTransaction};
pub use rpc::{HttpSnapshotRpc, Page, PageItem, PageOptions, SnapshotRpc};
pub use runner::{Phase, Runner};
pub use settings::AppConfig;
