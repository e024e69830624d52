//! Snapshot RPC surface of the upstream ledger node.
//!
//! The node exposes its internal database behind snapshot handles: a caller
//! opens a snapshot, reads a frozen view through point and iterator calls,
//! and releases the handle when done. Values travel base64-encoded.

use crate::errors::DigestError;
use crate::retry::retry_with_delay;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageOptions {
    pub reverse: bool,
    pub cursor: Option<String>,
    pub limit: u64,
}

impl PageOptions {
    pub fn new() -> Self {
        PageOptions::default()
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn cursor(mut self, cursor: String) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageItem {
    pub key: String,
    /// base64-encoded record body
    pub value: String,
}

impl PageItem {
    pub fn decoded(&self) -> Result<Vec<u8>, DigestError> {
        Ok(BASE64.decode(&self.value)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub limit: u64,
    pub items: Vec<PageItem>,
}

#[async_trait]
pub trait SnapshotRpc: Send + Sync {
    /// Open a frozen view of the node's database and return its handle.
    async fn open_snapshot(&self) -> Result<String, DigestError>;

    /// Release a handle. `false` means the node no longer knew it.
    async fn release_snapshot(&self, snapshot: &str) -> Result<bool, DigestError>;

    async fn has(&self, snapshot: &str, key: &str) -> Result<bool, DigestError>;

    async fn get(&self, snapshot: &str, key: &str) -> Result<Vec<u8>, DigestError>;

    async fn get_iterator(
        &self,
        snapshot: &str,
        prefix: &str,
        opts: PageOptions,
    ) -> Result<Page, DigestError>;
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Clone, Serialize)]
struct SnapshotParams<'a> {
    snapshot: &'a str,
}

#[derive(Clone, Serialize)]
struct KeyParams<'a> {
    snapshot: &'a str,
    key: &'a str,
}

#[derive(Clone, Serialize)]
struct IteratorParams<'a> {
    snapshot: &'a str,
    prefix: &'a str,
    reverse: bool,
    cursor: Option<&'a str>,
    limit: u64,
}

#[derive(Deserialize)]
struct OpenSnapshotResult {
    snapshot: String,
}

#[derive(Deserialize)]
struct ReleaseSnapshotResult {
    released: bool,
}

#[derive(Deserialize)]
struct HasResult {
    exists: bool,
}

#[derive(Deserialize)]
struct GetResult {
    /// base64-encoded
    value: String,
}

/// JSON-RPC 2.0 client against a single node endpoint. Every call retries
/// with a fixed delay before giving up.
pub struct HttpSnapshotRpc {
    client: reqwest::Client,
    endpoint: String,
    attempts: usize,
    delay: Duration,
}

impl HttpSnapshotRpc {
    pub fn new(endpoint: String, attempts: usize, delay: Duration) -> Self {
        HttpSnapshotRpc { client: reqwest::Client::new(), endpoint, attempts, delay }
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, DigestError>
    where
        P: Serialize + Clone,
        R: DeserializeOwned,
    {
        retry_with_delay(self.attempts, self.delay, || async {
            let request = RpcRequest { jsonrpc: "2.0", id: 1, method, params: params.clone() };
            let response: RpcResponse<R> = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if let Some(err) = response.error {
                return Err(DigestError::custom(format!(
                    "{} failed: {} (code {})",
                    method, err.message, err.code
                )));
            }
            response
                .result
                .ok_or_else(|| DigestError::custom(format!("{} returned an empty result", method)))
        })
        .await
    }
}

#[async_trait]
impl SnapshotRpc for HttpSnapshotRpc {
    async fn open_snapshot(&self) -> Result<String, DigestError> {
        let result: OpenSnapshotResult = self.call("DB.OpenSnapshot", ()).await?;
        Ok(result.snapshot)
    }

    async fn release_snapshot(&self, snapshot: &str) -> Result<bool, DigestError> {
        let result: ReleaseSnapshotResult =
            self.call("DB.ReleaseSnapshot", SnapshotParams { snapshot }).await?;
        Ok(result.released)
    }

    async fn has(&self, snapshot: &str, key: &str) -> Result<bool, DigestError> {
        let result: HasResult = self.call("DB.Has", KeyParams { snapshot, key }).await?;
        Ok(result.exists)
    }

    async fn get(&self, snapshot: &str, key: &str) -> Result<Vec<u8>, DigestError> {
        let result: GetResult = self.call("DB.Get", KeyParams { snapshot, key }).await?;
        Ok(BASE64.decode(result.value)?)
    }

    async fn get_iterator(
        &self,
        snapshot: &str,
        prefix: &str,
        opts: PageOptions,
    ) -> Result<Page, DigestError> {
        self.call(
            "DB.GetIterator",
            IteratorParams {
                snapshot,
                prefix,
                reverse: opts.reverse,
                cursor: opts.cursor.as_deref(),
                limit: opts.limit,
            },
        )
        .await
    }
}
