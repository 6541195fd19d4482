//! JSON-RPC transport
//!
//! Thin JSON-RPC 2.0 client over `reqwest` used for the chain node, the
//! wallet provider and the bundler. Every failure mode of a call is surfaced
//! as an [`RpcError`]:
//! - the HTTP request could not be sent or the body could not be read
//! - the server answered with a non-success status
//! - the payload carried a JSON-RPC `error` object
//! - the `result` field did not have the expected shape

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default per-request timeout for node calls
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("RPC transport error: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Http(u16),
    #[error("RPC Error: {message} (code {code})")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("Failed to decode RPC response: {0}")]
    Decode(String),
    #[error("Malformed result for {method}: {reason}")]
    MalformedResult { method: String, reason: String },
}

impl RpcError {
    /// JSON-RPC error code, if the server returned an error object
    pub fn code(&self) -> Option<i64> {
        match self {
            RpcError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the failure happened below the JSON-RPC layer
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport(_) | RpcError::Http(_))
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// JSON-RPC 2.0 client bound to a single endpoint
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint this client talks to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform a JSON-RPC call and deserialize its `result`.
    ///
    /// A missing or `null` result is handed to the deserializer as `null`,
    /// so callers expecting an optional value should ask for `Option<T>`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!("RPC call {} (id {}) -> {}", method, id, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http(status.as_u16()));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        serde_json::from_value(body.result.unwrap_or(Value::Null)).map_err(|e| {
            RpcError::MalformedResult {
                method: method.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// `eth_blockNumber`
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let raw: String = self.request("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&raw).ok_or_else(|| RpcError::MalformedResult {
            method: "eth_blockNumber".to_string(),
            reason: format!("not a hex quantity: {}", raw),
        })
    }

    /// `eth_getLogs` for a single filter.
    ///
    /// Only the list shape is enforced here; each record is read leniently
    /// so one mistyped entry cannot sink the rest of the page.
    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
        let records: Vec<Value> = self
            .request("eth_getLogs", json!([filter.to_params()]))
            .await?;
        Ok(records.iter().map(RawLog::from_value).collect())
    }

    /// `eth_getBalance` at the latest block
    pub async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        let raw: String = self
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        U256::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|e| {
            RpcError::MalformedResult {
                method: "eth_getBalance".to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// `eth_call` against the latest block
    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }
}

/// Read-only chain access used by the submission paths
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn get_balance(&self, address: Address) -> Result<U256, RpcError>;
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError>;
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        RpcClient::get_balance(self, address).await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        RpcClient::call(self, to, data).await
    }
}

// ============================================================================
// Log filters and raw records
// ============================================================================

/// Inclusive block range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Number of blocks covered, both ends included
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

/// `eth_getLogs` filter for one contract and one event topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topic: B256,
    pub range: BlockRange,
}

impl LogFilter {
    pub fn new(address: Address, topic: B256, range: BlockRange) -> Self {
        Self {
            address,
            topic,
            range,
        }
    }

    /// Wire form: every field is a `0x`-prefixed hex string
    pub fn to_params(&self) -> Value {
        json!({
            "address": to_hex_string(self.address.as_slice()),
            "topics": [to_hex_string(self.topic.as_slice())],
            "fromBlock": to_hex_quantity(self.range.from),
            "toBlock": to_hex_quantity(self.range.to),
        })
    }
}

/// Log record as returned by the node, before any validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
}

impl RawLog {
    /// Read a record field by field; a field of the wrong JSON type is left
    /// empty and the record later fails decoding.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let topics = value.get("topics").and_then(Value::as_array).and_then(|topics| {
            topics
                .iter()
                .map(|t| t.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        });

        Self {
            topics,
            data: text("data"),
            block_number: text("blockNumber"),
        }
    }
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_hex_u64(raw: &str) -> Option<u64> {
    let digits = raw.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Encode a quantity as `0x`-prefixed lowercase hex
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Encode bytes as `0x`-prefixed lowercase hex
pub fn to_hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
