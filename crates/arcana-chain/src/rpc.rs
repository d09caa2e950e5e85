//! # Chain RPC
//!
//! [`ChainRpc`] is the seam between the builder/broadcaster and a node.
//! [`JsonRpcClient`] speaks Ethereum JSON-RPC 2.0 over HTTP;
//! [`crate::MockChain`] is the in-memory stand-in.
//!
//! Reads are retried on transport failure. `eth_sendRawTransaction` is sent
//! exactly once: a retry after an ambiguous failure could only produce a
//! "known transaction" or "nonce too low" error, and the broadcaster already
//! holds the locally computed hash for reconciliation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arcana_core::{decode_hex, EvmAddress, HexBytes, TxHash};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::RpcError;
use crate::network::NetworkConfig;
use crate::retry::retry_read;

/// Default HTTP timeout for a single JSON-RPC request.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(15);

/// Subset of a transaction receipt the orchestrator cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    /// `status == 0x1`.
    pub success: bool,
    pub block_number: u64,
    pub contract_address: Option<EvmAddress>,
    pub gas_used: u64,
}

/// Arguments of an `eth_call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<EvmAddress>,
    pub to: EvmAddress,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `eth_getTransactionCount(address, "pending")`.
    async fn transaction_count(&self, network: &NetworkConfig, address: &EvmAddress) -> Result<u64, RpcError>;

    async fn gas_price(&self, network: &NetworkConfig) -> Result<u128, RpcError>;

    async fn send_raw_transaction(&self, network: &NetworkConfig, raw: &[u8]) -> Result<TxHash, RpcError>;

    /// `None` while the transaction is not yet mined.
    async fn transaction_receipt(&self, network: &NetworkConfig, hash: &TxHash) -> Result<Option<Receipt>, RpcError>;

    /// `eth_call` at `block`, or at `latest` when `None`.
    async fn call(&self, network: &NetworkConfig, request: &CallRequest, block: Option<u64>) -> Result<Vec<u8>, RpcError>;
}

/// HTTP JSON-RPC client. One instance serves every network; the endpoint
/// comes from the [`NetworkConfig`] passed to each call.
#[derive(Debug)]
pub struct JsonRpcClient {
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport {
                network: "*".into(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(&self, network: &NetworkConfig, method: &str, params: Value) -> Result<Value, RpcError> {
        let transport = |message: String| RpcError::Transport {
            network: network.name.clone(),
            message,
        };
        let invalid = |message: String| RpcError::InvalidResponse {
            network: network.name.clone(),
            message,
        };

        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        let resp = self
            .client
            .post(&network.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    transport(format!("{method} timed out"))
                } else {
                    transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(transport(format!("HTTP {status}")));
        }
        let json: Value = resp
            .json()
            .await
            .map_err(|e| invalid(format!("HTTP {status}, invalid JSON: {e}")))?;

        if let Some(error) = json.get("error") {
            return Err(RpcError::Node {
                network: network.name.clone(),
                method: method.to_string(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown RPC error")
                    .to_string(),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| invalid("JSON-RPC response missing 'result' field".into()))
    }

    async fn read(&self, network: &NetworkConfig, method: &str, params: Value) -> Result<Value, RpcError> {
        retry_read(method, || self.rpc_call(network, method, params.clone())).await
    }
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    async fn transaction_count(&self, network: &NetworkConfig, address: &EvmAddress) -> Result<u64, RpcError> {
        let v = self
            .read(network, "eth_getTransactionCount", json!([address.to_string(), "pending"]))
            .await?;
        quantity(network, &v).and_then(|q| to_u64(network, q))
    }

    async fn gas_price(&self, network: &NetworkConfig) -> Result<u128, RpcError> {
        let v = self.read(network, "eth_gasPrice", json!([])).await?;
        quantity(network, &v)
    }

    async fn send_raw_transaction(&self, network: &NetworkConfig, raw: &[u8]) -> Result<TxHash, RpcError> {
        let v = self
            .rpc_call(network, "eth_sendRawTransaction", json!([HexBytes(raw.to_vec()).to_string()]))
            .await?;
        v.as_str()
            .and_then(|s| TxHash::new(s).ok())
            .ok_or_else(|| RpcError::InvalidResponse {
                network: network.name.clone(),
                message: "eth_sendRawTransaction returned a non-hash result".into(),
            })
    }

    async fn transaction_receipt(&self, network: &NetworkConfig, hash: &TxHash) -> Result<Option<Receipt>, RpcError> {
        let v = self
            .read(network, "eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        parse_receipt(network, *hash, &v).map(Some)
    }

    async fn call(&self, network: &NetworkConfig, request: &CallRequest, block: Option<u64>) -> Result<Vec<u8>, RpcError> {
        let mut tx = json!({
            "to": request.to.to_string(),
            "data": HexBytes(request.data.clone()).to_string(),
        });
        if let Some(from) = request.from {
            tx["from"] = json!(from.to_string());
        }
        let tag = block.map_or_else(|| "latest".to_string(), |b| format!("0x{b:x}"));
        let v = self.read(network, "eth_call", json!([tx, tag])).await?;
        v.as_str()
            .and_then(|s| decode_hex(s).ok())
            .ok_or_else(|| RpcError::InvalidResponse {
                network: network.name.clone(),
                message: "eth_call returned non-hex data".into(),
            })
    }
}

fn parse_receipt(network: &NetworkConfig, hash: TxHash, v: &Value) -> Result<Receipt, RpcError> {
    let field = |name: &str| -> Result<u128, RpcError> {
        let raw = v.get(name).ok_or_else(|| RpcError::InvalidResponse {
            network: network.name.clone(),
            message: format!("receipt missing '{name}'"),
        })?;
        quantity(network, raw)
    };
    let contract_address = match v.get("contractAddress").and_then(Value::as_str) {
        Some(s) => Some(EvmAddress::new(s).map_err(|e| RpcError::InvalidResponse {
            network: network.name.clone(),
            message: e.to_string(),
        })?),
        None => None,
    };
    Ok(Receipt {
        tx_hash: hash,
        success: field("status")? == 1,
        block_number: to_u64(network, field("blockNumber")?)?,
        contract_address,
        gas_used: v
            .get("gasUsed")
            .map(|g| quantity(network, g))
            .transpose()?
            .map_or(Ok(0), |g| to_u64(network, g))?,
    })
}

/// Parse a `0x`-prefixed hex quantity.
fn quantity(network: &NetworkConfig, v: &Value) -> Result<u128, RpcError> {
    v.as_str()
        .and_then(|s| s.strip_prefix("0x"))
        .and_then(|s| u128::from_str_radix(s, 16).ok())
        .ok_or_else(|| RpcError::InvalidResponse {
            network: network.name.clone(),
            message: format!("expected hex quantity, got {v}"),
        })
}

fn to_u64(network: &NetworkConfig, q: u128) -> Result<u64, RpcError> {
    u64::try_from(q).map_err(|_| RpcError::InvalidResponse {
        network: network.name.clone(),
        message: format!("quantity {q} exceeds 64 bits"),
    })
}
