//! Chain-side error types.

use arcana_core::{TxHash, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The requested network is not in the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("unknown network \"{0}\"")]
    Unknown(String),
    #[error("invalid network configuration: {0}")]
    InvalidConfig(String),
}

/// A JSON-RPC call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Connection, TLS, or HTTP-level failure. The request may or may not
    /// have reached the node.
    #[error("transport error calling {network}: {message}")]
    Transport { network: String, message: String },
    /// The node answered with a JSON-RPC error object.
    #[error("{network} rejected {method}: {message} (code {code})")]
    Node {
        network: String,
        method: String,
        code: i64,
        message: String,
    },
    /// The node answered with something that is not a valid result.
    #[error("invalid response from {network}: {message}")]
    InvalidResponse { network: String, message: String },
}

impl RpcError {
    /// Transport failures may succeed on retry; node rejections will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Unsigned transaction construction failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("unsupported network \"{0}\"")]
    UnsupportedNetwork(String),
    #[error("missing artifact: {0}")]
    MissingArtifact(String),
    #[error("encoding failure: {0}")]
    EncodingFailure(String),
    /// Nonce or gas price could not be fetched.
    #[error("chain query failed: {0}")]
    Rpc(#[from] RpcError),
}

impl From<NetworkError> for BuildError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Unknown(name) => Self::UnsupportedNetwork(name),
            NetworkError::InvalidConfig(msg) => Self::UnsupportedNetwork(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastErrorKind {
    /// The node refused the transaction, or it was superseded.
    RejectedByNetwork,
    /// Submitted (or possibly submitted) but no receipt was observed in time.
    Timeout,
    /// Mined with a failure status.
    ReceiptIndicatesFailure,
}

impl BroadcastErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RejectedByNetwork => "rejected_by_network",
            Self::Timeout => "timeout",
            Self::ReceiptIndicatesFailure => "receipt_indicates_failure",
        }
    }
}

impl std::fmt::Display for BroadcastErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcasting a signed transaction failed.
///
/// `tx_hash` is always set for `Timeout`, so the caller can reconcile later.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("broadcast failed ({kind}): {message}")]
pub struct BroadcastError {
    pub kind: BroadcastErrorKind,
    pub message: String,
    pub tx_hash: Option<TxHash>,
}

impl BroadcastError {
    pub fn rejected(message: impl Into<String>, tx_hash: Option<TxHash>) -> Self {
        Self {
            kind: BroadcastErrorKind::RejectedByNetwork,
            message: message.into(),
            tx_hash,
        }
    }

    pub fn timeout(message: impl Into<String>, tx_hash: TxHash) -> Self {
        Self {
            kind: BroadcastErrorKind::Timeout,
            message: message.into(),
            tx_hash: Some(tx_hash),
        }
    }

    pub fn receipt_failure(message: impl Into<String>, tx_hash: TxHash) -> Self {
        Self {
            kind: BroadcastErrorKind::ReceiptIndicatesFailure,
            message: message.into(),
            tx_hash: Some(tx_hash),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, BroadcastErrorKind::Timeout)
    }
}

/// Either the signed bytes were unacceptable or the broadcast itself failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastFailure {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}
