//! # Lifecycle Errors
//!
//! Every failure of a controller operation is a [`LifecycleError`]: the
//! underlying domain error plus the circuit it concerns, the circuit's
//! lifecycle state after the failure (when the circuit exists), and the
//! operation stage that failed. The HTTP layer maps [`LifecycleError::code`]
//! to a status code without inspecting the inner error.

use arcana_chain::{BroadcastError, BroadcastErrorKind, BuildError, NetworkError};
use arcana_core::{CircuitId, ValidationError};
use arcana_state::{CircuitState, RecordTransitionError, StateError};
use arcana_store::StoreError;
use arcana_zkp::{CompileError, ProveError, ProveErrorKind};
use thiserror::Error;

/// Operation stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Register,
    Compile,
    Deploy,
    Prove,
    Broadcast,
    Reconcile,
    Read,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Compile => "compile",
            Self::Deploy => "deploy",
            Self::Prove => "prove",
            Self::Broadcast => "broadcast",
            Self::Reconcile => "reconcile",
            Self::Read => "read",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Prove(#[from] ProveError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("circuit \"{0}\" already exists")]
    Duplicate(CircuitId),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ErrorKind {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(id) => Self::Duplicate(id),
            StoreError::NotFound { kind, id } => Self::NotFound(format!("{kind} \"{id}\" not found")),
            other => Self::Store(other),
        }
    }
}

impl From<RecordTransitionError> for ErrorKind {
    fn from(err: RecordTransitionError) -> Self {
        Self::State(StateError::Conflict(err.to_string()))
    }
}

#[derive(Error, Debug)]
#[error("{stage} failed: {kind}")]
pub struct LifecycleError {
    pub kind: ErrorKind,
    pub stage: Stage,
    pub circuit_id: Option<CircuitId>,
    /// State of the circuit after the failure, when it exists.
    pub state: Option<CircuitState>,
}

impl LifecycleError {
    pub fn new(stage: Stage, kind: impl Into<ErrorKind>) -> Self {
        Self {
            kind: kind.into(),
            stage,
            circuit_id: None,
            state: None,
        }
    }

    pub fn with_circuit(mut self, circuit_id: &CircuitId) -> Self {
        self.circuit_id = Some(circuit_id.clone());
        self
    }

    pub fn with_state(mut self, state: CircuitState) -> Self {
        self.state = Some(state);
        self
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match &self.kind {
            ErrorKind::Validation(_) => "validation_error",
            ErrorKind::Compile(_) => "compile_error",
            ErrorKind::Prove(e) => match e.kind {
                ProveErrorKind::InvalidWitness => "invalid_witness",
                ProveErrorKind::BackendUnavailable => "backend_unavailable",
                ProveErrorKind::Timeout => "prove_timeout",
            },
            ErrorKind::Build(BuildError::Rpc(_)) => "chain_unavailable",
            ErrorKind::Build(BuildError::UnsupportedNetwork(_)) => "unsupported_network",
            ErrorKind::Build(BuildError::MissingArtifact(_)) => "missing_artifact",
            ErrorKind::Build(BuildError::EncodingFailure(_)) => "encoding_failure",
            ErrorKind::Broadcast(e) => match e.kind {
                BroadcastErrorKind::RejectedByNetwork => "rejected_by_network",
                BroadcastErrorKind::Timeout => "broadcast_timeout",
                BroadcastErrorKind::ReceiptIndicatesFailure => "receipt_indicates_failure",
            },
            ErrorKind::State(_) => "invalid_state",
            ErrorKind::Duplicate(_) => "duplicate_circuit",
            ErrorKind::Network(_) => "unknown_network",
            ErrorKind::NotFound(_) => "not_found",
            ErrorKind::Store(_) => "store_error",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            ErrorKind::Prove(e) => e.is_retryable(),
            ErrorKind::Broadcast(e) => e.is_retryable(),
            ErrorKind::Build(BuildError::Rpc(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_core::TxHash;

    #[test]
    fn codes_and_retryability() {
        let e = LifecycleError::new(Stage::Prove, ProveError::invalid_witness("assert failed"));
        assert_eq!(e.code(), "invalid_witness");
        assert!(!e.is_retryable());

        let e = LifecycleError::new(Stage::Prove, ProveError::backend_unavailable("bb missing"));
        assert!(e.is_retryable());

        let e = LifecycleError::new(
            Stage::Broadcast,
            BroadcastError::timeout("no receipt", TxHash::from_bytes([1; 32])),
        );
        assert_eq!(e.code(), "broadcast_timeout");
        assert!(e.is_retryable());

        let e = LifecycleError::new(Stage::Broadcast, BroadcastError::rejected("nonce too low", None));
        assert_eq!(e.code(), "rejected_by_network");
        assert!(!e.is_retryable());
    }

    #[test]
    fn store_errors_fold_into_domain_kinds() {
        let id = CircuitId::new("c").unwrap();
        let kind: ErrorKind = StoreError::Duplicate(id.clone()).into();
        assert!(matches!(kind, ErrorKind::Duplicate(_)));
        let e = LifecycleError::new(Stage::Read, StoreError::NotFound { kind: "circuit", id: "c".into() })
            .with_circuit(&id);
        assert_eq!(e.code(), "not_found");
        assert_eq!(e.circuit_id, Some(id));
    }
}
