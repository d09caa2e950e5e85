//! Compile and prove failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The compiler phase that rejected a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileStage {
    Parse,
    Typecheck,
    Codegen,
}

impl CompileStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Typecheck => "typecheck",
            Self::Codegen => "codegen",
        }
    }
}

impl std::fmt::Display for CompileStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compilation failed. The message is the backend's diagnostic, verbatim.
///
/// Never retried: the same source produces the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("compile failed at {stage}: {message}")]
pub struct CompileError {
    pub stage: CompileStage,
    pub message: String,
}

impl CompileError {
    pub fn new(stage: CompileStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Why proof generation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProveErrorKind {
    /// The inputs do not satisfy the circuit's constraints. Terminal.
    InvalidWitness,
    /// The proving backend could not be started or crashed. Retryable.
    BackendUnavailable,
    /// The backend did not finish within its time limit. Retryable.
    Timeout,
}

impl ProveErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidWitness => "invalid_witness",
            Self::BackendUnavailable => "backend_unavailable",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ProveErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof generation failed.
///
/// The message never contains input values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("prove failed ({kind}): {message}")]
pub struct ProveError {
    pub kind: ProveErrorKind,
    pub message: String,
}

impl ProveError {
    pub fn new(kind: ProveErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_witness(message: impl Into<String>) -> Self {
        Self::new(ProveErrorKind::InvalidWitness, message)
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(ProveErrorKind::BackendUnavailable, message)
    }

    /// `InvalidWitness` is terminal; everything else may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, ProveErrorKind::InvalidWitness)
    }
}
