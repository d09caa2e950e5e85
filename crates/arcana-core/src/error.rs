//! # Validation Errors
//!
//! Every rejection of caller-supplied input lands here. These errors are
//! never retried and never coerced: the orchestrator reports exactly what
//! was wrong and stops before invoking any external backend.

use thiserror::Error;

/// Validation errors for domain primitives and operation inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Circuit identifier does not match `^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$`.
    #[error("invalid circuit id \"{0}\" (expected 1-128 chars of [A-Za-z0-9_-], starting alphanumeric)")]
    InvalidCircuitId(String),

    /// Record identifier is not a UUID.
    #[error("invalid record id \"{0}\"")]
    InvalidRecordId(String),

    /// EVM address is not `0x` followed by 40 hex characters.
    #[error("invalid EVM address \"{0}\" (expected 0x followed by 40 hex chars)")]
    InvalidAddress(String),

    /// Hex payload could not be decoded.
    #[error("invalid hex value: {0}")]
    InvalidHex(String),

    /// Field element literal could not be parsed or exceeds the field modulus.
    #[error("invalid field element ({length} characters): {reason}")]
    InvalidFieldElement {
        /// Length of the rejected literal. The literal itself is never kept.
        length: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// A source file was empty.
    #[error("{0} must not be empty")]
    EmptySource(&'static str),

    /// A source file exceeded its size limit.
    #[error("{what} is {size} bytes, limit is {limit}")]
    SourceTooLarge {
        /// Which file.
        what: &'static str,
        /// Submitted size.
        size: usize,
        /// Maximum accepted size.
        limit: usize,
    },

    /// The number of public inputs does not match the circuit's public arity.
    #[error("expected {expected} public inputs, got {actual}")]
    PublicInputArity {
        /// Declared number of `pub` parameters.
        expected: usize,
        /// Number supplied.
        actual: usize,
    },

    /// An input name is not declared by the circuit.
    #[error("unknown input \"{0}\"")]
    UnknownInput(String),

    /// A private parameter was not supplied.
    #[error("missing private input \"{0}\"")]
    MissingInput(String),

    /// A public parameter was supplied in the private map with a different value.
    #[error("input \"{0}\" disagrees with the positional public input")]
    PublicInputMismatch(String),

    /// A value does not fit the parameter's declared type.
    #[error("input \"{name}\" does not fit type {ty}")]
    InputOutOfRange {
        /// Parameter name.
        name: String,
        /// Declared type.
        ty: String,
    },

    /// The circuit declares a parameter type the orchestrator cannot feed.
    #[error("parameter \"{name}\" has unsupported type {ty}")]
    UnsupportedParameterType {
        /// Parameter name.
        name: String,
        /// Declared type.
        ty: String,
    },

    /// The signed transaction bytes are malformed.
    #[error("malformed signed transaction: {0}")]
    MalformedTransaction(String),

    /// A request field was invalid for the operation.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name as seen by the caller.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::InvalidField`].
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
