//! # Identifiers
//!
//! [`CircuitId`] is client-supplied and doubles as an on-disk directory
//! name, so its alphabet is restricted at construction. [`RecordId`]
//! identifies deployment, verification and proof records and is always a
//! UUID generated by the service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

const MAX_CIRCUIT_ID_LEN: usize = 128;

/// A validated circuit identifier.
///
/// Must match `^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$`. Path separators, dots
/// and whitespace are rejected, so a circuit id can never escape the
/// artifact store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CircuitId(String);

impl CircuitId {
    /// Validate and wrap a circuit identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let mut chars = raw.chars();
        let valid_head = matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric());
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_head || !valid_tail || raw.len() > MAX_CIRCUIT_ID_LEN {
            return Err(ValidationError::InvalidCircuitId(raw));
        }
        Ok(Self(raw))
    }

    /// Generate a fresh identifier of the form `circuit-<12 hex>`.
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(format!("circuit-{}", &simple[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CircuitId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for CircuitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CircuitId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier for deployment, verification and proof records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new random record identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ValidationError::InvalidRecordId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_ids() {
        for id in ["age_check", "circuit-1", "A", "x9_y-z"] {
            assert!(CircuitId::new(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_path_like_ids() {
        for id in ["", "../etc", "a/b", ".hidden", "-lead", "_lead", "has space", "a.b"] {
            assert!(CircuitId::new(id).is_err(), "{id:?} should be rejected");
        }
    }

    #[test]
    fn rejects_overlong_id() {
        let id = "a".repeat(MAX_CIRCUIT_ID_LEN + 1);
        assert!(CircuitId::new(id).is_err());
        assert!(CircuitId::new("a".repeat(MAX_CIRCUIT_ID_LEN)).is_ok());
    }

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let a = CircuitId::generate();
        let b = CircuitId::generate();
        assert_ne!(a, b);
        assert!(CircuitId::new(a.as_str()).is_ok());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<CircuitId, _> = serde_json::from_str("\"good_id\"");
        assert!(ok.is_ok());
        let bad: Result<CircuitId, _> = serde_json::from_str("\"../bad\"");
        assert!(bad.is_err());
    }

    #[test]
    fn record_id_round_trips_through_display() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("nope".parse::<RecordId>().is_err());
    }
}
