//! # Circuit Artifacts
//!
//! [`CircuitSource`] is what a client registers. [`CompiledArtifact`] is what
//! the compiler driver produces from it and is immutable once created; its
//! `digest` covers every byte that matters and is re-checked on load.
//! [`ProofArtifact`] is what the prover driver produces. It holds public
//! inputs only.

use arcana_core::{sha256_hex, CircuitId, FieldElement, HexBytes, RecordId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum size of a build manifest (`Nargo.toml`).
pub const MAX_MANIFEST_BYTES: usize = 16 * 1024;
/// Maximum size of a program source (`src/main.nr`).
pub const MAX_SOURCE_BYTES: usize = 256 * 1024;

/// A circuit's source bundle: build manifest plus program source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSource {
    pub manifest: String,
    pub source: String,
}

impl CircuitSource {
    pub fn new(manifest: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            source: source.into(),
        }
    }

    /// Enforce non-emptiness and size limits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_size("manifest", &self.manifest, MAX_MANIFEST_BYTES)?;
        check_size("source", &self.source, MAX_SOURCE_BYTES)
    }

    /// The `name = "..."` entry of the `[package]` table, if present.
    pub fn package_name(&self) -> Option<&str> {
        self.manifest.lines().find_map(|line| {
            let (key, value) = line.split_once('=')?;
            (key.trim() == "name").then(|| value.trim().trim_matches('"'))
        })
    }
}

fn check_size(what: &'static str, text: &str, limit: usize) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptySource(what));
    }
    if text.len() > limit {
        return Err(ValidationError::SourceTooLarge {
            what,
            size: text.len(),
            limit,
        });
    }
    Ok(())
}

/// Whether a parameter is revealed to the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// Scalar parameter types the orchestrator can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParamType {
    Field,
    /// Unsigned integer of the given bit width.
    Unsigned(u8),
    Boolean,
}

impl ParamType {
    /// Parse a Noir type name (`Field`, `u8`..`u64`, `bool`).
    pub fn from_noir(name: &str) -> Option<Self> {
        match name.trim() {
            "Field" => Some(Self::Field),
            "bool" => Some(Self::Boolean),
            other => {
                let width: u8 = other.strip_prefix('u')?.parse().ok()?;
                matches!(width, 1 | 8 | 16 | 32 | 64).then_some(Self::Unsigned(width))
            }
        }
    }

    /// Whether `value` is representable in this type.
    pub fn admits(&self, value: &FieldElement) -> bool {
        match self {
            Self::Field => true,
            Self::Unsigned(width) => value.bits() <= usize::from(*width),
            Self::Boolean => value.bits() <= 1,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field => f.write_str("Field"),
            Self::Unsigned(w) => write!(f, "u{w}"),
            Self::Boolean => f.write_str("bool"),
        }
    }
}

impl TryFrom<String> for ParamType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_noir(&value).ok_or_else(|| format!("unsupported parameter type {value}"))
    }
}

impl From<ParamType> for String {
    fn from(value: ParamType) -> Self {
        value.to_string()
    }
}

/// One declared parameter of `fn main`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub visibility: Visibility,
    #[serde(rename = "type")]
    pub ty: ParamType,
}

/// The ordered parameter list of a compiled circuit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    pub parameters: Vec<Parameter>,
}

impl InputSchema {
    pub fn public(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.visibility == Visibility::Public)
    }

    pub fn public_arity(&self) -> usize {
        self.public().count()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Output of a successful compilation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub circuit_id: CircuitId,
    /// Source snapshot the program was compiled from.
    pub source: CircuitSource,
    /// Executable circuit representation as emitted by the compiler.
    pub program: HexBytes,
    pub verification_key: HexBytes,
    /// Creation bytecode of the on-chain verifier contract.
    pub verifier_bytecode: HexBytes,
    pub schema: InputSchema,
    pub backend: String,
    pub compiler_version: String,
    pub compiled_at: DateTime<Utc>,
    /// SHA-256 over every field above except the timestamp.
    pub digest: String,
}

impl CompiledArtifact {
    /// Hex SHA-256 over length-prefixed content fields.
    pub fn compute_digest(&self) -> String {
        let schema = serde_json::to_vec(&self.schema).unwrap_or_default();
        let parts: [&[u8]; 9] = [
            self.circuit_id.as_str().as_bytes(),
            self.source.manifest.as_bytes(),
            self.source.source.as_bytes(),
            self.program.as_slice(),
            self.verification_key.as_slice(),
            self.verifier_bytecode.as_slice(),
            &schema,
            self.backend.as_bytes(),
            self.compiler_version.as_bytes(),
        ];
        let mut buf = Vec::new();
        for part in parts {
            buf.extend_from_slice(&(part.len() as u64).to_be_bytes());
            buf.extend_from_slice(part);
        }
        sha256_hex(&buf)
    }

    pub fn digest_matches(&self) -> bool {
        self.compute_digest() == self.digest
    }
}

/// A generated proof. Private inputs are never part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    pub proof_id: RecordId,
    pub circuit_id: CircuitId,
    pub public_inputs: Vec<FieldElement>,
    pub proof: HexBytes,
    /// Hex SHA-256 of the proof bytes.
    pub proof_hash: String,
    pub generated_at: DateTime<Utc>,
    /// Verification record that consumed this proof, once issued.
    pub verification_id: Option<RecordId>,
}

impl ProofArtifact {
    pub fn new(circuit_id: CircuitId, public_inputs: Vec<FieldElement>, proof: Vec<u8>) -> Self {
        let proof_hash = sha256_hex(&proof);
        Self {
            proof_id: RecordId::new(),
            circuit_id,
            public_inputs,
            proof: HexBytes(proof),
            proof_hash,
            generated_at: Utc::now(),
            verification_id: None,
        }
    }

    pub fn proof_size(&self) -> usize {
        self.proof.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_limits() {
        assert!(CircuitSource::new("[package]", "fn main() {}").validate().is_ok());
        assert_eq!(
            CircuitSource::new("  ", "fn main() {}").validate(),
            Err(ValidationError::EmptySource("manifest"))
        );
        let huge = "a".repeat(MAX_SOURCE_BYTES + 1);
        assert!(matches!(
            CircuitSource::new("[package]", huge).validate(),
            Err(ValidationError::SourceTooLarge { what: "source", .. })
        ));
    }

    #[test]
    fn package_name_from_manifest() {
        let src = CircuitSource::new(
            "[package]\nname = \"age_check\"\ntype = \"bin\"\n",
            "fn main() {}",
        );
        assert_eq!(src.package_name(), Some("age_check"));
    }

    #[test]
    fn param_types() {
        assert_eq!(ParamType::from_noir("Field"), Some(ParamType::Field));
        assert_eq!(ParamType::from_noir("u32"), Some(ParamType::Unsigned(32)));
        assert_eq!(ParamType::from_noir("bool"), Some(ParamType::Boolean));
        assert_eq!(ParamType::from_noir("u7"), None);
        assert_eq!(ParamType::from_noir("[Field; 3]"), None);

        assert!(ParamType::Unsigned(8).admits(&FieldElement::from_u64(255)));
        assert!(!ParamType::Unsigned(8).admits(&FieldElement::from_u64(256)));
        assert!(ParamType::Boolean.admits(&FieldElement::from_u64(1)));
        assert!(!ParamType::Boolean.admits(&FieldElement::from_u64(2)));
    }

    #[test]
    fn schema_serializes_types_as_noir_names() {
        let schema = InputSchema {
            parameters: vec![Parameter {
                name: "x".into(),
                visibility: Visibility::Private,
                ty: ParamType::Unsigned(64),
            }],
        };
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["parameters"][0]["type"], "u64");
        let back: InputSchema = serde_json::from_value(json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn proof_hash_is_sha256_of_bytes() {
        let p = ProofArtifact::new(CircuitId::new("c").unwrap(), vec![], b"abc".to_vec());
        assert_eq!(p.proof_hash, sha256_hex(b"abc"));
        assert_eq!(p.proof_size(), 3);
    }
}
