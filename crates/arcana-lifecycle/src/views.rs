//! Request and result shapes of the controller operations.

use arcana_chain::{NetworkConfig, TxType, UnsignedTx};
use arcana_core::{CircuitId, EvmAddress, FieldElement, HexBytes, RecordId, TxHash};
use arcana_state::{CircuitState, RecordStatus};
use arcana_store::{Circuit, DeploymentRecord, VerificationRecord};
use arcana_zkp::{CompiledArtifact, Parameter, ProofArtifact, SecretInputs};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub circuit_id: Option<CircuitId>,
    /// `Nargo.toml` contents.
    pub manifest: String,
    /// `src/main.nr` contents.
    pub source: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResult {
    pub circuit_id: CircuitId,
    pub state: CircuitState,
    pub network: String,
    pub artifact_digest: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub circuit_id: CircuitId,
    pub user_address: EvmAddress,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub circuit_id: CircuitId,
    pub deployment_id: RecordId,
    pub network: String,
    pub chain_id: u64,
    pub nonce: u64,
    pub unsigned_tx: UnsignedTx,
    pub state: CircuitState,
}

/// Proof request. Private inputs are consumed by the prover and dropped.
#[derive(Deserialize)]
pub struct ProofRequest {
    pub circuit_id: CircuitId,
    pub private_inputs: SecretInputs,
    pub public_inputs: Vec<FieldElement>,
    /// Defaults to the circuit's deployed verifier.
    #[serde(default)]
    pub verifier_address: Option<EvmAddress>,
    pub user_address: EvmAddress,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResult {
    pub circuit_id: CircuitId,
    pub proof_id: RecordId,
    pub verification_id: RecordId,
    pub proof_hash: String,
    pub proof_size: usize,
    pub public_inputs: Vec<FieldElement>,
    pub verifier_address: EvmAddress,
    pub network: String,
    pub unsigned_tx: UnsignedTx,
    pub state: CircuitState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub circuit_id: CircuitId,
    /// RLP-encoded signed transaction.
    pub signed_tx: HexBytes,
    #[serde(default)]
    pub network: Option<String>,
    pub tx_type: TxType,
    /// When given, must match the verifier the transaction was built for.
    #[serde(default)]
    pub verifier_address: Option<EvmAddress>,
    /// When given, must match the proof's public inputs.
    #[serde(default)]
    pub public_inputs: Option<Vec<FieldElement>>,
}

/// Where a submitted transaction stands, and what it did to the circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub circuit_id: CircuitId,
    pub tx_type: TxType,
    pub record_id: RecordId,
    pub tx_hash: TxHash,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier_address: Option<EvmAddress>,
    /// Set once a verification is confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    pub state: CircuitState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub digest: String,
    pub backend: String,
    pub compiler_version: String,
    pub compiled_at: DateTime<Utc>,
    pub parameters: Vec<Parameter>,
    pub public_input_arity: usize,
    pub verifier_bytecode_size: usize,
}

impl From<&CompiledArtifact> for ArtifactSummary {
    fn from(artifact: &CompiledArtifact) -> Self {
        Self {
            digest: artifact.digest.clone(),
            backend: artifact.backend.clone(),
            compiler_version: artifact.compiler_version.clone(),
            compiled_at: artifact.compiled_at,
            parameters: artifact.schema.parameters.clone(),
            public_input_arity: artifact.schema.public_arity(),
            verifier_bytecode_size: artifact.verifier_bytecode.len(),
        }
    }
}

/// A proof without its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSummary {
    pub proof_id: RecordId,
    pub proof_hash: String,
    pub proof_size: usize,
    pub public_inputs: Vec<FieldElement>,
    pub generated_at: DateTime<Utc>,
    pub verification_id: Option<RecordId>,
}

impl From<&ProofArtifact> for ProofSummary {
    fn from(proof: &ProofArtifact) -> Self {
        Self {
            proof_id: proof.proof_id,
            proof_hash: proof.proof_hash.clone(),
            proof_size: proof.proof_size(),
            public_inputs: proof.public_inputs.clone(),
            generated_at: proof.generated_at,
            verification_id: proof.verification_id,
        }
    }
}

/// Everything known about one circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitView {
    #[serde(flatten)]
    pub circuit: Circuit,
    pub artifact: Option<ArtifactSummary>,
    pub deployments: Vec<DeploymentRecord>,
    pub verifications: Vec<VerificationRecord>,
    pub proofs: Vec<ProofSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthView {
    pub status: String,
    pub backend: String,
    pub backend_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub total_circuits: usize,
    pub total_proofs: u64,
    pub deployed_circuits: usize,
    pub supported_networks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkView {
    pub name: String,
    pub chain_id: u64,
    pub confidential: bool,
    pub is_default: bool,
}

impl NetworkView {
    pub(crate) fn new(config: &NetworkConfig, default_network: &str) -> Self {
        Self {
            name: config.name.clone(),
            chain_id: config.chain_id,
            confidential: config.requires_confidential_encryption,
            is_default: config.name == default_network,
        }
    }
}
