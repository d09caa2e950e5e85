//! Persisted record types.

use arcana_chain::UnsignedTx;
use arcana_core::{CircuitId, EvmAddress, RecordId, TxHash};
use arcana_state::{CircuitState, RecordStatus, RecordTransitionError, StateError, VerificationOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage and message of the most recent failure on a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub stage: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// A registered circuit. Mutated only by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    pub circuit_id: CircuitId,
    pub description: Option<String>,
    /// Network named at registration; the default for later operations.
    pub network: String,
    pub state: CircuitState,
    /// Digest of the compiled artifact, once compiled.
    pub artifact_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub proof_count: u64,
    pub deployed_network: Option<String>,
    pub verifier_address: Option<EvmAddress>,
    pub last_error: Option<LastError>,
}

impl Circuit {
    pub fn new(circuit_id: CircuitId, description: Option<String>, network: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            circuit_id,
            description,
            network: network.into(),
            state: CircuitState::Registered,
            artifact_digest: None,
            created_at: now,
            updated_at: now,
            proof_count: 0,
            deployed_network: None,
            verifier_address: None,
            last_error: None,
        }
    }

    /// Validated state change; bumps `updated_at`.
    pub fn transition(&mut self, to: CircuitState) -> Result<(), StateError> {
        self.state = self.state.transition(to)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_error(&mut self, stage: impl Into<String>, message: impl Into<String>) {
        let at = Utc::now();
        self.last_error = Some(LastError {
            stage: stage.into(),
            message: message.into(),
            at,
        });
        self.updated_at = at;
    }
}

/// One issued deployment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployment_id: RecordId,
    pub circuit_id: CircuitId,
    pub network: String,
    pub chain_id: u64,
    pub nonce: u64,
    pub from: EvmAddress,
    pub unsigned_tx: UnsignedTx,
    pub status: RecordStatus,
    pub tx_hash: Option<TxHash>,
    pub contract_address: Option<EvmAddress>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn pending(circuit_id: CircuitId, network: impl Into<String>, unsigned_tx: UnsignedTx) -> Self {
        let now = Utc::now();
        Self {
            deployment_id: RecordId::new(),
            circuit_id,
            network: network.into(),
            chain_id: unsigned_tx.chain_id(),
            nonce: unsigned_tx.nonce(),
            from: unsigned_tx.from,
            unsigned_tx,
            status: RecordStatus::Pending,
            tx_hash: None,
            contract_address: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, to: RecordStatus) -> Result<(), RecordTransitionError> {
        self.status = self.status.advance(to)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), RecordTransitionError> {
        self.advance(RecordStatus::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }
}

/// One issued verification transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub verification_id: RecordId,
    pub circuit_id: CircuitId,
    pub network: String,
    pub chain_id: u64,
    pub nonce: u64,
    pub from: EvmAddress,
    pub verifier_address: EvmAddress,
    pub proof_id: RecordId,
    pub unsigned_tx: UnsignedTx,
    pub status: RecordStatus,
    /// On-chain verdict, once confirmed.
    pub outcome: Option<VerificationOutcome>,
    pub tx_hash: Option<TxHash>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationRecord {
    pub fn pending(
        circuit_id: CircuitId,
        network: impl Into<String>,
        verifier_address: EvmAddress,
        proof_id: RecordId,
        unsigned_tx: UnsignedTx,
    ) -> Self {
        let now = Utc::now();
        Self {
            verification_id: RecordId::new(),
            circuit_id,
            network: network.into(),
            chain_id: unsigned_tx.chain_id(),
            nonce: unsigned_tx.nonce(),
            from: unsigned_tx.from,
            verifier_address,
            proof_id,
            unsigned_tx,
            status: RecordStatus::Pending,
            outcome: None,
            tx_hash: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, to: RecordStatus) -> Result<(), RecordTransitionError> {
        self.status = self.status.advance(to)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), RecordTransitionError> {
        self.advance(RecordStatus::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }
}
