//! # Prover Driver
//!
//! Validates inputs against the artifact's schema, then drives the toolchain
//! under a time limit. Validation happens before any backend work, so a
//! malformed request never reaches the prover. The [`SecretInputs`] and the
//! derived [`Witness`] are dropped, and zeroized, when the call returns.

use std::sync::Arc;
use std::time::Duration;

use arcana_core::{FieldElement, ValidationError};
use thiserror::Error;

use crate::artifact::{CompiledArtifact, ProofArtifact};
use crate::error::{ProveError, ProveErrorKind};
use crate::inputs::{SecretInputs, Witness};
use crate::toolchain::ZkToolchain;

/// Default prove time limit.
pub const DEFAULT_PROVE_TIMEOUT: Duration = Duration::from_secs(300);

/// Why [`ProverDriver::prove`] returned no proof.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProveFailure {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Prove(#[from] ProveError),
}

#[derive(Clone)]
pub struct ProverDriver {
    toolchain: Arc<dyn ZkToolchain>,
    timeout: Duration,
}

impl std::fmt::Debug for ProverDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProverDriver")
            .field("backend", &self.toolchain.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProverDriver {
    pub fn new(toolchain: Arc<dyn ZkToolchain>) -> Self {
        Self {
            toolchain,
            timeout: DEFAULT_PROVE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate a proof. Takes `private_inputs` by value so they cannot
    /// outlive the call.
    pub async fn prove(
        &self,
        artifact: &CompiledArtifact,
        private_inputs: SecretInputs,
        public_inputs: Vec<FieldElement>,
    ) -> Result<ProofArtifact, ProveFailure> {
        let witness = Witness::resolve(&artifact.schema, &private_inputs, &public_inputs)?;
        drop(private_inputs);

        let circuit_id = &artifact.circuit_id;
        let started = std::time::Instant::now();
        let proof = match tokio::time::timeout(
            self.timeout,
            self.toolchain.prove(artifact, &witness),
        )
        .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::warn!(%circuit_id, kind = %e.kind, "proof generation failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(%circuit_id, timeout = ?self.timeout, "proof generation timed out");
                return Err(ProveError::new(
                    ProveErrorKind::Timeout,
                    format!("prover did not finish within {}s", self.timeout.as_secs()),
                )
                .into());
            }
        };

        let artifact = ProofArtifact::new(circuit_id.clone(), public_inputs, proof);
        tracing::info!(
            %circuit_id,
            proof_id = %artifact.proof_id,
            proof_size = artifact.proof_size(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "proof generated"
        );
        Ok(artifact)
    }
}
