//! # Compiler Driver
//!
//! Validates a source bundle, runs the toolchain under a time limit, and
//! stamps the result into an immutable [`CompiledArtifact`]. A timeout is
//! reported as a codegen failure: compilation is deterministic, so it is
//! never retried here or by the controller.

use std::sync::Arc;
use std::time::Duration;

use arcana_core::{CircuitId, HexBytes, ValidationError};
use chrono::Utc;
use thiserror::Error;

use crate::artifact::{CircuitSource, CompiledArtifact};
use crate::error::{CompileError, CompileStage};
use crate::toolchain::ZkToolchain;

/// Default compile time limit.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(300);

/// Why [`CompilerDriver::compile`] returned no artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileFailure {
    /// The bundle was rejected before the compiler ran.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

#[derive(Clone)]
pub struct CompilerDriver {
    toolchain: Arc<dyn ZkToolchain>,
    timeout: Duration,
}

impl std::fmt::Debug for CompilerDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerDriver")
            .field("backend", &self.toolchain.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CompilerDriver {
    pub fn new(toolchain: Arc<dyn ZkToolchain>) -> Self {
        Self {
            toolchain,
            timeout: DEFAULT_COMPILE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &'static str {
        self.toolchain.name()
    }

    pub async fn compile(
        &self,
        circuit_id: &CircuitId,
        source: &CircuitSource,
    ) -> Result<CompiledArtifact, CompileFailure> {
        source.validate()?;

        let started = std::time::Instant::now();
        let output = match tokio::time::timeout(self.timeout, self.toolchain.compile(source)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(%circuit_id, timeout = ?self.timeout, "compilation timed out");
                return Err(CompileError::new(
                    CompileStage::Codegen,
                    format!("compilation timed out after {}s", self.timeout.as_secs()),
                )
                .into());
            }
        };

        let mut artifact = CompiledArtifact {
            circuit_id: circuit_id.clone(),
            source: source.clone(),
            program: HexBytes(output.program),
            verification_key: HexBytes(output.verification_key),
            verifier_bytecode: HexBytes(output.verifier_bytecode),
            schema: output.schema,
            backend: self.toolchain.name().to_string(),
            compiler_version: output.compiler_version,
            compiled_at: Utc::now(),
            digest: String::new(),
        };
        artifact.digest = artifact.compute_digest();

        tracing::info!(
            %circuit_id,
            backend = self.toolchain.name(),
            public_inputs = artifact.schema.public_arity(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "circuit compiled"
        );
        Ok(artifact)
    }
}
