//! The seam between the orchestrator and a ZK compiler/prover.

use async_trait::async_trait;

use crate::artifact::{CircuitSource, CompiledArtifact, InputSchema};
use crate::error::{CompileError, ProveError};
use crate::inputs::Witness;

/// Raw compiler output before the driver stamps it into a
/// [`CompiledArtifact`].
#[derive(Debug, Clone)]
pub struct ToolchainOutput {
    pub program: Vec<u8>,
    pub verification_key: Vec<u8>,
    pub verifier_bytecode: Vec<u8>,
    pub schema: InputSchema,
    pub compiler_version: String,
}

/// A ZK compiler and proving backend.
///
/// Implementations must be cancellation-safe: dropping either future must
/// terminate any child process and discard intermediate files. Neither
/// method retries internally.
#[async_trait]
pub trait ZkToolchain: Send + Sync {
    /// Short backend name recorded on every artifact.
    fn name(&self) -> &'static str;

    /// Whether the backend's executables are reachable.
    async fn available(&self) -> bool;

    async fn compile(&self, source: &CircuitSource) -> Result<ToolchainOutput, CompileError>;

    /// Produce proof bytes for `witness`. Public inputs are not appended.
    async fn prove(
        &self,
        artifact: &CompiledArtifact,
        witness: &Witness,
    ) -> Result<Vec<u8>, ProveError>;
}
