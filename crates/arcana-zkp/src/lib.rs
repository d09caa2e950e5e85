//! # arcana-zkp: Compiler & Prover Drivers
//!
//! The orchestrator never implements a proof system. It drives one.
//!
//! ```text
//! CircuitSource ──▶ CompilerDriver ──▶ ZkToolchain::compile ──▶ CompiledArtifact
//!
//! CompiledArtifact ┐
//! SecretInputs     ├─▶ ProverDriver ──validate──▶ Witness ──▶ ZkToolchain::prove ──▶ ProofArtifact
//! public inputs    ┘
//! ```
//!
//! ## Backends
//!
//! - [`NoirToolchain`]: shells out to `nargo`, `bb` and `solc` inside a
//!   scoped temporary directory. Child processes are killed and the
//!   directory removed on every exit path, including future cancellation.
//! - [`MockToolchain`]: deterministic in-process backend for tests and local
//!   development. Understands `fn main(...)` signatures and `assert`
//!   constraints over scalar parameters.
//!
//! ## Private inputs
//!
//! [`SecretInputs`] can be deserialized but never serialized, cloned or
//! printed, and its values are zeroized on drop. The validated [`Witness`]
//! carries the same guarantees. Neither type appears in any persisted record.

pub mod artifact;
pub mod compiler;
pub mod error;
pub mod inputs;
pub mod mock;
pub mod noir;
pub mod prover;
pub mod toolchain;

pub use artifact::{
    CircuitSource, CompiledArtifact, InputSchema, ParamType, Parameter, ProofArtifact, Visibility,
};
pub use compiler::{CompileFailure, CompilerDriver};
pub use error::{CompileError, CompileStage, ProveError, ProveErrorKind};
pub use inputs::{SecretInputs, Witness};
pub use mock::{mock_verify, MockToolchain};
pub use noir::{NoirConfig, NoirToolchain};
pub use prover::{ProveFailure, ProverDriver};
pub use toolchain::{ToolchainOutput, ZkToolchain};
