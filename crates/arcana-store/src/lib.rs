//! # arcana-store: Artifact Store
//!
//! Durable, filesystem-backed storage for everything the orchestrator knows
//! about a circuit. One directory per circuit under `{data_dir}/circuits/`:
//!
//! ```text
//! {circuit_id}/
//!   Nargo.toml               build manifest
//!   src/main.nr              program source
//!   circuit.json             Circuit record
//!   artifact.json            CompiledArtifact (create-once, digest-checked)
//!   deployments/{id}.json    DeploymentRecord
//!   verifications/{id}.json  VerificationRecord
//!   proofs/{id}.json         ProofArtifact
//! ```
//!
//! Circuit creation is atomic on the directory itself, so two concurrent
//! registrations of the same id cannot both succeed. Every other write goes
//! through a temp file and a rename. Reads take no locks.

pub mod error;
pub mod records;
pub mod store;

pub use error::StoreError;
pub use records::{Circuit, DeploymentRecord, LastError, VerificationRecord};
pub use store::ArtifactStore;
