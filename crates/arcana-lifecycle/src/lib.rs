//! # arcana-lifecycle: Circuit Lifecycle Controller
//!
//! Drives a circuit through
//!
//! ```text
//! register ──▶ Compiled ──create_deployment──▶ DeployTxIssued ──broadcast──▶ Deployed
//!                                                                              │
//!                       Verified ◀──broadcast (accepted)── ProofIssued ◀──generate_proof
//! ```
//!
//! composing the artifact store, the compiler and prover drivers, the
//! transaction builder and the broadcaster. The controller never sees a
//! signing key: it hands out unsigned transactions and accepts signed bytes.
//!
//! Operations on one circuit are serialized by a [`KeyedLock`]; operations
//! on different circuits run concurrently. Store writes made under that lock
//! run on the blocking pool and finish even if the request is dropped.

pub mod config;
pub mod controller;
pub mod error;
pub mod lock;
mod locked;
pub mod views;

pub use config::LifecycleConfig;
pub use controller::LifecycleController;
pub use error::{ErrorKind, LifecycleError, Stage};
pub use lock::{KeyedGuard, KeyedLock};
pub use views::{
    ArtifactSummary, BroadcastRequest, CircuitView, DeployRequest, DeploymentResult, HealthView, NetworkView,
    ProofRequest, ProofResult, ProofSummary, RegisterRequest, RegisterResult, StatusView, TxOutcome,
};
