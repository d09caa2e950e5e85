//! # arcana-state: Lifecycle State Machines
//!
//! - **Circuit** ([`circuit`]): `Registered → Compiled → DeployTxIssued →
//!   Deployed → ProofIssued → Verified`, with an absorbing `Failed(stage)`.
//!   Every transition the orchestrator performs goes through
//!   [`CircuitState::transition`]; there is no way to assign a state
//!   without it.
//!
//! - **Transaction records** ([`record`]): deployment and verification
//!   records move `Pending → Broadcast → Confirmed | Failed` or
//!   `Pending → Failed`, never backward.

pub mod circuit;
pub mod record;

pub use circuit::{CircuitState, FailureStage, StateError};
pub use record::{RecordStatus, RecordTransitionError, VerificationOutcome};
