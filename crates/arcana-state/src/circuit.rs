//! # Circuit Lifecycle
//!
//! ```text
//! Registered ──compile ok──▶ Compiled ──deploy tx──▶ DeployTxIssued ──confirmed──▶ Deployed
//!     │                         ▲                        │  ▲   │                    │  ▲
//!     └─compile err─▶ Failed    └──broadcast failed──────┘  └───┘ (new nonce)        │  │
//!                                                                        proof ok ───┘  │ rejected
//!                                                                                   ▼   │
//!                               Verified ◀──accepted── ProofIssued ◀──┐ (more proofs)
//!                                                          └──────────┘
//! ```
//!
//! `Verified` and `Failed(_)` are terminal. Re-registering a circuit id is
//! only permitted from `Failed(_)`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stage at which a circuit permanently failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Compile,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a registered circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "stage", rename_all = "snake_case")]
pub enum CircuitState {
    /// Source stored, compilation not yet finished.
    Registered,
    /// Compiled artifact exists; no deployment transaction issued yet.
    Compiled,
    /// At least one unsigned deployment transaction is outstanding.
    DeployTxIssued,
    /// The verifier contract is confirmed on chain.
    Deployed,
    /// At least one proof has been generated against the deployed verifier.
    ProofIssued,
    /// A proof was accepted on chain. Terminal.
    Verified,
    /// Absorbing failure state.
    Failed(FailureStage),
}

impl CircuitState {
    /// Whether this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Failed(_))
    }

    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Compiled => "compiled",
            Self::DeployTxIssued => "deploy_tx_issued",
            Self::Deployed => "deployed",
            Self::ProofIssued => "proof_issued",
            Self::Verified => "verified",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether a verifier contract is live for this circuit.
    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed | Self::ProofIssued | Self::Verified)
    }

    /// Whether `self → to` is a legal edge.
    ///
    /// No wildcard arms: adding a variant must revisit this table.
    pub fn can_transition_to(&self, to: CircuitState) -> bool {
        use CircuitState::*;
        match self {
            Registered => matches!(to, Compiled | Failed(FailureStage::Compile)),
            Compiled => matches!(to, DeployTxIssued),
            DeployTxIssued => matches!(to, DeployTxIssued | Deployed | Compiled),
            Deployed => matches!(to, ProofIssued),
            ProofIssued => matches!(to, ProofIssued | Verified | Deployed),
            Verified | Failed(_) => false,
        }
    }

    /// Validate and perform a transition.
    pub fn transition(self, to: CircuitState) -> Result<CircuitState, StateError> {
        if self.is_terminal() {
            return Err(StateError::Terminal { state: self });
        }
        if !self.can_transition_to(to) {
            return Err(StateError::InvalidTransition { from: self, to });
        }
        Ok(to)
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(stage) => write!(f, "failed({stage})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Errors raised when an operation is not valid for a circuit's current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The attempted transition is not an edge of the lifecycle.
    #[error("invalid circuit transition from {from} to {to}")]
    InvalidTransition {
        from: CircuitState,
        to: CircuitState,
    },
    /// The circuit is in a terminal state.
    #[error("circuit is in terminal state {state}")]
    Terminal { state: CircuitState },
    /// The operation requires a different state.
    #[error("{operation} requires state {required}, circuit is {actual}")]
    WrongState {
        operation: &'static str,
        required: &'static str,
        actual: CircuitState,
    },
    /// The operation conflicts with bound deployment parameters.
    #[error("{0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use CircuitState::*;

    const ALL: [CircuitState; 7] = [
        Registered,
        Compiled,
        DeployTxIssued,
        Deployed,
        ProofIssued,
        Verified,
        Failed(FailureStage::Compile),
    ];

    #[test]
    fn happy_path_is_legal() {
        let path = [
            Registered,
            Compiled,
            DeployTxIssued,
            DeployTxIssued,
            Deployed,
            ProofIssued,
            ProofIssued,
            Verified,
        ];
        let mut state = path[0];
        for next in &path[1..] {
            state = state.transition(*next).unwrap();
        }
        assert_eq!(state, Verified);
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in [Verified, Failed(FailureStage::Compile)] {
            for to in ALL {
                assert!(matches!(
                    from.transition(to),
                    Err(StateError::Terminal { .. })
                ));
            }
        }
    }

    #[test]
    fn cannot_skip_deployment() {
        assert!(Compiled.transition(Deployed).is_err());
        assert!(Compiled.transition(ProofIssued).is_err());
        assert!(DeployTxIssued.transition(ProofIssued).is_err());
        assert!(Registered.transition(DeployTxIssued).is_err());
    }

    #[test]
    fn failure_returns_are_legal() {
        assert_eq!(DeployTxIssued.transition(Compiled), Ok(Compiled));
        assert_eq!(ProofIssued.transition(Deployed), Ok(Deployed));
        assert_eq!(
            Registered.transition(Failed(FailureStage::Compile)),
            Ok(Failed(FailureStage::Compile))
        );
    }

    #[test]
    fn only_failed_and_verified_are_terminal() {
        let terminal: Vec<_> = ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&Verified, &Failed(FailureStage::Compile)]);
    }

    #[test]
    fn serde_shape() {
        assert_eq!(
            serde_json::to_value(Compiled).unwrap(),
            serde_json::json!({"status": "compiled"})
        );
        assert_eq!(
            serde_json::to_value(Failed(FailureStage::Compile)).unwrap(),
            serde_json::json!({"status": "failed", "stage": "compile"})
        );
        let back: CircuitState =
            serde_json::from_value(serde_json::json!({"status": "deploy_tx_issued"})).unwrap();
        assert_eq!(back, DeployTxIssued);
    }
}
