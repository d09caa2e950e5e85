//! # Restart persistence
//!
//! Everything the controller knows lives in the artifact store. A controller
//! opened over the same directory picks up where the previous one stopped.

mod common;

use arcana_chain::TxType;
use arcana_core::FieldElement;
use arcana_lifecycle::{BroadcastRequest, DeployRequest, ProofRequest};
use arcana_state::{CircuitState, RecordStatus};
use arcana_zkp::SecretInputs;
use common::{id, register_request, sign, user, Harness, NEQ};

fn deploy_request(circuit_id: &str) -> DeployRequest {
    DeployRequest {
        circuit_id: id(circuit_id),
        user_address: user(),
        network: None,
    }
}

fn broadcast(circuit_id: &str, tx: &arcana_chain::UnsignedTx, tx_type: TxType) -> BroadcastRequest {
    BroadcastRequest {
        circuit_id: id(circuit_id),
        signed_tx: sign(tx),
        network: None,
        tx_type,
        verifier_address: None,
        public_inputs: None,
    }
}

#[tokio::test]
async fn issued_deployment_survives_restart() {
    let h = Harness::new();
    h.ctl.register(register_request("neq", NEQ)).await.unwrap();
    let deployment = h.ctl.create_deployment(deploy_request("neq")).await.unwrap();

    let restarted = h.restart();
    let view = restarted.get_circuit(&id("neq")).unwrap();
    assert_eq!(view.circuit.state, CircuitState::DeployTxIssued);
    assert_eq!(view.deployments.len(), 1);
    assert_eq!(view.deployments[0].status, RecordStatus::Pending);

    let outcome = restarted
        .broadcast(broadcast("neq", &deployment.unsigned_tx, TxType::Deployment))
        .await
        .unwrap();
    assert_eq!(outcome.state, CircuitState::Deployed);
}

#[tokio::test]
async fn proofs_and_counters_survive_restart() {
    let h = Harness::new();
    h.ctl.register(register_request("neq", NEQ)).await.unwrap();
    let tx = h.ctl.create_deployment(deploy_request("neq")).await.unwrap().unsigned_tx;
    h.ctl.broadcast(broadcast("neq", &tx, TxType::Deployment)).await.unwrap();
    let proof = h
        .ctl
        .generate_proof(ProofRequest {
            circuit_id: id("neq"),
            private_inputs: [("x", FieldElement::from(3u64))].into_iter().collect::<SecretInputs>(),
            public_inputs: vec![FieldElement::from(4u64)],
            verifier_address: None,
            user_address: user(),
            network: None,
        })
        .await
        .unwrap();

    let restarted = h.restart();
    let view = restarted.get_circuit(&id("neq")).unwrap();
    assert_eq!(view.circuit.state, CircuitState::ProofIssued);
    assert_eq!(view.circuit.proof_count, 1);
    assert_eq!(view.proofs[0].proof_id, proof.proof_id);
    assert_eq!(view.proofs[0].proof_hash, proof.proof_hash);
    assert_eq!(restarted.status().unwrap().total_proofs, 1);

    // The restarted controller still accepts the verification issued before.
    let outcome = restarted
        .broadcast(broadcast("neq", &proof.unsigned_tx, TxType::Verification))
        .await
        .unwrap();
    assert_eq!(outcome.verified, Some(true));
    assert_eq!(h.ctl.get_circuit(&id("neq")).unwrap().circuit.state, CircuitState::Verified);
}

#[tokio::test]
async fn failed_registration_survives_restart_and_can_be_replaced() {
    let h = Harness::new();
    let broken = "fn main(x: Field) {\n    assert(x != z);\n}\n";
    h.ctl.register(register_request("fix", broken)).await.unwrap_err();

    let restarted = h.restart();
    let view = restarted.get_circuit(&id("fix")).unwrap();
    assert!(matches!(view.circuit.state, CircuitState::Failed(_)));
    assert_eq!(view.circuit.last_error.unwrap().stage, "compile");

    let replaced = restarted.register(register_request("fix", NEQ)).await.unwrap();
    assert_eq!(replaced.state, CircuitState::Compiled);
}
