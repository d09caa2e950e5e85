//! Contract tests for ArcanaClient against a wiremock server.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET | `/health` | `health_*` |
//! | GET | `/status` | `status_*` |
//! | GET | `/circuits/{id}` | `get_circuit_*` |
//! | POST | `/register` | `register_*` |
//! | POST | `/proof` | `prove_*` |
//! | POST | `/broadcast` | `broadcast_*` |
//! | POST | `/circuits/{id}/reconcile` | `reconcile_*` |

use std::time::Duration;

use arcana_chain::TxType;
use arcana_client::{ArcanaClient, BroadcastRequest, ClientConfig, ClientError, ProveRequest, RegisterRequest};
use arcana_core::{CircuitId, EvmAddress, FieldElement, HexBytes, TxHash};
use arcana_state::{CircuitState, RecordStatus};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const VERIFIER: &str = "0x00000000000000000000000000000000000000aa";
const USER: &str = "0x00000000000000000000000000000000000000bb";
const RECORD_ID: &str = "6f1c1a4e-8a43-4f4b-9d6e-2f4f1c9a7b10";

fn client(server: &MockServer) -> ArcanaClient {
    ArcanaClient::new(ClientConfig::new(&server.uri()).unwrap()).unwrap()
}

fn id(s: &str) -> CircuitId {
    CircuitId::new(s).unwrap()
}

fn error_body(code: &str, message: &str, state: serde_json::Value) -> serde_json::Value {
    json!({"error": {
        "code": code,
        "message": message,
        "stage": "register",
        "circuit_id": "neq",
        "state": state,
        "retryable": false,
    }})
}

// ── GET /health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "backend": "noir",
            "backend_available": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(&server.uri()).unwrap().with_token("t0ken");
    let health = ArcanaClient::new(config).unwrap().health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert!(health.backend_available);
}

// ── GET /status ──────────────────────────────────────────────────────

fn status_body() -> serde_json::Value {
    json!({
        "total_circuits": 1,
        "total_proofs": 0,
        "deployed_circuits": 0,
        "supported_networks": ["local"],
    })
}

#[tokio::test]
async fn status_read_outlasts_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream restarting"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(&server.uri())
        .unwrap()
        .with_read_retries(3, Duration::from_millis(1));
    let status = ArcanaClient::new(config).unwrap().status().await.unwrap();
    assert_eq!(status.total_circuits, 1);
}

#[tokio::test]
async fn status_read_gives_up_after_its_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    let config = ClientConfig::new(&server.uri())
        .unwrap()
        .with_read_retries(2, Duration::from_millis(1));
    let err = ArcanaClient::new(config).unwrap().status().await.unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedStatus { status: 502, .. }));
}

#[tokio::test]
async fn status_read_does_not_repeat_a_final_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": {
            "code": "store_error",
            "message": "malformed record",
            "retryable": false,
        }})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(&server.uri())
        .unwrap()
        .with_read_retries(3, Duration::from_millis(1));
    let err = ArcanaClient::new(config).unwrap().status().await.unwrap_err();
    assert_eq!(err.code(), Some("store_error"));
}

// ── GET /circuits/{id} ───────────────────────────────────────────────

#[tokio::test]
async fn get_circuit_parses_flattened_view() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/circuits/neq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "circuit_id": "neq",
            "description": null,
            "network": "local",
            "state": {"status": "deployed"},
            "artifact_digest": "ab12",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:05:00Z",
            "proof_count": 0,
            "deployed_network": "local",
            "verifier_address": VERIFIER,
            "last_error": null,
            "artifact": null,
            "deployments": [],
            "verifications": [],
            "proofs": [],
        })))
        .mount(&server)
        .await;

    let view = client(&server).get_circuit(&id("neq")).await.unwrap().unwrap();
    assert_eq!(view.circuit.state, CircuitState::Deployed);
    assert_eq!(view.circuit.verifier_address, Some(VERIFIER.parse().unwrap()));
}

#[tokio::test]
async fn get_circuit_not_found_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/circuits/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {
            "code": "not_found",
            "message": "circuit ghost not found",
            "stage": "read",
            "retryable": false,
        }})))
        .mount(&server)
        .await;

    assert!(client(&server).get_circuit(&id("ghost")).await.unwrap().is_none());
}

// ── POST /register ───────────────────────────────────────────────────

#[tokio::test]
async fn register_duplicate_carries_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_partial_json(json!({"circuit_id": "neq"})))
        .respond_with(ResponseTemplate::new(409).set_body_json(error_body(
            "duplicate_circuit",
            "circuit neq already exists",
            json!({"status": "compiled"}),
        )))
        .mount(&server)
        .await;

    let err = client(&server)
        .register(&RegisterRequest {
            circuit_id: Some(id("neq")),
            manifest: "[package]\nname = \"neq\"\n".into(),
            source: "fn main(x: Field, y: pub Field) { assert(x != y); }".into(),
            description: None,
            network: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("duplicate_circuit"));
    assert_eq!(err.status(), Some(409));
    assert!(!err.is_retryable());
    match err {
        ClientError::Api { error, .. } => assert_eq!(error.state, Some(CircuitState::Compiled)),
        other => panic!("expected Api error, got {other:?}"),
    }
}

// ── POST /proof ──────────────────────────────────────────────────────

#[tokio::test]
async fn prove_sends_inputs_as_decimal_strings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/proof"))
        .and(body_partial_json(json!({
            "circuit_id": "neq",
            "private_inputs": {"x": "5"},
            "public_inputs": ["10"],
        })))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": {
            "code": "backend_unavailable",
            "message": "bb not found",
            "stage": "prove",
            "retryable": true,
        }})))
        .expect(1)
        .mount(&server)
        .await;

    let request = ProveRequest::new(id("neq"), USER.parse().unwrap())
        .private_input("x", FieldElement::from(5u64))
        .public_inputs([FieldElement::from(10u64)]);
    let err = client(&server).prove(&request).await.unwrap_err();
    assert_eq!(err.code(), Some("backend_unavailable"));
    assert!(err.is_retryable());
}

// ── POST /broadcast ──────────────────────────────────────────────────

#[tokio::test]
async fn broadcast_returns_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/broadcast"))
        .and(body_partial_json(json!({"signed_tx": "0xf86c", "tx_type": "verification"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "circuit_id": "neq",
            "tx_type": "verification",
            "record_id": RECORD_ID,
            "tx_hash": TX_HASH,
            "status": "confirmed",
            "verifier_address": VERIFIER,
            "verified": true,
            "state": {"status": "verified"},
        })))
        .mount(&server)
        .await;

    let verifier: EvmAddress = VERIFIER.parse().unwrap();
    let outcome = client(&server)
        .broadcast(&BroadcastRequest {
            circuit_id: id("neq"),
            signed_tx: HexBytes(vec![0xf8, 0x6c]),
            network: None,
            tx_type: TxType::Verification,
            verifier_address: Some(verifier),
            public_inputs: Some(vec![FieldElement::from(10u64)]),
        })
        .await
        .unwrap();
    assert_eq!(outcome.status, RecordStatus::Confirmed);
    assert_eq!(outcome.verified, Some(true));
    assert_eq!(outcome.state, CircuitState::Verified);
}

#[tokio::test]
async fn broadcast_proxy_error_is_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/broadcast"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server)
        .broadcast(&BroadcastRequest {
            circuit_id: id("neq"),
            signed_tx: HexBytes(vec![0x01]),
            network: None,
            tx_type: TxType::Deployment,
            verifier_address: None,
            public_inputs: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedStatus { status: 502, .. }));
    assert!(err.is_retryable());
}

// ── POST /circuits/{id}/reconcile ────────────────────────────────────

#[tokio::test]
async fn reconcile_posts_tx_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/circuits/neq/reconcile"))
        .and(body_partial_json(json!({"tx_hash": TX_HASH})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "circuit_id": "neq",
            "tx_type": "deployment",
            "record_id": RECORD_ID,
            "tx_hash": TX_HASH,
            "status": "broadcast",
            "state": {"status": "deploy_tx_issued"},
        })))
        .mount(&server)
        .await;

    let hash: TxHash = TX_HASH.parse().unwrap();
    let outcome = client(&server).reconcile(&id("neq"), hash).await.unwrap();
    assert_eq!(outcome.status, RecordStatus::Broadcast);
    assert_eq!(outcome.state, CircuitState::DeployTxIssued);
    assert!(outcome.verifier_address.is_none());
}
