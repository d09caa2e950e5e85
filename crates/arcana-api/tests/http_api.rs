//! Router tests: status codes, error bodies, auth, and a full lifecycle over
//! HTTP against the mock toolchain and the in-memory chain.

use std::sync::Arc;
use std::time::Duration;

use arcana_api::error::ErrorBody;
use arcana_api::state::AppState;
use arcana_chain::{mock_sign, MockChain, NetworkRegistry, PollConfig};
use arcana_core::{EvmAddress, HexBytes};
use arcana_lifecycle::{DeploymentResult, LifecycleConfig, LifecycleController, ProofResult, TxOutcome};
use arcana_store::ArtifactStore;
use arcana_zkp::MockToolchain;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const NEQ: &str = "fn main(x: Field, y: pub Field) {\n    assert(x != y);\n}\n";
const MANIFEST: &str = "[package]\nname = \"neq\"\ntype = \"bin\"\n";
const USER: &str = "0x00000000000000000000000000000000000000bb";

fn test_app(token: Option<&str>) -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let config = LifecycleConfig {
        default_network: "local".into(),
        poll: PollConfig {
            attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        ..LifecycleConfig::default()
    };
    let controller = LifecycleController::new(
        ArtifactStore::open(dir.path()).unwrap(),
        Arc::new(MockToolchain::new()),
        Arc::new(MockChain::new()),
        Arc::new(NetworkRegistry::builtin()),
        config,
    )
    .unwrap();
    let state = AppState::new(controller, token.map(str::to_string));
    (dir, arcana_api::app(state))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn error_code(body: &Value) -> String {
    let body: ErrorBody = serde_json::from_value(body.clone()).unwrap();
    body.error.code
}

fn sign(unsigned: &arcana_chain::UnsignedTx) -> String {
    let user: EvmAddress = USER.parse().unwrap();
    HexBytes(mock_sign(unsigned, &user)).to_string()
}

async fn register(app: &Router, id: &str) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        "/register",
        Some(json!({"circuit_id": id, "manifest": MANIFEST, "source": NEQ})),
    )
    .await
}

#[tokio::test]
async fn root_and_health_are_public() {
    let (_dir, app) = test_app(Some("s3cret"));
    let (status, body) = call(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "arcana");

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "mock");
}

#[tokio::test]
async fn guarded_routes_require_the_token() {
    let (_dir, app) = test_app(Some("s3cret"));
    let (status, body) = call(&app, "GET", "/circuits", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "unauthorized");

    let request = Request::builder()
        .uri("/circuits")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/circuits")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_lifecycle_over_http() {
    let (_dir, app) = test_app(None);

    let (status, body) = register(&app, "neq").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"]["status"], "compiled");

    let (status, body) = call(&app, "POST", "/deploy", Some(json!({"circuit_id": "neq", "user_address": USER}))).await;
    assert_eq!(status, StatusCode::OK);
    let deployment: DeploymentResult = serde_json::from_value(body).unwrap();
    assert_eq!(deployment.chain_id, 31337);

    let (status, body) = call(
        &app,
        "POST",
        "/broadcast",
        Some(json!({
            "circuit_id": "neq",
            "signed_tx": sign(&deployment.unsigned_tx),
            "tx_type": "deployment",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let deployed: TxOutcome = serde_json::from_value(body).unwrap();
    let verifier = deployed.verifier_address.unwrap();

    let (status, body) = call(
        &app,
        "POST",
        "/proof",
        Some(json!({
            "circuit_id": "neq",
            "private_inputs": {"x": "5"},
            "public_inputs": ["10"],
            "user_address": USER,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let proof: ProofResult = serde_json::from_value(body).unwrap();
    assert_eq!(proof.verifier_address, verifier);

    let (status, body) = call(
        &app,
        "POST",
        "/broadcast",
        Some(json!({
            "circuit_id": "neq",
            "signed_tx": sign(&proof.unsigned_tx),
            "tx_type": "verification",
            "verifier_address": verifier.to_string(),
            "public_inputs": ["10"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["verified"], true);
    assert_eq!(body["state"]["status"], "verified");

    let (status, body) = call(&app, "GET", "/circuits/neq", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["proof_count"], 1);
    assert!(body["proofs"][0].get("proof").is_none());

    let (_, status_body) = call(&app, "GET", "/status", None).await;
    assert_eq!(status_body["total_circuits"], 1);
    assert_eq!(status_body["total_proofs"], 1);
    assert_eq!(status_body["deployed_circuits"], 1);
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let (_dir, app) = test_app(None);
    register(&app, "dup").await;
    let (status, body) = register(&app, "dup").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "duplicate_circuit");
    assert_eq!(body["error"]["circuit_id"], "dup");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn proof_before_deployment_is_conflict() {
    let (_dir, app) = test_app(None);
    register(&app, "early").await;
    let (status, body) = call(
        &app,
        "POST",
        "/proof",
        Some(json!({
            "circuit_id": "early",
            "private_inputs": {"x": "5"},
            "public_inputs": ["10"],
            "user_address": USER,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "invalid_state");
    assert_eq!(body["error"]["state"]["status"], "compiled");
    assert_eq!(body["error"]["stage"], "prove");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let (_dir, app) = test_app(None);
    let (status, body) = call(&app, "GET", "/circuits/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");

    let (status, body) = call(&app, "GET", "/circuits/-bad", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "validation_error");
}

#[tokio::test]
async fn malformed_body_is_validation_error() {
    let (_dir, app) = test_app(None);
    let (status, body) = call(&app, "POST", "/deploy", Some(json!({"circuit_id": "x", "user_address": "nope"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "validation_error");
}

#[tokio::test]
async fn rejected_private_input_is_not_echoed() {
    let (_dir, app) = test_app(None);
    register(&app, "neq").await;
    let secret = "21888242871839275222246405745257275088548364400416034343698204186575808495700";
    let (status, body) = call(
        &app,
        "POST",
        "/proof",
        Some(json!({
            "circuit_id": "neq",
            "private_inputs": {"x": secret},
            "public_inputs": ["10"],
            "user_address": USER,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "validation_error");
    assert!(!body.to_string().contains(secret), "{body}");

    let non_ascii = "é".repeat(60);
    let (status, body) = call(
        &app,
        "POST",
        "/proof",
        Some(json!({
            "circuit_id": "neq",
            "private_inputs": {"x": non_ascii},
            "public_inputs": ["10"],
            "user_address": USER,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!body.to_string().contains(&non_ascii));
}

#[tokio::test]
async fn networks_lists_default() {
    let (_dir, app) = test_app(None);
    let (status, body) = call(&app, "GET", "/networks", None).await;
    assert_eq!(status, StatusCode::OK);
    let local = body
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "local")
        .unwrap();
    assert_eq!(local["chain_id"], 31337);
    assert_eq!(local["is_default"], true);
}
