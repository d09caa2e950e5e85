//! # arcana-client: Typed client for the orchestrator HTTP API
//!
//! Mirrors the service routes one method per route. Response bodies
//! deserialize into the same view types the service produces.
//!
//! The client never signs anything: `deploy` and `prove` return unsigned
//! transactions, the caller signs them with its own key, and `broadcast`
//! submits the signed bytes.
//!
//! ## Retries
//!
//! A GET is repeated, with doubling backoff, while its failure is one
//! [`ClientError::is_retryable`] accepts: transport errors, gateway statuses,
//! and service errors flagged retryable. POST requests are sent once; the
//! caller decides whether a failed submission is safe to repeat.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ClientConfig, ConfigError};
pub use error::{ApiErrorDetail, ClientError};
pub use types::{ProveRequest, ServiceInfo};

pub use arcana_lifecycle::{
    BroadcastRequest, CircuitView, DeployRequest, DeploymentResult, HealthView, NetworkView, ProofResult,
    RegisterRequest, RegisterResult, StatusView, TxOutcome,
};

use std::time::Duration;

use arcana_core::{CircuitId, TxHash};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiErrorBody;

#[derive(Debug, Clone)]
pub struct ArcanaClient {
    http: reqwest::Client,
    base_url: String,
    read_retries: u32,
    retry_delay: Duration,
}

impl ArcanaClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|_| ConfigError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            read_retries: config.read_retries,
            retry_delay: config.retry_delay,
        })
    }

    /// Client from `ARCANA_API_URL` / `ARCANA_AUTH_TOKEN`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub async fn service_info(&self) -> Result<ServiceInfo, ClientError> {
        self.get("/").await
    }

    pub async fn health(&self) -> Result<HealthView, ClientError> {
        self.get("/health").await
    }

    pub async fn status(&self) -> Result<StatusView, ClientError> {
        self.get("/status").await
    }

    pub async fn networks(&self) -> Result<Vec<NetworkView>, ClientError> {
        self.get("/networks").await
    }

    pub async fn list_circuits(&self) -> Result<Vec<CircuitView>, ClientError> {
        self.get("/circuits").await
    }

    /// `Ok(None)` when the service has no such circuit.
    pub async fn get_circuit(&self, circuit_id: &CircuitId) -> Result<Option<CircuitView>, ClientError> {
        match self.get(&format!("/circuits/{circuit_id}")).await {
            Ok(view) => Ok(Some(view)),
            Err(e) if e.code() == Some("not_found") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Store and compile a circuit. Fails with `duplicate_circuit` when the
    /// id is taken by a circuit that has not failed.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResult, ClientError> {
        self.post("/register", request).await
    }

    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeploymentResult, ClientError> {
        self.post("/deploy", request).await
    }

    pub async fn prove(&self, request: &ProveRequest) -> Result<ProofResult, ClientError> {
        self.post("/proof", request).await
    }

    pub async fn broadcast(&self, request: &BroadcastRequest) -> Result<TxOutcome, ClientError> {
        self.post("/broadcast", request).await
    }

    /// Re-check a broadcast that timed out waiting for its receipt.
    pub async fn reconcile(&self, circuit_id: &CircuitId, tx_hash: TxHash) -> Result<TxOutcome, ClientError> {
        self.post(
            &format!("/circuits/{circuit_id}/reconcile"),
            &types::ReconcileBody { tx_hash },
        )
        .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut attempt = 0;
        loop {
            match self.get_once(path).await {
                Err(e) if e.is_retryable() && attempt < self.read_retries => {
                    let delay = self.retry_delay.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    tracing::warn!(
                        path,
                        attempt,
                        retries = self.read_retries,
                        ?delay,
                        "orchestrator read failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let endpoint = format!("GET {path}");
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        decode(endpoint, resp).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let endpoint = format!("POST {path}");
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        decode(endpoint, resp).await
    }
}

async fn decode<T: DeserializeOwned>(endpoint: String, resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => ClientError::Api {
                endpoint,
                status: status.as_u16(),
                error: parsed.error,
            },
            Err(_) => ClientError::UnexpectedStatus {
                endpoint,
                status: status.as_u16(),
                body,
            },
        });
    }
    resp.json()
        .await
        .map_err(|e| ClientError::Deserialization { endpoint, source: e })
}
