//! Shared harness: a controller over a throwaway store, the deterministic
//! toolchain and the in-memory chain.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use arcana_api::auth::AuthConfig;
use arcana_api::state::AppState;
use arcana_chain::{mock_sign, MockChain, NetworkRegistry, PollConfig, UnsignedTx};
use arcana_client::{ArcanaClient, ClientConfig};
use arcana_core::{CircuitId, EvmAddress, HexBytes};
use arcana_lifecycle::{LifecycleConfig, LifecycleController, RegisterRequest};
use arcana_store::ArtifactStore;
use arcana_zkp::MockToolchain;
use tempfile::TempDir;

pub const MANIFEST: &str = "[package]\nname = \"neq\"\ntype = \"bin\"\n";
pub const NEQ: &str = "fn main(x: Field, y: pub Field) {\n    assert(x != y);\n}\n";

pub struct Harness {
    dir: TempDir,
    pub chain: Arc<MockChain>,
    pub toolchain: Arc<MockToolchain>,
    pub ctl: Arc<LifecycleController>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_toolchain(MockToolchain::new())
    }

    pub fn with_toolchain(toolchain: MockToolchain) -> Self {
        let dir = TempDir::new().unwrap();
        let chain = Arc::new(MockChain::new());
        let toolchain = Arc::new(toolchain);
        let ctl = controller(&dir, &toolchain, &chain);
        Self {
            dir,
            chain,
            toolchain,
            ctl: Arc::new(ctl),
        }
    }

    /// A fresh controller over the same data directory and chain, as after a
    /// process restart.
    pub fn restart(&self) -> LifecycleController {
        controller(&self.dir, &self.toolchain, &self.chain)
    }

    /// Serve the router on a loopback port and return its base URL.
    pub async fn serve_url(&self, token: Option<&str>) -> String {
        let state = AppState {
            controller: self.ctl.clone(),
            auth: AuthConfig {
                token: token.map(str::to_string),
            },
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, arcana_api::app(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Serve the router and return a client holding the same token.
    pub async fn serve(&self, token: Option<&str>) -> ArcanaClient {
        let mut config = ClientConfig::new(&self.serve_url(token).await).unwrap();
        if let Some(token) = token {
            config = config.with_token(token);
        }
        ArcanaClient::new(config).unwrap()
    }
}

fn controller(dir: &TempDir, toolchain: &Arc<MockToolchain>, chain: &Arc<MockChain>) -> LifecycleController {
    let config = LifecycleConfig {
        default_network: "local".into(),
        poll: PollConfig {
            attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        ..LifecycleConfig::default()
    };
    LifecycleController::new(
        ArtifactStore::open(dir.path()).unwrap(),
        toolchain.clone(),
        chain.clone(),
        Arc::new(NetworkRegistry::builtin()),
        config,
    )
    .unwrap()
}

pub fn user() -> EvmAddress {
    "0x00000000000000000000000000000000000000bb".parse().unwrap()
}

pub fn id(s: &str) -> CircuitId {
    CircuitId::new(s).unwrap()
}

/// Stand-in for the client's wallet.
pub fn sign(tx: &UnsignedTx) -> HexBytes {
    HexBytes(mock_sign(tx, &user()))
}

pub fn register_request(circuit_id: &str, source: &str) -> RegisterRequest {
    RegisterRequest {
        circuit_id: Some(id(circuit_id)),
        manifest: MANIFEST.into(),
        source: source.into(),
        description: None,
        network: None,
    }
}
