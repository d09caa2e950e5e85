//! # Application State
//!
//! Shared state for the router, and its construction from [`Config`].

use std::sync::Arc;
use std::time::Duration;

use arcana_chain::{ChainRpc, JsonRpcClient, MockChain, NetworkError, NetworkRegistry, RpcError};
use arcana_lifecycle::LifecycleController;
use arcana_store::{ArtifactStore, StoreError};
use arcana_zkp::{MockToolchain, NoirConfig, NoirToolchain, ZkToolchain};
use thiserror::Error;

use crate::auth::AuthConfig;
use crate::config::{Backend, Config};

#[derive(Clone, Debug)]
pub struct AppState {
    pub controller: Arc<LifecycleController>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(controller: LifecycleController, auth_token: Option<String>) -> Self {
        Self {
            controller: Arc::new(controller),
            auth: AuthConfig { token: auth_token },
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, BootstrapError> {
        let store = ArtifactStore::open(&config.data_dir)?;
        let toolchain: Arc<dyn ZkToolchain> = match config.backend {
            Backend::Noir => Arc::new(NoirToolchain::new(NoirConfig {
                nargo_path: config.nargo_path.clone(),
                bb_path: config.bb_path.clone(),
                solc_path: config.solc_path.clone(),
                ..NoirConfig::default()
            })),
            Backend::Mock => Arc::new(MockToolchain::new()),
        };
        let rpc: Arc<dyn ChainRpc> = if config.mock_chain {
            Arc::new(MockChain::new())
        } else {
            Arc::new(JsonRpcClient::new(Duration::from_secs(config.rpc_timeout_secs))?)
        };
        let registry = Arc::new(NetworkRegistry::from_env(config.networks_file.as_deref())?);
        let controller = LifecycleController::new(store, toolchain, rpc, registry, config.lifecycle())?;
        tracing::info!(
            data_dir = %config.data_dir.display(),
            backend = ?config.backend,
            mock_chain = config.mock_chain,
            default_network = %config.default_network,
            "service state initialized"
        );
        Ok(Self::new(controller, config.auth_token.clone()))
    }
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("artifact store: {0}")]
    Store(#[from] StoreError),
    #[error("network registry: {0}")]
    Network(#[from] NetworkError),
    #[error("rpc client: {0}")]
    Rpc(#[from] RpcError),
}
