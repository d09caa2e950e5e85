//! Service configuration: command-line flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use arcana_chain::{PollConfig, DEFAULT_NETWORK};
use arcana_lifecycle::LifecycleConfig;
use clap::{Parser, ValueEnum};

/// Proving backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// `nargo` + `bb` + `solc` child processes.
    Noir,
    /// Deterministic in-process backend.
    Mock,
}

/// Arcana ZK orchestrator HTTP service.
#[derive(Parser, Clone)]
#[command(name = "arcana-api", version, about, long_about = None)]
pub struct Config {
    #[arg(long, env = "ARCANA_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Root of the artifact store.
    #[arg(long, env = "ARCANA_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    #[arg(long, env = "ARCANA_BACKEND", value_enum, default_value_t = Backend::Noir)]
    pub backend: Backend,

    #[arg(long, env = "ARCANA_NARGO_PATH", default_value = "nargo")]
    pub nargo_path: PathBuf,

    #[arg(long, env = "ARCANA_BB_PATH", default_value = "bb")]
    pub bb_path: PathBuf,

    #[arg(long, env = "ARCANA_SOLC_PATH", default_value = "solc")]
    pub solc_path: PathBuf,

    #[arg(long, env = "ARCANA_COMPILE_TIMEOUT_SECS", default_value_t = 300)]
    pub compile_timeout_secs: u64,

    #[arg(long, env = "ARCANA_PROVE_TIMEOUT_SECS", default_value_t = 300)]
    pub prove_timeout_secs: u64,

    #[arg(long, env = "ARCANA_RPC_TIMEOUT_SECS", default_value_t = 15)]
    pub rpc_timeout_secs: u64,

    #[arg(long, env = "ARCANA_RECEIPT_POLL_ATTEMPTS", default_value_t = 30)]
    pub receipt_poll_attempts: u32,

    #[arg(long, env = "ARCANA_RECEIPT_POLL_BASE_MS", default_value_t = 500)]
    pub receipt_poll_base_ms: u64,

    /// JSON file of additional or overriding networks.
    #[arg(long, env = "ARCANA_NETWORKS_FILE")]
    pub networks_file: Option<PathBuf>,

    #[arg(long, env = "ARCANA_DEFAULT_NETWORK", default_value = DEFAULT_NETWORK)]
    pub default_network: String,

    /// Bearer token required on every route except `/` and `/health`.
    #[arg(long, env = "ARCANA_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Serve against the in-memory chain instead of JSON-RPC endpoints.
    #[arg(long, env = "ARCANA_MOCK_CHAIN")]
    pub mock_chain: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "ARCANA_LOG_JSON")]
    pub log_json: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("backend", &self.backend)
            .field("default_network", &self.default_network)
            .field("networks_file", &self.networks_file)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("mock_chain", &self.mock_chain)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            default_network: self.default_network.clone(),
            compile_timeout: Duration::from_secs(self.compile_timeout_secs),
            prove_timeout: Duration::from_secs(self.prove_timeout_secs),
            poll: PollConfig {
                attempts: self.receipt_poll_attempts,
                base_delay: Duration::from_millis(self.receipt_poll_base_ms),
                ..PollConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["arcana-api"]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.backend, Backend::Noir);
        assert_eq!(config.default_network, DEFAULT_NETWORK);
        let lifecycle = config.lifecycle();
        assert_eq!(lifecycle.poll.attempts, 30);
        assert_eq!(lifecycle.poll.base_delay, Duration::from_millis(500));
        assert_eq!(lifecycle.compile_timeout, Duration::from_secs(300));
    }

    #[test]
    fn flags_override() {
        let config = Config::try_parse_from([
            "arcana-api",
            "--backend",
            "mock",
            "--mock-chain",
            "--receipt-poll-attempts",
            "3",
            "--auth-token",
            "t0ken",
        ])
        .unwrap();
        assert_eq!(config.backend, Backend::Mock);
        assert!(config.mock_chain);
        assert_eq!(config.lifecycle().poll.attempts, 3);
        assert!(!format!("{config:?}").contains("t0ken"));
    }
}
