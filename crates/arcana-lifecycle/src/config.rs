use std::time::Duration;

use arcana_chain::{PollConfig, DEFAULT_NETWORK};
use arcana_zkp::compiler::DEFAULT_COMPILE_TIMEOUT;
use arcana_zkp::prover::DEFAULT_PROVE_TIMEOUT;

/// Library-level controller settings. The binary fills these from its CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Network used when a request names none.
    pub default_network: String,
    pub compile_timeout: Duration,
    pub prove_timeout: Duration,
    /// Receipt polling schedule for `broadcast`.
    pub poll: PollConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_network: DEFAULT_NETWORK.to_string(),
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            prove_timeout: DEFAULT_PROVE_TIMEOUT,
            poll: PollConfig::default(),
        }
    }
}
