//! Request shapes the service accepts but the engine only deserializes.

use std::collections::BTreeMap;

use arcana_core::{CircuitId, EvmAddress, FieldElement, TxHash};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Body of `POST /proof`. Private inputs are wiped when the request drops.
#[derive(Serialize)]
pub struct ProveRequest {
    pub circuit_id: CircuitId,
    pub private_inputs: BTreeMap<String, FieldElement>,
    pub public_inputs: Vec<FieldElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_address: Option<EvmAddress>,
    pub user_address: EvmAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl ProveRequest {
    pub fn new(circuit_id: CircuitId, user_address: EvmAddress) -> Self {
        Self {
            circuit_id,
            private_inputs: BTreeMap::new(),
            public_inputs: Vec::new(),
            verifier_address: None,
            user_address,
            network: None,
        }
    }

    pub fn private_input(mut self, name: impl Into<String>, value: FieldElement) -> Self {
        if let Some(mut previous) = self.private_inputs.insert(name.into(), value) {
            previous.zeroize();
        }
        self
    }

    pub fn public_inputs(mut self, values: impl IntoIterator<Item = FieldElement>) -> Self {
        self.public_inputs = values.into_iter().collect();
        self
    }

    pub fn verifier(mut self, address: EvmAddress) -> Self {
        self.verifier_address = Some(address);
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }
}

impl Drop for ProveRequest {
    fn drop(&mut self) {
        for value in self.private_inputs.values_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for ProveRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProveRequest")
            .field("circuit_id", &self.circuit_id)
            .field("private_inputs", &"[REDACTED]")
            .field("public_inputs", &self.public_inputs.len())
            .field("verifier_address", &self.verifier_address)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
pub(crate) struct ReconcileBody {
    pub tx_hash: TxHash,
}

/// `GET /` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub default_network: String,
}
