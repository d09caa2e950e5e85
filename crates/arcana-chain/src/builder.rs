//! # Transaction Builder
//!
//! Produces chain-correct [`UnsignedTx`] values for the two universal
//! operations. Nonce and gas price come from the node; the gas limit is the
//! network default; calldata comes from [`crate::abi`].
//!
//! ## Nonce reservations
//!
//! Two deployment transactions requested back to back for the same sender
//! must not share a nonce, yet the node's pending count does not move until
//! one of them is broadcast. The builder therefore keeps the next nonce it
//! handed out per (network, sender), serialized by a per-key mutex, and
//! issues `max(pending count, next reserved)`.
//!
//! A reservation stays outstanding until the caller either settles it (the
//! node accepted the transaction) or releases it (the record was abandoned).
//! Once a sender has nothing outstanding its entry is dropped, and the next
//! request starts again from the node's pending count.

use std::collections::BTreeSet;
use std::sync::Arc;

use arcana_core::EvmAddress;
use arcana_zkp::{CompiledArtifact, ProofArtifact};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::abi;
use crate::error::BuildError;
use crate::network::{NetworkConfig, NetworkRegistry};
use crate::rpc::ChainRpc;
use crate::tx::{TxRequest, UnsignedTx};

type ReservationKey = (String, EvmAddress);

#[derive(Debug, Default)]
struct Reservation {
    next: u64,
    outstanding: BTreeSet<u64>,
}

pub struct TxBuilder {
    rpc: Arc<dyn ChainRpc>,
    registry: Arc<NetworkRegistry>,
    reservations: DashMap<ReservationKey, Arc<Mutex<Reservation>>>,
}

impl std::fmt::Debug for TxBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxBuilder")
            .field("reservations", &self.reservations.len())
            .finish_non_exhaustive()
    }
}

impl TxBuilder {
    pub fn new(rpc: Arc<dyn ChainRpc>, registry: Arc<NetworkRegistry>) -> Self {
        Self {
            rpc,
            registry,
            reservations: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Contract-creation transaction carrying the verifier bytecode.
    pub async fn build_deployment_tx(
        &self,
        artifact: &CompiledArtifact,
        network: &str,
        user: &EvmAddress,
    ) -> Result<UnsignedTx, BuildError> {
        let config = self.registry.resolve(network)?;
        if artifact.verifier_bytecode.is_empty() {
            return Err(BuildError::MissingArtifact(format!(
                "{} has no verifier bytecode",
                artifact.circuit_id
            )));
        }
        if !artifact.digest_matches() {
            return Err(BuildError::MissingArtifact(format!(
                "{} artifact digest does not match its contents",
                artifact.circuit_id
            )));
        }
        let data = abi::encode_deployment(artifact.verifier_bytecode.as_slice());
        self.build(config, user, None, data, config.gas.deploy).await
    }

    /// `verify(proof, publicInputs)` call against a deployed verifier.
    pub async fn build_verification_tx(
        &self,
        proof: &ProofArtifact,
        network: &str,
        verifier: &EvmAddress,
        user: &EvmAddress,
    ) -> Result<UnsignedTx, BuildError> {
        let config = self.registry.resolve(network)?;
        if proof.proof.is_empty() {
            return Err(BuildError::MissingArtifact(format!(
                "proof {} is empty",
                proof.proof_id
            )));
        }
        if *verifier == EvmAddress::ZERO {
            return Err(BuildError::EncodingFailure(
                "verifier address is the zero address".into(),
            ));
        }
        let data = abi::encode_verify_call(proof.proof.as_slice(), &proof.public_inputs);
        self.build(config, user, Some(*verifier), data, config.gas.verify).await
    }

    /// Return `nonce` to the pool if it is the most recent reservation.
    ///
    /// Called when a pending record is abandoned, so the next request does
    /// not leave a gap the node would wait on forever.
    pub async fn release_nonce(&self, network: &str, sender: &EvmAddress, nonce: u64) {
        let key = (network.to_string(), *sender);
        let Some(slot) = self.reservations.get(&key).map(|s| s.clone()) else {
            return;
        };
        {
            let mut reservation = slot.lock().await;
            reservation.outstanding.remove(&nonce);
            if reservation.next == nonce + 1 {
                reservation.next = nonce;
                tracing::debug!(network, sender = %sender, nonce, "released nonce reservation");
            }
        }
        drop(slot);
        self.evict_if_idle(&key);
    }

    /// Mark `nonce` as accepted by the node. From here on the node's pending
    /// count covers it.
    pub async fn settle_nonce(&self, network: &str, sender: &EvmAddress, nonce: u64) {
        let key = (network.to_string(), *sender);
        let Some(slot) = self.reservations.get(&key).map(|s| s.clone()) else {
            return;
        };
        slot.lock().await.outstanding.remove(&nonce);
        drop(slot);
        self.evict_if_idle(&key);
    }

    /// Number of senders with a live reservation entry.
    pub fn reserved_senders(&self) -> usize {
        self.reservations.len()
    }

    fn evict_if_idle(&self, key: &ReservationKey) {
        self.reservations.remove_if(key, |_, slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .try_lock()
                    .map_or(false, |reservation| reservation.outstanding.is_empty())
        });
    }

    async fn build(
        &self,
        config: &NetworkConfig,
        from: &EvmAddress,
        to: Option<EvmAddress>,
        data: Vec<u8>,
        gas: u64,
    ) -> Result<UnsignedTx, BuildError> {
        let gas_price = self.rpc.gas_price(config).await?.max(config.min_gas_price);
        let nonce = self.reserve_nonce(config, from).await?;
        let request = TxRequest {
            chain_id: config.chain_id,
            nonce,
            gas_price,
            gas,
            to,
            value: 0,
            data: data.into(),
        };
        tracing::info!(
            network = %config.name,
            chain_id = config.chain_id,
            from = %from,
            nonce,
            kind = if to.is_none() { "deployment" } else { "verification" },
            "built unsigned transaction"
        );
        Ok(UnsignedTx::new(request, *from, config.requires_confidential_encryption))
    }

    async fn reserve_nonce(&self, config: &NetworkConfig, sender: &EvmAddress) -> Result<u64, BuildError> {
        let key = (config.name.clone(), *sender);
        let slot = self
            .reservations
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Reservation::default())))
            .clone();
        let reserved = {
            let mut reservation = slot.lock().await;
            match self.rpc.transaction_count(config, sender).await {
                Ok(pending) => {
                    let nonce = pending.max(reservation.next);
                    reservation.next = nonce + 1;
                    reservation.outstanding.insert(nonce);
                    Ok(nonce)
                }
                Err(e) => Err(e),
            }
        };
        drop(slot);
        if reserved.is_err() {
            self.evict_if_idle(&key);
        }
        Ok(reserved?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{mock_sign, MockChain};
    use crate::rpc::ChainRpc;
    use arcana_core::{CircuitId, FieldElement};
    use arcana_zkp::{CircuitSource, CompilerDriver, MockToolchain};

    const SOURCE: &str = "fn main(x: Field, y: pub Field) { assert(x != y); }";

    fn user() -> EvmAddress {
        "0x00000000000000000000000000000000000000aa".parse().unwrap()
    }

    async fn artifact() -> CompiledArtifact {
        let driver = CompilerDriver::new(Arc::new(MockToolchain::new()));
        let source = CircuitSource::new("[package]\nname = \"neq\"\ntype = \"bin\"\n", SOURCE);
        driver
            .compile(&CircuitId::new("neq").unwrap(), &source)
            .await
            .unwrap()
    }

    fn builder(chain: Arc<MockChain>) -> TxBuilder {
        TxBuilder::new(chain, Arc::new(NetworkRegistry::builtin()))
    }

    #[tokio::test]
    async fn deployment_tx_carries_bytecode_and_chain_id() {
        let chain = Arc::new(MockChain::new());
        let b = builder(chain);
        let art = artifact().await;
        let tx = b.build_deployment_tx(&art, "sapphire_testnet", &user()).await.unwrap();
        assert_eq!(tx.chain_id(), 23295);
        assert!(tx.request.to.is_none());
        assert_eq!(tx.request.data, art.verifier_bytecode);
        assert_eq!(tx.request.gas, 2_000_000);
        assert!(tx.confidential);
        assert!(tx.request.gas_price >= 100_000_000_000);
    }

    #[tokio::test]
    async fn consecutive_requests_get_distinct_nonces() {
        let b = builder(Arc::new(MockChain::new()));
        let art = artifact().await;
        let a = b.build_deployment_tx(&art, "local", &user()).await.unwrap();
        let c = b.build_deployment_tx(&art, "local", &user()).await.unwrap();
        assert_eq!(a.nonce(), 0);
        assert_eq!(c.nonce(), 1);

        b.release_nonce("local", &user(), 1).await;
        let d = b.build_deployment_tx(&art, "local", &user()).await.unwrap();
        assert_eq!(d.nonce(), 1);
    }

    #[tokio::test]
    async fn settled_and_released_senders_are_forgotten() {
        let chain = Arc::new(MockChain::new());
        let b = builder(chain.clone());
        let art = artifact().await;
        let local = b.registry().resolve("local").unwrap().clone();

        let sent = b.build_deployment_tx(&art, "local", &user()).await.unwrap();
        let dropped = b.build_deployment_tx(&art, "local", &user()).await.unwrap();
        assert_eq!(b.reserved_senders(), 1);

        chain
            .send_raw_transaction(&local, &mock_sign(&sent, &user()))
            .await
            .unwrap();
        b.settle_nonce("local", &user(), sent.nonce()).await;
        assert_eq!(b.reserved_senders(), 1, "one reservation still outstanding");

        b.release_nonce("local", &user(), dropped.nonce()).await;
        assert_eq!(b.reserved_senders(), 0);

        // a fresh entry starts from the node's pending count
        let next = b.build_deployment_tx(&art, "local", &user()).await.unwrap();
        assert_eq!(next.nonce(), 1);
        b.release_nonce("local", &user(), next.nonce()).await;

        for i in 0..50u8 {
            let sender = EvmAddress::from_bytes([i + 1; 20]);
            let tx = b.build_deployment_tx(&art, "local", &sender).await.unwrap();
            b.release_nonce("local", &sender, tx.nonce()).await;
        }
        assert_eq!(b.reserved_senders(), 0);
    }

    #[tokio::test]
    async fn chain_pending_count_wins_over_stale_reservation() {
        let chain = Arc::new(MockChain::new());
        let b = builder(chain.clone());
        let art = artifact().await;
        let local = b.registry().resolve("local").unwrap().clone();

        let first = b.build_deployment_tx(&art, "local", &user()).await.unwrap();
        b.release_nonce("local", &user(), first.nonce()).await;
        chain
            .send_raw_transaction(&local, &mock_sign(&first, &user()))
            .await
            .unwrap();
        chain
            .send_raw_transaction(
                &local,
                &mock_sign(&b.build_deployment_tx(&art, "local", &user()).await.unwrap(), &user()),
            )
            .await
            .unwrap();
        let third = b.build_deployment_tx(&art, "local", &user()).await.unwrap();
        assert_eq!(third.nonce(), 2);
    }

    #[tokio::test]
    async fn verification_tx_targets_verifier() {
        let b = builder(Arc::new(MockChain::new()));
        let verifier: EvmAddress = "0x1111111111111111111111111111111111111111".parse().unwrap();
        let proof = ProofArtifact::new(
            CircuitId::new("neq").unwrap(),
            vec![FieldElement::from_u64(10)],
            vec![7u8; 64],
        );
        let tx = b
            .build_verification_tx(&proof, "ethereum_sepolia", &verifier, &user())
            .await
            .unwrap();
        assert_eq!(tx.request.to, Some(verifier));
        assert_eq!(tx.chain_id(), 11155111);
        assert_eq!(tx.request.gas, 500_000);
        let (p, inputs) = abi::decode_verify_call(tx.request.data.as_slice()).unwrap();
        assert_eq!(p, vec![7u8; 64]);
        assert_eq!(inputs, vec![FieldElement::from_u64(10).to_be_bytes()]);
    }

    #[tokio::test]
    async fn unknown_network_and_bad_artifacts_rejected() {
        let b = builder(Arc::new(MockChain::new()));
        let mut art = artifact().await;
        assert_eq!(
            b.build_deployment_tx(&art, "dogechain", &user()).await.unwrap_err(),
            BuildError::UnsupportedNetwork("dogechain".into())
        );
        art.verifier_bytecode = Default::default();
        assert!(matches!(
            b.build_deployment_tx(&art, "local", &user()).await,
            Err(BuildError::MissingArtifact(_))
        ));
        let proof = ProofArtifact::new(CircuitId::new("neq").unwrap(), vec![], vec![1]);
        assert!(matches!(
            b.build_verification_tx(&proof, "local", &EvmAddress::ZERO, &user()).await,
            Err(BuildError::EncodingFailure(_))
        ));
    }
}
