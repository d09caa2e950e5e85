//! # Broadcaster
//!
//! Takes client-signed bytes, checks they are meant for the target network,
//! submits them once, and interprets the receipt:
//!
//! - deployment: the receipt's `contractAddress` is the verifier;
//! - verification: a successful status, plus on transparent networks an
//!   `eth_call` replay at the inclusion block decoding the `bool` result.
//!   Confidential networks encrypt calldata, so a successful status is the
//!   verdict there.
//!
//! Submission and receipt polling are separate steps so the caller can
//! persist "broadcast" status in between.

use std::sync::Arc;
use std::time::Duration;

use arcana_core::{EvmAddress, TxHash, ValidationError};
use arcana_state::VerificationOutcome;
use serde::{Deserialize, Serialize};

use crate::abi;
use crate::error::{BroadcastError, BroadcastFailure, RpcError};
use crate::network::{NetworkConfig, NetworkRegistry};
use crate::rpc::{CallRequest, ChainRpc, Receipt};
use crate::tx::SignedTx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Deployment,
    Verification,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Verification => "verification",
        }
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receipt polling schedule: `min(base * 2^n, max)` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            attempts: 30,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl PollConfig {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay)
    }
}

/// Interpreted outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Set for deployments.
    pub contract_address: Option<EvmAddress>,
    /// Set for verifications.
    pub outcome: Option<VerificationOutcome>,
}

pub struct Broadcaster {
    rpc: Arc<dyn ChainRpc>,
    registry: Arc<NetworkRegistry>,
    poll: PollConfig,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    pub fn new(rpc: Arc<dyn ChainRpc>, registry: Arc<NetworkRegistry>) -> Self {
        Self {
            rpc,
            registry,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Decode `raw` and reject it unless it is replay-protected for `network`.
    pub fn decode(&self, network: &NetworkConfig, raw: &[u8]) -> Result<SignedTx, ValidationError> {
        let tx = SignedTx::decode(raw)?;
        match tx.chain_id {
            None => Err(ValidationError::field(
                "signed_transaction",
                "transaction is not replay-protected (no chain id)",
            )),
            Some(id) if id != network.chain_id => Err(ValidationError::field(
                "signed_transaction",
                format!(
                    "transaction is for chain {id}, but {} is chain {}",
                    network.name, network.chain_id
                ),
            )),
            Some(_) => Ok(tx),
        }
    }

    /// One `eth_sendRawTransaction`. Never retried.
    pub async fn submit(&self, network: &NetworkConfig, tx: &SignedTx, raw: &[u8]) -> Result<TxHash, BroadcastError> {
        match self.rpc.send_raw_transaction(network, raw).await {
            Ok(hash) => {
                if hash != tx.hash {
                    tracing::warn!(network = %network.name, local = %tx.hash, node = %hash, "node reported a different transaction hash");
                }
                tracing::info!(network = %network.name, tx_hash = %hash, "transaction submitted");
                Ok(hash)
            }
            Err(RpcError::Node { message, code, .. }) => {
                tracing::warn!(network = %network.name, tx_hash = %tx.hash, code, "transaction rejected: {message}");
                Err(BroadcastError::rejected(message, Some(tx.hash)))
            }
            Err(e) => {
                tracing::warn!(network = %network.name, tx_hash = %tx.hash, "submission outcome unknown: {e}");
                Err(BroadcastError::timeout(
                    format!("submission outcome unknown: {e}"),
                    tx.hash,
                ))
            }
        }
    }

    /// A single receipt poll. Transport trouble is reported as `Timeout`.
    pub async fn check_receipt(&self, network: &NetworkConfig, hash: &TxHash) -> Result<Option<Receipt>, BroadcastError> {
        self.rpc
            .transaction_receipt(network, hash)
            .await
            .map_err(|e| BroadcastError::timeout(format!("receipt query failed: {e}"), *hash))
    }

    /// Poll for a receipt on the configured schedule.
    pub async fn await_receipt(&self, network: &NetworkConfig, hash: &TxHash) -> Result<Receipt, BroadcastError> {
        for attempt in 0..self.poll.attempts {
            match self.rpc.transaction_receipt(network, hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(network = %network.name, tx_hash = %hash, attempt, "receipt poll failed: {e}");
                }
            }
            if attempt + 1 < self.poll.attempts {
                tokio::time::sleep(self.poll.delay(attempt)).await;
            }
        }
        Err(BroadcastError::timeout(
            format!("no receipt after {} polls", self.poll.attempts),
            *hash,
        ))
    }

    /// Deployed verifier address from a deployment receipt.
    pub fn confirm_deployment(&self, receipt: &Receipt) -> Result<EvmAddress, BroadcastError> {
        if !receipt.success {
            return Err(BroadcastError::receipt_failure(
                "deployment reverted",
                receipt.tx_hash,
            ));
        }
        receipt.contract_address.ok_or_else(|| {
            BroadcastError::receipt_failure(
                "receipt carries no contract address",
                receipt.tx_hash,
            )
        })
    }

    /// On-chain verdict of a verification transaction.
    pub async fn verification_outcome(
        &self,
        network: &NetworkConfig,
        verifier: &EvmAddress,
        calldata: &[u8],
        receipt: &Receipt,
    ) -> Result<VerificationOutcome, BroadcastError> {
        if !receipt.success {
            return Err(BroadcastError::receipt_failure(
                "verification transaction reverted",
                receipt.tx_hash,
            ));
        }
        if network.requires_confidential_encryption {
            return Ok(VerificationOutcome::Accepted);
        }
        let request = CallRequest {
            from: None,
            to: *verifier,
            data: calldata.to_vec(),
        };
        let output = self
            .rpc
            .call(network, &request, Some(receipt.block_number))
            .await
            .map_err(|e| BroadcastError::timeout(format!("verdict replay failed: {e}"), receipt.tx_hash))?;
        let accepted = abi::decode_bool(&output).map_err(|e| {
            BroadcastError::receipt_failure(format!("verifier returned {e}"), receipt.tx_hash)
        })?;
        Ok(if accepted {
            VerificationOutcome::Accepted
        } else {
            VerificationOutcome::Rejected
        })
    }

    /// Interpret a receipt for `tx` according to its type.
    pub async fn interpret(
        &self,
        network: &NetworkConfig,
        tx: &SignedTx,
        receipt: &Receipt,
        tx_type: TxType,
    ) -> Result<BroadcastResult, BroadcastError> {
        let mut result = BroadcastResult {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            contract_address: None,
            outcome: None,
        };
        match tx_type {
            TxType::Deployment => {
                result.contract_address = Some(self.confirm_deployment(receipt)?);
            }
            TxType::Verification => {
                let verifier = tx.to.ok_or_else(|| {
                    BroadcastError::rejected("verification transaction has no recipient", Some(tx.hash))
                })?;
                result.outcome = Some(
                    self.verification_outcome(network, &verifier, &tx.data, receipt)
                        .await?,
                );
            }
        }
        Ok(result)
    }

    /// Decode, submit, wait, and interpret in one call.
    pub async fn broadcast(&self, network: &str, raw: &[u8], tx_type: TxType) -> Result<BroadcastResult, BroadcastFailure> {
        let config = self.registry.resolve(network)?;
        let tx = self.decode(config, raw)?;
        match (tx_type, tx.is_contract_creation()) {
            (TxType::Deployment, false) => {
                return Err(ValidationError::field("signed_transaction", "deployment must not have a recipient").into())
            }
            (TxType::Verification, true) => {
                return Err(ValidationError::field("signed_transaction", "verification must target a verifier").into())
            }
            _ => {}
        }
        let hash = self.submit(config, &tx, raw).await?;
        let receipt = self.await_receipt(config, &hash).await?;
        Ok(self.interpret(config, &tx, &receipt, tx_type).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BroadcastErrorKind;
    use crate::mock::{mock_sign, MockChain};
    use crate::tx::{TxRequest, UnsignedTx};
    use arcana_core::{FieldElement, HexBytes};

    fn user() -> EvmAddress {
        "0x00000000000000000000000000000000000000bb".parse().unwrap()
    }

    fn fast() -> PollConfig {
        PollConfig {
            attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn setup() -> (Arc<MockChain>, Broadcaster) {
        let chain = Arc::new(MockChain::new());
        let b = Broadcaster::new(chain.clone(), Arc::new(NetworkRegistry::builtin())).with_poll(fast());
        (chain, b)
    }

    fn unsigned(chain_id: u64, nonce: u64, to: Option<EvmAddress>, data: Vec<u8>) -> UnsignedTx {
        UnsignedTx::new(
            TxRequest {
                chain_id,
                nonce,
                gas_price: 1,
                gas: 2_000_000,
                to,
                value: 0,
                data: HexBytes(data),
            },
            user(),
            false,
        )
    }

    #[test]
    fn poll_delay_is_capped() {
        let p = PollConfig::default();
        assert_eq!(p.delay(0), Duration::from_millis(500));
        assert_eq!(p.delay(2), Duration::from_secs(2));
        assert_eq!(p.delay(10), Duration::from_secs(8));
        assert_eq!(p.delay(u32::MAX), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn deployment_yields_contract_address() {
        let (_, b) = setup();
        let raw = mock_sign(&unsigned(31337, 0, None, vec![0x60, 0x00]), &user());
        let result = b.broadcast("local", &raw, TxType::Deployment).await.unwrap();
        assert!(result.contract_address.is_some());
        assert!(result.outcome.is_none());
    }

    #[tokio::test]
    async fn wrong_chain_id_rejected_before_submission() {
        let (chain, b) = setup();
        let raw = mock_sign(&unsigned(1, 0, None, vec![0x60]), &user());
        let err = b.broadcast("sapphire_testnet", &raw, TxType::Deployment).await.unwrap_err();
        assert!(matches!(err, BroadcastFailure::Invalid(ValidationError::InvalidField { .. })));
        assert_eq!(chain.submitted(), 0);
    }

    #[tokio::test]
    async fn node_rejection_is_rejected_by_network() {
        let (_, b) = setup();
        // nonce 5 on a fresh account
        let raw = mock_sign(&unsigned(31337, 5, None, vec![0x60]), &user());
        let err = b.broadcast("local", &raw, TxType::Deployment).await.unwrap_err();
        match err {
            BroadcastFailure::Broadcast(e) => assert_eq!(e.kind, BroadcastErrorKind::RejectedByNetwork),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_receipt_times_out_with_hash() {
        let (chain, b) = setup();
        chain.set_receipt_delay(100);
        let raw = mock_sign(&unsigned(31337, 0, None, vec![0x60]), &user());
        let err = b.broadcast("local", &raw, TxType::Deployment).await.unwrap_err();
        match err {
            BroadcastFailure::Broadcast(e) => {
                assert_eq!(e.kind, BroadcastErrorKind::Timeout);
                assert_eq!(e.tx_hash, Some(SignedTx::decode(&raw).unwrap().hash));
                assert!(e.is_retryable());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn verification_replays_verdict_on_transparent_networks() {
        let (chain, b) = setup();
        chain.set_verifier(Arc::new(|_code: &[u8], calldata: &[u8]| {
            let (_, inputs) = abi::decode_verify_call(calldata).ok()?;
            Some(inputs.first().map(|w| w[31] == 10).unwrap_or(false))
        }));
        let deploy = mock_sign(&unsigned(31337, 0, None, vec![0x60]), &user());
        let verifier = b
            .broadcast("local", &deploy, TxType::Deployment)
            .await
            .unwrap()
            .contract_address
            .unwrap();

        let good = abi::encode_verify_call(b"p", &[FieldElement::from_u64(10)]);
        let raw = mock_sign(&unsigned(31337, 1, Some(verifier), good), &user());
        let result = b.broadcast("local", &raw, TxType::Verification).await.unwrap();
        assert_eq!(result.outcome, Some(VerificationOutcome::Accepted));

        let bad = abi::encode_verify_call(b"p", &[FieldElement::from_u64(11)]);
        let raw = mock_sign(&unsigned(31337, 2, Some(verifier), bad), &user());
        let result = b.broadcast("local", &raw, TxType::Verification).await.unwrap();
        assert_eq!(result.outcome, Some(VerificationOutcome::Rejected));
    }

    #[tokio::test]
    async fn reverted_deployment_is_receipt_failure() {
        let (chain, b) = setup();
        chain.set_fail_next_receipt(true);
        let raw = mock_sign(&unsigned(31337, 0, None, vec![0x60]), &user());
        match b.broadcast("local", &raw, TxType::Deployment).await.unwrap_err() {
            BroadcastFailure::Broadcast(e) => assert_eq!(e.kind, BroadcastErrorKind::ReceiptIndicatesFailure),
            other => panic!("unexpected {other:?}"),
        }
    }
}
