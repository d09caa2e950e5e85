//! In-memory chain for tests and local development.
//!
//! Each chain id gets its own ledger with strict per-sender nonces, instant
//! mining, and contract storage. No signature is verified: the sender of a
//! transaction produced by [`mock_sign`] is carried in the low 20 bytes of
//! `r`. Verifier execution is a pluggable hook; by default it checks proofs
//! from [`arcana_zkp::MockToolchain`] and accepts anything else.

use std::collections::HashMap;
use std::sync::Arc;

use arcana_core::{keccak256, EvmAddress, TxHash};
use arcana_zkp::mock_verify;
use async_trait::async_trait;
use parking_lot::Mutex;
use rlp::RlpStream;

use crate::abi;
use crate::error::RpcError;
use crate::network::NetworkConfig;
use crate::rpc::{CallRequest, ChainRpc, Receipt};
use crate::tx::{SignedTx, UnsignedTx};

/// Runs `verify(...)` calldata against deployed code.
///
/// `None` reverts; `Some(verdict)` succeeds and returns the ABI bool.
pub type VerifierHook = Arc<dyn Fn(&[u8], &[u8]) -> Option<bool> + Send + Sync>;

const GAS_PRICE: u128 = 1_000_000_000;

/// Sign `tx` as `from` in the mock scheme. Never use against a real node.
pub fn mock_sign(tx: &UnsignedTx, from: &EvmAddress) -> Vec<u8> {
    let mut r = [0u8; 32];
    r[12..].copy_from_slice(from.as_bytes());
    let mut s = [0u8; 32];
    s[31] = 1;
    tx.request.encode_signed(tx.chain_id() * 2 + 35, &r, &s)
}

struct Mined {
    receipt: Receipt,
    polls_remaining: u32,
}

#[derive(Default)]
struct Ledger {
    block: u64,
    nonces: HashMap<EvmAddress, u64>,
    code: HashMap<EvmAddress, Vec<u8>>,
    mined: HashMap<TxHash, Mined>,
}

struct State {
    ledgers: HashMap<u64, Ledger>,
    verifier: VerifierHook,
    receipt_delay: u32,
    fail_next_receipt: bool,
    offline: bool,
    submitted: usize,
}

pub struct MockChain {
    state: Mutex<State>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state.lock();
        f.debug_struct("MockChain")
            .field("chains", &s.ledgers.len())
            .field("submitted", &s.submitted)
            .finish_non_exhaustive()
    }
}

fn default_verifier() -> VerifierHook {
    Arc::new(|code: &[u8], calldata: &[u8]| {
        let (proof, inputs) = abi::decode_verify_call(calldata).ok()?;
        Some(mock_verify(code, &proof, &inputs).unwrap_or(true))
    })
}

fn contract_address(sender: &EvmAddress, nonce: u64) -> EvmAddress {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender.as_bytes().to_vec()).append(&nonce);
    let hash = keccak256(&stream.out());
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    EvmAddress::from_bytes(addr)
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                ledgers: HashMap::new(),
                verifier: default_verifier(),
                receipt_delay: 0,
                fail_next_receipt: false,
                offline: false,
                submitted: 0,
            }),
        }
    }

    pub fn set_verifier(&self, hook: VerifierHook) {
        self.state.lock().verifier = hook;
    }

    /// Receipts of newly mined transactions stay hidden for `polls` queries.
    pub fn set_receipt_delay(&self, polls: u32) {
        self.state.lock().receipt_delay = polls;
    }

    /// The next mined transaction gets a failed status.
    pub fn set_fail_next_receipt(&self, fail: bool) {
        self.state.lock().fail_next_receipt = fail;
    }

    /// Every call fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Number of `eth_sendRawTransaction` calls received.
    pub fn submitted(&self) -> usize {
        self.state.lock().submitted
    }

    pub fn code_at(&self, chain_id: u64, address: &EvmAddress) -> Option<Vec<u8>> {
        self.state
            .lock()
            .ledgers
            .get(&chain_id)
            .and_then(|l| l.code.get(address).cloned())
    }

    fn online(&self, network: &NetworkConfig) -> Result<parking_lot::MutexGuard<'_, State>, RpcError> {
        let state = self.state.lock();
        if state.offline {
            return Err(RpcError::Transport {
                network: network.name.clone(),
                message: "mock chain offline".into(),
            });
        }
        Ok(state)
    }
}

fn node_error(network: &NetworkConfig, method: &str, message: impl Into<String>) -> RpcError {
    RpcError::Node {
        network: network.name.clone(),
        method: method.to_string(),
        code: -32000,
        message: message.into(),
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn transaction_count(&self, network: &NetworkConfig, address: &EvmAddress) -> Result<u64, RpcError> {
        let state = self.online(network)?;
        Ok(state
            .ledgers
            .get(&network.chain_id)
            .and_then(|l| l.nonces.get(address).copied())
            .unwrap_or(0))
    }

    async fn gas_price(&self, network: &NetworkConfig) -> Result<u128, RpcError> {
        self.online(network)?;
        Ok(GAS_PRICE)
    }

    async fn send_raw_transaction(&self, network: &NetworkConfig, raw: &[u8]) -> Result<TxHash, RpcError> {
        const METHOD: &str = "eth_sendRawTransaction";
        let mut guard = self.online(network)?;
        let state = &mut *guard;
        state.submitted += 1;

        let tx = SignedTx::decode(raw).map_err(|e| node_error(network, METHOD, e.to_string()))?;
        if tx.chain_id != Some(network.chain_id) {
            return Err(node_error(network, METHOD, "invalid chain id for signer"));
        }
        let mut sender = [0u8; 20];
        sender.copy_from_slice(&tx.r[12..]);
        let sender = EvmAddress::from_bytes(sender);

        let ledger = state.ledgers.entry(network.chain_id).or_default();
        if ledger.mined.contains_key(&tx.hash) {
            return Err(node_error(network, METHOD, "already known"));
        }
        let expected = ledger.nonces.get(&sender).copied().unwrap_or(0);
        if tx.nonce < expected {
            return Err(node_error(network, METHOD, "nonce too low"));
        }
        if tx.nonce > expected {
            return Err(node_error(network, METHOD, "nonce too high"));
        }
        ledger.nonces.insert(sender, expected + 1);
        ledger.block += 1;

        let mut success = !std::mem::take(&mut state.fail_next_receipt);
        let mut created = None;
        match tx.to {
            None => {
                if success {
                    let addr = contract_address(&sender, tx.nonce);
                    ledger.code.insert(addr, tx.data.clone());
                    created = Some(addr);
                }
            }
            Some(to) => {
                if let Some(code) = ledger.code.get(&to) {
                    success = success && (state.verifier)(code, &tx.data).is_some();
                }
            }
        }
        ledger.mined.insert(
            tx.hash,
            Mined {
                receipt: Receipt {
                    tx_hash: tx.hash,
                    success,
                    block_number: ledger.block,
                    contract_address: created,
                    gas_used: 21_000,
                },
                polls_remaining: state.receipt_delay,
            },
        );
        Ok(tx.hash)
    }

    async fn transaction_receipt(&self, network: &NetworkConfig, hash: &TxHash) -> Result<Option<Receipt>, RpcError> {
        let mut state = self.online(network)?;
        let Some(mined) = state
            .ledgers
            .get_mut(&network.chain_id)
            .and_then(|l| l.mined.get_mut(hash))
        else {
            return Ok(None);
        };
        if mined.polls_remaining > 0 {
            mined.polls_remaining -= 1;
            return Ok(None);
        }
        Ok(Some(mined.receipt.clone()))
    }

    async fn call(&self, network: &NetworkConfig, request: &CallRequest, _block: Option<u64>) -> Result<Vec<u8>, RpcError> {
        let state = self.online(network)?;
        let Some(code) = state
            .ledgers
            .get(&network.chain_id)
            .and_then(|l| l.code.get(&request.to))
        else {
            return Ok(Vec::new());
        };
        match (state.verifier)(code, &request.data) {
            Some(verdict) => Ok(abi::encode_bool(verdict)),
            None => Err(node_error(network, "eth_call", "execution reverted")),
        }
    }
}
