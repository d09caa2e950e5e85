//! # arcana-chain: EVM Transaction Plumbing
//!
//! Everything between a compiled circuit and a confirmed on-chain verdict,
//! without ever touching a private key.
//!
//! | Module | Role |
//! |---|---|
//! | [`network`] | Static registry: network name → chain id, RPC endpoint, confidentiality, gas defaults |
//! | [`abi`] | The universal verifier ABI: deployment = creation bytecode, verification = `verify(bytes,bytes32[])` |
//! | [`tx`] | Unsigned EIP-155 transactions and signed-transaction decoding over `rlp` |
//! | [`builder`] | Resolves nonce, gas price and gas limit; emits [`UnsignedTx`] |
//! | [`rpc`] | The [`ChainRpc`] seam and its JSON-RPC implementation |
//! | [`broadcaster`] | Submits signed transactions and interprets receipts |
//! | [`mock`] | In-memory chain for tests and local development |
//!
//! ## Security
//!
//! No function in this crate accepts or derives key material. The builder
//! returns the signing payload; the client signs it elsewhere; the
//! broadcaster accepts only already-signed bytes.

pub mod abi;
pub mod broadcaster;
pub mod builder;
pub mod error;
pub mod mock;
pub mod network;
mod retry;
pub mod rpc;
pub mod tx;

pub use broadcaster::{BroadcastResult, Broadcaster, PollConfig, TxType};
pub use builder::TxBuilder;
pub use error::{BroadcastError, BroadcastErrorKind, BroadcastFailure, BuildError, NetworkError, RpcError};
pub use mock::{mock_sign, MockChain, VerifierHook};
pub use network::{GasDefaults, NetworkConfig, NetworkRegistry, DEFAULT_NETWORK};
pub use rpc::{CallRequest, ChainRpc, JsonRpcClient, Receipt, DEFAULT_RPC_TIMEOUT};
pub use tx::{SignedTx, TxRequest, UnsignedTx};
