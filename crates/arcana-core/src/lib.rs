//! # arcana-core: Foundational Types
//!
//! Domain primitives shared by every Arcana crate. Nothing in here performs
//! I/O; all types validate at construction so that a value which exists is
//! a value which is well-formed.
//!
//! - [`CircuitId`]: client-chosen circuit identifier, safe to use as a
//!   directory name.
//! - [`FieldElement`]: an element of the BN254 scalar field, the native
//!   value type of Noir circuits.
//! - [`EvmAddress`], [`TxHash`], [`HexBytes`]: EVM wire primitives with
//!   `0x`-hex serde representations.
//! - [`sha256_hex`], [`keccak256`]: the two digests the orchestrator uses.
//! - [`ValidationError`]: every input-shape rejection, surfaced to callers
//!   verbatim.

pub mod digest;
pub mod error;
pub mod evm;
pub mod field;
pub mod identity;

pub use digest::{keccak256, sha256, sha256_hex};
pub use error::ValidationError;
pub use evm::{decode_hex, is_valid_eth_address, EvmAddress, HexBytes, TxHash};
pub use field::FieldElement;
pub use identity::{CircuitId, RecordId};
