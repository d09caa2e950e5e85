//! Universal verifier ABI.
//!
//! Every verifier contract, on every network, is driven through the same two
//! shapes:
//!
//! - deployment: calldata is the verifier's creation bytecode, `to` is empty;
//! - verification: `verify(bytes proof, bytes32[] publicInputs) returns (bool)`.

use alloy_primitives::{Bytes, B256};
use alloy_sol_types::{sol, SolCall, SolValue};
use arcana_core::FieldElement;
use thiserror::Error;

sol! {
    function verify(bytes proof, bytes32[] publicInputs) external view returns (bool);
}

pub const VERIFY_SIGNATURE: &str = verifyCall::SIGNATURE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("calldata does not start with the verify selector")]
    WrongSelector,
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

pub fn verify_selector() -> [u8; 4] {
    verifyCall::SELECTOR
}

/// Deployment calldata is the creation bytecode itself.
pub fn encode_deployment(verifier_bytecode: &[u8]) -> Vec<u8> {
    verifier_bytecode.to_vec()
}

pub fn encode_verify_call(proof: &[u8], public_inputs: &[FieldElement]) -> Vec<u8> {
    verifyCall {
        proof: Bytes::copy_from_slice(proof),
        publicInputs: public_inputs.iter().map(|i| B256::from(i.to_be_bytes())).collect(),
    }
    .abi_encode()
}

/// Inverse of [`encode_verify_call`]: `(proof, public inputs)`.
pub fn decode_verify_call(calldata: &[u8]) -> Result<(Vec<u8>, Vec<[u8; 32]>), AbiError> {
    if calldata.get(..4) != Some(verifyCall::SELECTOR.as_slice()) {
        return Err(AbiError::WrongSelector);
    }
    let call = verifyCall::abi_decode(calldata, true).map_err(|e| AbiError::Malformed {
        what: "verify calldata",
        reason: e.to_string(),
    })?;
    Ok((
        call.proof.to_vec(),
        call.publicInputs.into_iter().map(|word| word.0).collect(),
    ))
}

/// Decode the `bool` a `verify` call returns.
pub fn decode_bool(output: &[u8]) -> Result<bool, AbiError> {
    verifyCall::abi_decode_returns(output, true)
        .map(|ret| ret._0)
        .map_err(|e| AbiError::Malformed {
            what: "bool",
            reason: e.to_string(),
        })
}

pub fn encode_bool(value: bool) -> Vec<u8> {
    value.abi_encode()
}
