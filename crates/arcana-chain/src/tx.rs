//! Unsigned EIP-155 transactions and signed-transaction decoding.
//!
//! The service only ever produces [`UnsignedTx`] (fields + signing payload)
//! and only ever consumes already-signed bytes ([`SignedTx::decode`]).
//! Signature recovery is left to the node.
//!
//! Decoding only walks the envelope's top-level list and reads fields as
//! scalars, so nested lists in a hostile payload are never descended into.

use arcana_core::{keccak256, EvmAddress, HexBytes, TxHash, ValidationError};
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

const TYPE_ACCESS_LIST: u8 = 0x01;
const TYPE_DYNAMIC_FEE: u8 = 0x02;

/// Transaction fields covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub chain_id: u64,
    pub nonce: u64,
    #[serde(with = "decimal_u128")]
    pub gas_price: u128,
    pub gas: u64,
    /// `None` for contract creation.
    pub to: Option<EvmAddress>,
    #[serde(with = "decimal_u128")]
    pub value: u128,
    pub data: HexBytes,
}

impl TxRequest {
    fn append_legacy_fields(&self, stream: &mut RlpStream) {
        stream
            .append(&self.nonce)
            .append(&self.gas_price)
            .append(&self.gas);
        match &self.to {
            Some(to) => stream.append(&to.as_bytes().to_vec()),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value).append(&self.data.0);
    }

    /// `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_legacy_fields(&mut stream);
        stream.append(&self.chain_id).append(&0u8).append(&0u8);
        stream.out().to_vec()
    }

    /// Legacy signed envelope with the given signature values.
    pub fn encode_signed(&self, v: u64, r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_legacy_fields(&mut stream);
        stream
            .append(&v)
            .append(&trim_leading_zeros(r))
            .append(&trim_leading_zeros(s));
        stream.out().to_vec()
    }
}

/// Everything a client needs to sign offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    #[serde(flatten)]
    pub request: TxRequest,
    pub from: EvmAddress,
    /// Calldata must be encrypted with the network's scheme before signing.
    pub confidential: bool,
    pub signing_payload: HexBytes,
    /// Keccak-256 of `signing_payload`.
    pub signing_hash: HexBytes,
}

impl UnsignedTx {
    pub fn new(request: TxRequest, from: EvmAddress, confidential: bool) -> Self {
        let payload = request.signing_payload();
        let hash = keccak256(&payload);
        Self {
            request,
            from,
            confidential,
            signing_payload: HexBytes(payload),
            signing_hash: HexBytes(hash.to_vec()),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.request.chain_id
    }

    pub fn nonce(&self) -> u64 {
        self.request.nonce
    }
}

/// Decoded view of a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    /// 0 for legacy, otherwise the EIP-2718 type byte.
    pub tx_type: u8,
    /// `None` for pre-EIP-155 legacy transactions.
    pub chain_id: Option<u64>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub to: Option<EvmAddress>,
    pub value: u128,
    pub data: Vec<u8>,
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Keccak-256 of the raw envelope, as the network will report it.
    pub hash: TxHash,
}

impl SignedTx {
    pub fn decode(raw: &[u8]) -> Result<Self, ValidationError> {
        let first = *raw
            .first()
            .ok_or_else(|| malformed("empty transaction"))?;
        let tx = match first {
            TYPE_ACCESS_LIST => decode_typed(raw, TYPE_ACCESS_LIST)?,
            TYPE_DYNAMIC_FEE => decode_typed(raw, TYPE_DYNAMIC_FEE)?,
            0xc0..=0xff => decode_legacy(raw)?,
            other => return Err(malformed(format!("unsupported transaction type 0x{other:02x}"))),
        };
        if tx.r == [0u8; 32] || tx.s == [0u8; 32] {
            return Err(ValidationError::field("signed_transaction", "transaction is not signed"));
        }
        Ok(tx)
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// The envelope's top-level list, which must span all of `raw`.
fn envelope(raw: &[u8]) -> Result<Rlp<'_>, ValidationError> {
    let rlp = Rlp::new(raw);
    if !rlp.is_list() {
        return Err(malformed("transaction is not an RLP list"));
    }
    let info = rlp.payload_info().map_err(rlp_err)?;
    if info.header_len + info.value_len != raw.len() {
        return Err(malformed("trailing bytes after transaction"));
    }
    Ok(rlp)
}

fn field_count(rlp: &Rlp<'_>) -> Result<usize, ValidationError> {
    rlp.item_count().map_err(rlp_err)
}

fn decode_legacy(raw: &[u8]) -> Result<SignedTx, ValidationError> {
    let f = envelope(raw)?;
    let count = field_count(&f)?;
    if count != 9 {
        return Err(malformed(format!("legacy transaction has {count} fields, expected 9")));
    }
    let v: u64 = f.val_at(6).map_err(rlp_err)?;
    let r = word(&f, 7)?;
    let s = word(&f, 8)?;
    let chain_id = match v {
        27 | 28 => None,
        v if v >= 35 => Some((v - 35) / 2),
        // unsigned EIP-155 payloads carry the bare chain id here with r = s = 0
        _ if r == [0u8; 32] && s == [0u8; 32] => Some(v),
        v => return Err(malformed(format!("invalid v value {v}"))),
    };
    Ok(SignedTx {
        tx_type: 0,
        chain_id,
        nonce: f.val_at(0).map_err(rlp_err)?,
        gas_limit: f.val_at(2).map_err(rlp_err)?,
        to: decode_to(&f, 3)?,
        value: f.val_at(4).map_err(rlp_err)?,
        data: bytes_at(&f, 5)?.to_vec(),
        r,
        s,
        hash: TxHash::from_bytes(keccak256(raw)),
    })
}

fn decode_typed(raw: &[u8], ty: u8) -> Result<SignedTx, ValidationError> {
    let f = envelope(&raw[1..])?;
    // 0x01: chainId nonce gasPrice gas to value data accessList y r s
    // 0x02: chainId nonce tip maxFee gas to value data accessList y r s
    let (expected, gas_at) = if ty == TYPE_ACCESS_LIST { (11, 3) } else { (12, 4) };
    let count = field_count(&f)?;
    if count != expected {
        return Err(malformed(format!(
            "type 0x{ty:02x} transaction has {count} fields, expected {expected}"
        )));
    }
    if !f.at(gas_at + 4).map_err(rlp_err)?.is_list() {
        return Err(malformed("access list is not a list"));
    }
    let y: u8 = f.val_at(gas_at + 5).map_err(rlp_err)?;
    if y > 1 {
        return Err(malformed(format!("invalid y parity {y}")));
    }
    Ok(SignedTx {
        tx_type: ty,
        chain_id: Some(f.val_at(0).map_err(rlp_err)?),
        nonce: f.val_at(1).map_err(rlp_err)?,
        gas_limit: f.val_at(gas_at).map_err(rlp_err)?,
        to: decode_to(&f, gas_at + 1)?,
        value: f.val_at(gas_at + 2).map_err(rlp_err)?,
        data: bytes_at(&f, gas_at + 3)?.to_vec(),
        r: word(&f, gas_at + 6)?,
        s: word(&f, gas_at + 7)?,
        hash: TxHash::from_bytes(keccak256(raw)),
    })
}

fn bytes_at<'a>(list: &Rlp<'a>, index: usize) -> Result<&'a [u8], ValidationError> {
    let item = list.at(index).map_err(rlp_err)?;
    if !item.is_data() {
        return Err(malformed(format!("field {index} must be a byte string")));
    }
    item.data().map_err(rlp_err)
}

fn decode_to(list: &Rlp<'_>, index: usize) -> Result<Option<EvmAddress>, ValidationError> {
    let bytes = bytes_at(list, index)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    EvmAddress::from_slice(bytes)
        .map(Some)
        .map_err(|_| malformed("recipient is not 20 bytes"))
}

fn word(list: &Rlp<'_>, index: usize) -> Result<[u8; 32], ValidationError> {
    let bytes = bytes_at(list, index)?;
    if bytes.len() > 32 {
        return Err(malformed("signature component longer than 32 bytes"));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn malformed(msg: impl Into<String>) -> ValidationError {
    ValidationError::MalformedTransaction(msg.into())
}

fn rlp_err(err: DecoderError) -> ValidationError {
    malformed(err.to_string())
}

/// `u128` as a decimal string; accepts a string or a JSON number.
mod decimal_u128 {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(u128::from(n)),
            Raw::Str(s) => s.parse().map_err(D::Error::custom),
        }
    }
}
