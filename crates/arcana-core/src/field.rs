//! # BN254 Field Elements
//!
//! Noir's native `Field` type is an element of the BN254 scalar field. Every
//! circuit input, public or private, travels through the orchestrator as a
//! [`FieldElement`]: 32 big-endian bytes, guaranteed below the modulus.
//!
//! ## Accepted literals
//!
//! - JSON integers (`10`), non-negative only.
//! - Decimal strings (`"10"`), up to the modulus.
//! - Hex strings (`"0x0a"`), 1 to 64 hex digits.
//!
//! Serialization always emits the canonical decimal string, which is also the
//! form `Prover.toml` expects. Literals are read as `U256` and range-checked
//! against the `halo2curves` BN254 scalar field.

use alloy_primitives::U256;
use ff::PrimeField;
use halo2curves::bn256::Fr;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::error::ValidationError;

/// An element of the BN254 scalar field.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Zeroize)]
pub struct FieldElement([u8; 32]);

impl FieldElement {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Wrap 32 big-endian bytes, rejecting values at or above the modulus.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Result<Self, ValidationError> {
        if !is_canonical(&bytes) {
            return Err(ValidationError::InvalidFieldElement {
                length: 64,
                reason: "not below the BN254 scalar modulus".into(),
            });
        }
        Ok(Self(bytes))
    }

    /// Parse a decimal or `0x`-hex literal.
    ///
    /// Errors describe the literal's length only; the value itself may be a
    /// private input and never appears in the message.
    pub fn parse(literal: &str) -> Result<Self, ValidationError> {
        let trimmed = literal.trim();
        let invalid = |reason: &str| ValidationError::InvalidFieldElement {
            length: trimmed.chars().count(),
            reason: reason.to_string(),
        };

        let value = if let Some(digits) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            if digits.is_empty() || digits.len() > 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid("hex literal must have 1 to 64 hex digits"));
            }
            U256::from_str_radix(digits, 16).map_err(|_| invalid("not valid hex"))?
        } else {
            if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("expected a non-negative integer"));
            }
            U256::from_str_radix(trimmed, 10).map_err(|_| invalid("exceeds 256 bits"))?
        };

        let bytes = value.to_be_bytes::<32>();
        if !is_canonical(&bytes) {
            return Err(invalid("not below the BN254 scalar modulus"));
        }
        Ok(Self(bytes))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// The value as `u64`, if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(self.as_u256()).ok()
    }

    /// Number of significant bits.
    pub fn bits(&self) -> usize {
        self.as_u256().bit_len()
    }

    /// `0x`-prefixed 64-digit hex, the `bytes32` form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Canonical decimal representation.
    pub fn to_decimal(&self) -> String {
        self.as_u256().to_string()
    }

    fn as_u256(&self) -> U256 {
        U256::from_be_bytes(self.0)
    }
}

/// Below the modulus iff the field accepts the little-endian repr.
fn is_canonical(be: &[u8; 32]) -> bool {
    let mut repr = <Fr as PrimeField>::Repr::default();
    for (dst, src) in repr.as_mut().iter_mut().zip(be.iter().rev()) {
        *dst = *src;
    }
    Option::<Fr>::from(Fr::from_repr(repr)).is_some()
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl std::str::FromStr for FieldElement {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal())
    }
}

impl std::fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FieldElement({})", self.to_decimal())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal())
    }
}

struct FieldElementVisitor;

impl<'de> Visitor<'de> for FieldElementVisitor {
    type Value = FieldElement;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a non-negative integer, decimal string, or 0x-hex string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(FieldElement::from_u64(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(FieldElement::from_u64)
            .map_err(|_| E::custom("field elements must be non-negative"))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Self::Value, E> {
        Err(E::custom("field elements must be integers"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        FieldElement::parse(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldElementVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MODULUS_DECIMAL: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn modulus_hex_matches_field() {
        assert!(FieldElement::parse(Fr::MODULUS).is_err());
    }

    #[test]
    fn modulus_decimal_matches_constant() {
        // r itself is out of range; r - 1 is the largest element.
        let r_minus_one =
            "21888242871839275222246405745257275088548364400416034343698204186575808495616";
        let fe = FieldElement::parse(r_minus_one).unwrap();
        assert_eq!(fe.to_decimal(), r_minus_one);
        assert!(FieldElement::parse(MODULUS_DECIMAL).is_err());
    }

    #[test]
    fn parses_json_forms() {
        let from_int: FieldElement = serde_json::from_str("10").unwrap();
        let from_dec: FieldElement = serde_json::from_str("\"10\"").unwrap();
        let from_hex: FieldElement = serde_json::from_str("\"0x0a\"").unwrap();
        assert_eq!(from_int, FieldElement::from_u64(10));
        assert_eq!(from_int, from_dec);
        assert_eq!(from_dec, from_hex);
    }

    #[test]
    fn rejects_negative_float_and_garbage() {
        assert!(serde_json::from_str::<FieldElement>("-1").is_err());
        assert!(serde_json::from_str::<FieldElement>("1.5").is_err());
        assert!(serde_json::from_str::<FieldElement>("\"abc\"").is_err());
        assert!(serde_json::from_str::<FieldElement>("\"\"").is_err());
        assert!(serde_json::from_str::<FieldElement>("\"0x\"").is_err());
        assert!(serde_json::from_str::<FieldElement>("true").is_err());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let fe = FieldElement::from_u64(12345);
        assert_eq!(serde_json::to_string(&fe).unwrap(), "\"12345\"");
        assert_eq!(FieldElement::ZERO.to_decimal(), "0");
    }

    #[test]
    fn bits_and_u64() {
        assert_eq!(FieldElement::ZERO.bits(), 0);
        assert_eq!(FieldElement::from_u64(1).bits(), 1);
        assert_eq!(FieldElement::from_u64(255).bits(), 8);
        assert_eq!(FieldElement::from_u64(256).bits(), 9);
        assert_eq!(FieldElement::from_u64(u64::MAX).to_u64(), Some(u64::MAX));
        let big = FieldElement::parse("18446744073709551616").unwrap();
        assert_eq!(big.to_u64(), None);
        assert_eq!(big.bits(), 65);
    }

    #[test]
    fn rejection_never_echoes_the_literal() {
        let above = "21888242871839275222246405745257275088548364400416034343698204186575808495700";
        let err = FieldElement::parse(above).unwrap_err().to_string();
        assert!(!err.contains(above), "{err}");
        assert!(!err.contains("2188824287"), "{err}");

        let err = serde_json::from_str::<FieldElement>(&format!("\"{above}\"")).unwrap_err();
        assert!(!err.to_string().contains(above));
    }

    #[test]
    fn long_non_ascii_literal_is_rejected() {
        let literal = "é".repeat(50);
        let err = FieldElement::parse(&literal).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidFieldElement {
                length: 50,
                reason: "expected a non-negative integer".into(),
            }
        );
        assert!(FieldElement::parse(&format!("0x{}", "ß".repeat(40))).is_err());
    }

    #[test]
    fn largest_element_is_accepted() {
        let mut below = [0u8; 32];
        below.copy_from_slice(&hex::decode(&Fr::MODULUS[2..]).unwrap());
        assert!(FieldElement::from_be_bytes(below).is_err());
        below[31] -= 1;
        assert!(FieldElement::from_be_bytes(below).is_ok());
    }

    #[test]
    fn hex_form_is_32_bytes() {
        let fe = FieldElement::from_u64(10);
        assert_eq!(
            fe.to_hex(),
            "0x000000000000000000000000000000000000000000000000000000000000000a"
        );
    }

    proptest! {
        #[test]
        fn decimal_round_trip(v in any::<u64>()) {
            let fe = FieldElement::from_u64(v);
            prop_assert_eq!(fe.to_decimal(), v.to_string());
            prop_assert_eq!(FieldElement::parse(&v.to_string()).unwrap(), fe);
        }

        #[test]
        fn hex_and_decimal_agree(hi in any::<u64>(), lo in any::<u64>()) {
            let value = (u128::from(hi) << 64) | u128::from(lo);
            let dec = FieldElement::parse(&value.to_string()).unwrap();
            let hex = FieldElement::parse(&format!("0x{value:x}")).unwrap();
            prop_assert_eq!(dec, hex);
        }
    }
}
