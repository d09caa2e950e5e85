//! # Private Inputs
//!
//! [`SecretInputs`] is the only way private values enter the orchestrator.
//! It is a capability type: deserializable from a request body, consumable by
//! the prover driver, and otherwise inert. It has no `Serialize`, no `Clone`,
//! and a redacted `Debug`, and it zeroizes its values when dropped.
//!
//! [`Witness`] is the validated, declaration-ordered assignment handed to a
//! toolchain. It carries the same restrictions.

use std::collections::BTreeMap;

use arcana_core::{FieldElement, ValidationError};
use serde::Deserialize;
use zeroize::{Zeroize, Zeroizing};

use crate::artifact::{InputSchema, Visibility};

/// Private circuit inputs, keyed by parameter name.
#[derive(Deserialize, Default)]
#[serde(transparent)]
pub struct SecretInputs(BTreeMap<String, FieldElement>);

impl SecretInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldElement) {
        if let Some(mut previous) = self.0.insert(name.into(), value) {
            previous.zeroize();
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get(&self, name: &str) -> Option<&FieldElement> {
        self.0.get(name)
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, FieldElement)> for SecretInputs {
    fn from_iter<I: IntoIterator<Item = (K, FieldElement)>>(iter: I) -> Self {
        let mut inputs = Self::new();
        for (k, v) in iter {
            inputs.insert(k, v);
        }
        inputs
    }
}

impl Drop for SecretInputs {
    fn drop(&mut self) {
        for value in self.0.values_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for SecretInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretInputs")
            .field("len", &self.0.len())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

/// A complete, validated assignment for every parameter of `fn main`, in
/// declaration order.
pub struct Witness {
    entries: Vec<(String, FieldElement)>,
}

impl Witness {
    /// Check `private` and `public` against `schema` and assemble the witness.
    ///
    /// Rejects, in order: wrong public arity, unknown names, missing private
    /// parameters, public values that disagree with the private map, and
    /// values that do not fit the declared type. Nothing is inferred.
    pub fn resolve(
        schema: &InputSchema,
        private: &SecretInputs,
        public: &[FieldElement],
    ) -> Result<Self, ValidationError> {
        let arity = schema.public_arity();
        if public.len() != arity {
            return Err(ValidationError::PublicInputArity {
                expected: arity,
                actual: public.len(),
            });
        }

        if let Some(unknown) = private.names().find(|name| schema.get(name).is_none()) {
            return Err(ValidationError::UnknownInput(unknown.to_string()));
        }

        let mut public_iter = public.iter();
        let mut entries = Vec::with_capacity(schema.parameters.len());
        for param in &schema.parameters {
            let value = match param.visibility {
                Visibility::Public => {
                    let positional = public_iter
                        .next()
                        .ok_or(ValidationError::PublicInputArity {
                            expected: arity,
                            actual: public.len(),
                        })?;
                    if let Some(named) = private.get(&param.name) {
                        if named != positional {
                            return Err(ValidationError::PublicInputMismatch(param.name.clone()));
                        }
                    }
                    positional
                }
                Visibility::Private => private
                    .get(&param.name)
                    .ok_or_else(|| ValidationError::MissingInput(param.name.clone()))?,
            };
            if !param.ty.admits(value) {
                return Err(ValidationError::InputOutOfRange {
                    name: param.name.clone(),
                    ty: param.ty.to_string(),
                });
            }
            entries.push((param.name.clone(), value.clone()));
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &FieldElement)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&FieldElement> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }

    /// Render as `Prover.toml`. The buffer is wiped when dropped.
    pub fn to_prover_toml(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(String::new());
        for (name, value) in &self.entries {
            out.push_str(name);
            out.push_str(" = \"");
            out.push_str(&value.to_decimal());
            out.push_str("\"\n");
        }
        out
    }
}

impl Drop for Witness {
    fn drop(&mut self) {
        for (_, value) in self.entries.iter_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for Witness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Witness")
            .field("parameters", &self.entries.len())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ParamType, Parameter};

    fn schema() -> InputSchema {
        InputSchema {
            parameters: vec![
                Parameter {
                    name: "x".into(),
                    visibility: Visibility::Private,
                    ty: ParamType::Field,
                },
                Parameter {
                    name: "y".into(),
                    visibility: Visibility::Public,
                    ty: ParamType::Field,
                },
                Parameter {
                    name: "flag".into(),
                    visibility: Visibility::Private,
                    ty: ParamType::Boolean,
                },
            ],
        }
    }

    fn private(pairs: &[(&str, u64)]) -> SecretInputs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldElement::from_u64(*v)))
            .collect()
    }

    #[test]
    fn resolves_in_declaration_order() {
        let w = Witness::resolve(
            &schema(),
            &private(&[("flag", 1), ("x", 5)]),
            &[FieldElement::from_u64(10)],
        )
        .unwrap();
        let names: Vec<_> = w.entries().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["x", "y", "flag"]);
        assert_eq!(w.get("y"), Some(&FieldElement::from_u64(10)));
        assert_eq!(&*w.to_prover_toml(), "x = \"5\"\ny = \"10\"\nflag = \"1\"\n");
    }

    #[test]
    fn out_of_range_secret_is_not_in_the_error() {
        let secret = "21888242871839275222246405745257275088548364400416034343698204186575808495700";
        let body = format!(r#"{{"x": "{secret}"}}"#);
        let err = serde_json::from_str::<SecretInputs>(&body).unwrap_err().to_string();
        assert!(err.contains("not below the BN254 scalar modulus"), "{err}");
        assert!(!err.contains(secret), "{err}");
        assert!(!err.contains(&secret[..20]), "{err}");
    }

    #[test]
    fn arity_mismatch_rejected_first() {
        let err = Witness::resolve(&schema(), &private(&[("bogus", 1)]), &[]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::PublicInputArity {
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn unknown_and_missing_rejected() {
        let public = [FieldElement::from_u64(10)];
        assert_eq!(
            Witness::resolve(&schema(), &private(&[("x", 1), ("flag", 0), ("z", 1)]), &public)
                .unwrap_err(),
            ValidationError::UnknownInput("z".into())
        );
        assert_eq!(
            Witness::resolve(&schema(), &private(&[("x", 1)]), &public).unwrap_err(),
            ValidationError::MissingInput("flag".into())
        );
    }

    #[test]
    fn public_value_in_private_map_must_agree() {
        let public = [FieldElement::from_u64(10)];
        assert!(
            Witness::resolve(&schema(), &private(&[("x", 1), ("flag", 0), ("y", 10)]), &public)
                .is_ok()
        );
        assert_eq!(
            Witness::resolve(&schema(), &private(&[("x", 1), ("flag", 0), ("y", 11)]), &public)
                .unwrap_err(),
            ValidationError::PublicInputMismatch("y".into())
        );
    }

    #[test]
    fn out_of_range_rejected() {
        let err = Witness::resolve(
            &schema(),
            &private(&[("x", 1), ("flag", 2)]),
            &[FieldElement::from_u64(10)],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InputOutOfRange { .. }));
    }

    #[test]
    fn debug_output_is_redacted() {
        let inputs = private(&[("x", 123456789)]);
        let rendered = format!("{inputs:?}");
        assert!(!rendered.contains("123456789"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn deserializes_from_json_object() {
        let inputs: SecretInputs =
            serde_json::from_value(serde_json::json!({"x": 5, "flag": "1"})).unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(serde_json::from_value::<SecretInputs>(serde_json::json!({"x": -1})).is_err());
    }
}
