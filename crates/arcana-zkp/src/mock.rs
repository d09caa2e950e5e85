//! # Mock Toolchain
//!
//! A deterministic in-process backend for tests and local development.
//!
//! It reads the `fn main(...)` signature and `assert(...)` / `assert_eq(...)`
//! statements of a Noir program over scalar parameters. At prove time it
//! evaluates those constraints against the witness, so an unsatisfying
//! assignment fails with `InvalidWitness` exactly as `nargo execute` would.
//!
//! Artifacts are content-derived:
//!
//! - verification key: `sha256(manifest || source)`
//! - verifier bytecode: `MOCK_VERIFIER_MAGIC || vk`
//! - proof: `sha256("arcana-mock-proof" || vk || public inputs as bytes32)`
//!
//! [`mock_verify`] checks a proof against verifier bytecode using the same
//! derivation, which lets an in-memory chain act as the verifier contract.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use arcana_core::{sha256, FieldElement};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::{
    CircuitSource, CompiledArtifact, InputSchema, ParamType, Parameter, Visibility,
};
use crate::error::{CompileError, CompileStage, ProveError};
use crate::inputs::Witness;
use crate::toolchain::{ToolchainOutput, ZkToolchain};

/// Prefix of every mock verifier's creation bytecode.
pub const MOCK_VERIFIER_MAGIC: &[u8] = b"\x00arcana-mock-verifier\x00";

const PROOF_DOMAIN: &[u8] = b"arcana-mock-proof";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn holds(&self, lhs: &FieldElement, rhs: &FieldElement) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Operand {
    Var(String),
    Const(FieldElement),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Constraint {
    text: String,
    lhs: Operand,
    op: Op,
    rhs: Operand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MockProgram {
    parameters: Vec<Parameter>,
    constraints: Vec<Constraint>,
}

/// Deterministic backend. See the module docs for its derivations.
#[derive(Debug)]
pub struct MockToolchain {
    compile_delay: Duration,
    prove_delay: Duration,
    available: AtomicBool,
    prove_calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for MockToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockToolchain {
    pub fn new() -> Self {
        Self {
            compile_delay: Duration::ZERO,
            prove_delay: Duration::ZERO,
            available: AtomicBool::new(true),
            prove_calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every `compile` call.
    pub fn with_compile_delay(mut self, delay: Duration) -> Self {
        self.compile_delay = delay;
        self
    }

    /// Sleep this long inside every `prove` call.
    pub fn with_prove_delay(mut self, delay: Duration) -> Self {
        self.prove_delay = delay;
        self
    }

    /// Simulate the backend binary disappearing.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `prove` calls that reached the backend.
    pub fn prove_calls(&self) -> usize {
        self.prove_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `prove` calls observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ZkToolchain for MockToolchain {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn compile(&self, source: &CircuitSource) -> Result<ToolchainOutput, CompileError> {
        if !self.compile_delay.is_zero() {
            tokio::time::sleep(self.compile_delay).await;
        }
        let program = parse_program(&source.source)?;
        let mut vk_input = source.manifest.as_bytes().to_vec();
        vk_input.extend_from_slice(source.source.as_bytes());
        let vk = sha256(&vk_input).to_vec();

        let mut verifier = MOCK_VERIFIER_MAGIC.to_vec();
        verifier.extend_from_slice(&vk);

        let bytes = serde_json::to_vec(&program)
            .map_err(|e| CompileError::new(CompileStage::Codegen, e.to_string()))?;

        Ok(ToolchainOutput {
            program: bytes,
            verification_key: vk,
            verifier_bytecode: verifier,
            schema: InputSchema {
                parameters: program.parameters,
            },
            compiler_version: "mock-0.1.0".to_string(),
        })
    }

    async fn prove(
        &self,
        artifact: &CompiledArtifact,
        witness: &Witness,
    ) -> Result<Vec<u8>, ProveError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ProveError::backend_unavailable("mock prover is offline"));
        }
        self.prove_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        if !self.prove_delay.is_zero() {
            tokio::time::sleep(self.prove_delay).await;
        }

        let program: MockProgram = serde_json::from_slice(artifact.program.as_slice())
            .map_err(|e| ProveError::backend_unavailable(format!("unreadable program: {e}")))?;

        for constraint in &program.constraints {
            let lhs = resolve(&constraint.lhs, witness)?;
            let rhs = resolve(&constraint.rhs, witness)?;
            if !constraint.op.holds(lhs, rhs) {
                return Err(ProveError::invalid_witness(format!(
                    "Failed constraint: {}",
                    constraint.text
                )));
            }
        }

        let public: Vec<[u8; 32]> = program
            .parameters
            .iter()
            .filter(|p| p.visibility == Visibility::Public)
            .filter_map(|p| witness.get(&p.name).map(FieldElement::to_be_bytes))
            .collect();
        Ok(mock_proof(artifact.verification_key.as_slice(), &public))
    }
}

fn resolve<'a>(operand: &'a Operand, witness: &'a Witness) -> Result<&'a FieldElement, ProveError> {
    match operand {
        Operand::Const(c) => Ok(c),
        Operand::Var(name) => witness
            .get(name)
            .ok_or_else(|| ProveError::backend_unavailable(format!("witness lacks {name}"))),
    }
}

fn mock_proof(vk: &[u8], public_inputs: &[[u8; 32]]) -> Vec<u8> {
    let mut buf = PROOF_DOMAIN.to_vec();
    buf.extend_from_slice(vk);
    for input in public_inputs {
        buf.extend_from_slice(input);
    }
    sha256(&buf).to_vec()
}

/// Check `proof` against mock verifier bytecode.
///
/// Returns `None` when `verifier_bytecode` is not a mock verifier.
pub fn mock_verify(verifier_bytecode: &[u8], proof: &[u8], public_inputs: &[[u8; 32]]) -> Option<bool> {
    let vk = verifier_bytecode.strip_prefix(MOCK_VERIFIER_MAGIC)?;
    Some(mock_proof(vk, public_inputs) == proof)
}

// -- Parsing ------------------------------------------------------------------

fn parse_program(source: &str) -> Result<MockProgram, CompileError> {
    let parse_err = |msg: &str| CompileError::new(CompileStage::Parse, msg);
    let type_err = |msg: String| CompileError::new(CompileStage::Typecheck, msg);

    let code = strip_comments(source);
    if code.matches('{').count() != code.matches('}').count()
        || code.matches('(').count() != code.matches(')').count()
    {
        return Err(parse_err("unbalanced delimiters"));
    }

    let start = code
        .find("fn main(")
        .ok_or_else(|| parse_err("expected `fn main(...)`"))?;
    let after = &code[start + "fn main(".len()..];
    let close = after
        .find(')')
        .ok_or_else(|| parse_err("unterminated parameter list"))?;
    let params_src = &after[..close];
    let rest = &after[close + 1..];
    let brace = rest
        .find('{')
        .ok_or_else(|| parse_err("expected function body"))?;
    if rest[..brace].contains("->") {
        return Err(type_err(
            "main must not return a value; expose outputs as pub parameters".into(),
        ));
    }
    let body = &rest[brace + 1..];

    let mut parameters = Vec::new();
    for raw in params_src.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, ty) = raw
            .split_once(':')
            .ok_or_else(|| parse_err("expected `name: Type` parameter"))?;
        let name = name.trim().trim_start_matches("mut ").trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(parse_err("invalid parameter name"));
        }
        let ty = ty.trim();
        let (visibility, ty) = match ty.strip_prefix("pub ") {
            Some(t) => (Visibility::Public, t.trim()),
            None => (Visibility::Private, ty),
        };
        let ty = ParamType::from_noir(ty)
            .ok_or_else(|| type_err(format!("unsupported parameter type `{ty}` for `{name}`")))?;
        if parameters.iter().any(|p: &Parameter| p.name == name) {
            return Err(type_err(format!("duplicate parameter `{name}`")));
        }
        parameters.push(Parameter {
            name: name.to_string(),
            visibility,
            ty,
        });
    }

    let mut constraints = Vec::new();
    for (keyword, args) in assertion_calls(body) {
        let constraint = if keyword == "assert_eq" {
            let mut parts = split_top_level(args);
            let (lhs, rhs) = match (parts.next(), parts.next()) {
                (Some(l), Some(r)) => (l, r),
                _ => return Err(parse_err("assert_eq takes two arguments")),
            };
            Constraint {
                text: format!("assert_eq({}, {})", lhs.trim(), rhs.trim()),
                lhs: operand(lhs, &parameters)?,
                op: Op::Eq,
                rhs: operand(rhs, &parameters)?,
            }
        } else {
            let expr = split_top_level(args)
                .next()
                .ok_or_else(|| parse_err("empty assertion"))?;
            let (lhs, op, rhs) = split_comparison(expr)
                .ok_or_else(|| type_err(format!("unsupported assertion `{}`", expr.trim())))?;
            Constraint {
                text: format!("assert({})", expr.trim()),
                lhs: operand(lhs, &parameters)?,
                op,
                rhs: operand(rhs, &parameters)?,
            }
        };
        constraints.push(constraint);
    }

    Ok(MockProgram {
        parameters,
        constraints,
    })
}

fn strip_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| line.split("//").next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Yield `(keyword, argument text)` for every `assert(..)` / `assert_eq(..)`.
fn assertion_calls(body: &str) -> Vec<(&'static str, &str)> {
    let mut calls = Vec::new();
    let mut cursor = 0;
    while let Some(found) = body[cursor..].find("assert") {
        let at = cursor + found;
        let tail = &body[at..];
        let (keyword, open) = if tail.starts_with("assert_eq(") {
            ("assert_eq", "assert_eq(".len())
        } else if tail.starts_with("assert(") {
            ("assert", "assert(".len())
        } else {
            cursor = at + "assert".len();
            continue;
        };
        let args_start = at + open;
        let mut depth = 1usize;
        let mut end = None;
        for (i, c) in body[args_start..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(args_start + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        match end {
            Some(e) => {
                calls.push((keyword, &body[args_start..e]));
                cursor = e + 1;
            }
            None => break,
        }
    }
    calls
}

/// Split on commas outside parentheses and string literals.
fn split_top_level(args: &str) -> impl Iterator<Item = &str> {
    let mut parts = Vec::new();
    let (mut depth, mut in_str, mut last) = (0i32, false, 0);
    for (i, c) in args.char_indices() {
        match c {
            '"' => in_str = !in_str,
            '(' if !in_str => depth += 1,
            ')' if !in_str => depth -= 1,
            ',' if !in_str && depth == 0 => {
                parts.push(&args[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[last..]);
    parts.into_iter().filter(|p| !p.trim().is_empty())
}

fn split_comparison(expr: &str) -> Option<(&str, Op, &str)> {
    const OPS: [(&str, Op); 6] = [
        ("==", Op::Eq),
        ("!=", Op::Ne),
        ("<=", Op::Le),
        (">=", Op::Ge),
        ("<", Op::Lt),
        (">", Op::Gt),
    ];
    OPS.iter().find_map(|(token, op)| {
        expr.find(token)
            .map(|i| (&expr[..i], *op, &expr[i + token.len()..]))
    })
}

fn operand(raw: &str, parameters: &[Parameter]) -> Result<Operand, CompileError> {
    let raw = raw.trim();
    if raw.starts_with(|c: char| c.is_ascii_digit()) {
        return FieldElement::parse(raw)
            .map(Operand::Const)
            .map_err(|e| CompileError::new(CompileStage::Typecheck, e.to_string()));
    }
    if parameters.iter().any(|p| p.name == raw) {
        Ok(Operand::Var(raw.to_string()))
    } else {
        Err(CompileError::new(
            CompileStage::Typecheck,
            format!("cannot find `{raw}` in this scope"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::SecretInputs;

    fn compile(src: &str) -> Result<MockProgram, CompileError> {
        parse_program(src)
    }

    #[test]
    fn parses_signature_and_constraints() {
        let p = compile(
            "// age gate\nfn main(age: u8, min: pub u8) {\n    assert(age >= min, \"too young\");\n    assert_eq(min, 18);\n}\n",
        )
        .unwrap();
        assert_eq!(p.parameters.len(), 2);
        assert_eq!(p.parameters[1].visibility, Visibility::Public);
        assert_eq!(p.parameters[0].ty, ParamType::Unsigned(8));
        assert_eq!(p.constraints.len(), 2);
        assert_eq!(p.constraints[0].op, Op::Ge);
        assert_eq!(p.constraints[1].rhs, Operand::Const(FieldElement::from_u64(18)));
    }

    #[test]
    fn classifies_errors_by_stage() {
        assert_eq!(compile("garbage").unwrap_err().stage, CompileStage::Parse);
        assert_eq!(compile("fn main(x: Field {").unwrap_err().stage, CompileStage::Parse);
        assert_eq!(
            compile("fn main(x: String) {}").unwrap_err().stage,
            CompileStage::Typecheck
        );
        assert_eq!(
            compile("fn main(x: Field) { assert(x != z); }").unwrap_err().stage,
            CompileStage::Typecheck
        );
        assert_eq!(
            compile("fn main(x: Field) -> pub Field { x }").unwrap_err().stage,
            CompileStage::Typecheck
        );
    }

    #[tokio::test]
    async fn proof_verifies_against_its_own_verifier_only() {
        let tc = MockToolchain::new();
        let src = CircuitSource::new("[package]\nname=\"a\"", "fn main(x: Field, y: pub Field) { assert(x != y); }");
        let out = tc.compile(&src).await.unwrap();
        let artifact = CompiledArtifact {
            circuit_id: arcana_core::CircuitId::new("a").unwrap(),
            source: src,
            program: out.program.into(),
            verification_key: out.verification_key.into(),
            verifier_bytecode: out.verifier_bytecode.clone().into(),
            schema: out.schema.clone(),
            backend: "mock".into(),
            compiler_version: out.compiler_version,
            compiled_at: chrono::Utc::now(),
            digest: String::new(),
        };
        let private: SecretInputs = [("x", FieldElement::from_u64(5))].into_iter().collect();
        let ten = FieldElement::from_u64(10);
        let witness = Witness::resolve(&out.schema, &private, &[ten.clone()]).unwrap();
        let proof = tc.prove(&artifact, &witness).await.unwrap();

        assert_eq!(mock_verify(&out.verifier_bytecode, &proof, &[ten.to_be_bytes()]), Some(true));
        assert_eq!(
            mock_verify(&out.verifier_bytecode, &proof, &[FieldElement::from_u64(11).to_be_bytes()]),
            Some(false)
        );
        assert_eq!(mock_verify(b"\x60\x80", &proof, &[]), None);
    }
}
