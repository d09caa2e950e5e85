//! # Noir Toolchain
//!
//! Drives the Noir compiler (`nargo`), the Barretenberg prover (`bb`) and the
//! Solidity compiler (`solc`) as child processes.
//!
//! ## Compile
//!
//! ```text
//! nargo compile                          → target/<package>.json (program + ABI)
//! bb write_vk -b <program> -o target/vk  → verification key
//! bb write_solidity_verifier -k <vk>     → Verifier.sol
//! solc --combined-json bin --optimize    → verifier creation bytecode
//! ```
//!
//! ## Prove
//!
//! ```text
//! Prover.toml ← witness
//! nargo execute witness                  → target/witness.gz   (failure = InvalidWitness)
//! bb prove -b <program> -w <witness>     → proof bytes          (failure = BackendUnavailable)
//! ```
//!
//! Every call runs in its own [`tempfile::TempDir`]. Children are spawned with
//! `kill_on_drop`, so dropping the future (timeout or caller cancellation)
//! terminates them, and the directory, including `Prover.toml`, is removed
//! when the guard drops.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::process::Command;

use crate::artifact::{CircuitSource, CompiledArtifact, InputSchema, ParamType, Parameter, Visibility};
use crate::error::{CompileError, CompileStage, ProveError, ProveErrorKind};
use crate::inputs::Witness;
use crate::toolchain::{ToolchainOutput, ZkToolchain};

/// Longest diagnostic surfaced to callers.
const MAX_DIAGNOSTIC_BYTES: usize = 8 * 1024;

/// Paths and options for the Noir toolchain binaries.
#[derive(Debug, Clone)]
pub struct NoirConfig {
    pub nargo_path: PathBuf,
    pub bb_path: PathBuf,
    pub solc_path: PathBuf,
    pub solc_optimize_runs: u32,
}

impl Default for NoirConfig {
    fn default() -> Self {
        Self {
            nargo_path: PathBuf::from("nargo"),
            bb_path: PathBuf::from("bb"),
            solc_path: PathBuf::from("solc"),
            solc_optimize_runs: 200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoirToolchain {
    config: NoirConfig,
}

impl NoirToolchain {
    pub fn new(config: NoirConfig) -> Self {
        Self { config }
    }
}

// -- Process plumbing ---------------------------------------------------------

async fn run(program: &Path, args: &[&str], cwd: &Path) -> std::io::Result<Output> {
    tracing::debug!(program = %program.display(), ?args, "spawning toolchain process");
    Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
}

fn diagnostic(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if text.is_empty() {
        text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    }
    let text = strip_ansi(&text);
    if text.len() > MAX_DIAGNOSTIC_BYTES {
        let mut cut = MAX_DIAGNOSTIC_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &text[..cut])
    } else if text.is_empty() {
        format!("exited with {}", output.status)
    } else {
        text
    }
}

fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Sort a `nargo compile` failure into parse or typecheck.
fn classify_nargo_failure(diagnostic: &str) -> CompileStage {
    let lower = diagnostic.to_lowercase();
    let type_markers = ["found type", "mismatched types", "cannot find", "type annotation", "is not defined", "no method"];
    if type_markers.iter().any(|m| lower.contains(m)) {
        return CompileStage::Typecheck;
    }
    let parse_markers = ["expected", "unexpected", "parse", "unterminated"];
    if parse_markers.iter().any(|m| lower.contains(m)) {
        return CompileStage::Parse;
    }
    CompileStage::Typecheck
}

/// Sort a `nargo execute` failure into a witness the circuit rejects or a
/// backend that did not get that far. Only recognised constraint and input
/// failures are terminal.
fn classify_execute_failure(diagnostic: &str) -> ProveErrorKind {
    let lower = diagnostic.to_lowercase();
    let witness_markers = [
        "cannot satisfy constraint",
        "failed constraint",
        "failed assertion",
        "assertion failed",
        "attempt to divide by zero",
        "index out of bounds",
        "with overflow",
    ];
    if witness_markers.iter().any(|m| lower.contains(m)) || quotes_input_value(diagnostic) {
        ProveErrorKind::InvalidWitness
    } else {
        ProveErrorKind::BackendUnavailable
    }
}

/// Input parse failures quote the rejected value, which may be private.
fn quotes_input_value(diagnostic: &str) -> bool {
    let lower = diagnostic.to_lowercase();
    ["invalid value for parameter", "is not a valid", "expected to be a"]
        .iter()
        .any(|m| lower.contains(m))
}

/// `path`, or `path/<file>` when a newer `bb` wrote a directory.
async fn resolve_output(path: &Path, file: &str) -> PathBuf {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => path.join(file),
        _ => path.to_path_buf(),
    }
}

// -- Program JSON ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NoirProgram {
    #[serde(default)]
    noir_version: Option<String>,
    abi: NoirAbi,
}

#[derive(Debug, Deserialize)]
struct NoirAbi {
    parameters: Vec<NoirParam>,
    #[serde(default)]
    return_type: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NoirParam {
    name: String,
    #[serde(rename = "type")]
    ty: NoirType,
    visibility: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum NoirType {
    Field,
    Integer { sign: String, width: u8 },
    Boolean,
    #[serde(other)]
    Unsupported,
}

fn schema_from_program(bytes: &[u8]) -> Result<(InputSchema, String), CompileError> {
    let program: NoirProgram = serde_json::from_slice(bytes).map_err(|e| {
        CompileError::new(CompileStage::Codegen, format!("unreadable compiler output: {e}"))
    })?;
    if program.abi.return_type.is_some() {
        return Err(CompileError::new(
            CompileStage::Typecheck,
            "main must not return a value; expose outputs as pub parameters",
        ));
    }
    let mut parameters = Vec::with_capacity(program.abi.parameters.len());
    for p in program.abi.parameters {
        let ty = match p.ty {
            NoirType::Field => Some(ParamType::Field),
            NoirType::Boolean => Some(ParamType::Boolean),
            NoirType::Integer { sign, width } if sign == "unsigned" => {
                ParamType::from_noir(&format!("u{width}"))
            }
            _ => None,
        }
        .ok_or_else(|| {
            CompileError::new(
                CompileStage::Typecheck,
                format!("parameter `{}` must be Field, bool or an unsigned integer", p.name),
            )
        })?;
        let visibility = if p.visibility == "public" {
            Visibility::Public
        } else {
            Visibility::Private
        };
        parameters.push(Parameter {
            name: p.name,
            visibility,
            ty,
        });
    }
    let version = program.noir_version.unwrap_or_else(|| "unknown".to_string());
    Ok((InputSchema { parameters }, version))
}

#[derive(Debug, Deserialize)]
struct SolcOutput {
    contracts: std::collections::BTreeMap<String, SolcContract>,
}

#[derive(Debug, Deserialize)]
struct SolcContract {
    #[serde(default)]
    bin: String,
}

/// Pick the verifier contract's creation bytecode from `solc` output.
fn verifier_bytecode(stdout: &[u8]) -> Result<Vec<u8>, CompileError> {
    let codegen = |msg: String| CompileError::new(CompileStage::Codegen, msg);
    let out: SolcOutput =
        serde_json::from_slice(stdout).map_err(|e| codegen(format!("unreadable solc output: {e}")))?;
    let (_, contract) = out
        .contracts
        .iter()
        .filter(|(name, c)| name.ends_with("Verifier") && !c.bin.is_empty())
        .max_by_key(|(_, c)| c.bin.len())
        .ok_or_else(|| codegen("solc produced no verifier contract".into()))?;
    hex::decode(contract.bin.trim_start_matches("0x"))
        .map_err(|e| codegen(format!("invalid verifier bytecode: {e}")))
}

fn program_file(dir: &Path, source: &CircuitSource) -> PathBuf {
    let name = source.package_name().unwrap_or("circuit");
    dir.join("target").join(format!("{name}.json"))
}

async fn write_project(dir: &Path, source: &CircuitSource) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir.join("src")).await?;
    tokio::fs::create_dir_all(dir.join("target")).await?;
    tokio::fs::write(dir.join("Nargo.toml"), &source.manifest).await?;
    tokio::fs::write(dir.join("src").join("main.nr"), &source.source).await
}

fn scratch_dir(prefix: &str) -> std::io::Result<TempDir> {
    tempfile::Builder::new().prefix(prefix).tempdir()
}

#[async_trait]
impl ZkToolchain for NoirToolchain {
    fn name(&self) -> &'static str {
        "noir"
    }

    async fn available(&self) -> bool {
        let cwd = std::env::temp_dir();
        for bin in [&self.config.nargo_path, &self.config.bb_path] {
            match run(bin, &["--version"], &cwd).await {
                Ok(out) if out.status.success() => {}
                _ => return false,
            }
        }
        true
    }

    async fn compile(&self, source: &CircuitSource) -> Result<ToolchainOutput, CompileError> {
        let codegen = |msg: String| CompileError::new(CompileStage::Codegen, msg);
        let dir = scratch_dir("arcana-compile-").map_err(|e| codegen(format!("workspace: {e}")))?;
        let root = dir.path();
        write_project(root, source)
            .await
            .map_err(|e| codegen(format!("workspace: {e}")))?;

        let out = run(&self.config.nargo_path, &["compile"], root)
            .await
            .map_err(|e| codegen(format!("failed to start nargo: {e}")))?;
        if !out.status.success() {
            let message = diagnostic(&out);
            return Err(CompileError::new(classify_nargo_failure(&message), message));
        }

        let program_path = program_file(root, source);
        let program = tokio::fs::read(&program_path)
            .await
            .map_err(|e| codegen(format!("missing {}: {e}", program_path.display())))?;
        let (schema, compiler_version) = schema_from_program(&program)?;

        let program_arg = program_path.to_string_lossy().into_owned();
        let vk_arg = root.join("target").join("vk");
        let vk_arg_str = vk_arg.to_string_lossy().into_owned();
        let out = run(
            &self.config.bb_path,
            &["write_vk", "-b", &program_arg, "-o", &vk_arg_str],
            root,
        )
        .await
        .map_err(|e| codegen(format!("failed to start bb: {e}")))?;
        if !out.status.success() {
            return Err(codegen(format!("bb write_vk: {}", diagnostic(&out))));
        }
        let vk_path = resolve_output(&vk_arg, "vk").await;
        let verification_key = tokio::fs::read(&vk_path)
            .await
            .map_err(|e| codegen(format!("missing verification key: {e}")))?;

        let vk_path_str = vk_path.to_string_lossy().into_owned();
        let out = run(
            &self.config.bb_path,
            &["write_solidity_verifier", "-k", &vk_path_str, "-o", "Verifier.sol"],
            root,
        )
        .await
        .map_err(|e| codegen(format!("failed to start bb: {e}")))?;
        if !out.status.success() {
            return Err(codegen(format!("bb write_solidity_verifier: {}", diagnostic(&out))));
        }

        let runs = self.config.solc_optimize_runs.to_string();
        let out = run(
            &self.config.solc_path,
            &["--combined-json", "bin", "--optimize", "--optimize-runs", &runs, "Verifier.sol"],
            root,
        )
        .await
        .map_err(|e| codegen(format!("failed to start solc: {e}")))?;
        if !out.status.success() {
            return Err(codegen(format!("solc: {}", diagnostic(&out))));
        }
        let verifier_bytecode = verifier_bytecode(&out.stdout)?;

        Ok(ToolchainOutput {
            program,
            verification_key,
            verifier_bytecode,
            schema,
            compiler_version,
        })
    }

    async fn prove(
        &self,
        artifact: &CompiledArtifact,
        witness: &Witness,
    ) -> Result<Vec<u8>, ProveError> {
        let unavailable = |msg: String| ProveError::backend_unavailable(msg);
        let dir = scratch_dir("arcana-prove-").map_err(|e| unavailable(format!("workspace: {e}")))?;
        let root = dir.path();
        write_project(root, &artifact.source)
            .await
            .map_err(|e| unavailable(format!("workspace: {e}")))?;
        let program_path = program_file(root, &artifact.source);
        tokio::fs::write(&program_path, artifact.program.as_slice())
            .await
            .map_err(|e| unavailable(format!("workspace: {e}")))?;

        let prover_toml = witness.to_prover_toml();
        tokio::fs::write(root.join("Prover.toml"), prover_toml.as_bytes())
            .await
            .map_err(|e| unavailable(format!("workspace: {e}")))?;
        drop(prover_toml);

        let out = run(&self.config.nargo_path, &["execute", "witness"], root)
            .await
            .map_err(|e| unavailable(format!("failed to start nargo: {e}")))?;
        // Prover.toml has served its purpose; remove it before the slow step.
        let _ = tokio::fs::remove_file(root.join("Prover.toml")).await;
        if !out.status.success() {
            let message = diagnostic(&out);
            // Killed by a signal: OOM or a crash, never a verdict on the inputs.
            if out.status.code().is_none() {
                return Err(unavailable(format!("nargo execute: {message}")));
            }
            return Err(match classify_execute_failure(&message) {
                ProveErrorKind::InvalidWitness if quotes_input_value(&message) => {
                    ProveError::invalid_witness("an input value does not fit its declared parameter type")
                }
                ProveErrorKind::InvalidWitness => ProveError::invalid_witness(message),
                _ => unavailable(format!("nargo execute: {message}")),
            });
        }

        let program_arg = program_path.to_string_lossy().into_owned();
        let witness_arg = root.join("target").join("witness.gz").to_string_lossy().into_owned();
        let proof_arg = root.join("target").join("proof");
        let proof_arg_str = proof_arg.to_string_lossy().into_owned();
        let out = run(
            &self.config.bb_path,
            &["prove", "-b", &program_arg, "-w", &witness_arg, "-o", &proof_arg_str],
            root,
        )
        .await
        .map_err(|e| unavailable(format!("failed to start bb: {e}")))?;
        if !out.status.success() {
            return Err(unavailable(format!("bb prove: {}", diagnostic(&out))));
        }

        let proof_path = resolve_output(&proof_arg, "proof").await;
        tokio::fs::read(&proof_path)
            .await
            .map_err(|e| unavailable(format!("missing proof output: {e}")))
    }
}
