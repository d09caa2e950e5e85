use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use arcana_core::{CircuitId, RecordId};
use arcana_state::CircuitState;
use arcana_zkp::{CircuitSource, CompiledArtifact, ProofArtifact};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::records::{Circuit, DeploymentRecord, VerificationRecord};

const MANIFEST_FILE: &str = "Nargo.toml";
const SOURCE_FILE: &str = "src/main.nr";
const CIRCUIT_FILE: &str = "circuit.json";
const ARTIFACT_FILE: &str = "artifact.json";
const DEPLOYMENTS_DIR: &str = "deployments";
const VERIFICATIONS_DIR: &str = "verifications";
const PROOFS_DIR: &str = "proofs";

/// Filesystem artifact store rooted at `{data_dir}/circuits`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the store under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = data_dir.as_ref().join("circuits");
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn circuit_dir(&self, id: &CircuitId) -> PathBuf {
        // CircuitId admits only [A-Za-z0-9_-], so this cannot escape `root`.
        self.root.join(id.as_str())
    }

    // -- Circuits ------------------------------------------------------------

    /// Create a new circuit directory with its source and record.
    ///
    /// Fails with [`StoreError::Duplicate`] if the directory already exists.
    pub fn create_circuit(&self, circuit: &Circuit, source: &CircuitSource) -> Result<(), StoreError> {
        let dir = self.circuit_dir(&circuit.circuit_id);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::Duplicate(circuit.circuit_id.clone()));
            }
            Err(e) => return Err(StoreError::io(&dir, e)),
        }
        let result = self
            .write_source(&dir, source)
            .and_then(|()| write_json(&dir.join(CIRCUIT_FILE), circuit));
        if result.is_err() {
            // leave no half-created circuit that would block a retry
            if let Err(e) = fs::remove_dir_all(&dir) {
                tracing::warn!(circuit_id = %circuit.circuit_id, "failed to clean up {}: {e}", dir.display());
            }
        }
        result
    }

    /// Re-register over an existing circuit that ended in `Failed`.
    ///
    /// Any other existing state is a [`StoreError::Duplicate`].
    pub fn replace_failed_circuit(&self, circuit: &Circuit, source: &CircuitSource) -> Result<(), StoreError> {
        let existing = self.load_circuit(&circuit.circuit_id)?;
        if !matches!(existing.state, CircuitState::Failed(_)) {
            return Err(StoreError::Duplicate(circuit.circuit_id.clone()));
        }
        let dir = self.circuit_dir(&circuit.circuit_id);
        let artifact = dir.join(ARTIFACT_FILE);
        if artifact.exists() {
            fs::remove_file(&artifact).map_err(|e| StoreError::io(&artifact, e))?;
        }
        self.write_source(&dir, source)?;
        write_json(&dir.join(CIRCUIT_FILE), circuit)?;
        tracing::info!(circuit_id = %circuit.circuit_id, "replaced failed circuit");
        Ok(())
    }

    pub fn load_circuit(&self, id: &CircuitId) -> Result<Circuit, StoreError> {
        read_json(&self.circuit_dir(id).join(CIRCUIT_FILE))?.ok_or_else(|| StoreError::NotFound {
            kind: "circuit",
            id: id.to_string(),
        })
    }

    pub fn save_circuit(&self, circuit: &Circuit) -> Result<(), StoreError> {
        let dir = self.circuit_dir(&circuit.circuit_id);
        if !dir.is_dir() {
            return Err(StoreError::NotFound {
                kind: "circuit",
                id: circuit.circuit_id.to_string(),
            });
        }
        write_json(&dir.join(CIRCUIT_FILE), circuit)
    }

    pub fn circuit_exists(&self, id: &CircuitId) -> bool {
        self.circuit_dir(id).join(CIRCUIT_FILE).is_file()
    }

    /// All circuits, oldest first. Unreadable entries are skipped with a warning.
    pub fn list_circuits(&self) -> Result<Vec<Circuit>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut circuits = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| CircuitId::new(n).ok()) else {
                continue;
            };
            match self.load_circuit(&id) {
                Ok(c) => circuits.push(c),
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => tracing::warn!(circuit_id = %id, "skipping unreadable circuit: {e}"),
            }
        }
        circuits.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.circuit_id.as_str().cmp(b.circuit_id.as_str()))
        });
        Ok(circuits)
    }

    pub fn load_source(&self, id: &CircuitId) -> Result<CircuitSource, StoreError> {
        let dir = self.circuit_dir(id);
        let read = |rel: &str| -> Result<String, StoreError> {
            let path = dir.join(rel);
            fs::read_to_string(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::NotFound {
                    kind: "circuit source",
                    id: id.to_string(),
                },
                _ => StoreError::io(&path, e),
            })
        };
        Ok(CircuitSource::new(read(MANIFEST_FILE)?, read(SOURCE_FILE)?))
    }

    fn write_source(&self, dir: &Path, source: &CircuitSource) -> Result<(), StoreError> {
        let src_dir = dir.join("src");
        fs::create_dir_all(&src_dir).map_err(|e| StoreError::io(&src_dir, e))?;
        write_atomic(&dir.join(MANIFEST_FILE), source.manifest.as_bytes())?;
        write_atomic(&dir.join(SOURCE_FILE), source.source.as_bytes())
    }

    // -- Compiled artifacts --------------------------------------------------

    /// Store the compiled artifact. Create-once: a second call fails with
    /// [`StoreError::ArtifactExists`] and the original is untouched.
    pub fn store_artifact(&self, artifact: &CompiledArtifact) -> Result<(), StoreError> {
        let dir = self.circuit_dir(&artifact.circuit_id);
        let path = dir.join(ARTIFACT_FILE);
        let bytes = to_json(&path, artifact)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(&bytes).map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| StoreError::io(tmp.path(), e))?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::ArtifactExists(artifact.circuit_id.clone()))
            }
            Err(e) => Err(StoreError::io(&path, e.error)),
        }
    }

    /// Load and integrity-check the compiled artifact.
    pub fn load_artifact(&self, id: &CircuitId) -> Result<CompiledArtifact, StoreError> {
        let path = self.circuit_dir(id).join(ARTIFACT_FILE);
        let artifact: CompiledArtifact = read_json(&path)?.ok_or_else(|| StoreError::NotFound {
            kind: "compiled artifact",
            id: id.to_string(),
        })?;
        if artifact.circuit_id != *id {
            return Err(StoreError::Integrity {
                path,
                detail: format!("artifact belongs to {}", artifact.circuit_id),
            });
        }
        let computed = artifact.compute_digest();
        if computed != artifact.digest {
            return Err(StoreError::Integrity {
                path,
                detail: format!("digest is {computed}, record says {}", artifact.digest),
            });
        }
        Ok(artifact)
    }

    // -- Deployment records --------------------------------------------------

    pub fn save_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.save_record(&record.circuit_id, DEPLOYMENTS_DIR, &record.deployment_id, record)
    }

    pub fn load_deployment(&self, circuit: &CircuitId, id: &RecordId) -> Result<DeploymentRecord, StoreError> {
        self.load_record(circuit, DEPLOYMENTS_DIR, id, "deployment")
    }

    /// Deployment records, oldest first.
    pub fn list_deployments(&self, circuit: &CircuitId) -> Result<Vec<DeploymentRecord>, StoreError> {
        let mut records: Vec<DeploymentRecord> = self.list_records(circuit, DEPLOYMENTS_DIR)?;
        records.sort_by_key(|r| (r.created_at, r.nonce));
        Ok(records)
    }

    // -- Verification records ------------------------------------------------

    pub fn save_verification(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        self.save_record(&record.circuit_id, VERIFICATIONS_DIR, &record.verification_id, record)
    }

    pub fn load_verification(&self, circuit: &CircuitId, id: &RecordId) -> Result<VerificationRecord, StoreError> {
        self.load_record(circuit, VERIFICATIONS_DIR, id, "verification")
    }

    pub fn list_verifications(&self, circuit: &CircuitId) -> Result<Vec<VerificationRecord>, StoreError> {
        let mut records: Vec<VerificationRecord> = self.list_records(circuit, VERIFICATIONS_DIR)?;
        records.sort_by_key(|r| (r.created_at, r.nonce));
        Ok(records)
    }

    // -- Proofs --------------------------------------------------------------

    pub fn save_proof(&self, proof: &ProofArtifact) -> Result<(), StoreError> {
        self.save_record(&proof.circuit_id, PROOFS_DIR, &proof.proof_id, proof)
    }

    pub fn load_proof(&self, circuit: &CircuitId, id: &RecordId) -> Result<ProofArtifact, StoreError> {
        self.load_record(circuit, PROOFS_DIR, id, "proof")
    }

    pub fn list_proofs(&self, circuit: &CircuitId) -> Result<Vec<ProofArtifact>, StoreError> {
        let mut proofs: Vec<ProofArtifact> = self.list_records(circuit, PROOFS_DIR)?;
        proofs.sort_by_key(|p| p.generated_at);
        Ok(proofs)
    }

    // -- Helpers -------------------------------------------------------------

    fn save_record<T: Serialize>(&self, circuit: &CircuitId, sub: &str, id: &RecordId, value: &T) -> Result<(), StoreError> {
        let dir = self.circuit_dir(circuit);
        if !dir.is_dir() {
            return Err(StoreError::NotFound {
                kind: "circuit",
                id: circuit.to_string(),
            });
        }
        let sub_dir = dir.join(sub);
        fs::create_dir_all(&sub_dir).map_err(|e| StoreError::io(&sub_dir, e))?;
        write_json(&sub_dir.join(format!("{id}.json")), value)
    }

    fn load_record<T: DeserializeOwned>(
        &self,
        circuit: &CircuitId,
        sub: &str,
        id: &RecordId,
        kind: &'static str,
    ) -> Result<T, StoreError> {
        let path = self.circuit_dir(circuit).join(sub).join(format!("{id}.json"));
        read_json(&path)?.ok_or_else(|| StoreError::NotFound {
            kind,
            id: id.to_string(),
        })
    }

    fn list_records<T: DeserializeOwned>(&self, circuit: &CircuitId, sub: &str) -> Result<Vec<T>, StoreError> {
        let dir = self.circuit_dir(circuit).join(sub);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };
        let mut out = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = read_json(&path)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}

fn to_json<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serde {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = to_json(path, value)?;
    write_atomic(path, &bytes)
}

/// Write via a sibling temp file and rename, so readers see old or new, never partial.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Serde {
            path: path.to_path_buf(),
            source,
        })
}
