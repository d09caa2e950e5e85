//! # Lifecycle Controller
//!
//! Owns every circuit state transition. Each mutating operation takes the
//! circuit's keyed lock for its whole duration, external calls included, and
//! persists nothing until the external step it depends on has succeeded:
//!
//! - `register` compiles before the circuit directory is created;
//! - `create_deployment` and `generate_proof` build the unsigned transaction
//!   before any record is written;
//! - `broadcast` persists `broadcast` status between submission and the
//!   receipt wait, so an abandoned wait leaves a record `reconcile` can pick
//!   up.
//!
//! Store calls made under the lock run on the blocking pool and keep the
//! lock until they finish (see [`crate::locked`]). Writes that must land
//! together are issued as one call.
//!
//! Reads take no lock. The store's atomic writes guarantee they never see a
//! partial record.

use std::sync::Arc;

use arcana_chain::{
    BroadcastError, BroadcastErrorKind, Broadcaster, ChainRpc, NetworkConfig, NetworkError, NetworkRegistry, Receipt,
    SignedTx, TxBuilder, TxType,
};
use arcana_core::{CircuitId, EvmAddress, FieldElement, TxHash, ValidationError};
use arcana_state::{CircuitState, FailureStage, RecordStatus, StateError};
use arcana_store::{ArtifactStore, Circuit, DeploymentRecord, StoreError, VerificationRecord};
use arcana_zkp::{
    CircuitSource, CompileFailure, CompiledArtifact, CompilerDriver, ProveFailure, ProverDriver, ZkToolchain,
};

use crate::config::LifecycleConfig;
use crate::error::{ErrorKind, LifecycleError, Stage};
use crate::lock::KeyedLock;
use crate::locked::LockedStore;
use crate::views::{
    ArtifactSummary, BroadcastRequest, CircuitView, DeployRequest, DeploymentResult, HealthView, NetworkView,
    ProofRequest, ProofResult, ProofSummary, RegisterRequest, RegisterResult, StatusView, TxOutcome,
};

pub struct LifecycleController {
    store: ArtifactStore,
    toolchain: Arc<dyn ZkToolchain>,
    compiler: CompilerDriver,
    prover: ProverDriver,
    builder: TxBuilder,
    broadcaster: Broadcaster,
    registry: Arc<NetworkRegistry>,
    locks: KeyedLock<CircuitId>,
    config: LifecycleConfig,
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("store", &self.store.root())
            .field("backend", &self.toolchain.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn fail(stage: Stage, circuit: &Circuit, kind: impl Into<ErrorKind>) -> LifecycleError {
    LifecycleError::new(stage, kind)
        .with_circuit(&circuit.circuit_id)
        .with_state(circuit.state)
}

fn wrong_state(operation: &'static str, required: &'static str, actual: CircuitState) -> ErrorKind {
    StateError::WrongState {
        operation,
        required,
        actual,
    }
    .into()
}

fn unmatched(kind: &str) -> ErrorKind {
    ValidationError::field(
        "signed_transaction",
        format!("does not match any {kind} transaction issued for this circuit"),
    )
    .into()
}

/// A live candidate if there is one, otherwise the last terminal one.
fn pick<R>(candidates: impl IntoIterator<Item = R>, status: impl Fn(&R) -> RecordStatus) -> Option<R> {
    let mut fallback = None;
    for record in candidates {
        if !status(&record).is_terminal() {
            return Some(record);
        }
        fallback = Some(record);
    }
    fallback
}

/// Create (or replace) the circuit directory and record the compile result.
fn persist_registration(
    store: &ArtifactStore,
    mut circuit: Circuit,
    source: &CircuitSource,
    compiled: Result<CompiledArtifact, ErrorKind>,
    replacing: bool,
) -> Result<(Circuit, CompiledArtifact), LifecycleError> {
    let created = if replacing {
        store.replace_failed_circuit(&circuit, source)
    } else {
        store.create_circuit(&circuit, source)
    };
    created.map_err(|e| fail(Stage::Register, &circuit, e))?;

    match compiled {
        Ok(artifact) => {
            store
                .store_artifact(&artifact)
                .map_err(|e| fail(Stage::Compile, &circuit, e))?;
            circuit.artifact_digest = Some(artifact.digest.clone());
            circuit
                .transition(CircuitState::Compiled)
                .map_err(|e| fail(Stage::Compile, &circuit, e))?;
            store
                .save_circuit(&circuit)
                .map_err(|e| fail(Stage::Compile, &circuit, e))?;
            Ok((circuit, artifact))
        }
        Err(kind) => {
            circuit
                .transition(CircuitState::Failed(FailureStage::Compile))
                .map_err(|e| fail(Stage::Compile, &circuit, e))?;
            circuit.record_error(Stage::Compile.as_str(), kind.to_string());
            if let Err(e) = store.save_circuit(&circuit) {
                tracing::warn!(circuit_id = %circuit.circuit_id, "could not record failure: {e}");
            }
            tracing::warn!(circuit_id = %circuit.circuit_id, "compilation failed: {kind}");
            Err(fail(Stage::Compile, &circuit, kind))
        }
    }
}

fn deployment_outcome(circuit: &Circuit, record: &DeploymentRecord, tx_hash: TxHash) -> TxOutcome {
    TxOutcome {
        circuit_id: circuit.circuit_id.clone(),
        tx_type: TxType::Deployment,
        record_id: record.deployment_id,
        tx_hash: record.tx_hash.unwrap_or(tx_hash),
        status: record.status,
        verifier_address: record.contract_address,
        verified: None,
        state: circuit.state,
    }
}

fn verification_outcome(circuit: &Circuit, record: &VerificationRecord, tx_hash: TxHash) -> TxOutcome {
    TxOutcome {
        circuit_id: circuit.circuit_id.clone(),
        tx_type: TxType::Verification,
        record_id: record.verification_id,
        tx_hash: record.tx_hash.unwrap_or(tx_hash),
        status: record.status,
        verifier_address: Some(record.verifier_address),
        verified: record.outcome.map(|o| o.is_accepted()),
        state: circuit.state,
    }
}

impl LifecycleController {
    /// Fails when the configured default network is not registered.
    pub fn new(
        store: ArtifactStore,
        toolchain: Arc<dyn ZkToolchain>,
        rpc: Arc<dyn ChainRpc>,
        registry: Arc<NetworkRegistry>,
        config: LifecycleConfig,
    ) -> Result<Self, NetworkError> {
        registry.resolve(&config.default_network)?;
        Ok(Self {
            compiler: CompilerDriver::new(toolchain.clone()).with_timeout(config.compile_timeout),
            prover: ProverDriver::new(toolchain.clone()).with_timeout(config.prove_timeout),
            builder: TxBuilder::new(rpc.clone(), registry.clone()),
            broadcaster: Broadcaster::new(rpc, registry.clone()).with_poll(config.poll),
            store,
            toolchain,
            registry,
            locks: KeyedLock::new(),
            config,
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    fn load(&self, stage: Stage, circuit_id: &CircuitId) -> Result<Circuit, LifecycleError> {
        self.store
            .load_circuit(circuit_id)
            .map_err(|e| LifecycleError::new(stage, e).with_circuit(circuit_id))
    }

    /// Take the circuit's lock and load it under that lock.
    async fn hold(&self, stage: Stage, circuit_id: &CircuitId) -> Result<(LockedStore, Circuit), LifecycleError> {
        let locked = LockedStore::new(self.store.clone(), self.locks.lock(circuit_id).await);
        let circuit = locked
            .load_circuit(circuit_id)
            .await
            .map_err(|e| LifecycleError::new(stage, e).with_circuit(circuit_id))?;
        Ok((locked, circuit))
    }

    /// Persist `last_error` on a failure that leaves the state unchanged.
    async fn note_failure(&self, locked: &LockedStore, circuit: &mut Circuit, stage: Stage, message: String) {
        circuit.record_error(stage.as_str(), message);
        if let Err(e) = locked.save_circuit(circuit).await {
            tracing::warn!(circuit_id = %circuit.circuit_id, "could not record failure: {e}");
        }
    }

    // ── register ────────────────────────────────────────────────────────

    /// Store and compile a circuit.
    ///
    /// A compile error leaves the circuit persisted in `Failed(compile)`,
    /// from which the same id may be registered again.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResult, LifecycleError> {
        let stage = Stage::Register;
        let RegisterRequest {
            circuit_id,
            manifest,
            source,
            description,
            network,
        } = request;
        let circuit_id = circuit_id.unwrap_or_else(CircuitId::generate);
        let source = CircuitSource::new(manifest, source);
        source
            .validate()
            .map_err(|e| LifecycleError::new(stage, e).with_circuit(&circuit_id))?;
        let network = network.unwrap_or_else(|| self.config.default_network.clone());
        self.registry
            .resolve(&network)
            .map_err(|e| LifecycleError::new(stage, e).with_circuit(&circuit_id))?;

        let locked = LockedStore::new(self.store.clone(), self.locks.lock(&circuit_id).await);
        let replacing = match locked.load_circuit(&circuit_id).await {
            Ok(existing) if matches!(existing.state, CircuitState::Failed(_)) => true,
            Ok(existing) => {
                return Err(fail(stage, &existing, ErrorKind::Duplicate(circuit_id)));
            }
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(LifecycleError::new(stage, e).with_circuit(&circuit_id)),
        };

        tracing::info!(%circuit_id, %network, replacing, "registering circuit");
        let compiled = self
            .compiler
            .compile(&circuit_id, &source)
            .await
            .map_err(|failure| -> ErrorKind {
                match failure {
                    CompileFailure::Invalid(e) => e.into(),
                    CompileFailure::Compile(e) => e.into(),
                }
            });

        let circuit = Circuit::new(circuit_id.clone(), description, network);
        let (circuit, artifact) = locked
            .run(move |store| Ok::<_, StoreError>(persist_registration(store, circuit, &source, compiled, replacing)))
            .await
            .map_err(|e| LifecycleError::new(stage, e).with_circuit(&circuit_id))??;
        tracing::info!(%circuit_id, digest = %artifact.digest, "circuit compiled");
        Ok(RegisterResult {
            circuit_id,
            state: circuit.state,
            network: circuit.network,
            artifact_digest: artifact.digest,
            parameters: artifact.schema.parameters,
        })
    }

    // ── deploy ──────────────────────────────────────────────────────────

    /// Issue an unsigned deployment transaction for the circuit's verifier.
    /// May be called again while earlier deployments are outstanding; each
    /// call reserves a fresh nonce.
    pub async fn create_deployment(&self, request: DeployRequest) -> Result<DeploymentResult, LifecycleError> {
        let stage = Stage::Deploy;
        let (locked, mut circuit) = self.hold(stage, &request.circuit_id).await?;
        self.create_deployment_locked(&locked, &mut circuit, request)
            .await
            .map_err(|kind| fail(stage, &circuit, kind))
    }

    async fn create_deployment_locked(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        request: DeployRequest,
    ) -> Result<DeploymentResult, ErrorKind> {
        if !matches!(circuit.state, CircuitState::Compiled | CircuitState::DeployTxIssued) {
            return Err(wrong_state("create_deployment", "compiled", circuit.state));
        }
        let network = request.network.unwrap_or_else(|| circuit.network.clone());
        let artifact = locked.load_artifact(&circuit.circuit_id).await?;
        let unsigned = self
            .builder
            .build_deployment_tx(&artifact, &network, &request.user_address)
            .await?;

        let record = DeploymentRecord::pending(circuit.circuit_id.clone(), network.clone(), unsigned);
        let persisted = {
            let (record, mut next) = (record.clone(), circuit.clone());
            locked
                .run(move |store| -> Result<Circuit, ErrorKind> {
                    store.save_deployment(&record)?;
                    next.transition(CircuitState::DeployTxIssued)?;
                    store.save_circuit(&next)?;
                    Ok(next)
                })
                .await
        };
        match persisted {
            Ok(next) => *circuit = next,
            Err(e) => {
                self.builder
                    .release_nonce(&network, &record.from, record.nonce)
                    .await;
                return Err(e);
            }
        }

        tracing::info!(
            circuit_id = %circuit.circuit_id,
            %network,
            deployment_id = %record.deployment_id,
            nonce = record.nonce,
            "deployment transaction issued"
        );
        Ok(DeploymentResult {
            circuit_id: circuit.circuit_id.clone(),
            deployment_id: record.deployment_id,
            network,
            chain_id: record.chain_id,
            nonce: record.nonce,
            unsigned_tx: record.unsigned_tx,
            state: circuit.state,
        })
    }

    // ── prove ───────────────────────────────────────────────────────────

    /// Generate a proof and issue the unsigned verification transaction.
    ///
    /// Private inputs are consumed here whether or not the proof succeeds.
    pub async fn generate_proof(&self, request: ProofRequest) -> Result<ProofResult, LifecycleError> {
        let stage = Stage::Prove;
        let (locked, mut circuit) = self.hold(stage, &request.circuit_id).await?;
        self.generate_proof_locked(&locked, &mut circuit, request)
            .await
            .map_err(|kind| fail(stage, &circuit, kind))
    }

    async fn generate_proof_locked(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        request: ProofRequest,
    ) -> Result<ProofResult, ErrorKind> {
        let ProofRequest {
            circuit_id: _,
            private_inputs,
            public_inputs,
            verifier_address,
            user_address,
            network,
        } = request;
        if !matches!(circuit.state, CircuitState::Deployed | CircuitState::ProofIssued) {
            return Err(wrong_state("generate_proof", "deployed", circuit.state));
        }
        let (Some(verifier), Some(deployed_network)) = (circuit.verifier_address, circuit.deployed_network.clone()) else {
            return Err(StateError::Conflict("deployed circuit has no verifier address".into()).into());
        };
        if let Some(requested) = verifier_address {
            if requested != verifier {
                return Err(ValidationError::field(
                    "verifier_address",
                    format!("circuit verifier is deployed at {verifier}"),
                )
                .into());
            }
        }
        let network = match network {
            Some(requested) if requested != deployed_network => {
                return Err(ValidationError::field(
                    "network",
                    format!("circuit verifier is deployed on {deployed_network}"),
                )
                .into());
            }
            _ => deployed_network,
        };

        let artifact = locked.load_artifact(&circuit.circuit_id).await?;
        let mut proof = match self.prover.prove(&artifact, private_inputs, public_inputs).await {
            Ok(proof) => proof,
            Err(ProveFailure::Invalid(e)) => return Err(e.into()),
            Err(ProveFailure::Prove(e)) => {
                self.note_failure(locked, circuit, Stage::Prove, e.to_string()).await;
                return Err(e.into());
            }
        };

        let unsigned = self
            .builder
            .build_verification_tx(&proof, &network, &verifier, &user_address)
            .await?;
        let record = VerificationRecord::pending(
            circuit.circuit_id.clone(),
            network.clone(),
            verifier,
            proof.proof_id,
            unsigned,
        );
        proof.verification_id = Some(record.verification_id);

        let persisted = {
            let (proof, record, mut next) = (proof.clone(), record.clone(), circuit.clone());
            locked
                .run(move |store| -> Result<Circuit, ErrorKind> {
                    store.save_proof(&proof)?;
                    store.save_verification(&record)?;
                    next.proof_count += 1;
                    next.transition(CircuitState::ProofIssued)?;
                    store.save_circuit(&next)?;
                    Ok(next)
                })
                .await
        };
        match persisted {
            Ok(next) => *circuit = next,
            Err(e) => {
                self.builder
                    .release_nonce(&network, &record.from, record.nonce)
                    .await;
                return Err(e);
            }
        }

        tracing::info!(
            circuit_id = %circuit.circuit_id,
            %network,
            proof_id = %proof.proof_id,
            verification_id = %record.verification_id,
            nonce = record.nonce,
            "verification transaction issued"
        );
        Ok(ProofResult {
            circuit_id: circuit.circuit_id.clone(),
            proof_id: proof.proof_id,
            verification_id: record.verification_id,
            proof_size: proof.proof_size(),
            proof_hash: proof.proof_hash,
            public_inputs: proof.public_inputs,
            verifier_address: verifier,
            network,
            unsigned_tx: record.unsigned_tx,
            state: circuit.state,
        })
    }

    // ── broadcast ───────────────────────────────────────────────────────

    /// Submit a client-signed transaction and apply its receipt.
    ///
    /// The transaction must match a record issued for this circuit. A
    /// verifier that rejects the proof is a successful call with
    /// `verified: false`; only transport, rejection and revert are errors.
    pub async fn broadcast(&self, request: BroadcastRequest) -> Result<TxOutcome, LifecycleError> {
        let stage = Stage::Broadcast;
        let (locked, mut circuit) = self.hold(stage, &request.circuit_id).await?;
        self.broadcast_locked(&locked, &mut circuit, request)
            .await
            .map_err(|kind| fail(stage, &circuit, kind))
    }

    async fn broadcast_locked(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        request: BroadcastRequest,
    ) -> Result<TxOutcome, ErrorKind> {
        let network_name = match (&request.network, request.tx_type) {
            (Some(name), _) => name.clone(),
            (None, TxType::Verification) => circuit
                .deployed_network
                .clone()
                .unwrap_or_else(|| circuit.network.clone()),
            (None, TxType::Deployment) => circuit.network.clone(),
        };
        let network = self.registry.resolve(&network_name)?;
        let raw = request.signed_tx.as_slice();
        let tx = self.broadcaster.decode(network, raw)?;

        match request.tx_type {
            TxType::Deployment => self.broadcast_deployment(locked, circuit, network, &tx, raw).await,
            TxType::Verification => {
                self.broadcast_verification(
                    locked,
                    circuit,
                    network,
                    &tx,
                    raw,
                    request.verifier_address,
                    request.public_inputs.as_deref(),
                )
                .await
            }
        }
    }

    async fn broadcast_deployment(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        network: &NetworkConfig,
        tx: &SignedTx,
        raw: &[u8],
    ) -> Result<TxOutcome, ErrorKind> {
        if !tx.is_contract_creation() {
            return Err(ValidationError::field("signed_transaction", "deployment must not have a recipient").into());
        }
        let candidates = locked
            .list_deployments(&circuit.circuit_id)
            .await?
            .into_iter()
            .filter(|r| {
                let issued = &r.unsigned_tx.request;
                r.network == network.name
                    && r.nonce == tx.nonce
                    && issued.to.is_none()
                    && (network.requires_confidential_encryption || issued.data.as_slice() == tx.data.as_slice())
            });
        let mut record = pick(candidates, |r| r.status).ok_or_else(|| unmatched("deployment"))?;

        match record.status {
            RecordStatus::Failed => {
                return Err(BroadcastError::rejected(
                    format!(
                        "deployment {} is failed: {}",
                        record.deployment_id,
                        record.failure.as_deref().unwrap_or("unknown reason")
                    ),
                    Some(tx.hash),
                )
                .into());
            }
            RecordStatus::Confirmed => return Ok(deployment_outcome(circuit, &record, tx.hash)),
            RecordStatus::Pending | RecordStatus::Broadcast => {}
        }
        if circuit.state != CircuitState::DeployTxIssued {
            return Err(wrong_state("broadcast deployment", "deploy_tx_issued", circuit.state));
        }

        let hash = if record.status == RecordStatus::Broadcast && record.tx_hash == Some(tx.hash) {
            tx.hash
        } else {
            match self.broadcaster.submit(network, tx, raw).await {
                Ok(hash) => {
                    self.builder
                        .settle_nonce(&record.network, &record.from, record.nonce)
                        .await;
                    record.tx_hash = Some(hash);
                    if record.status == RecordStatus::Pending {
                        record.advance(RecordStatus::Broadcast)?;
                    }
                    locked.save_deployment(&record).await?;
                    hash
                }
                Err(e) if e.kind == BroadcastErrorKind::RejectedByNetwork => {
                    record.fail(e.message.clone())?;
                    locked.save_deployment(&record).await?;
                    self.builder
                        .release_nonce(&record.network, &record.from, record.nonce)
                        .await;
                    self.roll_back_deployment(locked, circuit, &e).await?;
                    return Err(e.into());
                }
                Err(e) => {
                    record.tx_hash = e.tx_hash.or(Some(tx.hash));
                    if record.status == RecordStatus::Pending {
                        record.advance(RecordStatus::Broadcast)?;
                    }
                    locked.save_deployment(&record).await?;
                    return Err(e.into());
                }
            }
        };

        let receipt = self.broadcaster.await_receipt(network, &hash).await?;
        self.settle_deployment(locked, circuit, record, &receipt).await
    }

    /// After a deployment failed: back to `Compiled` once nothing is live.
    async fn roll_back_deployment(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        cause: &BroadcastError,
    ) -> Result<(), ErrorKind> {
        circuit.record_error(Stage::Broadcast.as_str(), cause.to_string());
        let live = locked
            .list_deployments(&circuit.circuit_id)
            .await?
            .iter()
            .any(|r| !r.status.is_terminal());
        if circuit.state == CircuitState::DeployTxIssued && !live {
            circuit.transition(CircuitState::Compiled)?;
        }
        locked.save_circuit(circuit).await?;
        Ok(())
    }

    async fn settle_deployment(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        mut record: DeploymentRecord,
        receipt: &Receipt,
    ) -> Result<TxOutcome, ErrorKind> {
        record.tx_hash = Some(receipt.tx_hash);
        let address = match self.broadcaster.confirm_deployment(receipt) {
            Ok(address) => address,
            Err(e) => {
                record.fail(e.message.clone())?;
                locked.save_deployment(&record).await?;
                self.roll_back_deployment(locked, circuit, &e).await?;
                tracing::warn!(circuit_id = %circuit.circuit_id, tx_hash = %receipt.tx_hash, "deployment failed: {e}");
                return Err(e.into());
            }
        };
        record.contract_address = Some(address);
        record.advance(RecordStatus::Confirmed)?;
        locked.save_deployment(&record).await?;

        let mut released = Vec::new();
        for mut sibling in locked.list_deployments(&circuit.circuit_id).await? {
            if sibling.deployment_id == record.deployment_id || sibling.status.is_terminal() {
                continue;
            }
            let unsent = sibling.status == RecordStatus::Pending;
            sibling.fail("superseded")?;
            locked.save_deployment(&sibling).await?;
            if unsent {
                released.push(sibling);
            }
        }
        self.release_all(released.iter().map(|r| (r.network.as_str(), &r.from, r.nonce)))
            .await;

        circuit.verifier_address = Some(address);
        circuit.deployed_network = Some(record.network.clone());
        circuit.transition(CircuitState::Deployed)?;
        locked.save_circuit(circuit).await?;
        tracing::info!(
            circuit_id = %circuit.circuit_id,
            network = %record.network,
            tx_hash = %receipt.tx_hash,
            verifier = %address,
            "verifier deployed"
        );
        Ok(deployment_outcome(circuit, &record, receipt.tx_hash))
    }

    async fn broadcast_verification(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        network: &NetworkConfig,
        tx: &SignedTx,
        raw: &[u8],
        verifier_address: Option<EvmAddress>,
        public_inputs: Option<&[FieldElement]>,
    ) -> Result<TxOutcome, ErrorKind> {
        let Some(target) = tx.to else {
            return Err(ValidationError::field("signed_transaction", "verification must target a verifier").into());
        };
        if let Some(expected) = verifier_address {
            if expected != target {
                return Err(ValidationError::field(
                    "verifier_address",
                    format!("transaction targets {target}, not {expected}"),
                )
                .into());
            }
        }
        let candidates = locked
            .list_verifications(&circuit.circuit_id)
            .await?
            .into_iter()
            .filter(|r| {
                r.network == network.name
                    && r.nonce == tx.nonce
                    && r.verifier_address == target
                    && (network.requires_confidential_encryption
                        || r.unsigned_tx.request.data.as_slice() == tx.data.as_slice())
            });
        let mut record = pick(candidates, |r| r.status).ok_or_else(|| unmatched("verification"))?;

        if let Some(expected) = public_inputs {
            let proof = locked.load_proof(&circuit.circuit_id, &record.proof_id).await?;
            if proof.public_inputs.as_slice() != expected {
                return Err(ValidationError::field(
                    "public_inputs",
                    format!("do not match the public inputs of proof {}", proof.proof_id),
                )
                .into());
            }
        }

        match record.status {
            RecordStatus::Failed => {
                return Err(BroadcastError::rejected(
                    format!(
                        "verification {} is failed: {}",
                        record.verification_id,
                        record.failure.as_deref().unwrap_or("unknown reason")
                    ),
                    Some(tx.hash),
                )
                .into());
            }
            RecordStatus::Confirmed => return Ok(verification_outcome(circuit, &record, tx.hash)),
            RecordStatus::Pending | RecordStatus::Broadcast => {}
        }
        if circuit.state != CircuitState::ProofIssued {
            return Err(wrong_state("broadcast verification", "proof_issued", circuit.state));
        }

        let hash = if record.status == RecordStatus::Broadcast && record.tx_hash == Some(tx.hash) {
            tx.hash
        } else {
            match self.broadcaster.submit(network, tx, raw).await {
                Ok(hash) => {
                    self.builder
                        .settle_nonce(&record.network, &record.from, record.nonce)
                        .await;
                    record.tx_hash = Some(hash);
                    if record.status == RecordStatus::Pending {
                        record.advance(RecordStatus::Broadcast)?;
                    }
                    locked.save_verification(&record).await?;
                    hash
                }
                Err(e) if e.kind == BroadcastErrorKind::RejectedByNetwork => {
                    record.fail(e.message.clone())?;
                    locked.save_verification(&record).await?;
                    self.builder
                        .release_nonce(&record.network, &record.from, record.nonce)
                        .await;
                    self.roll_back_verification(locked, circuit, Some(&e)).await?;
                    return Err(e.into());
                }
                Err(e) => {
                    record.tx_hash = e.tx_hash.or(Some(tx.hash));
                    if record.status == RecordStatus::Pending {
                        record.advance(RecordStatus::Broadcast)?;
                    }
                    locked.save_verification(&record).await?;
                    return Err(e.into());
                }
            }
        };

        let receipt = self.broadcaster.await_receipt(network, &hash).await?;
        self.settle_verification(locked, circuit, network, record, &receipt).await
    }

    /// After a verification ended without acceptance: back to `Deployed`
    /// once no other verification is live.
    async fn roll_back_verification(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        cause: Option<&BroadcastError>,
    ) -> Result<(), ErrorKind> {
        if let Some(cause) = cause {
            circuit.record_error(Stage::Broadcast.as_str(), cause.to_string());
        }
        let live = locked
            .list_verifications(&circuit.circuit_id)
            .await?
            .iter()
            .any(|r| !r.status.is_terminal());
        if circuit.state == CircuitState::ProofIssued && !live {
            circuit.transition(CircuitState::Deployed)?;
        }
        locked.save_circuit(circuit).await?;
        Ok(())
    }

    async fn settle_verification(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        network: &NetworkConfig,
        mut record: VerificationRecord,
        receipt: &Receipt,
    ) -> Result<TxOutcome, ErrorKind> {
        record.tx_hash = Some(receipt.tx_hash);
        let verdict = self
            .broadcaster
            .verification_outcome(
                network,
                &record.verifier_address,
                record.unsigned_tx.request.data.as_slice(),
                receipt,
            )
            .await;
        let outcome = match verdict {
            Ok(outcome) => outcome,
            // the verdict replay failed in transit; the record stays broadcast
            Err(e) if e.kind == BroadcastErrorKind::Timeout => return Err(e.into()),
            Err(e) => {
                record.fail(e.message.clone())?;
                locked.save_verification(&record).await?;
                self.roll_back_verification(locked, circuit, Some(&e)).await?;
                tracing::warn!(circuit_id = %circuit.circuit_id, tx_hash = %receipt.tx_hash, "verification failed: {e}");
                return Err(e.into());
            }
        };
        record.outcome = Some(outcome);
        record.advance(RecordStatus::Confirmed)?;
        locked.save_verification(&record).await?;

        if outcome.is_accepted() {
            let mut released = Vec::new();
            for mut sibling in locked.list_verifications(&circuit.circuit_id).await? {
                if sibling.verification_id == record.verification_id || sibling.status.is_terminal() {
                    continue;
                }
                let unsent = sibling.status == RecordStatus::Pending;
                sibling.fail("circuit already verified")?;
                locked.save_verification(&sibling).await?;
                if unsent {
                    released.push(sibling);
                }
            }
            self.release_all(released.iter().map(|r| (r.network.as_str(), &r.from, r.nonce)))
                .await;
            circuit.transition(CircuitState::Verified)?;
            locked.save_circuit(circuit).await?;
        } else {
            self.roll_back_verification(locked, circuit, None).await?;
        }
        tracing::info!(
            circuit_id = %circuit.circuit_id,
            network = %record.network,
            tx_hash = %receipt.tx_hash,
            accepted = outcome.is_accepted(),
            state = %circuit.state,
            "verification confirmed"
        );
        Ok(verification_outcome(circuit, &record, receipt.tx_hash))
    }

    /// Release abandoned nonces, highest first, so a contiguous tail of
    /// reservations is fully returned.
    async fn release_all<'a>(&self, reservations: impl Iterator<Item = (&'a str, &'a EvmAddress, u64)>) {
        let mut reservations: Vec<_> = reservations.collect();
        reservations.sort_by(|a, b| b.2.cmp(&a.2));
        for (network, sender, nonce) in reservations {
            self.builder.release_nonce(network, sender, nonce).await;
        }
    }

    // ── reconcile ───────────────────────────────────────────────────────

    /// Re-check a transaction left `broadcast` by a timed-out wait.
    ///
    /// Performs a single receipt poll. A still-missing receipt is not an
    /// error; the returned status stays `broadcast`.
    pub async fn reconcile(&self, circuit_id: &CircuitId, tx_hash: TxHash) -> Result<TxOutcome, LifecycleError> {
        let stage = Stage::Reconcile;
        let (locked, mut circuit) = self.hold(stage, circuit_id).await?;
        self.reconcile_locked(&locked, &mut circuit, tx_hash)
            .await
            .map_err(|kind| fail(stage, &circuit, kind))
    }

    async fn reconcile_locked(
        &self,
        locked: &LockedStore,
        circuit: &mut Circuit,
        tx_hash: TxHash,
    ) -> Result<TxOutcome, ErrorKind> {
        let deployment = locked
            .list_deployments(&circuit.circuit_id)
            .await?
            .into_iter()
            .find(|r| r.tx_hash == Some(tx_hash));
        if let Some(record) = deployment {
            if record.status != RecordStatus::Broadcast {
                return Ok(deployment_outcome(circuit, &record, tx_hash));
            }
            let network = self.registry.resolve(&record.network)?;
            return match self.broadcaster.check_receipt(network, &tx_hash).await? {
                Some(receipt) => self.settle_deployment(locked, circuit, record, &receipt).await,
                None => Ok(deployment_outcome(circuit, &record, tx_hash)),
            };
        }

        let verification = locked
            .list_verifications(&circuit.circuit_id)
            .await?
            .into_iter()
            .find(|r| r.tx_hash == Some(tx_hash));
        if let Some(record) = verification {
            if record.status != RecordStatus::Broadcast {
                return Ok(verification_outcome(circuit, &record, tx_hash));
            }
            let network = self.registry.resolve(&record.network)?;
            return match self.broadcaster.check_receipt(network, &tx_hash).await? {
                Some(receipt) => self.settle_verification(locked, circuit, network, record, &receipt).await,
                None => Ok(verification_outcome(circuit, &record, tx_hash)),
            };
        }

        Err(ErrorKind::NotFound(format!("transaction {tx_hash} not found")))
    }

    // ── reads ───────────────────────────────────────────────────────────

    pub fn get_circuit(&self, circuit_id: &CircuitId) -> Result<CircuitView, LifecycleError> {
        let circuit = self.load(Stage::Read, circuit_id)?;
        self.view(circuit)
    }

    pub fn list_circuits(&self) -> Result<Vec<CircuitView>, LifecycleError> {
        self.store
            .list_circuits()
            .map_err(|e| LifecycleError::new(Stage::Read, e))?
            .into_iter()
            .map(|circuit| self.view(circuit))
            .collect()
    }

    fn view(&self, circuit: Circuit) -> Result<CircuitView, LifecycleError> {
        let id = &circuit.circuit_id;
        let read = |e: StoreError| LifecycleError::new(Stage::Read, e).with_circuit(id).with_state(circuit.state);
        let artifact = match circuit.artifact_digest {
            Some(_) => Some(ArtifactSummary::from(&self.store.load_artifact(id).map_err(read)?)),
            None => None,
        };
        let deployments = self.store.list_deployments(id).map_err(read)?;
        let verifications = self.store.list_verifications(id).map_err(read)?;
        let proofs = self
            .store
            .list_proofs(id)
            .map_err(read)?
            .iter()
            .map(ProofSummary::from)
            .collect();
        Ok(CircuitView {
            circuit,
            artifact,
            deployments,
            verifications,
            proofs,
        })
    }

    pub async fn health(&self) -> HealthView {
        let available = self.toolchain.available().await;
        HealthView {
            status: if available { "healthy" } else { "degraded" }.to_string(),
            backend: self.toolchain.name().to_string(),
            backend_available: available,
        }
    }

    pub fn status(&self) -> Result<StatusView, LifecycleError> {
        let circuits = self
            .store
            .list_circuits()
            .map_err(|e| LifecycleError::new(Stage::Read, e))?;
        Ok(StatusView {
            total_circuits: circuits.len(),
            total_proofs: circuits.iter().map(|c| c.proof_count).sum(),
            deployed_circuits: circuits.iter().filter(|c| c.state.is_deployed()).count(),
            supported_networks: self.registry.names().map(str::to_string).collect(),
        })
    }

    pub fn networks(&self) -> Vec<NetworkView> {
        self.registry
            .list()
            .map(|n| NetworkView::new(n, &self.config.default_network))
            .collect()
    }
}
