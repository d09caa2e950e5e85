//! Store access under a held circuit lock.
//!
//! The artifact store does blocking filesystem I/O. [`LockedStore`] moves
//! each call onto the blocking pool together with a share of the circuit's
//! lock guard, so the lock is held until the write lands even when the
//! calling future is dropped mid-await. A cancelled request therefore never
//! lets the next operation on the same circuit observe a half-applied step.

use std::sync::Arc;

use arcana_core::{CircuitId, RecordId};
use arcana_store::{ArtifactStore, Circuit, DeploymentRecord, StoreError, VerificationRecord};
use arcana_zkp::{CompiledArtifact, ProofArtifact};

use crate::lock::KeyedGuard;

pub(crate) struct LockedStore {
    store: ArtifactStore,
    guard: Arc<KeyedGuard<CircuitId>>,
}

impl LockedStore {
    pub(crate) fn new(store: ArtifactStore, guard: KeyedGuard<CircuitId>) -> Self {
        Self {
            store,
            guard: Arc::new(guard),
        }
    }

    /// Run `op` on the blocking pool while the circuit lock is held.
    ///
    /// Several store calls that must land together go in one `op`: a dropped
    /// caller cannot interrupt it between them.
    pub(crate) async fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
        F: FnOnce(&ArtifactStore) -> Result<T, E> + Send + 'static,
    {
        let store = self.store.clone();
        let guard = self.guard.clone();
        tokio::task::spawn_blocking(move || {
            let _held = guard;
            op(&store)
        })
        .await
        .map_err(|e| {
            StoreError::Io {
                path: self.store.root().to_path_buf(),
                source: std::io::Error::other(format!("store task did not complete: {e}")),
            }
        })?
    }

    pub(crate) async fn load_circuit(&self, id: &CircuitId) -> Result<Circuit, StoreError> {
        let id = id.clone();
        self.run(move |store| store.load_circuit(&id)).await
    }

    pub(crate) async fn save_circuit(&self, circuit: &Circuit) -> Result<(), StoreError> {
        let circuit = circuit.clone();
        self.run(move |store| store.save_circuit(&circuit)).await
    }

    pub(crate) async fn load_artifact(&self, id: &CircuitId) -> Result<CompiledArtifact, StoreError> {
        let id = id.clone();
        self.run(move |store| store.load_artifact(&id)).await
    }

    pub(crate) async fn load_proof(&self, circuit: &CircuitId, proof: &RecordId) -> Result<ProofArtifact, StoreError> {
        let (circuit, proof) = (circuit.clone(), *proof);
        self.run(move |store| store.load_proof(&circuit, &proof)).await
    }

    pub(crate) async fn save_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.run(move |store| store.save_deployment(&record)).await
    }

    pub(crate) async fn list_deployments(&self, id: &CircuitId) -> Result<Vec<DeploymentRecord>, StoreError> {
        let id = id.clone();
        self.run(move |store| store.list_deployments(&id)).await
    }

    pub(crate) async fn save_verification(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.run(move |store| store.save_verification(&record)).await
    }

    pub(crate) async fn list_verifications(&self, id: &CircuitId) -> Result<Vec<VerificationRecord>, StoreError> {
        let id = id.clone();
        self.run(move |store| store.list_verifications(&id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::KeyedLock;
    use std::time::Duration;
    use tempfile::TempDir;

    fn id() -> CircuitId {
        CircuitId::new("held").unwrap()
    }

    #[tokio::test]
    async fn dropped_caller_keeps_the_lock_until_the_write_lands() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let locks = KeyedLock::new();
        let locked = LockedStore::new(store.clone(), locks.lock(&id()).await);

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let write = locked.run(move |_| {
            let _ = started_tx.send(());
            std::thread::sleep(Duration::from_millis(50));
            Ok::<_, StoreError>(())
        });
        // abandon the write once it is running on the blocking pool
        tokio::select! {
            _ = write => panic!("write should still be running"),
            _ = started_rx => {}
        }
        drop(locked);

        let waiting = tokio::time::timeout(Duration::from_millis(5), locks.lock(&id())).await;
        assert!(waiting.is_err(), "lock must stay held while the write runs");
        let acquired = tokio::time::timeout(Duration::from_secs(2), locks.lock(&id())).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn store_errors_pass_through() {
        let dir = TempDir::new().unwrap();
        let locks = KeyedLock::new();
        let locked = LockedStore::new(ArtifactStore::open(dir.path()).unwrap(), locks.lock(&id()).await);
        let err = locked.load_circuit(&id()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
