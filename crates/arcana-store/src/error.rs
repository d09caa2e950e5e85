use std::path::PathBuf;

use arcana_core::CircuitId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A circuit with this id already exists and is not replaceable.
    #[error("circuit \"{0}\" already exists")]
    Duplicate(CircuitId),

    #[error("{kind} \"{id}\" not found")]
    NotFound { kind: &'static str, id: String },

    /// The artifact was already stored; compiled artifacts are immutable.
    #[error("compiled artifact for \"{0}\" already exists")]
    ArtifactExists(CircuitId),

    /// Stored bytes do not match their recorded digest.
    #[error("integrity violation at {path}: {detail}")]
    Integrity { path: PathBuf, detail: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
