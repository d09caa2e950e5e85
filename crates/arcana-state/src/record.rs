//! Forward-only status for deployment and verification records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of an issued transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Unsigned transaction handed to the client.
    Pending,
    /// Signed transaction submitted; receipt not yet observed.
    Broadcast,
    /// Receipt observed with success status.
    Confirmed,
    /// Rejected, reverted, or superseded.
    Failed,
}

impl RecordStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Broadcast => "broadcast",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// Validate and perform a forward transition.
    pub fn advance(self, to: RecordStatus) -> Result<RecordStatus, RecordTransitionError> {
        use RecordStatus::*;
        let ok = match self {
            Pending => matches!(to, Broadcast | Failed),
            Broadcast => matches!(to, Confirmed | Failed),
            Confirmed | Failed => false,
        };
        if ok {
            Ok(to)
        } else {
            Err(RecordTransitionError { from: self, to })
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record status cannot move from {from} to {to}")]
pub struct RecordTransitionError {
    pub from: RecordStatus,
    pub to: RecordStatus,
}

/// On-chain verdict of a confirmed verification transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Accepted,
    Rejected,
}

impl VerificationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}
