//! Workflow states.

use securi_core::{CertificationRecord, CoreError, ErrorKind, Fingerprint};
use securi_ledger::TxHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a certification attempt, with the data that state carries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    /// No file selected
    #[default]
    Idle,
    /// Computing the fingerprint
    Hashing,
    /// Querying the ledger
    LookingUp {
        /// Fingerprint being looked up
        fingerprint: Fingerprint,
    },
    /// The fingerprint already has a record
    Exists {
        /// The existing record
        record: CertificationRecord,
    },
    /// No record, and the session cannot write one
    NotFound {
        /// Fingerprint that has no record
        fingerprint: Fingerprint,
    },
    /// Waiting on the signer
    Certifying {
        /// Fingerprint being certified
        fingerprint: Fingerprint,
    },
    /// Waiting for the write to be confirmed
    Confirming {
        /// Fingerprint being certified
        fingerprint: Fingerprint,
        /// Submitted write
        tx: TxHandle,
    },
    /// The write was confirmed
    Certified {
        /// The new record
        record: CertificationRecord,
    },
    /// The attempt failed
    Failed {
        /// Fingerprint, if hashing got that far
        fingerprint: Option<Fingerprint>,
        /// Classified cause
        error: CoreError,
    },
}

/// Payload-free discriminant of [`WorkflowState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTag {
    /// See [`WorkflowState::Idle`]
    Idle,
    /// See [`WorkflowState::Hashing`]
    Hashing,
    /// See [`WorkflowState::LookingUp`]
    LookingUp,
    /// See [`WorkflowState::Exists`]
    Exists,
    /// See [`WorkflowState::NotFound`]
    NotFound,
    /// See [`WorkflowState::Certifying`]
    Certifying,
    /// See [`WorkflowState::Confirming`]
    Confirming,
    /// See [`WorkflowState::Certified`]
    Certified,
    /// See [`WorkflowState::Failed`]
    Failed,
}

impl StateTag {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Hashing => "hashing",
            Self::LookingUp => "looking_up",
            Self::Exists => "exists",
            Self::NotFound => "not_found",
            Self::Certifying => "certifying",
            Self::Confirming => "confirming",
            Self::Certified => "certified",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WorkflowState {
    /// Discriminant
    #[must_use]
    pub const fn tag(&self) -> StateTag {
        match self {
            Self::Idle => StateTag::Idle,
            Self::Hashing => StateTag::Hashing,
            Self::LookingUp { .. } => StateTag::LookingUp,
            Self::Exists { .. } => StateTag::Exists,
            Self::NotFound { .. } => StateTag::NotFound,
            Self::Certifying { .. } => StateTag::Certifying,
            Self::Confirming { .. } => StateTag::Confirming,
            Self::Certified { .. } => StateTag::Certified,
            Self::Failed { .. } => StateTag::Failed,
        }
    }

    /// Whether the attempt has ended; only "start over" leaves a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Exists { .. } | Self::NotFound { .. } | Self::Certified { .. } | Self::Failed { .. }
        )
    }

    /// Fingerprint of the current attempt, if known
    #[must_use]
    pub const fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Self::Idle | Self::Hashing => None,
            Self::LookingUp { fingerprint }
            | Self::NotFound { fingerprint }
            | Self::Certifying { fingerprint }
            | Self::Confirming { fingerprint, .. } => Some(fingerprint),
            Self::Exists { record } | Self::Certified { record } => Some(&record.fingerprint),
            Self::Failed { fingerprint, .. } => fingerprint.as_ref(),
        }
    }

    /// Record shown by a terminal success state
    #[must_use]
    pub const fn record(&self) -> Option<&CertificationRecord> {
        match self {
            Self::Exists { record } | Self::Certified { record } => Some(record),
            _ => None,
        }
    }

    /// Error of a failed attempt
    #[must_use]
    pub const fn error(&self) -> Option<&CoreError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Kind of the error of a failed attempt
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(CoreError::kind)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { error, .. } => write!(f, "failed ({})", error.kind()),
            other => f.write_str(other.tag().as_str()),
        }
    }
}
