//! Error taxonomy for certification and verification.
//!
//! Every failure a caller can observe is one of the [`ErrorKind`]s below.
//! Raw transport and signer errors are classified into a [`CoreError`] once,
//! where the external call returns, and flow through unchanged afterwards.

use crate::hash::Fingerprint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Classification of a [`CoreError`] for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or unreadable input, or a write without an authenticated session
    Validation,
    /// Ledger or provider unreachable, or a malformed response
    TransientNetwork,
    /// The principal rejected the signing prompt
    UserCancelled,
    /// Fee or balance rejected by the signer or the ledger
    InsufficientResource,
    /// Another principal certified the same fingerprint first
    AlreadyCertified,
    /// Anything uncategorized
    Unknown,
}

impl ErrorKind {
    /// Stable machine-readable name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::TransientNetwork => "transient_network",
            Self::UserCancelled => "user_cancelled",
            Self::InsufficientResource => "insufficient_resource",
            Self::AlreadyCertified => "already_certified",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the presentation layer should offer a retry
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork | Self::InsufficientResource)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Validation error
    #[error("Validation failed for {field}: {reason}")]
    Validation {
        /// Offending input
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Network or provider failure
    #[error("Network unavailable during {operation}: {message}")]
    TransientNetwork {
        /// Operation in progress
        operation: String,
        /// Underlying failure
        message: String,
    },

    /// Signing prompt rejected
    #[error("Signing request rejected by principal")]
    UserCancelled,

    /// Fee or balance rejected
    #[error("Insufficient resources: {message}")]
    InsufficientResource {
        /// Signer or ledger message
        message: String,
    },

    /// Lost a certification race
    #[error("Fingerprint {fingerprint} already certified")]
    AlreadyCertified {
        /// Fingerprint that was already on the ledger
        fingerprint: Fingerprint,
    },

    /// Uncategorized error
    #[error("Unexpected error: {message}")]
    Unknown {
        /// Error message
        message: String,
    },
}

impl CoreError {
    /// Shorthand for a network failure during `operation`
    #[must_use]
    pub fn network(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::TransientNetwork {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Classification of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::TransientNetwork { .. } => ErrorKind::TransientNetwork,
            Self::UserCancelled => ErrorKind::UserCancelled,
            Self::InsufficientResource { .. } => ErrorKind::InsufficientResource,
            Self::AlreadyCertified { .. } => ErrorKind::AlreadyCertified,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }
}
