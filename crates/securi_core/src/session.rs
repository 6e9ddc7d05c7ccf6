//! Sessions: who is acting, and whether they may write.

use crate::address::Principal;
use serde::{Deserialize, Serialize};

/// Access mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Signing session established; reads go through the signer's provider
    Authenticated,
    /// Public observer; reads go through the public endpoint
    Anonymous,
}

/// The current principal and its access mode.
///
/// The mode is derived from the principal so the two never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    principal: Principal,
}

impl Session {
    /// Session for a principal
    #[must_use]
    pub const fn new(principal: Principal) -> Self {
        Self { principal }
    }

    /// Public, read-only session
    #[must_use]
    pub const fn anonymous() -> Self {
        Self::new(Principal::Anonymous)
    }

    /// Current principal
    #[must_use]
    pub const fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Access mode
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        match self.principal {
            Principal::Authenticated(_) => SessionMode::Authenticated,
            Principal::Anonymous => SessionMode::Anonymous,
        }
    }

    /// Whether the session may submit certifying writes
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.mode(), SessionMode::Authenticated)
    }
}
