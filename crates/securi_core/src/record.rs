//! Certification records as stored on the ledger.

use crate::address::Address;
use crate::hash::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The immutable (fingerprint, author, timestamp) tuple stored once per fingerprint.
///
/// Records are created by the ledger; clients only hold read-only copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificationRecord {
    /// Certified content fingerprint
    pub fingerprint: Fingerprint,
    /// Principal that certified the content
    pub author: Address,
    /// Ledger-assigned time, in seconds since the Unix epoch
    pub timestamp: u64,
}

impl CertificationRecord {
    /// Create a record copy
    #[must_use]
    pub const fn new(fingerprint: Fingerprint, author: Address, timestamp: u64) -> Self {
        Self {
            fingerprint,
            author,
            timestamp,
        }
    }

    /// Ledger time as a UTC date-time.
    ///
    /// `None` if the timestamp is outside chrono's representable range.
    #[must_use]
    pub fn certified_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Result of a ledger existence lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lookup {
    /// A record exists for the fingerprint
    Certified(CertificationRecord),
    /// No record exists for the fingerprint
    Uncertified,
}

impl Lookup {
    /// Whether a record exists
    #[must_use]
    pub const fn exists(&self) -> bool {
        matches!(self, Self::Certified(_))
    }

    /// Author of the existing record
    #[must_use]
    pub const fn author(&self) -> Option<Address> {
        match self {
            Self::Certified(record) => Some(record.author),
            Self::Uncertified => None,
        }
    }

    /// Ledger time of the existing record
    #[must_use]
    pub const fn timestamp(&self) -> Option<u64> {
        match self {
            Self::Certified(record) => Some(record.timestamp),
            Self::Uncertified => None,
        }
    }

    /// The existing record, if any
    #[must_use]
    pub const fn record(&self) -> Option<&CertificationRecord> {
        match self {
            Self::Certified(record) => Some(record),
            Self::Uncertified => None,
        }
    }
}
