//! Ledger addresses and principals.

use crate::hash::keccak256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 20-byte ledger account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The number of bytes in an address
    pub const LEN: usize = 20;

    /// The all-zero address
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse from hex, with or without the `0x` prefix. Case is ignored.
    ///
    /// # Errors
    ///
    /// Returns error if hex is invalid or not 20 bytes
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| AddressError::InvalidHex)?;
        if bytes.len() != Self::LEN {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Lowercase `0x`-prefixed hex, the form JSON-RPC endpoints expect
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Mixed-case checksum encoding (EIP-55)
    #[must_use]
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                digest[i / 2] >> 4
            } else {
                digest[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Abbreviated checksum form, e.g. `0x5aAe...eAed`
    #[must_use]
    pub fn short(&self) -> String {
        let full = self.to_checksum();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Address parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Invalid hex encoding
    #[error("Invalid address hex")]
    InvalidHex,
    /// Invalid length (not 20 bytes)
    #[error("Invalid address length: {0} (expected 20)")]
    InvalidLength(usize),
}

/// An identity that can observe the ledger, and possibly write to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "address", rename_all = "snake_case")]
pub enum Principal {
    /// Bound to an external signing session; capable of writes
    Authenticated(Address),
    /// Read-only observer
    Anonymous,
}

impl Principal {
    /// Sentinel identity of the anonymous observer
    pub const ANONYMOUS_IDENTITY: &'static str = "anonymous";

    /// Opaque identity string
    #[must_use]
    pub fn identity(&self) -> String {
        match self {
            Self::Authenticated(address) => address.to_checksum(),
            Self::Anonymous => Self::ANONYMOUS_IDENTITY.to_string(),
        }
    }

    /// Ledger address of an authenticated principal
    #[must_use]
    pub const fn address(&self) -> Option<Address> {
        match self {
            Self::Authenticated(address) => Some(*address),
            Self::Anonymous => None,
        }
    }

    /// Whether this principal may submit certifying writes
    #[must_use]
    pub const fn can_write(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}
