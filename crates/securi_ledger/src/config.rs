//! Ledger client configuration.

use securi_core::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Deployed certification contract on Polygon Amoy
pub const DEFAULT_CONTRACT: Address = Address::from_bytes([
    0xbb, 0xf0, 0xb1, 0x9e, 0x33, 0xcc, 0xae, 0xe7, 0x77, 0xc9, 0xb8, 0xe2, 0xc2, 0xf9, 0x90,
    0x62, 0xe0, 0x72, 0x18, 0xf8,
]);

/// Public read endpoint used by anonymous sessions
pub const DEFAULT_PUBLIC_RPC: &str = "https://polygon-amoy.drpc.org";

/// Gas ceiling for a certifying write
pub const DEFAULT_GAS_LIMIT: u64 = 2_000_000;

/// Native currency of a chain, as announced to a signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Currency name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
}

/// Parameters of the target chain, used to switch or provision the signer's network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Chain ID
    pub chain_id: u64,
    /// Human-readable name
    pub name: String,
    /// RPC endpoints offered to the signer when provisioning
    pub rpc_urls: Vec<String>,
    /// Native currency
    pub currency: NativeCurrency,
    /// Block explorers
    pub explorer_urls: Vec<String>,
}

impl ChainParams {
    /// Polygon Amoy testnet
    #[must_use]
    pub fn polygon_amoy() -> Self {
        Self {
            chain_id: 80_002,
            name: "Polygon Amoy Testnet".to_string(),
            rpc_urls: vec!["https://rpc-amoy.polygon.technology/".to_string()],
            currency: NativeCurrency {
                name: "POL".to_string(),
                symbol: "POL".to_string(),
                decimals: 18,
            },
            explorer_urls: vec!["https://amoy.polygonscan.com/".to_string()],
        }
    }

    /// Chain ID as a JSON-RPC quantity, e.g. `0x13882`
    #[must_use]
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::polygon_amoy()
    }
}

/// Configuration for the ledger client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Certification contract address
    pub contract: Address,
    /// Public read endpoint for anonymous sessions
    pub public_rpc_url: String,
    /// Target chain
    pub chain: ChainParams,
    /// Gas ceiling for certifying writes
    pub gas_limit: u64,
    /// Blocks that must include the write before it counts as confirmed (1 = inclusion)
    pub confirmations: u64,
    /// Receipt polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Consecutive polls a transaction may be unknown to the node before it counts as dropped
    pub drop_grace_polls: u32,
    /// Revert reason fragments meaning "fingerprint already certified" (case-insensitive)
    pub already_certified_markers: Vec<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract: DEFAULT_CONTRACT,
            public_rpc_url: DEFAULT_PUBLIC_RPC.to_string(),
            chain: ChainParams::polygon_amoy(),
            gas_limit: DEFAULT_GAS_LIMIT,
            confirmations: 1,
            poll_interval_ms: 2_000,
            request_timeout_secs: 15,
            drop_grace_polls: 30,
            already_certified_markers: vec![
                "already certified".to_string(),
                "already exists".to_string(),
                "already registered".to_string(),
                "ya certificada".to_string(),
                "ya existe".to_string(),
                "ya registrada".to_string(),
            ],
        }
    }
}

impl LedgerConfig {
    /// Load from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or fails validation
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config: Self =
            serde_json::from_str(&json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns error naming the first invalid field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "gas_limit",
                reason: "must be positive".to_string(),
            });
        }
        if self.confirmations == 0 {
            return Err(ConfigError::Invalid {
                field: "confirmations",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.public_rpc_url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "public_rpc_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Receipt polling interval
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-request timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config: {0}")]
    Io(String),
    /// File is not valid configuration JSON
    #[error("cannot parse config: {0}")]
    Parse(String),
    /// A field has an unusable value
    #[error("invalid config field {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it is invalid
        reason: String,
    },
}
