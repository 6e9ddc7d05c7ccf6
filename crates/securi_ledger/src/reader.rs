//! Read-only ledger lookups.

use crate::abi;
use crate::classify::ErrorClassifier;
use crate::config::LedgerConfig;
use crate::rpc::{JsonRpcClient, RpcError};
use async_trait::async_trait;
use securi_core::{Address, CoreError, CoreResult, Fingerprint, Lookup};
use serde_json::json;
use tracing::debug;

/// Existence and ownership lookup against the ledger
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Look up the record for `fingerprint`.
    ///
    /// A failure never means "uncertified": callers must treat any error as
    /// "unknown".
    ///
    /// # Errors
    ///
    /// Returns `TransientNetwork` if the ledger cannot be reached or answers
    /// with something other than a well-formed lookup result
    async fn lookup(&self, fingerprint: &Fingerprint) -> CoreResult<Lookup>;
}

/// Lookup through `eth_call` on a JSON-RPC endpoint
#[derive(Clone)]
pub struct RpcLedgerReader {
    rpc: JsonRpcClient,
    contract: Address,
    classifier: ErrorClassifier,
}

impl RpcLedgerReader {
    /// Create a reader for `contract` over `rpc`
    #[must_use]
    pub fn new(rpc: JsonRpcClient, contract: Address) -> Self {
        Self {
            rpc,
            contract,
            classifier: ErrorClassifier::new(Vec::<String>::new()),
        }
    }

    /// Reader over the configured public endpoint, for anonymous sessions
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn public(config: &LedgerConfig) -> CoreResult<Self> {
        let rpc = JsonRpcClient::new(config.public_rpc_url.clone(), config.request_timeout())
            .map_err(|e| CoreError::network("connect", e))?;
        Ok(Self::new(rpc, config.contract))
    }

    /// Endpoint this reader queries
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.rpc.url()
    }
}

#[async_trait]
impl LedgerReader for RpcLedgerReader {
    async fn lookup(&self, fingerprint: &Fingerprint) -> CoreResult<Lookup> {
        let call = json!({
            "to": self.contract.to_hex(),
            "data": abi::to_hex_data(&abi::encode_verify(fingerprint)),
        });
        let raw: String = self
            .rpc
            .request("eth_call", json!([call, "latest"]))
            .await
            .map_err(|e| self.classifier.classify_read("lookup", e))?;

        let bytes = abi::from_hex_data(&raw)
            .map_err(|e| self.classifier.classify_read("lookup", RpcError::Malformed(e.to_string())))?;
        let lookup = abi::decode_verify(fingerprint, &bytes)
            .map_err(|e| self.classifier.classify_read("lookup", RpcError::Malformed(e.to_string())))?;

        debug!(%fingerprint, exists = lookup.exists(), endpoint = %self.rpc.url(), "ledger lookup");
        Ok(lookup)
    }
}
