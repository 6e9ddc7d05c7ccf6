//! External signing principal.
//!
//! Private keys never enter this process. A signer is any endpoint that
//! speaks the wallet JSON-RPC methods (`eth_requestAccounts`,
//! `wallet_switchEthereumChain`, `wallet_addEthereumChain`,
//! `eth_sendTransaction`) and asks its owner to approve each request.

use crate::abi;
use crate::classify::{ErrorClassifier, UNRECOGNIZED_CHAIN};
use crate::config::ChainParams;
use crate::rpc::{self, JsonRpcClient, RpcError};
use async_trait::async_trait;
use securi_core::{Address, CoreError, CoreResult, Fingerprint, TxHash};
use serde_json::json;
use tracing::{debug, info};

/// A transaction for the signer to approve and broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Sending principal
    pub from: Address,
    /// Contract address
    pub to: Address,
    /// Calldata
    pub data: Vec<u8>,
    /// Gas ceiling
    pub gas_limit: u64,
    /// Fingerprint being certified, for error classification
    pub fingerprint: Fingerprint,
}

/// The identity/provider collaborator that owns the keys
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// Ask the principal to open a signing session
    ///
    /// # Errors
    ///
    /// Returns `UserCancelled` if the principal declines
    async fn request_session(&self) -> CoreResult<Address>;

    /// Make sure the signer is on `chain`, provisioning it if unknown
    ///
    /// # Errors
    ///
    /// Returns error if the signer cannot be switched to the chain
    async fn ensure_network(&self, chain: &ChainParams) -> CoreResult<()>;

    /// Ask the principal to sign and broadcast `tx`. Blocks until the
    /// principal approves or rejects; no client-side timeout applies.
    ///
    /// # Errors
    ///
    /// Returns the classified signer or ledger failure
    async fn send_transaction(&self, tx: &TransactionRequest) -> CoreResult<TxHash>;
}

/// Signer reached over JSON-RPC
#[derive(Clone)]
pub struct RpcSigningProvider {
    rpc: JsonRpcClient,
    classifier: ErrorClassifier,
}

impl RpcSigningProvider {
    /// Create a signer client
    #[must_use]
    pub fn new(rpc: JsonRpcClient, classifier: ErrorClassifier) -> Self {
        Self { rpc, classifier }
    }

    /// The signer's own endpoint, also used for authenticated reads
    #[must_use]
    pub fn rpc(&self) -> &JsonRpcClient {
        &self.rpc
    }

    async fn switch_chain(&self, chain: &ChainParams) -> Result<(), RpcError> {
        self.rpc
            .request::<serde_json::Value>(
                "wallet_switchEthereumChain",
                json!([{ "chainId": chain.chain_id_hex() }]),
            )
            .await
            .map(|_| ())
    }

    async fn add_chain(&self, chain: &ChainParams) -> Result<(), RpcError> {
        let params = json!([{
            "chainId": chain.chain_id_hex(),
            "chainName": chain.name,
            "rpcUrls": chain.rpc_urls,
            "nativeCurrency": {
                "name": chain.currency.name,
                "symbol": chain.currency.symbol,
                "decimals": chain.currency.decimals,
            },
            "blockExplorerUrls": chain.explorer_urls,
        }]);
        self.rpc
            .request::<serde_json::Value>("wallet_addEthereumChain", params)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SigningProvider for RpcSigningProvider {
    async fn request_session(&self) -> CoreResult<Address> {
        let accounts: Vec<String> = self
            .rpc
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(|e| self.classifier.classify_session(e))?;

        let first = accounts.first().ok_or_else(|| CoreError::Validation {
            field: "session".to_string(),
            reason: "signer exposed no accounts".to_string(),
        })?;
        let address = Address::from_hex(first)
            .map_err(|e| CoreError::network("session", RpcError::Malformed(e.to_string())))?;
        info!(%address, "signing session established");
        Ok(address)
    }

    async fn ensure_network(&self, chain: &ChainParams) -> CoreResult<()> {
        let current: String = self
            .rpc
            .request("eth_chainId", json!([]))
            .await
            .map_err(|e| self.classifier.classify_session(e))?;
        if rpc::parse_quantity(&current).map_err(|e| self.classifier.classify_session(e))? == chain.chain_id {
            return Ok(());
        }

        match self.switch_chain(chain).await {
            Ok(()) => {}
            Err(RpcError::Rpc { code, .. }) if code == UNRECOGNIZED_CHAIN => {
                info!(chain_id = chain.chain_id, name = %chain.name, "provisioning network on signer");
                self.add_chain(chain).await.map_err(|e| self.classifier.classify_session(e))?;
                self.switch_chain(chain).await.map_err(|e| self.classifier.classify_session(e))?;
            }
            Err(e) => return Err(self.classifier.classify_session(e)),
        }
        debug!(chain_id = chain.chain_id, "signer on target network");
        Ok(())
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> CoreResult<TxHash> {
        let params = json!([{
            "from": tx.from.to_hex(),
            "to": tx.to.to_hex(),
            "data": abi::to_hex_data(&tx.data),
            "gas": rpc::to_quantity(tx.gas_limit),
        }]);
        let raw: String = self
            .rpc
            .request("eth_sendTransaction", params)
            .await
            .map_err(|e| self.classifier.classify_write("submit", &tx.fingerprint, e))?;

        TxHash::from_hex(&raw).map_err(|e| {
            CoreError::network("submit", RpcError::Malformed(format!("transaction hash: {}", e)))
        })
    }
}
