//! Confirmation tracking for submitted writes.
//!
//! A write is confirmed once its receipt is buried under the configured
//! number of blocks. The tracker polls the node; it does not retry failed
//! polls, so a mid-wait RPC failure ends the wait.

use crate::abi;
use crate::classify::ErrorClassifier;
use crate::config::LedgerConfig;
use crate::rpc::{self, JsonRpcClient, RpcError};
use crate::writer::TxHandle;
use async_trait::async_trait;
use securi_core::{Address, CertificationRecord, CoreError, CoreResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Waits until a submitted write reaches the finality threshold
#[async_trait]
pub trait ConfirmationTracker: Send + Sync {
    /// Wait for `handle` to be confirmed and return the resulting record.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCertified` if the write reverted because another
    /// principal won the race, `TransientNetwork` if the wait fails or the
    /// transaction is dropped
    async fn wait(&self, handle: &TxHandle) -> CoreResult<CertificationRecord>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    #[serde(default)]
    status: Option<String>,
    block_number: Option<String>,
    #[serde(default)]
    logs: Vec<Log>,
}

#[derive(Debug, Deserialize)]
struct Log {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct Block {
    timestamp: String,
}

/// Tracker that polls a JSON-RPC endpoint
#[derive(Clone)]
pub struct RpcConfirmationTracker {
    rpc: JsonRpcClient,
    contract: Address,
    confirmations: u64,
    poll_interval: Duration,
    drop_grace_polls: u32,
    classifier: ErrorClassifier,
}

impl RpcConfirmationTracker {
    /// Create a tracker. `confirmations` is clamped to at least one block.
    #[must_use]
    pub fn new(
        rpc: JsonRpcClient,
        contract: Address,
        confirmations: u64,
        poll_interval: Duration,
        drop_grace_polls: u32,
        classifier: ErrorClassifier,
    ) -> Self {
        Self {
            rpc,
            contract,
            confirmations: confirmations.max(1),
            poll_interval,
            drop_grace_polls,
            classifier,
        }
    }

    /// Tracker configured from `config`, polling through `rpc`
    #[must_use]
    pub fn from_config(rpc: JsonRpcClient, config: &LedgerConfig) -> Self {
        Self::new(
            rpc,
            config.contract,
            config.confirmations,
            config.poll_interval(),
            config.drop_grace_polls,
            ErrorClassifier::new(&config.already_certified_markers),
        )
    }

    async fn receipt(&self, handle: &TxHandle) -> Result<Option<Receipt>, RpcError> {
        self.rpc
            .request("eth_getTransactionReceipt", json!([handle.hash.to_hex()]))
            .await
    }

    async fn is_known(&self, handle: &TxHandle) -> Result<bool, RpcError> {
        let tx: Option<Value> = self
            .rpc
            .request("eth_getTransactionByHash", json!([handle.hash.to_hex()]))
            .await?;
        Ok(tx.is_some())
    }

    async fn head(&self) -> Result<u64, RpcError> {
        let raw: String = self.rpc.request("eth_blockNumber", json!([])).await?;
        rpc::parse_quantity(&raw)
    }

    /// Re-run the reverted call at its block to recover the revert reason
    async fn replay(&self, handle: &TxHandle, block: &str) -> Result<String, RpcError> {
        let call = json!({
            "from": handle.from.to_hex(),
            "to": self.contract.to_hex(),
            "data": abi::to_hex_data(&abi::encode_certify(&handle.fingerprint)),
        });
        self.rpc.request("eth_call", json!([call, block])).await
    }

    async fn block_timestamp(&self, block: &str) -> Result<u64, RpcError> {
        let block: Option<Block> = self
            .rpc
            .request("eth_getBlockByNumber", json!([block, false]))
            .await?;
        let block = block.ok_or_else(|| RpcError::Malformed("receipt block not found".to_string()))?;
        rpc::parse_quantity(&block.timestamp)
    }

    /// Record from the contract's event, or from the block time if the
    /// receipt carries no matching log
    async fn record(&self, handle: &TxHandle, receipt: &Receipt, block: &str) -> Result<CertificationRecord, RpcError> {
        let contract = self.contract.to_hex();
        for log in &receipt.logs {
            if !log.address.eq_ignore_ascii_case(&contract) {
                continue;
            }
            let topics = log
                .topics
                .iter()
                .map(|t| abi::topic_from_hex(t))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| RpcError::Malformed(e.to_string()))?;
            let data = abi::from_hex_data(&log.data).map_err(|e| RpcError::Malformed(e.to_string()))?;
            let event = abi::decode_certified_event(&topics, &data).map_err(|e| RpcError::Malformed(e.to_string()))?;
            if let Some(record) = event.filter(|r| r.fingerprint == handle.fingerprint) {
                return Ok(CertificationRecord::new(record.fingerprint, handle.from, record.timestamp));
            }
        }

        debug!(tx = %handle.hash, "no certification event in receipt, using block time");
        let timestamp = self.block_timestamp(block).await?;
        Ok(CertificationRecord::new(handle.fingerprint, handle.from, timestamp))
    }
}

#[async_trait]
impl ConfirmationTracker for RpcConfirmationTracker {
    async fn wait(&self, handle: &TxHandle) -> CoreResult<CertificationRecord> {
        let network = |e: RpcError| self.classifier.classify_read("confirmation", e);
        let mut unknown_polls = 0u32;

        loop {
            match self.receipt(handle).await.map_err(network)? {
                None => {
                    if self.is_known(handle).await.map_err(network)? {
                        unknown_polls = 0;
                    } else {
                        unknown_polls += 1;
                        if unknown_polls > self.drop_grace_polls {
                            warn!(tx = %handle.hash, polls = unknown_polls, "transaction dropped");
                            return Err(CoreError::network(
                                "confirmation",
                                format!("transaction {} was dropped", handle.hash),
                            ));
                        }
                    }
                    debug!(tx = %handle.hash, "awaiting inclusion");
                }
                Some(receipt) => {
                    let block = receipt
                        .block_number
                        .clone()
                        .ok_or_else(|| network(RpcError::Malformed("receipt without block".to_string())))?;

                    if receipt.status.as_deref() == Some("0x0") {
                        warn!(tx = %handle.hash, block = %block, "certification reverted");
                        return Err(self
                            .classifier
                            .classify_revert(&handle.fingerprint, self.replay(handle, &block).await));
                    }

                    let included = rpc::parse_quantity(&block).map_err(network)?;
                    let head = self.head().await.map_err(network)?;
                    let depth = head.saturating_sub(included) + 1;
                    if depth >= self.confirmations {
                        let record = self.record(handle, &receipt, &block).await.map_err(network)?;
                        info!(
                            tx = %handle.hash,
                            fingerprint = %record.fingerprint,
                            block = included,
                            depth,
                            "certification confirmed"
                        );
                        return Ok(record);
                    }
                    debug!(tx = %handle.hash, depth, required = self.confirmations, "awaiting depth");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
