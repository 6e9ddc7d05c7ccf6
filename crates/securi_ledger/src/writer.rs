//! Certifying writes.

use crate::abi;
use crate::signer::{SigningProvider, TransactionRequest};
use async_trait::async_trait;
use securi_core::{Address, CoreError, CoreResult, Fingerprint, Principal, Session, TxHash};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A submitted certifying write, awaiting confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHandle {
    /// Transaction hash
    pub hash: TxHash,
    /// Fingerprint being certified
    pub fingerprint: Fingerprint,
    /// Submitting principal
    pub from: Address,
}

/// Submits certifying writes on behalf of an authenticated session
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Submit `certify(fingerprint)`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` without any network call if `session` is not
    /// authenticated; otherwise the classified signer or ledger failure
    async fn submit(&self, fingerprint: &Fingerprint, session: &Session) -> CoreResult<TxHandle>;
}

/// Address of the session's principal, or a validation error if it cannot write
///
/// # Errors
///
/// Returns `Validation` for anonymous sessions
pub fn require_authenticated(session: &Session) -> CoreResult<Address> {
    match session.principal() {
        Principal::Authenticated(address) => Ok(*address),
        Principal::Anonymous => Err(CoreError::Validation {
            field: "session".to_string(),
            reason: "certifying writes require an authenticated session".to_string(),
        }),
    }
}

/// Writer that routes transactions through an external signer
#[derive(Clone)]
pub struct RpcLedgerWriter {
    signer: Arc<dyn SigningProvider>,
    contract: Address,
    gas_limit: u64,
}

impl RpcLedgerWriter {
    /// Create a writer
    #[must_use]
    pub fn new(signer: Arc<dyn SigningProvider>, contract: Address, gas_limit: u64) -> Self {
        Self {
            signer,
            contract,
            gas_limit,
        }
    }
}

#[async_trait]
impl LedgerWriter for RpcLedgerWriter {
    async fn submit(&self, fingerprint: &Fingerprint, session: &Session) -> CoreResult<TxHandle> {
        let from = require_authenticated(session)?;
        let tx = TransactionRequest {
            from,
            to: self.contract,
            data: abi::encode_certify(fingerprint),
            gas_limit: self.gas_limit,
            fingerprint: *fingerprint,
        };

        info!(%fingerprint, %from, gas_limit = self.gas_limit, "requesting signature for certification");
        let hash = self.signer.send_transaction(&tx).await?;
        info!(%fingerprint, tx = %hash, "certification submitted");

        Ok(TxHandle {
            hash,
            fingerprint: *fingerprint,
            from,
        })
    }
}
