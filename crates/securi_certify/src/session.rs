//! Session context: the principal plus the ledger access path it uses.

use securi_core::{Address, CoreError, CoreResult, Principal, Session, SessionMode};
use securi_ledger::{
    ConfirmationTracker, JsonRpcClient, LedgerConfig, LedgerReader, LedgerWriter, MemoryLedger,
    RpcConfirmationTracker, RpcLedgerReader, RpcLedgerWriter, RpcSigningProvider, SigningProvider,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

/// Write path of an authenticated session
#[derive(Clone)]
pub struct WritePath {
    /// Submits certifying writes
    pub writer: Arc<dyn LedgerWriter>,
    /// Waits for submitted writes
    pub tracker: Arc<dyn ConfirmationTracker>,
}

/// A session together with the clients it reads and writes through.
///
/// Clones share the signing slot: while one holder has a submission in
/// flight, every other holder is refused a new one.
#[derive(Clone)]
pub struct SessionContext {
    session: Session,
    reader: Arc<dyn LedgerReader>,
    writes: Option<WritePath>,
    signing_slot: Arc<Semaphore>,
}

impl SessionContext {
    /// Read-only session over `reader`
    #[must_use]
    pub fn anonymous(reader: Arc<dyn LedgerReader>) -> Self {
        Self {
            session: Session::anonymous(),
            reader,
            writes: None,
            signing_slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Session for `address`, reading through `reader` and writing through `writes`
    #[must_use]
    pub fn authenticated(address: Address, reader: Arc<dyn LedgerReader>, writes: WritePath) -> Self {
        Self {
            session: Session::new(Principal::Authenticated(address)),
            reader,
            writes: Some(writes),
            signing_slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Anonymous session over the configured public endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn public(config: &LedgerConfig) -> CoreResult<Self> {
        let reader = RpcLedgerReader::public(config)?;
        info!(endpoint = %reader.endpoint(), "anonymous session");
        Ok(Self::anonymous(Arc::new(reader)))
    }

    /// Open a signing session through `signer`.
    ///
    /// Moves the signer onto the configured chain, asks the principal for an
    /// account, and routes reads and confirmation polls through the signer's
    /// own endpoint, bounded by the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `UserCancelled` if the principal declines, or the classified
    /// failure of switching networks
    pub async fn connect(signer: Arc<RpcSigningProvider>, config: &LedgerConfig) -> CoreResult<Self> {
        signer.ensure_network(&config.chain).await?;
        let address = signer.request_session().await?;

        let rpc = JsonRpcClient::new(signer.rpc().url(), config.request_timeout())
            .map_err(|e| CoreError::network("connect", e))?;
        let reader = Arc::new(RpcLedgerReader::new(rpc.clone(), config.contract));
        let writes = WritePath {
            writer: Arc::new(RpcLedgerWriter::new(signer, config.contract, config.gas_limit)),
            tracker: Arc::new(RpcConfirmationTracker::from_config(rpc, config)),
        };
        info!(%address, chain = %config.chain.name, "authenticated session");
        Ok(Self::authenticated(address, reader, writes))
    }

    /// Session backed by an in-memory ledger
    #[must_use]
    pub fn in_memory(ledger: &MemoryLedger, principal: Principal) -> Self {
        let reader = Arc::new(ledger.clone());
        match principal {
            Principal::Authenticated(address) => Self::authenticated(
                address,
                reader,
                WritePath {
                    writer: Arc::new(ledger.clone()),
                    tracker: Arc::new(ledger.clone()),
                },
            ),
            Principal::Anonymous => Self::anonymous(reader),
        }
    }

    /// The session
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Access mode
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.session.mode()
    }

    /// Lookup client
    #[must_use]
    pub fn reader(&self) -> &Arc<dyn LedgerReader> {
        &self.reader
    }

    /// Write path, present only for authenticated sessions
    #[must_use]
    pub fn writes(&self) -> Option<&WritePath> {
        self.writes.as_ref()
    }

    /// Whether some holder of this session has an attempt in flight
    #[must_use]
    pub fn submission_pending(&self) -> bool {
        self.signing_slot.available_permits() == 0
    }

    /// Take the session's signing slot for the duration of one attempt
    ///
    /// # Errors
    ///
    /// Returns `Validation` if another attempt holds it
    pub fn reserve_signing(&self) -> CoreResult<OwnedSemaphorePermit> {
        Arc::clone(&self.signing_slot)
            .try_acquire_owned()
            .map_err(|_| CoreError::Validation {
                field: "session".to_string(),
                reason: "a submission is already pending for this session".to_string(),
            })
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("session", &self.session)
            .field("writable", &self.writes.is_some())
            .field("submission_pending", &self.submission_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securi_core::ErrorKind;

    #[test]
    fn test_in_memory_modes() {
        let ledger = MemoryLedger::new();
        let anon = SessionContext::in_memory(&ledger, Principal::Anonymous);
        assert_eq!(anon.mode(), SessionMode::Anonymous);
        assert!(anon.writes().is_none());

        let address = Address::from_bytes([7; 20]);
        let auth = SessionContext::in_memory(&ledger, Principal::Authenticated(address));
        assert_eq!(auth.mode(), SessionMode::Authenticated);
        assert_eq!(auth.session().principal().address(), Some(address));
        assert!(auth.writes().is_some());
    }

    #[test]
    fn test_signing_slot_shared_by_clones() {
        let ledger = MemoryLedger::new();
        let ctx = SessionContext::in_memory(&ledger, Principal::Authenticated(Address::from_bytes([7; 20])));
        let other = ctx.clone();

        let permit = ctx.reserve_signing().unwrap();
        assert!(other.submission_pending());
        let err = other.reserve_signing().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        drop(permit);
        assert!(!other.submission_pending());
        assert!(other.reserve_signing().is_ok());
    }

    #[test]
    fn test_public_session() {
        let ctx = SessionContext::public(&LedgerConfig::default()).unwrap();
        assert_eq!(ctx.mode(), SessionMode::Anonymous);
        assert!(!ctx.submission_pending());
    }
}
