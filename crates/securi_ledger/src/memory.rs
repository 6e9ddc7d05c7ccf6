//! In-memory ledger.
//!
//! A single-process stand-in for the contract with the same
//! first-writer-wins semantics. Used by tests and offline runs. It can be
//! scripted to lose a race, reject signatures, go unreachable, or hold
//! confirmations open.

use crate::confirm::ConfirmationTracker;
use crate::reader::LedgerReader;
use crate::writer::{require_authenticated, LedgerWriter, TxHandle};
use async_trait::async_trait;
use securi_core::{
    keccak256, Address, CertificationRecord, CoreError, CoreResult, Fingerprint, Lookup, Session,
    TxHash,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::debug;

/// Ledger time of the first record
const GENESIS_TIME: u64 = 1_700_000_000;

/// How the scripted signer answers the next requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningBehavior {
    /// Sign and broadcast
    #[default]
    Approve,
    /// The principal declines
    Reject,
    /// The principal cannot pay for the write
    InsufficientFunds,
}

/// Point at which a scripted rival writer certifies the same fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceStage {
    /// Rival is already recorded when the write is submitted
    Submit,
    /// Rival is mined ahead of the accepted write
    Confirmation,
}

#[derive(Debug)]
struct LedgerState {
    records: HashMap<Fingerprint, CertificationRecord>,
    pending: HashMap<TxHash, TxHandle>,
    clock: u64,
    nonce: u64,
    reachable: bool,
    signing: SigningBehavior,
    race: Option<(Address, RaceStage)>,
    hold: bool,
    write_calls: usize,
    lookups: usize,
}

impl LedgerState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Record `fingerprint` for `author` unless it already has a record
    fn insert(&mut self, fingerprint: Fingerprint, author: Address) -> CertificationRecord {
        if let Some(existing) = self.records.get(&fingerprint) {
            return *existing;
        }
        let timestamp = self.tick();
        let record = CertificationRecord::new(fingerprint, author, timestamp);
        self.records.insert(fingerprint, record);
        record
    }
}

/// Shared in-memory ledger; clones share state
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    released: Arc<Notify>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Create an empty, reachable ledger
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState {
                records: HashMap::new(),
                pending: HashMap::new(),
                clock: GENESIS_TIME,
                nonce: 0,
                reachable: true,
                signing: SigningBehavior::Approve,
                race: None,
                hold: false,
                write_calls: 0,
                lookups: 0,
            })),
            released: Arc::new(Notify::new()),
        }
    }

    /// Insert an existing record
    pub async fn seed(&self, record: CertificationRecord) {
        let mut state = self.state.write().await;
        state.clock = state.clock.max(record.timestamp);
        state.records.insert(record.fingerprint, record);
    }

    /// Make every call succeed or fail as if the network were down
    pub async fn set_reachable(&self, reachable: bool) {
        self.state.write().await.reachable = reachable;
    }

    /// Script the signer's answer
    pub async fn set_signing(&self, behavior: SigningBehavior) {
        self.state.write().await.signing = behavior;
    }

    /// Let `rival` certify the next submitted fingerprint first, at `stage`
    pub async fn race_next_submission(&self, rival: Address, stage: RaceStage) {
        self.state.write().await.race = Some((rival, stage));
    }

    /// Hold confirmations open until released with `false`
    pub async fn hold_confirmations(&self, hold: bool) {
        self.state.write().await.hold = hold;
        if !hold {
            self.released.notify_waiters();
        }
    }

    /// Submissions that reached the signer
    pub async fn write_calls(&self) -> usize {
        self.state.read().await.write_calls
    }

    /// Lookups served
    pub async fn lookup_calls(&self) -> usize {
        self.state.read().await.lookups
    }

    /// Current record for `fingerprint`
    pub async fn record(&self, fingerprint: &Fingerprint) -> Option<CertificationRecord> {
        self.state.read().await.records.get(fingerprint).copied()
    }

    fn unreachable(operation: &str) -> CoreError {
        CoreError::network(operation, "ledger unreachable")
    }
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn lookup(&self, fingerprint: &Fingerprint) -> CoreResult<Lookup> {
        let mut state = self.state.write().await;
        state.lookups += 1;
        if !state.reachable {
            return Err(Self::unreachable("lookup"));
        }
        Ok(state
            .records
            .get(fingerprint)
            .map_or(Lookup::Uncertified, |r| Lookup::Certified(*r)))
    }
}

#[async_trait]
impl LedgerWriter for MemoryLedger {
    async fn submit(&self, fingerprint: &Fingerprint, session: &Session) -> CoreResult<TxHandle> {
        let from = require_authenticated(session)?;
        let mut state = self.state.write().await;
        state.write_calls += 1;
        if !state.reachable {
            return Err(Self::unreachable("submit"));
        }
        match state.signing {
            SigningBehavior::Approve => {}
            SigningBehavior::Reject => return Err(CoreError::UserCancelled),
            SigningBehavior::InsufficientFunds => {
                return Err(CoreError::InsufficientResource {
                    message: "insufficient funds for gas * price + value".to_string(),
                });
            }
        }

        let race = state.race.take();
        if let Some((rival, RaceStage::Submit)) = race {
            state.insert(*fingerprint, rival);
        }
        if state.records.contains_key(fingerprint) {
            debug!(%fingerprint, "write rejected, fingerprint already recorded");
            return Err(CoreError::AlreadyCertified {
                fingerprint: *fingerprint,
            });
        }

        state.nonce += 1;
        let mut preimage = Vec::with_capacity(32 + 20 + 8);
        preimage.extend_from_slice(fingerprint.as_bytes());
        preimage.extend_from_slice(from.as_bytes());
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        let handle = TxHandle {
            hash: TxHash::from_bytes(keccak256(&preimage)),
            fingerprint: *fingerprint,
            from,
        };
        state.pending.insert(handle.hash, handle);

        if let Some((rival, RaceStage::Confirmation)) = race {
            state.insert(*fingerprint, rival);
        }
        debug!(%fingerprint, tx = %handle.hash, "write accepted");
        Ok(handle)
    }
}

#[async_trait]
impl ConfirmationTracker for MemoryLedger {
    async fn wait(&self, handle: &TxHandle) -> CoreResult<CertificationRecord> {
        loop {
            // Registered before the check so a release in between is not missed.
            let released = self.released.notified();
            if !self.state.read().await.hold {
                break;
            }
            released.await;
        }

        let mut state = self.state.write().await;
        if !state.reachable {
            return Err(Self::unreachable("confirmation"));
        }
        if state.pending.remove(&handle.hash).is_none() {
            return Err(CoreError::network(
                "confirmation",
                format!("transaction {} was dropped", handle.hash),
            ));
        }
        if state.records.contains_key(&handle.fingerprint) {
            return Err(CoreError::AlreadyCertified {
                fingerprint: handle.fingerprint,
            });
        }
        Ok(state.insert(handle.fingerprint, handle.from))
    }
}
