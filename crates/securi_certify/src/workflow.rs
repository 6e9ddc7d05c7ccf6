//! The certification workflow.
//!
//! One attempt runs a selected file to a terminal state:
//!
//! ```text
//! Idle -> Hashing -> LookingUp -> Exists
//!                             \-> NotFound                       (anonymous)
//!                             \-> Certifying -> Confirming -> Certified
//! ```
//!
//! Any error ends in `Failed`, except a lost race (`AlreadyCertified`), which
//! forces one more lookup so the winner's record is shown. Abandoning an
//! attempt while it waits on the ledger returns the workflow to `Idle`.

use crate::progress::{ProgressListener, Transition};
use crate::session::{SessionContext, WritePath};
use crate::state::WorkflowState;
use securi_core::{
    CertificationRecord, CoreError, CoreResult, ErrorKind, Fingerprint, Lookup, Session,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Workflow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Upper bound on a single ledger lookup, in seconds
    pub lookup_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_secs: 15,
        }
    }
}

impl WorkflowConfig {
    /// Lookup timeout
    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

/// What an attempt hashes
#[derive(Clone, Copy)]
enum Input<'a> {
    Bytes(&'a [u8]),
    Path(&'a Path),
}

/// How a suspended step ended
enum Step<T> {
    Done(T),
    Abandoned,
}

/// Read and fingerprint a file off the async worker threads.
///
/// # Errors
///
/// Returns `Validation` if the file cannot be read or is empty.
pub async fn fingerprint_file(path: impl AsRef<Path>) -> CoreResult<Fingerprint> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || Fingerprint::from_file(path))
        .await
        .map_err(|e| CoreError::Unknown {
            message: format!("hashing task failed: {}", e),
        })?
}

/// Sequences hashing, lookup, submission and confirmation for one session
pub struct CertificationWorkflow {
    config: WorkflowConfig,
    context: Option<SessionContext>,
    state: WorkflowState,
    listeners: Vec<Box<dyn ProgressListener>>,
    abandon: CancellationToken,
    attempt: Uuid,
}

impl CertificationWorkflow {
    /// Workflow bound to `context`, with default configuration
    #[must_use]
    pub fn new(context: SessionContext) -> Self {
        Self::with_config(context, WorkflowConfig::default())
    }

    /// Workflow bound to `context`
    #[must_use]
    pub fn with_config(context: SessionContext, config: WorkflowConfig) -> Self {
        Self {
            config,
            context: Some(context),
            state: WorkflowState::Idle,
            listeners: Vec::new(),
            abandon: CancellationToken::new(),
            attempt: Uuid::nil(),
        }
    }

    /// Register a listener for every subsequent transition
    pub fn add_listener(&mut self, listener: impl ProgressListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Current session, if logged in
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.context.as_ref().map(SessionContext::session)
    }

    /// Current session context, if logged in
    #[must_use]
    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    /// Identifier of the current or last attempt
    #[must_use]
    pub fn attempt(&self) -> Uuid {
        self.attempt
    }

    /// Token that abandons the running attempt, or the next one if none is
    /// running. A token is spent once it abandons an attempt; take a new
    /// handle for each attempt. Cancelling it never withdraws a write
    /// already submitted.
    #[must_use]
    pub fn abandon_handle(&self) -> CancellationToken {
        self.abandon.clone()
    }

    /// Attach a new session, resetting the workflow
    pub fn login(&mut self, context: SessionContext) {
        info!(principal = %context.session().principal(), "session attached");
        self.context = Some(context);
        self.reset();
    }

    /// Destroy the session. Outstanding abandon handles fire and the
    /// workflow returns to `Idle`; submissions are rejected until `login`.
    pub fn logout(&mut self) {
        if let Some(context) = self.context.take() {
            info!(principal = %context.session().principal(), "session destroyed");
        }
        self.abandon.cancel();
        self.renew_abandon();
        self.reset();
    }

    /// Discard the last attempt's fingerprint, record or error, keeping the session
    pub fn start_over(&mut self) {
        self.reset();
    }

    /// Run one attempt over `bytes` to a terminal state, or to `Idle` if abandoned.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, leaving the state untouched, if no session is
    /// attached or another attempt holds the session's signing slot. Every
    /// other failure is reported as `WorkflowState::Failed`.
    pub async fn submit_file(&mut self, bytes: &[u8]) -> CoreResult<&WorkflowState> {
        self.submit(Input::Bytes(bytes)).await
    }

    /// Run one attempt over the file at `path`; see [`Self::submit_file`]
    ///
    /// # Errors
    ///
    /// Same as [`Self::submit_file`]. An unreadable file fails the attempt
    /// with `Validation`.
    pub async fn submit_path(&mut self, path: impl AsRef<Path>) -> CoreResult<&WorkflowState> {
        self.submit(Input::Path(path.as_ref())).await
    }

    async fn submit(&mut self, input: Input<'_>) -> CoreResult<&WorkflowState> {
        let context = self.context.clone().ok_or_else(|| CoreError::Validation {
            field: "session".to_string(),
            reason: "no active session".to_string(),
        })?;
        let _slot = context.reserve_signing()?;

        self.reset();
        self.attempt = Uuid::new_v4();

        let span = info_span!("attempt", id = %self.attempt, mode = ?context.mode());
        self.run(&context, input).instrument(span).await;
        Ok(&self.state)
    }

    async fn run(&mut self, context: &SessionContext, input: Input<'_>) {
        let token = self.abandon.clone();

        self.transition(WorkflowState::Hashing);
        let computed = match input {
            Input::Bytes(bytes) => Fingerprint::compute(bytes),
            Input::Path(path) => fingerprint_file(path).await,
        };
        let fingerprint = match computed {
            Ok(fingerprint) => fingerprint,
            Err(e) => return self.fail(None, e),
        };

        let mut lost_race = false;
        loop {
            self.transition(WorkflowState::LookingUp { fingerprint });
            let lookup = match self.lookup(context, &fingerprint, &token).await {
                Ok(Step::Done(lookup)) => lookup,
                Ok(Step::Abandoned) => return self.abandoned(),
                Err(e) => return self.fail(Some(fingerprint), e),
            };

            if let Lookup::Certified(record) = lookup {
                info!(%fingerprint, author = %record.author, timestamp = record.timestamp, "already certified");
                return self.transition(WorkflowState::Exists { record });
            }
            if lost_race {
                // The ledger rejected our write as a duplicate but the node
                // still reports no record.
                let e = CoreError::network("lookup", "ledger has not caught up with the winning certification");
                return self.fail(Some(fingerprint), e);
            }
            let Some(writes) = context.writes() else {
                info!(%fingerprint, "not certified");
                return self.transition(WorkflowState::NotFound { fingerprint });
            };

            match self.certify(context, writes, &fingerprint, &token).await {
                Ok(Step::Done(record)) => {
                    info!(%fingerprint, author = %record.author, timestamp = record.timestamp, "certified");
                    return self.transition(WorkflowState::Certified { record });
                }
                Ok(Step::Abandoned) => return self.abandoned(),
                Err(CoreError::AlreadyCertified { .. }) => {
                    warn!(%fingerprint, "lost certification race, re-querying ledger");
                    lost_race = true;
                }
                Err(e) => return self.fail(Some(fingerprint), e),
            }
        }
    }

    async fn lookup(
        &self,
        context: &SessionContext,
        fingerprint: &Fingerprint,
        token: &CancellationToken,
    ) -> CoreResult<Step<Lookup>> {
        let timeout = self.config.lookup_timeout();
        tokio::select! {
            biased;
            () = token.cancelled() => Ok(Step::Abandoned),
            result = tokio::time::timeout(timeout, context.reader().lookup(fingerprint)) => match result {
                Ok(lookup) => lookup.map(Step::Done),
                Err(_) => Err(CoreError::network(
                    "lookup",
                    format!("no answer within {}s", timeout.as_secs()),
                )),
            },
        }
    }

    async fn certify(
        &mut self,
        context: &SessionContext,
        writes: &WritePath,
        fingerprint: &Fingerprint,
        token: &CancellationToken,
    ) -> CoreResult<Step<CertificationRecord>> {
        self.transition(WorkflowState::Certifying {
            fingerprint: *fingerprint,
        });
        // The signing prompt is owned by the principal and not cancellable here.
        let tx = writes.writer.submit(fingerprint, context.session()).await?;

        self.transition(WorkflowState::Confirming {
            fingerprint: *fingerprint,
            tx,
        });
        tokio::select! {
            biased;
            () = token.cancelled() => Ok(Step::Abandoned),
            record = writes.tracker.wait(&tx) => record.map(Step::Done),
        }
    }

    fn abandoned(&mut self) {
        warn!(from = %self.state.tag(), "attempt abandoned");
        self.renew_abandon();
        self.transition(WorkflowState::Idle);
    }

    fn renew_abandon(&mut self) {
        self.abandon = CancellationToken::new();
    }

    fn fail(&mut self, fingerprint: Option<Fingerprint>, error: CoreError) {
        match error.kind() {
            ErrorKind::UserCancelled => info!("signing request rejected"),
            ErrorKind::Unknown => error!(error = %error, "attempt failed"),
            kind => warn!(%kind, error = %error, "attempt failed"),
        }
        self.transition(WorkflowState::Failed { fingerprint, error });
    }

    fn reset(&mut self) {
        if self.state != WorkflowState::Idle {
            self.transition(WorkflowState::Idle);
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        let from = self.state.tag();
        self.state = next;
        debug!(%from, to = %self.state.tag(), "transition");

        let transition = Transition {
            attempt: self.attempt,
            from,
            to: &self.state,
        };
        for listener in &self.listeners {
            listener.on_transition(&transition);
        }
    }
}

impl std::fmt::Debug for CertificationWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificationWorkflow")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("state", &self.state)
            .field("attempt", &self.attempt)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
