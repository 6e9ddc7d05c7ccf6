//! Image authorship certification for Securi Certify.
//!
//! This crate sequences fingerprinting, ledger lookup, certifying writes and
//! confirmation into a single state machine per session, and maps its states
//! to what a presentation layer shows.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod progress;
pub mod session;
pub mod state;
pub mod view;
pub mod workflow;

pub use progress::{ProgressListener, Transition};
pub use session::{SessionContext, WritePath};
pub use state::{StateTag, WorkflowState};
pub use view::{render, Action, Banner, CheckItem, CheckStatus, RecordPanel, Tone, ViewModel};
pub use workflow::{fingerprint_file, CertificationWorkflow, WorkflowConfig};
