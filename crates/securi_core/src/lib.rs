//! Securi Certify Core Types
//!
//! This crate contains pure types and logic with no network I/O.
//! Fingerprints, principals and records are shared by the ledger client
//! and the certification workflow.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod error;
pub mod hash;
pub mod record;
pub mod session;

// Re-exports
pub use address::{Address, AddressError, Principal};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use hash::{keccak256, Fingerprint, HashError, TxHash};
pub use record::{CertificationRecord, Lookup};
pub use session::{Session, SessionMode};
