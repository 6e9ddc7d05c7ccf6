//! Securi Certify Ledger Client
//!
//! Talks to the certification contract over JSON-RPC: read-only lookups,
//! signer-gated certifying writes, and confirmation tracking. Raw transport
//! and signer failures are classified into `securi_core::CoreError` here,
//! at the boundary where the external call returns.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abi;
pub mod classify;
pub mod config;
pub mod confirm;
pub mod memory;
pub mod reader;
pub mod rpc;
pub mod signer;
pub mod writer;

pub use classify::ErrorClassifier;
pub use config::{ChainParams, ConfigError, LedgerConfig, NativeCurrency};
pub use confirm::{ConfirmationTracker, RpcConfirmationTracker};
pub use memory::{MemoryLedger, RaceStage, SigningBehavior};
pub use reader::{LedgerReader, RpcLedgerReader};
pub use rpc::{JsonRpcClient, RpcError};
pub use signer::{RpcSigningProvider, SigningProvider, TransactionRequest};
pub use writer::{LedgerWriter, RpcLedgerWriter, TxHandle};
