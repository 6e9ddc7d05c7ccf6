//! Classification of raw signer and ledger failures into the error taxonomy.
//!
//! This is the only place that inspects JSON-RPC error codes, messages and
//! revert payloads. Everything downstream matches on `ErrorKind`.

use crate::abi;
use crate::rpc::RpcError;
use securi_core::{CoreError, Fingerprint};
use serde_json::Value;

/// EIP-1193: the user rejected the request
pub const USER_REJECTED: i64 = 4001;
/// EIP-1193: the requested account or method is not authorized
pub const UNAUTHORIZED: i64 = 4100;
/// EIP-1193: the provider is disconnected from all chains
pub const DISCONNECTED: i64 = 4900;
/// EIP-1193: the provider is not connected to the requested chain
pub const CHAIN_DISCONNECTED: i64 = 4901;
/// The signer does not know the requested chain
pub const UNRECOGNIZED_CHAIN: i64 = 4902;
/// Geth-style "execution reverted" with revert data
pub const EXECUTION_REVERTED: i64 = 3;

const INSUFFICIENT_MARKERS: &[&str] = &[
    "insufficient funds",
    "underpriced",
    "fee cap",
    "max fee per gas less than",
    "intrinsic gas too low",
    "gas too low",
    "out of gas",
    "exceeds block gas limit",
];

const REJECTED_MARKERS: &[&str] = &["user rejected", "user denied", "rejected by user"];

/// Classifies raw RPC failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    /// Lowercased revert reason fragments meaning "already certified"
    markers: Vec<String>,
}

impl ErrorClassifier {
    /// Create a classifier with already-certified revert markers
    #[must_use]
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Whether `text` says the fingerprint already has a record
    #[must_use]
    pub fn is_already_certified(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.markers.iter().any(|m| text.contains(m.as_str()))
    }

    /// Classify a failed read. Reads never produce a verdict, so every
    /// failure is a network failure.
    #[must_use]
    pub fn classify_read(&self, operation: &str, err: RpcError) -> CoreError {
        CoreError::network(operation, err)
    }

    /// Classify a failed session call (accounts, chain switching)
    #[must_use]
    pub fn classify_session(&self, err: RpcError) -> CoreError {
        self.classify("session", None, err)
    }

    /// Classify a failed signer or write call for `fingerprint`
    #[must_use]
    pub fn classify_write(&self, operation: &str, fingerprint: &Fingerprint, err: RpcError) -> CoreError {
        self.classify(operation, Some(fingerprint), err)
    }

    fn classify(&self, operation: &str, fingerprint: Option<&Fingerprint>, err: RpcError) -> CoreError {
        let (code, message, data) = match err {
            RpcError::Rpc { code, message, data } => (code, message, data),
            other => return CoreError::network(operation, other),
        };
        let text = error_text(&message, data.as_ref());
        let lowered = text.to_lowercase();

        if code == USER_REJECTED || REJECTED_MARKERS.iter().any(|m| lowered.contains(m)) {
            return CoreError::UserCancelled;
        }
        if code == DISCONNECTED || code == CHAIN_DISCONNECTED {
            return CoreError::network(operation, text);
        }
        if code == UNAUTHORIZED {
            return CoreError::Validation {
                field: "session".to_string(),
                reason: format!("signer refused the account: {}", message),
            };
        }
        if INSUFFICIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
            return CoreError::InsufficientResource { message };
        }
        if code == EXECUTION_REVERTED || lowered.contains("revert") {
            let reason = revert_reason(data.as_ref()).unwrap_or(text);
            if let Some(fingerprint) = fingerprint {
                if self.is_already_certified(&reason) {
                    return CoreError::AlreadyCertified {
                        fingerprint: *fingerprint,
                    };
                }
            }
            return CoreError::Unknown {
                message: format!("execution reverted: {}", reason),
            };
        }
        CoreError::Unknown {
            message: format!("{} (code {})", message, code),
        }
    }

    /// Classify the replay of a transaction whose receipt reported a revert.
    ///
    /// Only an already-certified reason is reclassified; any other revert,
    /// or a replay that cannot be performed, is a network failure.
    #[must_use]
    pub fn classify_revert(&self, fingerprint: &Fingerprint, replay: Result<String, RpcError>) -> CoreError {
        let reason = match replay {
            Ok(_) => "transaction reverted without reason".to_string(),
            Err(RpcError::Rpc { message, data, .. }) => {
                revert_reason(data.as_ref()).unwrap_or_else(|| error_text(&message, data.as_ref()))
            }
            Err(other) => other.to_string(),
        };
        if self.is_already_certified(&reason) {
            CoreError::AlreadyCertified {
                fingerprint: *fingerprint,
            }
        } else {
            CoreError::network("confirmation", format!("transaction reverted: {}", reason))
        }
    }
}

/// Message plus any nested message carried in the error data
fn error_text(message: &str, data: Option<&Value>) -> String {
    let mut text = message.to_string();
    if let Some(nested) = data.and_then(|d| d.get("message")).and_then(Value::as_str) {
        text.push_str(": ");
        text.push_str(nested);
    }
    text
}

/// Decoded revert reason from error data, which signers ship either as a
/// hex string or nested under `data`
fn revert_reason(data: Option<&Value>) -> Option<String> {
    match data? {
        Value::String(hex) => abi::from_hex_data(hex)
            .ok()
            .and_then(|bytes| abi::decode_revert_reason(&bytes)),
        Value::Object(map) => revert_reason(map.get("data")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securi_core::ErrorKind;
    use serde_json::json;

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new(["already certified", "ya certificada"])
    }

    fn fp() -> Fingerprint {
        Fingerprint::from_bytes([4; 32])
    }

    fn rpc(code: i64, message: &str, data: Option<Value>) -> RpcError {
        RpcError::Rpc {
            code,
            message: message.to_string(),
            data,
        }
    }

    #[test]
    fn test_user_rejected_code() {
        let err = classifier().classify_write("submit", &fp(), rpc(4001, "User rejected the request.", None));
        assert_eq!(err.kind(), ErrorKind::UserCancelled);
    }

    #[test]
    fn test_user_rejected_nested_message() {
        let err = classifier().classify_write(
            "submit",
            &fp(),
            rpc(-32603, "Internal error", Some(json!({"code": 4001, "message": "User denied transaction signature."}))),
        );
        assert_eq!(err.kind(), ErrorKind::UserCancelled);
    }

    #[test]
    fn test_insufficient_funds() {
        let err = classifier().classify_write(
            "submit",
            &fp(),
            rpc(-32000, "insufficient funds for gas * price + value", None),
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientResource);

        let err = classifier().classify_write("submit", &fp(), rpc(-32000, "transaction underpriced", None));
        assert_eq!(err.kind(), ErrorKind::InsufficientResource);
    }

    #[test]
    fn test_revert_with_marker_data() {
        let data = abi::to_hex_data(&abi::encode_revert_reason("Imagen ya certificada"));
        let err = classifier().classify_write("submit", &fp(), rpc(3, "execution reverted", Some(json!(data))));
        assert_eq!(err, CoreError::AlreadyCertified { fingerprint: fp() });
    }

    #[test]
    fn test_revert_with_marker_in_message() {
        let err = classifier().classify_write(
            "submit",
            &fp(),
            rpc(-32000, "execution reverted: already certified", None),
        );
        assert_eq!(err.kind(), ErrorKind::AlreadyCertified);
    }

    #[test]
    fn test_other_revert_is_unknown() {
        let data = abi::to_hex_data(&abi::encode_revert_reason("paused"));
        let err = classifier().classify_write(
            "submit",
            &fp(),
            rpc(3, "execution reverted", Some(json!({"data": data}))),
        );
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.to_string().contains("paused"));
    }

    #[test]
    fn test_transport_is_network() {
        let err = classifier().classify_write("submit", &fp(), RpcError::Transport("refused".into()));
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);

        let err = classifier().classify_write("submit", &fp(), rpc(4900, "disconnected", None));
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    }

    #[test]
    fn test_unauthorized_is_validation() {
        let err = classifier().classify_session(rpc(4100, "unauthorized", None));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_session_rejection_and_revert() {
        let err = classifier().classify_session(rpc(4001, "User rejected the request.", None));
        assert_eq!(err.kind(), ErrorKind::UserCancelled);

        // Without a fingerprint there is nothing to have been certified already.
        let err = classifier().classify_session(rpc(3, "execution reverted: already certified", None));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_uncategorized_is_unknown() {
        let err = classifier().classify_write("submit", &fp(), rpc(-32601, "method not found", None));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_reads_are_always_network() {
        let err = classifier().classify_read("lookup", rpc(4001, "User rejected", None));
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
        let err = classifier().classify_read("lookup", RpcError::Malformed("bad".into()));
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    }

    #[test]
    fn test_classify_revert_replay() {
        let data = abi::to_hex_data(&abi::encode_revert_reason("already certified"));
        let err = classifier().classify_revert(&fp(), Err(rpc(3, "execution reverted", Some(json!(data)))));
        assert_eq!(err.kind(), ErrorKind::AlreadyCertified);

        let err = classifier().classify_revert(&fp(), Ok("0x".to_string()));
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);

        let err = classifier().classify_revert(&fp(), Err(RpcError::Transport("down".into())));
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    }

    #[test]
    fn test_markers_case_insensitive() {
        let c = ErrorClassifier::new(["Already Certified", ""]);
        assert!(c.is_already_certified("ALREADY CERTIFIED by someone"));
        assert!(!c.is_already_certified("anything else"));
    }
}
