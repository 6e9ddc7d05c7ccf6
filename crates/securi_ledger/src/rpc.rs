//! JSON-RPC transport over HTTP.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Raw failure of a JSON-RPC request, before classification
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status without a JSON-RPC error body
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// Response was not a usable JSON-RPC envelope
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Endpoint returned a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// Error code
        code: i64,
        /// Error message
        message: String,
        /// Optional error data
        data: Option<Value>,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// JSON-RPC client for one endpoint
#[derive(Clone)]
pub struct JsonRpcClient {
    /// Endpoint URL
    url: String,
    /// HTTP client
    client: reqwest::Client,
    /// Request ID counter
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    /// Create a client with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self::with_client(url, client))
    }

    /// Create a client without a request timeout, for calls that wait on a
    /// person (signing prompts)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn untimed(url: impl Into<String>) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self::with_client(url, client))
    }

    /// Create a client around an existing HTTP client
    #[must_use]
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` with positional `params` and decode the result
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the endpoint reports an error,
    /// or the result does not decode as `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, url = %self.url, "json-rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let envelope = match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Http {
                    status: status.as_u16(),
                    body: text,
                });
            }
            Err(e) => return Err(RpcError::Malformed(e.to_string())),
        };

        if let Some(error) = envelope.error {
            debug!(method, id, code = error.code, "json-rpc error");
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        if !status.is_success() {
            return Err(RpcError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|e| RpcError::Malformed(format!("{}: {}", method, e)))
    }
}

/// Encode an integer as a JSON-RPC quantity
#[must_use]
pub fn to_quantity(value: u64) -> String {
    format!("{:#x}", value)
}

/// Decode a JSON-RPC quantity such as `0x1b4`
///
/// # Errors
///
/// Returns error if the string is not a hex quantity that fits in u64
pub fn parse_quantity(s: &str) -> Result<u64, RpcError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Malformed(format!("quantity without 0x prefix: {}", s)))?;
    if digits.is_empty() {
        return Err(RpcError::Malformed("empty quantity".to_string()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Malformed(format!("bad quantity {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_roundtrip() {
        assert_eq!(to_quantity(0), "0x0");
        assert_eq!(to_quantity(2_000_000), "0x1e8480");
        assert_eq!(parse_quantity("0x1e8480").unwrap(), 2_000_000);
    }

    #[test]
    fn test_parse_quantity_errors() {
        assert!(matches!(parse_quantity("1234"), Err(RpcError::Malformed(_))));
        assert!(matches!(parse_quantity("0x"), Err(RpcError::Malformed(_))));
        assert!(matches!(parse_quantity("0xzz"), Err(RpcError::Malformed(_))));
        assert!(matches!(
            parse_quantity("0x1ffffffffffffffff"),
            Err(RpcError::Malformed(_))
        ));
    }

    #[test]
    fn test_rpc_error_display() {
        let err = RpcError::Rpc {
            code: 4001,
            message: "User rejected the request.".to_string(),
            data: None,
        };
        assert_eq!(err.to_string(), "JSON-RPC error 4001: User rejected the request.");

        let err = RpcError::Http { status: 503, body: "unavailable".to_string() };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_client_url() {
        let client = JsonRpcClient::new("http://localhost:8545", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url(), "http://localhost:8545");
    }
}
