//! ABI codec for the certification contract.
//!
//! The deployed contract exposes:
//!
//! - `certificarImagen(bytes32)`: certify a fingerprint; reverts if already certified
//! - `verificarImagen(bytes32) -> (address, uint256, bool)`: look up a fingerprint
//! - event `NuevaCertificacion(bytes32 indexed, address indexed, uint256)`
//!
//! Every static ABI value occupies one 32-byte word.

use securi_core::{keccak256, Address, CertificationRecord, Fingerprint, Lookup};

/// Canonical signature of the certifying write
pub const CERTIFY_SIGNATURE: &str = "certificarImagen(bytes32)";

/// Canonical signature of the lookup
pub const VERIFY_SIGNATURE: &str = "verificarImagen(bytes32)";

/// Canonical signature of the event emitted by a successful certification
pub const CERTIFIED_EVENT_SIGNATURE: &str = "NuevaCertificacion(bytes32,address,uint256)";

/// Selector of `Error(string)` revert payloads
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Selector of `Panic(uint256)` revert payloads
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

const WORD: usize = 32;

/// ABI decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    /// Invalid hex data
    #[error("invalid hex data")]
    InvalidHex,
    /// Fewer bytes than the type requires
    #[error("truncated data: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Required length
        expected: usize,
        /// Actual length
        actual: usize,
    },
    /// Integer does not fit in 64 bits
    #[error("integer overflows u64")]
    Overflow,
    /// Address word has non-zero padding
    #[error("invalid address word")]
    InvalidAddress,
    /// Bool word is neither 0 nor 1
    #[error("invalid bool word")]
    InvalidBool,
}

/// First four bytes of the Keccak-256 of a function signature
#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Topic of an event signature
#[must_use]
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// Calldata for `certify(fingerprint)`
#[must_use]
pub fn encode_certify(fingerprint: &Fingerprint) -> Vec<u8> {
    encode_bytes32_call(CERTIFY_SIGNATURE, fingerprint)
}

/// Calldata for `verify(fingerprint)`
#[must_use]
pub fn encode_verify(fingerprint: &Fingerprint) -> Vec<u8> {
    encode_bytes32_call(VERIFY_SIGNATURE, fingerprint)
}

fn encode_bytes32_call(signature: &str, fingerprint: &Fingerprint) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(fingerprint.as_bytes());
    data
}

/// Decode the `(address, uint256, bool)` returned by `verify`
///
/// # Errors
///
/// Returns error if the return data is malformed
pub fn decode_verify(fingerprint: &Fingerprint, data: &[u8]) -> Result<Lookup, AbiError> {
    let author = decode_address(word(data, 0)?)?;
    let timestamp = decode_u64(word(data, 1)?)?;
    let exists = decode_bool(word(data, 2)?)?;

    if exists {
        Ok(Lookup::Certified(CertificationRecord::new(
            *fingerprint,
            author,
            timestamp,
        )))
    } else {
        Ok(Lookup::Uncertified)
    }
}

/// Decode a certification event log.
///
/// Returns `None` when the log is not a certification event.
///
/// # Errors
///
/// Returns error if the log claims to be a certification event but is malformed
pub fn decode_certified_event(
    topics: &[[u8; 32]],
    data: &[u8],
) -> Result<Option<CertificationRecord>, AbiError> {
    if topics.first() != Some(&event_topic(CERTIFIED_EVENT_SIGNATURE)) {
        return Ok(None);
    }
    if topics.len() < 3 {
        return Err(AbiError::Truncated {
            expected: 3 * WORD,
            actual: topics.len() * WORD,
        });
    }
    let fingerprint = Fingerprint::from_bytes(topics[1]);
    let author = decode_address(&topics[2])?;
    let timestamp = decode_u64(word(data, 0)?)?;
    Ok(Some(CertificationRecord::new(fingerprint, author, timestamp)))
}

/// Human-readable reason from revert data, if it is `Error(string)` or `Panic(uint256)`
#[must_use]
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let (head, body) = data.split_at_checked(4)?;
    if head == ERROR_STRING_SELECTOR {
        let offset = usize::try_from(decode_u64(word(body, 0).ok()?).ok()?).ok()?;
        let len_word = body.get(offset..offset.checked_add(WORD)?)?;
        let len = usize::try_from(decode_u64(len_word).ok()?).ok()?;
        let start = offset + WORD;
        let bytes = body.get(start..start.checked_add(len)?)?;
        return Some(String::from_utf8_lossy(bytes).into_owned());
    }
    if head == PANIC_SELECTOR {
        let code = decode_u64(word(body, 0).ok()?).ok()?;
        return Some(format!("panic code {:#x}", code));
    }
    None
}

/// Encode bytes as `0x`-prefixed hex
#[must_use]
pub fn to_hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decode `0x`-prefixed hex data; `0x` alone is empty data
///
/// # Errors
///
/// Returns error if the string is not hex
pub fn from_hex_data(s: &str) -> Result<Vec<u8>, AbiError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|_| AbiError::InvalidHex)
}

/// Decode a 32-byte topic
///
/// # Errors
///
/// Returns error if the string is not 32 bytes of hex
pub fn topic_from_hex(s: &str) -> Result<[u8; 32], AbiError> {
    let bytes = from_hex_data(s)?;
    bytes.try_into().map_err(|b: Vec<u8>| AbiError::Truncated {
        expected: WORD,
        actual: b.len(),
    })
}

fn word(data: &[u8], index: usize) -> Result<&[u8], AbiError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or(AbiError::Truncated {
        expected: start + WORD,
        actual: data.len(),
    })
}

fn decode_u64(word: &[u8]) -> Result<u64, AbiError> {
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow);
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    Ok(u64::from_be_bytes(buf))
}

fn decode_address(word: &[u8]) -> Result<Address, AbiError> {
    let (padding, body) = word.split_at(WORD - Address::LEN);
    if padding.iter().any(|b| *b != 0) {
        return Err(AbiError::InvalidAddress);
    }
    let mut buf = [0u8; 20];
    buf.copy_from_slice(body);
    Ok(Address::from_bytes(buf))
}

fn decode_bool(word: &[u8]) -> Result<bool, AbiError> {
    match decode_u64(word) {
        Ok(0) => Ok(false),
        Ok(1) => Ok(true),
        _ => Err(AbiError::InvalidBool),
    }
}

/// Encode an address as an ABI word
#[must_use]
pub fn address_word(address: &Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[WORD - Address::LEN..].copy_from_slice(address.as_bytes());
    out
}

/// Encode an integer as an ABI word
#[must_use]
pub fn u64_word(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Encode `Error(string)` revert data
#[must_use]
pub fn encode_revert_reason(reason: &str) -> Vec<u8> {
    let bytes = reason.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut data = Vec::with_capacity(4 + 2 * WORD + padded);
    data.extend_from_slice(&ERROR_STRING_SELECTOR);
    data.extend_from_slice(&u64_word(WORD as u64));
    data.extend_from_slice(&u64_word(bytes.len() as u64));
    data.extend_from_slice(bytes);
    data.resize(4 + 2 * WORD + padded, 0);
    data
}

/// Encode the `(address, uint256, bool)` tuple returned by `verify`
#[must_use]
pub fn encode_verify_result(author: &Address, timestamp: u64, exists: bool) -> Vec<u8> {
    let mut data = Vec::with_capacity(3 * WORD);
    data.extend_from_slice(&address_word(author));
    data.extend_from_slice(&u64_word(timestamp));
    data.extend_from_slice(&u64_word(u64::from(exists)));
    data
}
