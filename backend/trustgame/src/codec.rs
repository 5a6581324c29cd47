//! Big-endian integer and base64 string codecs used for call arguments,
//! state values and logs.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::errors::{ClientError, Result};

/// Largest integer an IEEE-754 double represents exactly (2^53 - 1).
pub const MAX_EXACT_F64_INT: f64 = 9_007_199_254_740_991.0;

const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

pub fn encode_uint64_be(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Encode a host float (typically a JSON number) as 8 big-endian bytes.
///
/// Values above 2^53 - 1 are rejected with [`ClientError::Precision`] even
/// when they fit in a u64, since the float may already have been rounded.
/// Pass such values through [`encode_uint64_be`] or [`encode_wide_be`].
pub fn encode_number_be(value: f64) -> Result<[u8; 8]> {
    if !value.is_finite() {
        return Err(ClientError::Range(format!("{value} is not a finite number")));
    }
    if value < 0.0 {
        return Err(ClientError::Range(format!("{value} must be >= 0")));
    }
    if value.fract() != 0.0 {
        return Err(ClientError::Range(format!("{value} is not an integer")));
    }
    if value >= TWO_POW_64 {
        return Err(ClientError::Range(format!("{value} exceeds 2^64 - 1")));
    }
    if value > MAX_EXACT_F64_INT {
        return Err(ClientError::Precision(format!(
            "{value} exceeds 2^53 - 1; supply an integer type instead"
        )));
    }
    Ok(encode_uint64_be(value as u64))
}

/// Encode an arbitrary-precision signed integer, rejecting anything outside
/// `0..=u64::MAX`.
pub fn encode_wide_be(value: i128) -> Result<[u8; 8]> {
    let v = u64::try_from(value)
        .map_err(|_| ClientError::Range(format!("{value} is outside 0..=2^64 - 1")))?;
    Ok(encode_uint64_be(v))
}

/// Big-endian accumulation over any number of bytes. Leading zero bytes are
/// accepted so both padded state values and short historical encodings
/// decode; an empty slice decodes to 0.
pub fn decode_uint64_be(bytes: &[u8]) -> Result<u64> {
    bytes.iter().try_fold(0u64, |acc, b| {
        acc.checked_mul(256)
            .and_then(|v| v.checked_add(u64::from(*b)))
            .ok_or_else(|| {
                ClientError::Range(format!(
                    "{}-byte value 0x{} overflows u64",
                    bytes.len(),
                    hex::encode(bytes)
                ))
            })
    })
}

pub fn encode_utf8_b64(s: &str) -> String {
    STANDARD.encode(s.as_bytes())
}

pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_b64(b64: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(b64.trim())
        .map_err(|e| ClientError::Decode(format!("invalid base64 {b64:?}: {e}")))
}

/// Decode base64 and interpret the bytes as UTF-8, replacing invalid
/// sequences. No printability check is made here.
pub fn decode_b64_to_utf8(b64: &str) -> Result<String> {
    let bytes = decode_b64(b64)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `true` when `s` contains a C0 control character other than tab,
/// line feed or carriage return.
pub fn has_unsafe_control_chars(s: &str) -> bool {
    s.chars()
        .any(|c| c.is_ascii_control() && c != '\u{7f}' && !matches!(c, '\t' | '\n' | '\r'))
}
