//! Decoding of contract global state and per-account local state.
//!
//! Byte values are always exposed as base64 in the canonical map; a UTF-8
//! preview is attached only when the bytes are printable text. Opaque values
//! such as 32-byte addresses are never coerced to strings.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::codec;
use crate::errors::Result;
use crate::phase::Phase;
use crate::rpc::{AccountResponse, AppLocalState, ApplicationResponse, RawKeyValue};

const TEAL_BYTES: u8 = 1;
const TEAL_UINT: u8 = 2;

/// Spendable balance a subject needs before opting in: the minimum
/// balance increase plus fee headroom.
pub const OPT_IN_SPENDABLE_THRESHOLD: u64 = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Uint,
    Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractKvEntry {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uint: Option<u64>,
    #[serde(rename = "bytesB64", skip_serializing_if = "Option::is_none")]
    pub bytes_b64: Option<String>,
    #[serde(rename = "str", skip_serializing_if = "Option::is_none")]
    pub utf8_preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BytesValue {
    pub bytes: String,
    #[serde(rename = "str", skip_serializing_if = "Option::is_none")]
    pub utf8_preview: Option<String>,
}

/// Canonical value: integers as numbers, byte strings as a base64 object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Uint(u64),
    Bytes(BytesValue),
}

impl StateValue {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(*v),
            Self::Bytes(_) => None,
        }
    }

    pub fn as_bytes_b64(&self) -> Option<&str> {
        match self {
            Self::Bytes(b) => Some(&b.bytes),
            Self::Uint(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodedState {
    pub entries: Vec<ContractKvEntry>,
    pub map: BTreeMap<String, StateValue>,
}

impl DecodedState {
    pub fn get_uint(&self, key: &str) -> Option<u64> {
        self.map.get(key).and_then(StateValue::as_uint)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current phase from the `phase` global, when present and known.
    pub fn phase(&self) -> Option<Phase> {
        self.get_uint("phase").and_then(|v| Phase::try_from(v).ok())
    }
}

/// UTF-8 preview of raw bytes, or `None` when they are empty, not valid
/// UTF-8, or contain control characters other than tab/newline.
pub fn utf8_preview(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let s = std::str::from_utf8(bytes).ok()?;
    if codec::has_unsafe_control_chars(s) {
        return None;
    }
    Some(s.to_string())
}

fn decode_key(key_b64: &str) -> String {
    // Keys are ASCII identifiers by convention; a malformed key still decodes
    // to something rather than failing the whole state read.
    codec::decode_b64_to_utf8(key_b64).unwrap_or_default()
}

fn decode_bytes_value(bytes_b64: &str) -> BytesValue {
    let preview = codec::decode_b64(bytes_b64)
        .ok()
        .and_then(|raw| utf8_preview(&raw));
    BytesValue {
        bytes: bytes_b64.to_string(),
        utf8_preview: preview,
    }
}

pub fn decode_state(raw: &[RawKeyValue]) -> DecodedState {
    let mut decoded = DecodedState::default();
    for kv in raw {
        let key = decode_key(&kv.key);
        match kv.value.value_type {
            TEAL_UINT => {
                let uint = kv.value.uint;
                decoded.entries.push(ContractKvEntry {
                    key: key.clone(),
                    kind: ValueKind::Uint,
                    uint: Some(uint),
                    bytes_b64: None,
                    utf8_preview: None,
                });
                decoded.map.insert(key, StateValue::Uint(uint));
            }
            TEAL_BYTES => {
                let value = decode_bytes_value(&kv.value.bytes);
                decoded.entries.push(ContractKvEntry {
                    key: key.clone(),
                    kind: ValueKind::Bytes,
                    uint: None,
                    bytes_b64: Some(value.bytes.clone()),
                    utf8_preview: value.utf8_preview.clone(),
                });
                decoded.map.insert(key, StateValue::Bytes(value));
            }
            other => warn!("Skipping state key {key:?} with unknown value type {other}"),
        }
    }
    decoded
}

/// Local state of one account for `app_id`. An account that has not opted
/// in yields an empty state.
pub fn decode_local_state(local_states: &[AppLocalState], app_id: u64) -> DecodedState {
    local_states
        .iter()
        .find(|bucket| bucket.id == app_id)
        .map(|bucket| decode_state(&bucket.key_value))
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────
// Lookup summaries
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalSchema {
    pub ints: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationSummary {
    pub id: u64,
    pub creator: Option<String>,
    pub global_schema: GlobalSchema,
    pub globals: BTreeMap<String, StateValue>,
    pub globals_raw: Vec<ContractKvEntry>,
}

impl ApplicationSummary {
    pub fn from_response(app: &ApplicationResponse) -> Self {
        let decoded = decode_state(&app.params.global_state);
        Self {
            id: app.id,
            creator: app.params.creator.clone(),
            global_schema: GlobalSchema {
                ints: app.params.global_state_schema.num_uint,
                bytes: app.params.global_state_schema.num_byte_slice,
            },
            globals: decoded.map,
            globals_raw: decoded.entries,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.globals
            .get("phase")
            .and_then(StateValue::as_uint)
            .and_then(|v| Phase::try_from(v).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub address: String,
    pub amount: u64,
    pub min_balance: u64,
    pub spendable: u64,
    pub apps_local_state: usize,
}

impl AccountSummary {
    pub fn from_response(account: &AccountResponse) -> Self {
        Self {
            address: account.address.clone(),
            amount: account.amount,
            min_balance: account.min_balance,
            spendable: account.amount.saturating_sub(account.min_balance),
            apps_local_state: account.apps_local_state.len(),
        }
    }

    pub fn has_spendable_for_opt_in(&self) -> bool {
        self.spendable >= OPT_IN_SPENDABLE_THRESHOLD
    }
}

/// Read a subject's local state for `app_id` straight from an account
/// lookup.
pub fn local_state_of(account: &AccountResponse, app_id: u64) -> Result<DecodedState> {
    Ok(decode_local_state(&account.apps_local_state, app_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RawTealValue;
    use serde_json::json;

    fn uint_kv(key: &str, v: u64) -> RawKeyValue {
        RawKeyValue {
            key: codec::encode_utf8_b64(key),
            value: RawTealValue {
                value_type: TEAL_UINT,
                bytes: String::new(),
                uint: v,
            },
        }
    }

    fn bytes_kv(key: &str, raw: &[u8]) -> RawKeyValue {
        RawKeyValue {
            key: codec::encode_utf8_b64(key),
            value: RawTealValue {
                value_type: TEAL_BYTES,
                bytes: codec::encode_b64(raw),
                uint: 0,
            },
        }
    }

    #[test]
    fn integer_globals_decode_to_numbers() {
        let decoded = decode_state(&[uint_kv("phase", 1), uint_kv("UNIT", 1000)]);
        assert_eq!(decoded.get_uint("phase"), Some(1));
        assert_eq!(decoded.get_uint("UNIT"), Some(1000));
        assert_eq!(
            serde_json::to_value(&decoded.map).unwrap(),
            json!({ "phase": 1, "UNIT": 1000 })
        );
        assert_eq!(decoded.phase(), Some(Phase::Invest));
    }

    #[test]
    fn control_bytes_get_no_preview() {
        let decoded = decode_state(&[bytes_kv("s1", &[0x00, 0x01, 0x41, 0x1b])]);
        let value = &decoded.map["s1"];
        assert_eq!(
            serde_json::to_value(value).unwrap(),
            json!({ "bytes": codec::encode_b64(&[0x00, 0x01, 0x41, 0x1b]) })
        );
        assert!(decoded.entries[0].utf8_preview.is_none());
    }

    #[test]
    fn printable_bytes_keep_base64_with_preview() {
        let decoded = decode_state(&[bytes_kv("uri", b"ipfs://abc\n")]);
        match &decoded.map["uri"] {
            StateValue::Bytes(b) => {
                assert_eq!(b.bytes, codec::encode_b64(b"ipfs://abc\n"));
                assert_eq!(b.utf8_preview.as_deref(), Some("ipfs://abc\n"));
            }
            other => panic!("expected bytes, got {other:?}"),
        }
        assert_eq!(decoded.entries[0].kind, ValueKind::Bytes);
    }

    #[test]
    fn invalid_utf8_bytes_get_no_preview() {
        assert!(utf8_preview(&[0xff, 0xfe, 0x41]).is_none());
        assert!(utf8_preview(b"").is_none());
        assert_eq!(utf8_preview(b"tab\tok").as_deref(), Some("tab\tok"));
    }

    #[test]
    fn decoding_is_idempotent() {
        let raw = vec![uint_kv("m", 3), bytes_kv("s2", &[7u8; 32]), uint_kv("E1", 100_000)];
        assert_eq!(decode_state(&raw), decode_state(&raw));
        assert_eq!(decode_state(&raw).entries.len(), 3);
    }

    #[test]
    fn malformed_key_does_not_panic() {
        let mut kv = uint_kv("x", 1);
        kv.key = "%%not-base64%%".to_string();
        let decoded = decode_state(&[kv]);
        assert_eq!(decoded.get_uint(""), Some(1));
    }

    #[test]
    fn unknown_value_type_is_skipped() {
        let mut kv = uint_kv("odd", 1);
        kv.value.value_type = 9;
        assert!(decode_state(&[kv]).is_empty());
    }

    #[test]
    fn local_state_selects_matching_bucket() {
        let buckets = vec![
            AppLocalState {
                id: 10,
                key_value: vec![uint_kv("s", 5)],
            },
            AppLocalState {
                id: 11,
                key_value: vec![uint_kv("s", 9), uint_kv("done", 1)],
            },
        ];
        let local = decode_local_state(&buckets, 11);
        assert_eq!(local.get_uint("s"), Some(9));
        assert_eq!(local.get_uint("done"), Some(1));
        assert!(decode_local_state(&buckets, 12).is_empty());
    }

    #[test]
    fn application_summary_from_lookup() {
        let app: ApplicationResponse = serde_json::from_value(json!({
            "id": 77,
            "params": {
                "creator": "CREATOR",
                "global-state-schema": { "num-uint": 8, "num-byte-slice": 2 },
                "global-state": [
                    { "key": codec::encode_utf8_b64("phase"), "value": { "type": 2, "uint": 2 } },
                    { "key": codec::encode_utf8_b64("s1"), "value": { "type": 1, "bytes": codec::encode_b64(&[1u8; 32]) } }
                ]
            }
        }))
        .unwrap();
        let summary = ApplicationSummary::from_response(&app);
        assert_eq!(summary.creator.as_deref(), Some("CREATOR"));
        assert_eq!(summary.global_schema, GlobalSchema { ints: 8, bytes: 2 });
        assert_eq!(summary.phase(), Some(Phase::Return));
        assert!(summary.globals["s1"].as_bytes_b64().is_some());
    }

    #[test]
    fn account_summary_spendable() {
        let account: AccountResponse = serde_json::from_value(json!({
            "address": "ADDR",
            "amount": 350_000,
            "min-balance": 100_000,
            "apps-local-state": []
        }))
        .unwrap();
        let summary = AccountSummary::from_response(&account);
        assert_eq!(summary.spendable, 250_000);
        assert!(summary.has_spendable_for_opt_in());
        assert!(local_state_of(&account, 5).unwrap().is_empty());
    }
}
