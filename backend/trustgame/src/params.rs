//! Normalization of suggested-transaction-parameter responses.
//!
//! Node versions and proxies disagree on the response shape: the payload may
//! be wrapped in `params` or `suggestedParams`, keys may be hyphenated or
//! camelCase, and the genesis hash may arrive as base64 or as a byte array.
//! Everything is resolved here into one [`NetworkParams`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::codec;
use crate::errors::{ClientError, Result};

/// Fee floor in micro-units.
pub const MIN_FEE: u64 = 1_000;
/// Rounds a transaction stays valid after its first valid round.
pub const VALIDITY_WINDOW: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub fee: u64,
    pub first_valid_round: u64,
    pub last_valid_round: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
}

impl NetworkParams {
    pub fn new(fee: u64, first_valid_round: u64, genesis_id: String, genesis_hash: [u8; 32]) -> Self {
        Self {
            fee: fee.max(MIN_FEE),
            first_valid_round,
            last_valid_round: first_valid_round.saturating_add(VALIDITY_WINDOW),
            genesis_id,
            genesis_hash,
        }
    }

    pub fn network_name(&self) -> NetworkName {
        NetworkName::from_genesis_id(&self.genesis_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkName {
    MainNet,
    TestNet,
    BetaNet,
    LocalNet,
    Unknown,
}

impl NetworkName {
    pub fn from_genesis_id(genesis_id: &str) -> Self {
        let id = genesis_id.to_ascii_lowercase();
        if id.contains("mainnet") {
            Self::MainNet
        } else if id.contains("testnet") {
            Self::TestNet
        } else if id.contains("betanet") {
            Self::BetaNet
        } else if id.contains("sandnet") || id.contains("dockernet") || id.contains("devnet") {
            Self::LocalNet
        } else {
            Self::Unknown
        }
    }
}

// ─────────────────────────────────────────────────────────
// Raw response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawParamsResponse {
    Wrapped {
        params: RawParams,
    },
    Suggested {
        #[serde(rename = "suggestedParams")]
        suggested_params: RawParams,
    },
    Flat(RawParams),
}

impl RawParamsResponse {
    fn into_inner(self) -> RawParams {
        match self {
            Self::Wrapped { params } => params,
            Self::Suggested { suggested_params } => suggested_params,
            Self::Flat(params) => params,
        }
    }
}

/// Each historical key spelling gets its own slot so a response carrying
/// several of them never trips serde's duplicate-field check.
#[derive(Debug, Default, Deserialize)]
struct RawParams {
    #[serde(rename = "min-fee")]
    min_fee: Option<Value>,
    #[serde(rename = "minFee")]
    min_fee_camel: Option<Value>,
    fee: Option<Value>,
    #[serde(rename = "last-round")]
    last_round: Option<Value>,
    #[serde(rename = "lastRound")]
    last_round_camel: Option<Value>,
    #[serde(rename = "firstRound", alias = "first-round", alias = "firstValid")]
    first_round: Option<Value>,
    #[serde(rename = "genesis-hash")]
    genesis_hash: Option<GenesisHashField>,
    #[serde(rename = "genesishashb64")]
    genesis_hash_legacy: Option<GenesisHashField>,
    #[serde(rename = "genesisHash")]
    genesis_hash_camel: Option<GenesisHashField>,
    #[serde(rename = "genesis-id")]
    genesis_id: Option<String>,
    #[serde(rename = "genesisID", alias = "genesisId")]
    genesis_id_camel: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenesisHashField {
    Base64(String),
    Bytes(Vec<u8>),
}

impl GenesisHashField {
    fn into_bytes(self) -> Result<[u8; 32]> {
        let raw = match self {
            Self::Base64(s) => codec::decode_b64(&s)
                .map_err(|e| ClientError::Config(format!("genesis hash: {e}")))?,
            Self::Bytes(bytes) => bytes,
        };
        <[u8; 32]>::try_from(raw.as_slice()).map_err(|_| {
            ClientError::Config(format!(
                "genesis hash must be 32 bytes, got {}",
                raw.len()
            ))
        })
    }
}

/// Accept JSON numbers and numeric strings; anything else reads as absent.
fn as_uint(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────

/// Normalize a raw parameter response body.
pub fn normalize(raw: &str) -> Result<NetworkParams> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ClientError::Config(format!("params response is not JSON: {e}")))?;
    normalize_value(value)
}

pub fn normalize_value(value: Value) -> Result<NetworkParams> {
    let raw = serde_json::from_value::<RawParamsResponse>(value)
        .map_err(|e| ClientError::Config(format!("unrecognised params response: {e}")))?
        .into_inner();

    let positive = |v: Option<&Value>| as_uint(v).filter(|f| *f > 0);
    let fee = positive(raw.min_fee.as_ref())
        .or_else(|| positive(raw.min_fee_camel.as_ref()))
        .or_else(|| positive(raw.fee.as_ref()))
        .unwrap_or(MIN_FEE);
    // An SDK-shaped payload names the first valid round directly; a node
    // response only reports the latest round. A missing round degrades to 0,
    // the validity window is still defined.
    let first_round = as_uint(raw.first_round.as_ref())
        .or_else(|| as_uint(raw.last_round.as_ref()))
        .or_else(|| as_uint(raw.last_round_camel.as_ref()))
        .unwrap_or(0);
    let genesis_hash = raw
        .genesis_hash
        .or(raw.genesis_hash_legacy)
        .or(raw.genesis_hash_camel)
        .ok_or_else(|| ClientError::Config("params response has no genesis hash".to_string()))?
        .into_bytes()?;
    let genesis_id = raw.genesis_id.or(raw.genesis_id_camel).unwrap_or_default();

    let params = NetworkParams::new(fee, first_round, genesis_id, genesis_hash);
    debug!(
        fee = params.fee,
        first_valid = params.first_valid_round,
        last_valid = params.last_valid_round,
        genesis_id = %params.genesis_id,
        "Normalized network params"
    );
    Ok(params)
}
