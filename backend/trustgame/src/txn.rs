//! Unsigned transaction construction.
//!
//! Transactions are encoded as canonical msgpack: keys in lexical order,
//! zero and empty values omitted. [`WireTxn`] declares its fields in that
//! order so `rmp_serde::to_vec_named` produces the canonical form directly.
//!
//! Nothing here performs I/O; parameters and compiled programs are supplied
//! by the caller.

use data_encoding::BASE32_NOPAD;
use serde::Serialize;
use serde_bytes::ByteBuf;
use sha2::{Digest, Sha512_256};
use tracing::debug;

use crate::address::Address;
use crate::codec::encode_uint64_be;
use crate::errors::{ClientError, Result};
use crate::params::NetworkParams;
use crate::phase::{Operation, Phase};

/// Largest atomic group the network accepts.
pub const MAX_GROUP_SIZE: usize = 16;

/// Global storage for the trust game: E1, E2, m, UNIT, phase, s, t, done
/// as integers; the two subject addresses s1, s2 as byte slices.
pub const TRUST_GAME_GLOBAL_SCHEMA: StateSchema = StateSchema {
    num_byte_slices: 2,
    num_uints: 8,
};
pub const TRUST_GAME_LOCAL_SCHEMA: StateSchema = StateSchema {
    num_byte_slices: 0,
    num_uints: 0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnKind {
    Create,
    OptIn,
    Call,
    Delete,
    Payment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateSchema {
    #[serde(rename = "nbs", skip_serializing_if = "is_zero")]
    pub num_byte_slices: u64,
    #[serde(rename = "nui", skip_serializing_if = "is_zero")]
    pub num_uints: u64,
}

impl StateSchema {
    fn is_empty(&self) -> bool {
        self.num_byte_slices == 0 && self.num_uints == 0
    }
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
enum OnCompletion {
    NoOp = 0,
    OptIn = 1,
    Delete = 5,
}

// ─────────────────────────────────────────────────────────
// Wire form
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
struct WireTxn {
    #[serde(skip_serializing_if = "is_zero")]
    amt: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    apaa: Vec<ByteBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    apan: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    apap: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    apat: Vec<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apgs: Option<StateSchema>,
    #[serde(skip_serializing_if = "is_zero")]
    apid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    apls: Option<StateSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apsu: Option<ByteBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    fee: u64,
    #[serde(skip_serializing_if = "is_zero")]
    fv: u64,
    #[serde(rename = "gen", skip_serializing_if = "String::is_empty")]
    genesis_id: String,
    gh: ByteBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    grp: Option<ByteBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    lv: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rcv: Option<ByteBuf>,
    snd: ByteBuf,
    #[serde(rename = "type")]
    txn_type: &'static str,
}

impl WireTxn {
    fn header(params: &NetworkParams, sender: &Address, txn_type: &'static str, fee: u64) -> Self {
        Self {
            fee,
            fv: params.first_valid_round,
            lv: params.last_valid_round,
            genesis_id: params.genesis_id.clone(),
            gh: ByteBuf::from(params.genesis_hash.to_vec()),
            snd: ByteBuf::from(sender.as_bytes().to_vec()),
            txn_type,
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
struct TxGroup<'a> {
    txlist: &'a [ByteBuf],
}

fn sha512_256(prefix: &[u8], body: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(prefix);
    hasher.update(body);
    hasher.finalize().into()
}

// ─────────────────────────────────────────────────────────
// Unsigned transactions
// ─────────────────────────────────────────────────────────

/// What a transaction does, kept next to its encoded bytes for callers
/// that need to display or validate it before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxnDescriptor {
    pub kind: TxnKind,
    pub sender: Address,
    pub app_id: Option<u64>,
    #[serde(skip)]
    pub args: Vec<Vec<u8>>,
    pub fee: u64,
}

#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    wire: WireTxn,
    bytes: Vec<u8>,
    pub descriptor: TxnDescriptor,
}

impl UnsignedTransaction {
    fn encode(wire: WireTxn, descriptor: TxnDescriptor) -> Result<Self> {
        let bytes = rmp_serde::to_vec_named(&wire)?;
        debug!(
            kind = ?descriptor.kind,
            sender = %descriptor.sender.short(),
            app_id = ?descriptor.app_id,
            len = bytes.len(),
            "Built unsigned transaction"
        );
        Ok(Self {
            wire,
            bytes,
            descriptor,
        })
    }

    /// Canonical msgpack encoding.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The exact byte string a signer signs: `"TX"` followed by the encoding.
    pub fn bytes_to_sign(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len() + 2);
        out.extend_from_slice(b"TX");
        out.extend_from_slice(&self.bytes);
        out
    }

    pub fn raw_id(&self) -> [u8; 32] {
        sha512_256(b"TX", &self.bytes)
    }

    /// 52-character transaction id.
    pub fn id(&self) -> String {
        BASE32_NOPAD.encode(&self.raw_id())
    }

    pub fn group(&self) -> Option<[u8; 32]> {
        self.wire
            .grp
            .as_ref()
            .and_then(|g| <[u8; 32]>::try_from(g.as_slice()).ok())
    }
}

// ─────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────

pub struct AppCreate {
    pub approval_program: Vec<u8>,
    pub clear_program: Vec<u8>,
    pub global_schema: StateSchema,
    pub local_schema: StateSchema,
    pub args: Vec<Vec<u8>>,
    pub note: Option<Vec<u8>>,
}

impl AppCreate {
    /// Create request for the trust game with its fixed storage layout.
    pub fn trust_game(approval_program: Vec<u8>, clear_program: Vec<u8>) -> Self {
        Self {
            approval_program,
            clear_program,
            global_schema: TRUST_GAME_GLOBAL_SCHEMA,
            local_schema: TRUST_GAME_LOCAL_SCHEMA,
            args: Vec::new(),
            note: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppCall {
    pub app_id: u64,
    /// Passed through in order, byte for byte.
    pub args: Vec<Vec<u8>>,
    pub accounts: Vec<Address>,
    /// Inner transactions the call emits; each one adds a base fee.
    pub inner_txns: u64,
}

fn parse_sender(sender: &str) -> Result<Address> {
    sender.parse()
}

fn require_app_id(app_id: u64) -> Result<()> {
    if app_id == 0 {
        return Err(ClientError::InvalidInput(
            "contract id must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn to_bufs(args: &[Vec<u8>]) -> Vec<ByteBuf> {
    args.iter().cloned().map(ByteBuf::from).collect()
}

pub fn build_app_create(
    params: &NetworkParams,
    sender: &str,
    create: AppCreate,
) -> Result<UnsignedTransaction> {
    let sender = parse_sender(sender)?;
    if create.approval_program.is_empty() || create.clear_program.is_empty() {
        return Err(ClientError::InvalidInput(
            "approval and clear programs are both required".to_string(),
        ));
    }

    let mut wire = WireTxn::header(params, &sender, "appl", params.fee);
    wire.apan = OnCompletion::NoOp as u64;
    wire.apaa = to_bufs(&create.args);
    wire.apap = Some(ByteBuf::from(create.approval_program));
    wire.apsu = Some(ByteBuf::from(create.clear_program));
    wire.apgs = Some(create.global_schema).filter(|s| !s.is_empty());
    wire.apls = Some(create.local_schema).filter(|s| !s.is_empty());
    wire.note = create.note.filter(|n| !n.is_empty()).map(ByteBuf::from);

    UnsignedTransaction::encode(
        wire,
        TxnDescriptor {
            kind: TxnKind::Create,
            sender,
            app_id: None,
            args: create.args,
            fee: params.fee,
        },
    )
}

pub fn build_app_opt_in(
    params: &NetworkParams,
    sender: &str,
    app_id: u64,
) -> Result<UnsignedTransaction> {
    let sender = parse_sender(sender)?;
    require_app_id(app_id)?;

    let mut wire = WireTxn::header(params, &sender, "appl", params.fee);
    wire.apid = app_id;
    wire.apan = OnCompletion::OptIn as u64;

    UnsignedTransaction::encode(
        wire,
        TxnDescriptor {
            kind: TxnKind::OptIn,
            sender,
            app_id: Some(app_id),
            args: Vec::new(),
            fee: params.fee,
        },
    )
}

pub fn build_app_call(
    params: &NetworkParams,
    sender: &str,
    call: AppCall,
) -> Result<UnsignedTransaction> {
    let sender = parse_sender(sender)?;
    require_app_id(call.app_id)?;
    let fee = params
        .fee
        .checked_mul(1 + call.inner_txns)
        .ok_or_else(|| ClientError::Range("fee overflows u64".to_string()))?;

    let mut wire = WireTxn::header(params, &sender, "appl", fee);
    wire.apid = call.app_id;
    wire.apan = OnCompletion::NoOp as u64;
    wire.apaa = to_bufs(&call.args);
    wire.apat = call
        .accounts
        .iter()
        .map(|a| ByteBuf::from(a.as_bytes().to_vec()))
        .collect();

    UnsignedTransaction::encode(
        wire,
        TxnDescriptor {
            kind: TxnKind::Call,
            sender,
            app_id: Some(call.app_id),
            args: call.args,
            fee,
        },
    )
}

pub fn build_app_delete(
    params: &NetworkParams,
    sender: &str,
    app_id: u64,
) -> Result<UnsignedTransaction> {
    let sender = parse_sender(sender)?;
    require_app_id(app_id)?;

    let mut wire = WireTxn::header(params, &sender, "appl", params.fee);
    wire.apid = app_id;
    wire.apan = OnCompletion::Delete as u64;

    UnsignedTransaction::encode(
        wire,
        TxnDescriptor {
            kind: TxnKind::Delete,
            sender,
            app_id: Some(app_id),
            args: Vec::new(),
            fee: params.fee,
        },
    )
}

pub fn build_payment(
    params: &NetworkParams,
    sender: &str,
    receiver: &Address,
    amount: u64,
) -> Result<UnsignedTransaction> {
    let sender = parse_sender(sender)?;

    let mut wire = WireTxn::header(params, &sender, "pay", params.fee);
    wire.amt = amount;
    wire.rcv = Some(ByteBuf::from(receiver.as_bytes().to_vec()));

    UnsignedTransaction::encode(
        wire,
        TxnDescriptor {
            kind: TxnKind::Payment,
            sender,
            app_id: None,
            args: Vec::new(),
            fee: params.fee,
        },
    )
}

/// Bind `txns` into one atomic group, re-encoding every member with the
/// shared group id. Any previous group assignment is replaced.
pub fn assign_group(txns: &mut [UnsignedTransaction]) -> Result<[u8; 32]> {
    if txns.is_empty() || txns.len() > MAX_GROUP_SIZE {
        return Err(ClientError::InvalidInput(format!(
            "a group needs 1..={MAX_GROUP_SIZE} transactions, got {}",
            txns.len()
        )));
    }

    let mut ids = Vec::with_capacity(txns.len());
    for txn in txns.iter_mut() {
        if txn.wire.grp.take().is_some() {
            txn.bytes = rmp_serde::to_vec_named(&txn.wire)?;
        }
        ids.push(ByteBuf::from(txn.raw_id().to_vec()));
    }

    let encoded = rmp_serde::to_vec_named(&TxGroup { txlist: &ids })?;
    let group = sha512_256(b"TG", &encoded);

    for txn in txns.iter_mut() {
        txn.wire.grp = Some(ByteBuf::from(group.to_vec()));
        txn.bytes = rmp_serde::to_vec_named(&txn.wire)?;
    }
    debug!("Assigned group {} to {} transactions", hex::encode(group), txns.len());
    Ok(group)
}

// ─────────────────────────────────────────────────────────
// Trust game call vocabulary
// ─────────────────────────────────────────────────────────

/// Application calls understood by the trust game contract. The first
/// argument is always the method tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustGameCall {
    SetPhase(Phase),
    Register { subject_tag: String },
    RegisterExperiment {
        params_hash: [u8; 32],
        n_needed: u64,
        contract_uri: String,
    },
    SetPair { s1: Address, s2: Address },
    Invest { amount: u64 },
    Return { amount: u64 },
    Commit { commitment: [u8; 32] },
    Reveal { choice: String, salt: String },
    Bid { micro_algos: u64 },
    Sweep,
}

impl TrustGameCall {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SetPhase(_) => "set_phase",
            Self::Register { .. } => "register",
            Self::RegisterExperiment { .. } => "registerExperiment",
            Self::SetPair { .. } => "set_pair",
            Self::Invest { .. } => "invest",
            Self::Return { .. } => "return",
            Self::Commit { .. } => "commit",
            Self::Reveal { .. } => "reveal",
            Self::Bid { .. } => "bid",
            Self::Sweep => "sweep",
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::SetPhase(_) => Operation::SetPhase,
            Self::Register { .. } => Operation::Register,
            Self::RegisterExperiment { .. } => Operation::RegisterExperiment,
            Self::SetPair { .. } => Operation::SetPair,
            Self::Invest { .. } => Operation::Invest,
            Self::Return { .. } => Operation::Return,
            Self::Commit { .. } => Operation::Commit,
            Self::Reveal { .. } => Operation::Reveal,
            Self::Bid { .. } => Operation::Bid,
            Self::Sweep => Operation::Sweep,
        }
    }

    /// Extra base fees to attach for the inner payments this call emits.
    /// Sweep is charged one extra fee like invest.
    pub fn inner_txns(&self) -> u64 {
        match self {
            Self::Invest { .. } | Self::Return { .. } | Self::Sweep => 1,
            _ => 0,
        }
    }

    pub fn args(&self) -> Vec<Vec<u8>> {
        let mut args = vec![self.tag().as_bytes().to_vec()];
        match self {
            Self::SetPhase(phase) => args.push(encode_uint64_be(phase.as_u64()).to_vec()),
            Self::Register { subject_tag } => args.push(subject_tag.as_bytes().to_vec()),
            Self::RegisterExperiment {
                params_hash,
                n_needed,
                contract_uri,
            } => {
                args.push(params_hash.to_vec());
                args.push(encode_uint64_be(*n_needed).to_vec());
                args.push(contract_uri.as_bytes().to_vec());
            }
            Self::SetPair { s1, s2 } => {
                args.push(s1.as_bytes().to_vec());
                args.push(s2.as_bytes().to_vec());
            }
            Self::Invest { amount } | Self::Return { amount } => {
                args.push(encode_uint64_be(*amount).to_vec())
            }
            Self::Commit { commitment } => args.push(commitment.to_vec()),
            Self::Reveal { choice, salt } => {
                args.push(choice.as_bytes().to_vec());
                args.push(salt.as_bytes().to_vec());
            }
            Self::Bid { micro_algos } => args.push(encode_uint64_be(*micro_algos).to_vec()),
            Self::Sweep => {}
        }
        args
    }

    pub fn into_app_call(self, app_id: u64, accounts: Vec<Address>) -> AppCall {
        AppCall {
            app_id,
            args: self.args(),
            accounts,
            inner_txns: self.inner_txns(),
        }
    }
}

/// Parse a 32-byte value given as 64 hex characters (optional `0x`) or
/// base64.
pub fn decode_hash32(raw: &str) -> Result<[u8; 32]> {
    let s = raw.trim();
    let hex_part = s.strip_prefix("0x").unwrap_or(s);
    if hex_part.len() == 64 {
        if let Ok(bytes) = hex::decode(hex_part) {
            if let Ok(out) = <[u8; 32]>::try_from(bytes.as_slice()) {
                return Ok(out);
            }
        }
    }
    crate::codec::decode_b64(s)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes.as_slice()).ok())
        .ok_or_else(|| {
            ClientError::InvalidInput("expected 32 bytes as hex or base64".to_string())
        })
}
