//! Reconstruction of the experiment's event ledger from transaction history.
//!
//! Every application call against the contract becomes one [`EventRecord`].
//! The event name comes from the first call argument when it is a safe
//! identifier, otherwise from the first log line, otherwise from the
//! transaction's structure. Records are never dropped.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::address::Address;
use crate::codec;
use crate::errors::{ClientError, Result};
use crate::rpc::{ChainGateway, HistoryQuery, IndexerTxn};

pub const MAX_PAGE_SIZE: u32 = 1000;
const MAX_TAG_LEN: usize = 32;

// ─────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerFilter {
    pub app_id: u64,
    pub min_round: Option<u64>,
    pub max_round: Option<u64>,
    pub page_size: u32,
}

impl LedgerFilter {
    pub fn new(app_id: u64) -> Self {
        Self {
            app_id,
            min_round: None,
            max_round: None,
            page_size: MAX_PAGE_SIZE,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.app_id == 0 {
            return Err(ClientError::InvalidInput(
                "contract id must be a positive integer".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ClientError::InvalidInput(format!(
                "page size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if let (Some(min), Some(max)) = (self.min_round, self.max_round) {
            if min > max {
                return Err(ClientError::InvalidInput(format!(
                    "min round {min} is after max round {max}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InnerPayment {
    pub to: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub round: u64,
    pub round_time: Option<u64>,
    pub txid: String,
    pub sender: String,
    pub event: String,
    pub details: Map<String, Value>,
    pub inner_payments: Vec<InnerPayment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerExport {
    pub app_id: u64,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

impl LedgerExport {
    pub fn new(app_id: u64, events: Vec<EventRecord>) -> Self {
        Self {
            app_id,
            count: events.len(),
            events,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Uint,
    Utf8,
    Hex,
    Address,
}

/// Positional fields that follow each known tag.
const RECIPES: &[(&str, &[(&str, FieldKind)])] = &[
    ("set_phase", &[("new_phase", FieldKind::Uint)]),
    ("invest", &[("s", FieldKind::Uint)]),
    ("return", &[("r", FieldKind::Uint)]),
    ("bid", &[("micro_algos", FieldKind::Uint)]),
    ("commit", &[("commit_hex", FieldKind::Hex)]),
    (
        "reveal",
        &[("choice_utf8", FieldKind::Utf8), ("salt_utf8", FieldKind::Utf8)],
    ),
    ("register", &[("subject_tag", FieldKind::Utf8)]),
    ("reg", &[("subject_tag", FieldKind::Utf8)]),
    (
        "registerExperiment",
        &[
            ("params_hash_hex", FieldKind::Hex),
            ("n_needed", FieldKind::Uint),
            ("contract_uri", FieldKind::Utf8),
        ],
    ),
    (
        "set_pair",
        &[("s1", FieldKind::Address), ("s2", FieldKind::Address)],
    ),
];

/// `true` when `tag` is 1..=32 characters of `[A-Za-z0-9_.:-]`.
pub fn is_safe_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-'))
}

fn safe_tag_from_b64(b64: &str) -> Option<String> {
    let raw = codec::decode_b64(b64).ok()?;
    let tag = String::from_utf8(raw).ok()?;
    is_safe_tag(&tag).then_some(tag)
}

fn decode_field(kind: FieldKind, raw: &[u8]) -> Value {
    match kind {
        FieldKind::Uint => match codec::decode_uint64_be(raw) {
            Ok(v) => Value::from(v),
            Err(_) => Value::from(hex::encode(raw)),
        },
        FieldKind::Utf8 => match std::str::from_utf8(raw) {
            Ok(s) => Value::from(s),
            Err(_) => Value::from(hex::encode(raw)),
        },
        FieldKind::Hex => Value::from(hex::encode(raw)),
        FieldKind::Address => match Address::from_slice(raw) {
            Some(addr) => Value::from(addr.to_string()),
            None => Value::from(hex::encode(raw)),
        },
    }
}

fn recipe_details(tag: &str, args: &[String]) -> Map<String, Value> {
    let mut details = Map::new();
    let Some((_, fields)) = RECIPES.iter().find(|(name, _)| *name == tag) else {
        return details;
    };
    for ((name, kind), arg) in fields.iter().zip(args.iter().skip(1)) {
        let value = match codec::decode_b64(arg) {
            Ok(raw) => decode_field(*kind, &raw),
            Err(_) => Value::from(arg.as_str()),
        };
        details.insert((*name).to_string(), value);
    }
    details
}

/// Event name and decoded details for one transaction.
pub fn classify(tx: &IndexerTxn) -> (String, Map<String, Value>) {
    let args = tx
        .application_transaction
        .as_ref()
        .map(|call| call.application_args.as_slice())
        .unwrap_or_default();

    if let Some(tag) = args.first().and_then(|a| safe_tag_from_b64(a)) {
        let details = recipe_details(&tag, args);
        return (tag, details);
    }
    if let Some(tag) = tx.logs.first().and_then(|l| safe_tag_from_b64(l)) {
        return (tag, Map::new());
    }
    let structural = if tx.tx_type == "appl" { "appl" } else { "inner" };
    (structural.to_string(), Map::new())
}

fn collect_inner_payments(tx: &IndexerTxn, out: &mut Vec<InnerPayment>) {
    for inner in &tx.inner_txns {
        if let Some(pay) = &inner.payment_transaction {
            out.push(InnerPayment {
                to: pay.receiver.clone(),
                amount: pay.amount,
            });
        }
        collect_inner_payments(inner, out);
    }
}

pub fn record_from(tx: &IndexerTxn) -> EventRecord {
    let (event, details) = classify(tx);
    let mut inner_payments = Vec::new();
    collect_inner_payments(tx, &mut inner_payments);
    EventRecord {
        round: tx.confirmed_round.unwrap_or(0),
        round_time: tx.round_time,
        txid: tx.id.clone().unwrap_or_default(),
        sender: tx.sender.clone(),
        event,
        details,
        inner_payments,
    }
}

// ─────────────────────────────────────────────────────────
// Pagination
// ─────────────────────────────────────────────────────────

/// Walk every history page for the filter, in upstream order. Any page
/// failure aborts the build.
pub async fn build_ledger<G: ChainGateway + ?Sized>(
    gateway: &G,
    filter: &LedgerFilter,
) -> Result<Vec<EventRecord>> {
    filter.validate()?;

    let mut events = Vec::new();
    let mut next: Option<String> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut pages = 0u32;

    loop {
        let query = HistoryQuery {
            app_id: filter.app_id,
            min_round: filter.min_round,
            max_round: filter.max_round,
            limit: filter.page_size,
            next: next.clone(),
        };
        let page = gateway.search_transactions(&query).await?;
        pages += 1;
        debug!(
            "History page {pages} for app {}: {} transactions",
            filter.app_id,
            page.transactions.len()
        );
        events.extend(page.transactions.iter().map(record_from));

        match page.next_token.filter(|t| !t.is_empty()) {
            None => break,
            Some(token) if !seen.insert(token.clone()) => {
                return Err(ClientError::Decode(format!(
                    "history cursor revisited {token:?}"
                )));
            }
            Some(token) => next = Some(token),
        }
    }

    info!(
        "Built ledger for app {}: {} events over {pages} page(s)",
        filter.app_id,
        events.len()
    );
    Ok(events)
}

// ─────────────────────────────────────────────────────────
// CSV
// ─────────────────────────────────────────────────────────

pub const CSV_HEADER: &str = "round,round_time,txid,sender,event,details_json";

pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One header row then one row per event. Inner payments are not part of
/// the CSV layout.
pub fn to_csv(events: &[EventRecord]) -> Result<String> {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for e in events {
        let details = serde_json::to_string(&e.details)?;
        let round_time = e.round_time.map(|t| t.to_string()).unwrap_or_default();
        let row = [
            e.round.to_string(),
            round_time,
            e.txid.clone(),
            e.sender.clone(),
            e.event.clone(),
            details,
        ];
        let escaped: Vec<String> = row.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&escaped.join(","));
        out.push('\n');
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
