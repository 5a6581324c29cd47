//! Node and indexer access.
//!
//! Everything the core needs from the network goes through the
//! [`ChainGateway`] trait. [`HttpGateway`] implements it against the node
//! (algod) and indexer REST APIs; tests substitute an in-memory double.
//!
//! Credentials are attached here, from configuration, and nowhere else.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::{ClientError, Result};

const API_KEY_HEADER: &str = "X-API-Key";

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompileResponse {
    /// Base64 program bytes.
    pub result: String,
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "txId", alias = "txid", alias = "txID")]
    tx_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingTxn {
    #[serde(rename = "confirmed-round", alias = "confirmedRound", default)]
    pub confirmed_round: Option<u64>,
    #[serde(rename = "application-index", alias = "applicationIndex", default)]
    pub application_index: Option<u64>,
    #[serde(rename = "pool-error", alias = "poolError", default)]
    pub pool_error: Option<String>,
}

/// Key/value record as stored in global or local state. `type` 1 is a byte
/// string, 2 an integer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawKeyValue {
    pub key: String,
    pub value: RawTealValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawTealValue {
    #[serde(rename = "type")]
    pub value_type: u8,
    #[serde(default)]
    pub bytes: String,
    #[serde(default)]
    pub uint: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppLocalState {
    pub id: u64,
    #[serde(rename = "key-value", default)]
    pub key_value: Vec<RawKeyValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub address: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(rename = "min-balance", default)]
    pub min_balance: u64,
    #[serde(rename = "apps-local-state", default)]
    pub apps_local_state: Vec<AppLocalState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSchema {
    #[serde(rename = "num-uint", default)]
    pub num_uint: u64,
    #[serde(rename = "num-byte-slice", default)]
    pub num_byte_slice: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationParams {
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(rename = "global-state-schema", default)]
    pub global_state_schema: RawSchema,
    #[serde(rename = "global-state", default)]
    pub global_state: Vec<RawKeyValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationResponse {
    pub id: u64,
    pub params: ApplicationParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexerAppCall {
    #[serde(rename = "application-id", default)]
    pub application_id: u64,
    #[serde(rename = "application-args", default)]
    pub application_args: Vec<String>,
    #[serde(rename = "on-completion", default)]
    pub on_completion: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexerPayment {
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub amount: u64,
}

/// One transaction as returned by the indexer search endpoint. Inner
/// transactions share the shape but usually lack `id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexerTxn {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "confirmed-round", default)]
    pub confirmed_round: Option<u64>,
    #[serde(rename = "round-time", default)]
    pub round_time: Option<u64>,
    #[serde(default)]
    pub sender: String,
    #[serde(rename = "tx-type", default)]
    pub tx_type: String,
    #[serde(rename = "application-transaction", default)]
    pub application_transaction: Option<IndexerAppCall>,
    #[serde(rename = "payment-transaction", default)]
    pub payment_transaction: Option<IndexerPayment>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(rename = "inner-txns", default)]
    pub inner_txns: Vec<IndexerTxn>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub transactions: Vec<IndexerTxn>,
    #[serde(rename = "next-token", default)]
    pub next_token: Option<String>,
    #[serde(rename = "current-round", default)]
    pub current_round: Option<u64>,
}

/// Parameters of one history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub app_id: u64,
    pub min_round: Option<u64>,
    pub max_round: Option<u64>,
    pub limit: u32,
    pub next: Option<String>,
}

impl HistoryQuery {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("application-id", self.app_id.to_string()),
            ("tx-type", "appl".to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(min) = self.min_round {
            pairs.push(("min-round", min.to_string()));
        }
        if let Some(max) = self.max_round {
            pairs.push(("max-round", max.to_string()));
        }
        if let Some(next) = &self.next {
            pairs.push(("next", next.clone()));
        }
        pairs
    }
}

// ─────────────────────────────────────────────────────────
// Gateway seam
// ─────────────────────────────────────────────────────────

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Raw body of the suggested-parameters endpoint; shape varies by node.
    async fn suggested_params(&self) -> Result<String>;

    async fn compile(&self, source: &str) -> Result<CompileResponse>;

    /// Transmit signed bytes and return the transaction id.
    async fn send_raw_transaction(&self, payload: &[u8]) -> Result<String>;

    async fn pending_transaction(&self, tx_id: &str) -> Result<PendingTxn>;

    async fn account(&self, address: &str) -> Result<AccountResponse>;

    async fn application(&self, app_id: u64) -> Result<ApplicationResponse>;

    async fn search_transactions(&self, query: &HistoryQuery) -> Result<TransactionPage>;
}

// ─────────────────────────────────────────────────────────
// HTTP implementation
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    algod_url: String,
    algod_token: String,
    indexer_url: String,
    indexer_token: String,
}

impl HttpGateway {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            algod_url: config.algod_url.trim_end_matches('/').to_string(),
            algod_token: config.algod_token.clone(),
            indexer_url: config.indexer_url.trim_end_matches('/').to_string(),
            indexer_token: config.indexer_token.clone(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self::new(client, config))
    }

    fn algod(&self, request: RequestBuilder) -> RequestBuilder {
        with_api_key(request, &self.algod_token)
    }

    fn indexer(&self, request: RequestBuilder) -> RequestBuilder {
        with_api_key(request, &self.indexer_token)
    }

    fn algod_path(&self, path: &str) -> String {
        format!("{}{path}", self.algod_url)
    }
}

fn with_api_key(request: RequestBuilder, token: &str) -> RequestBuilder {
    if token.is_empty() {
        request
    } else {
        request.header(API_KEY_HEADER, token)
    }
}

/// Read a response body, mapping non-2xx to `on_status` and unparseable
/// JSON to [`ClientError::Decode`].
async fn read_json<T: DeserializeOwned>(
    request: RequestBuilder,
    on_status: fn(StatusCode, String) -> ClientError,
) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        warn!("Upstream returned HTTP {status}");
        return Err(on_status(status, body));
    }
    serde_json::from_str(&body).map_err(|e| {
        ClientError::Decode(format!("unexpected response body ({e}): {}", truncate(&body)))
    })
}

fn submission_error(status: StatusCode, body: String) -> ClientError {
    ClientError::Submission {
        status: status.as_u16(),
        body,
    }
}

fn upstream_error(status: StatusCode, body: String) -> ClientError {
    ClientError::Upstream {
        status: status.as_u16(),
        body,
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl ChainGateway for HttpGateway {
    async fn suggested_params(&self) -> Result<String> {
        let response = self
            .algod(self.client.get(self.algod_path("/v2/transactions/params")))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(upstream_error(status, body));
        }
        Ok(body)
    }

    async fn compile(&self, source: &str) -> Result<CompileResponse> {
        let request = self
            .algod(self.client.post(self.algod_path("/v2/teal/compile")))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(source.to_string());
        read_json(request, upstream_error).await
    }

    async fn send_raw_transaction(&self, payload: &[u8]) -> Result<String> {
        let request = self
            .algod(self.client.post(self.algod_path("/v2/transactions")))
            .header(reqwest::header::CONTENT_TYPE, "application/x-binary")
            .body(payload.to_vec());
        let submitted: SubmitResponse = read_json(request, submission_error).await?;
        debug!("Submitted {} bytes → {}", payload.len(), submitted.tx_id);
        Ok(submitted.tx_id)
    }

    async fn pending_transaction(&self, tx_id: &str) -> Result<PendingTxn> {
        let url = self.algod_path(&format!("/v2/transactions/pending/{tx_id}"));
        read_json(self.algod(self.client.get(url)), upstream_error).await
    }

    async fn account(&self, address: &str) -> Result<AccountResponse> {
        let url = self.algod_path(&format!("/v2/accounts/{address}"));
        read_json(self.algod(self.client.get(url)), upstream_error).await
    }

    async fn application(&self, app_id: u64) -> Result<ApplicationResponse> {
        let url = self.algod_path(&format!("/v2/applications/{app_id}"));
        read_json(self.algod(self.client.get(url)), upstream_error).await
    }

    async fn search_transactions(&self, query: &HistoryQuery) -> Result<TransactionPage> {
        let url = format!("{}/v2/transactions", self.indexer_url);
        let request = self
            .indexer(self.client.get(url))
            .query(&query.to_query_pairs());
        let page: TransactionPage = read_json(request, upstream_error).await?;
        debug!(
            "Fetched {} transactions (next_token={:?})",
            page.transactions.len(),
            page.next_token
        );
        Ok(page)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
