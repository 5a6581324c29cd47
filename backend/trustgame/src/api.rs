//! Axum REST API handlers.
//!
//! Read-only surface over the client: network parameters, account and
//! contract state, and the experiment ledger as JSON or CSV.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::TrustGameClient;
use crate::codec;
use crate::config::parse_app_id;
use crate::errors::ClientError;
use crate::ledger;
use crate::params::NetworkName;
use crate::rpc::ChainGateway;
use crate::state::DecodedState;

pub struct ApiState<G> {
    pub client: TrustGameClient<G>,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ParamsResponse {
    pub fee: u64,
    pub first_valid_round: u64,
    pub last_valid_round: u64,
    pub genesis_id: String,
    pub genesis_hash: String,
    pub network: NetworkName,
}

#[derive(Serialize)]
pub struct LocalStateResponse {
    pub app_id: u64,
    pub address: String,
    pub opted_in: bool,
    pub state: DecodedState,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(alias = "minRound")]
    pub min_round: Option<u64>,
    #[serde(alias = "maxRound")]
    pub max_round: Option<u64>,
}

fn status_for(e: &ClientError) -> StatusCode {
    match e {
        e if e.is_caller_input() => StatusCode::BAD_REQUEST,
        ClientError::Upstream { status, .. } | ClientError::Submission { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        // Config faults reaching a handler come from upstream payloads.
        ClientError::Config(_) | ClientError::Decode(_) | ClientError::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: ClientError) -> Response {
    let status = status_for(&e);
    if status.is_server_error() {
        warn!("Request failed: {e}");
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Application id from the request path; a bad id is the caller's fault.
fn app_id_from_path(raw: &str) -> Result<u64, Response> {
    parse_app_id(raw).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response()
    })
}

fn json_or_error<T: Serialize>(result: Result<T, ClientError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => error_response(e),
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /params`
pub async fn get_params<G: ChainGateway>(State(state): State<Arc<ApiState<G>>>) -> Response {
    json_or_error(state.client.network_params().await.map(|p| ParamsResponse {
        network: p.network_name(),
        fee: p.fee,
        first_valid_round: p.first_valid_round,
        last_valid_round: p.last_valid_round,
        genesis_hash: codec::encode_b64(&p.genesis_hash),
        genesis_id: p.genesis_id,
    }))
}

/// `GET /accounts/:addr`
pub async fn get_account<G: ChainGateway>(
    State(state): State<Arc<ApiState<G>>>,
    Path(address): Path<String>,
) -> Response {
    json_or_error(state.client.account(&address).await)
}

/// `GET /apps/:id/globals`
pub async fn get_globals<G: ChainGateway>(
    State(state): State<Arc<ApiState<G>>>,
    Path(id): Path<String>,
) -> Response {
    let app_id = match app_id_from_path(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    json_or_error(state.client.application(Some(app_id)).await)
}

/// `GET /apps/:id/local/:addr`
pub async fn get_local<G: ChainGateway>(
    State(state): State<Arc<ApiState<G>>>,
    Path((id, address)): Path<(String, String)>,
) -> Response {
    let app_id = match app_id_from_path(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    json_or_error(
        state
            .client
            .local_state(Some(app_id), &address)
            .await
            .map(|local| LocalStateResponse {
                app_id,
                address,
                opted_in: !local.is_empty(),
                state: local,
            }),
    )
}

/// `GET /apps/:id/history?min_round=&max_round=`
pub async fn get_history<G: ChainGateway>(
    State(state): State<Arc<ApiState<G>>>,
    Path(id): Path<String>,
    Query(range): Query<HistoryParams>,
) -> Response {
    let app_id = match app_id_from_path(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    json_or_error(
        state
            .client
            .history(Some(app_id), range.min_round, range.max_round)
            .await
            .map(|events| ledger::LedgerExport::new(app_id, events)),
    )
}

/// `GET /apps/:id/export?min_round=&max_round=`
///
/// Ledger as a CSV attachment.
pub async fn export_csv<G: ChainGateway>(
    State(state): State<Arc<ApiState<G>>>,
    Path(id): Path<String>,
    Query(range): Query<HistoryParams>,
) -> Response {
    let app_id = match app_id_from_path(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let csv = match state
        .client
        .export(Some(app_id), range.min_round, range.max_round)
        .await {
        Ok(export) => ledger::to_csv(&export.events),
        Err(e) => return error_response(e),
    };
    match csv {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"trustgame-{app_id}.csv\""),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub fn router<G: ChainGateway + 'static>(state: Arc<ApiState<G>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/params", get(get_params::<G>))
        .route("/accounts/:addr", get(get_account::<G>))
        .route("/apps/:id/globals", get(get_globals::<G>))
        .route("/apps/:id/local/:addr", get(get_local::<G>))
        .route("/apps/:id/history", get(get_history::<G>))
        .route("/apps/:id/export", get(export_csv::<G>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::rpc::{IndexerAppCall, IndexerTxn, TransactionPage};
    use crate::testing::MockGateway;
    use axum::body::to_bytes;
    use axum::http::Uri;
    use serde_json::{json, Value};

    fn state(gateway: MockGateway) -> State<Arc<ApiState<MockGateway>>> {
        State(Arc::new(ApiState {
            client: TrustGameClient::new(gateway, &test_config()),
        }))
    }

    async fn body_of(response: Response) -> (StatusCode, String) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn bad_app_id_is_a_client_error() {
        let (status, body) = body_of(
            get_globals(state(MockGateway::default()), Path("zero".to_string())).await,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("APP_ID"));
    }

    #[tokio::test]
    async fn missing_application_passes_upstream_status() {
        let (status, _) =
            body_of(get_globals(state(MockGateway::default()), Path("77".to_string())).await)
                .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn params_expose_base64_genesis_hash() {
        let gateway = MockGateway::default();
        gateway.set_params_body(
            &json!({
                "last-round": 9,
                "genesis-id": "mainnet-v1.0",
                "genesis-hash": codec::encode_b64(&[4u8; 32])
            })
            .to_string(),
        );
        let (status, body) = body_of(get_params(state(gateway)).await).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["network"], "mainnet");
        assert_eq!(json["genesis_hash"], codec::encode_b64(&[4u8; 32]));
        assert_eq!(json["last_valid_round"], 1009);
    }

    #[tokio::test]
    async fn export_is_csv() {
        let gateway = MockGateway::default();
        gateway.queue_page(TransactionPage {
            transactions: vec![IndexerTxn {
                id: Some("T1".to_string()),
                confirmed_round: Some(3),
                sender: "S".to_string(),
                tx_type: "appl".to_string(),
                application_transaction: Some(IndexerAppCall {
                    application_id: 77,
                    application_args: vec![codec::encode_utf8_b64("register"), codec::encode_utf8_b64("a,b")],
                    on_completion: None,
                }),
                ..Default::default()
            }],
            next_token: None,
            current_round: None,
        });
        let response = export_csv(
            state(gateway),
            Path("77".to_string()),
            Query(HistoryParams::default()),
        )
        .await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let (status, body) = body_of(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            format!(
                "{}\n3,,T1,S,register,\"{{\"\"subject_tag\"\":\"\"a,b\"\"}}\"\n",
                ledger::CSV_HEADER
            )
        );
    }

    #[tokio::test]
    async fn export_passes_round_bounds_upstream() {
        let State(shared) = state(MockGateway::default());
        let uri: Uri = "/apps/77/export?minRound=10&max_round=20".parse().unwrap();
        let range: Query<HistoryParams> = Query::try_from_uri(&uri).unwrap();
        let response = export_csv(State(shared.clone()), Path("77".to_string()), range).await;
        assert_eq!(response.status(), StatusCode::OK);
        let queries = shared.client.gateway().history_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].min_round, Some(10));
        assert_eq!(queries[0].max_round, Some(20));
    }

    #[tokio::test]
    async fn malformed_upstream_params_are_a_gateway_error() {
        let gateway = MockGateway::default();
        gateway.set_params_body("<html>maintenance</html>");
        let (status, body) = body_of(get_params(state(gateway)).await).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("not JSON"));

        let gateway = MockGateway::default();
        gateway.set_params_body(&json!({ "last-round": 9, "genesis-id": "x" }).to_string());
        let (status, _) = body_of(get_params(state(gateway)).await).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn local_state_of_non_member_is_empty() {
        let gateway = MockGateway::default();
        let address = crate::address::Address::from_public_key([8u8; 32]).to_string();
        gateway.insert_account(
            serde_json::from_value(json!({ "address": address, "amount": 5 })).unwrap(),
        );
        let (status, body) = body_of(
            get_local(state(gateway), Path(("77".to_string(), address.clone()))).await,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["opted_in"], false);
        assert_eq!(json["address"], address);
    }
}
