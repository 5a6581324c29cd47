//! Trust game read API entry point.
//!
//! Serves network parameters, contract and account state, and the
//! reconstructed experiment ledger over a small Axum REST API.

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trustgame::api::{self, ApiState};
use trustgame::config::Config;
use trustgame::rpc::HttpGateway;
use trustgame::TrustGameClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let gateway = HttpGateway::from_config(&config)?;
    info!(
        "Node: {} | Indexer: {} | Default contract: {:?}",
        config.algod_url, config.indexer_url, config.app_id
    );

    let state = Arc::new(ApiState {
        client: TrustGameClient::new(gateway, &config),
    });

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
