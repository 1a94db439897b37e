use crate::error::Error;
use crate::storage::ledger::LedgerStore;
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use axum_server::Server;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::info;
use utoipa::OpenApi;

use error::ServeError;
use types::ChainTip;

mod error;
mod openapi;
mod routes;
mod types;

pub static DEFAULT_SERVE_ADDRESS: &str = "0.0.0.0:8080";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerStore,
}

pub async fn run(ledger: LedgerStore, address: &str) -> Result<(), Error> {
    let app_state = AppState { ledger };

    let app = Router::new()
        .route("/", get(root))
        .route("/tip", get(tip))
        .route("/openapi.json", get(openapi_json))
        .nest("/addresses", routes::addresses::router())
        .with_state(app_state);

    let addr = address
        .parse::<SocketAddr>()
        .map_err(|e| Error::Config(format!("invalid serve address '{address}': {e}")))?;

    info!("api listening on {}...", addr);

    Server::bind(addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| Error::Custom(e.to_string()))?;

    Ok(())
}

fn chain_tip(ledger: &LedgerStore) -> Result<Option<ChainTip>, ServeError> {
    let cursor = ledger.cursor()?;

    Ok(cursor.map(|cursor| ChainTip {
        block_hash: cursor.block_hash().to_string(),
        block_height: cursor.height,
    }))
}

async fn root() -> &'static str {
    "Cardinal API Server"
}

async fn tip(State(state): State<AppState>) -> Result<impl IntoResponse, ServeError> {
    let json = match chain_tip(&state.ledger)? {
        Some(tip) => Json(json!({
            "height": tip.block_height,
            "hash": tip.block_hash,
        })),
        None => Json(json!({})),
    };

    Ok(json.into_response())
}

async fn openapi_json() -> impl IntoResponse {
    Json(openapi::APIDoc::openapi())
}
