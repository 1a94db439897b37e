use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router, response::IntoResponse};

use crate::serve::error::ServeError;
use crate::serve::types::{ServeResponse, SpendableUtxo};
use crate::serve::{AppState, chain_tip};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{address}/spendable-utxos",
        get(addresses_spendable_utxos),
    )
}

#[utoipa::path(
    tag = "Addresses",
    get,
    path = "/addresses/{address}/spendable-utxos",
    params(
        ("address" = String, Path, description = "Bitcoin address", example="tb1qphcdyah2e4vtpxn56hsz3p6kapg90pl4x525kc"),
    ),
    responses(
        (
            status = 200,
            description = "Requested data",
            body = ServeResponse<Vec<SpendableUtxo>>,
            example = json!(EXAMPLE_RESPONSE)
        ),
        (status = 400, description = "Malformed query parameters"),
        (status = 500, description = "Internal server error"),
    )
)]
/// Spendable UTxOs by Address
///
/// Returns UTxOs controlled by the provided address which do not carry an
/// inscription, unordered. Always reflects the last applied block.
pub async fn addresses_spendable_utxos(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let address = bitcoin::Address::from_str(&address)
        .map_err(|_| ServeError::malformed_request("invalid address"))?;

    // the ledger keys addresses by their canonical display form
    let address = address.assume_checked().to_string();

    let utxos = state
        .ledger
        .spendable_utxos(&address)?
        .into_iter()
        .map(|(txo_ref, utxo)| SpendableUtxo {
            txid: txo_ref.txid().to_string(),
            vout: txo_ref.txo_index,
            address: utxo.address,
            value: utxo.value,
        })
        .collect::<Vec<_>>();

    let out = ServeResponse {
        data: utxos,
        chain_tip: chain_tip(&state.ledger)?,
    };

    Ok((StatusCode::OK, Json(out)))
}

static EXAMPLE_RESPONSE: &str = r##"{
  "data": [
    {
      "txid": "63937d48e35d15a7c5530469210c202104cc94a945cc848554f336b3f4f24121",
      "vout": 1,
      "address": "tb1qphcdyah2e4vtpxn56hsz3p6kapg90pl4x525kc",
      "value": 10000
    }
  ],
  "chain_tip": {
    "block_hash": "00000000000000108a4cd9755381003a01bea7998ca2d770fe09b576753ac7ef",
    "block_height": 31633
  }
}"##;
