use super::{routes::addresses, types::*};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cardinal",
        version = "v0.1.0",
        description = "Cardinal is an inscription-aware Bitcoin UTxO indexer and API server. It tracks spendable outputs while withholding those carrying ordinal, satribute or rune envelopes, and always serves the last successfully applied chain state.",
        license(
            name = "Apache 2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0.txt"
        )
    ),
    paths(addresses::addresses_spendable_utxos),
    components(schemas(
        ChainTip,
        // --
        ServeResponse<Vec<SpendableUtxo>>,
        // ---
        SpendableUtxo,
    )),
)]
pub struct APIDoc;
