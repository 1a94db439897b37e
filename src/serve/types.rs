use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// -- core types

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServeResponse<T> {
    pub data: T,
    pub chain_tip: Option<ChainTip>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChainTip {
    /// The hash of the block
    pub block_hash: String,

    /// The height of the block in the blockchain
    pub block_height: u64,
}

// -- endpoint types

#[derive(Serialize, ToSchema)]
pub struct SpendableUtxo {
    pub txid: String,
    pub vout: u32,
    pub address: Option<String>,
    pub value: u64,
}
