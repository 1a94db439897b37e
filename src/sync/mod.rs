use serde::Deserialize;

pub mod orchestrator;
pub mod pipeline;
pub mod source;
pub mod stages;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub network: Network,

    /// Seconds between chain-tip polls when no push notification arrives
    pub poll_interval_secs: Option<u64>,
    /// Max unapplied ancestors to backfill before declaring a sync gap
    pub max_gap: Option<u64>,

    /// Max in-flight triggers between the watch and ingest stage
    pub stage_queue_size: Option<usize>,
    pub stage_timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NodeConfig {
    pub rpc_address: String,
    pub rpc_user: String,
    pub rpc_pass: String,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet4,
    Regtest,
}

impl Network {
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            Self::Mainnet => bitcoin::Network::Bitcoin,
            Self::Testnet4 => bitcoin::Network::Testnet4,
            Self::Regtest => bitcoin::Network::Regtest,
        }
    }
}
