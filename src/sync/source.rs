use async_trait::async_trait;
use bitcoin::{Block, BlockHash};
use bitcoincore_rpc::{Auth, Client, RpcApi};

use crate::error::Error;

/// Boundary to the chain-data collaborator: block-by-hash fetch and
/// chain-tip discovery. Tip push notifications are delivered separately, on
/// the channel feeding the watch stage.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn fetch_block(&self, hash: BlockHash) -> Result<Block, Error>;

    async fn fetch_chain_tip(&self) -> Result<BlockHash, Error>;

    /// Height of a block as reported by the source. Only consulted when
    /// bootstrapping an empty ledger; afterwards heights derive from the
    /// cursor.
    async fn fetch_block_height(&self, hash: BlockHash) -> Result<u64, Error>;
}

/// Bitcoin Core JSON-RPC implementation. The rpc client is blocking, so
/// every call runs on the blocking pool with a per-call client (construction
/// is connectionless and cheap).
pub struct RpcChainSource {
    rpc_address: String,
    auth: Auth,
}

impl RpcChainSource {
    pub fn new(rpc_address: String, auth: Auth) -> Self {
        Self { rpc_address, auth }
    }

    async fn with_client<T, F>(&self, call: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&Client) -> Result<T, bitcoincore_rpc::Error> + Send + 'static,
    {
        let rpc_address = self.rpc_address.clone();
        let auth = self.auth.clone();

        tokio::task::spawn_blocking(move || {
            let client = Client::new(&rpc_address, auth).map_err(Error::fetch)?;

            call(&client).map_err(Error::fetch)
        })
        .await
        .map_err(Error::fetch)?
    }
}

#[async_trait]
impl ChainSource for RpcChainSource {
    async fn fetch_block(&self, hash: BlockHash) -> Result<Block, Error> {
        self.with_client(move |client| client.get_block(&hash)).await
    }

    async fn fetch_chain_tip(&self) -> Result<BlockHash, Error> {
        self.with_client(|client| client.get_best_block_hash())
            .await
    }

    async fn fetch_block_height(&self, hash: BlockHash) -> Result<u64, Error> {
        self.with_client(move |client| {
            client
                .get_block_header_info(&hash)
                .map(|info| info.height as u64)
        })
        .await
    }
}
