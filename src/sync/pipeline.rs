use std::sync::Arc;
use std::time::Duration;

use bitcoin::BlockHash;
use bitcoincore_rpc::Auth;
use tokio::sync::mpsc;

use crate::{
    error::Error,
    storage::ledger::LedgerStore,
    sync::{
        orchestrator::{DEFAULT_MAX_GAP, SyncOrchestrator},
        source::{ChainSource, RpcChainSource},
        stages::{ingest, watch},
    },
};

use super::Config;

const DEFAULT_SYNC_STAGE_QUEUE_SIZE: usize = 20;
const DEFAULT_SYNC_STAGE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

fn gasket_policy(stage_timeout: u64) -> gasket::runtime::Policy {
    let default_retries = gasket::retries::Policy {
        max_retries: 20,
        backoff_unit: Duration::from_secs(1),
        backoff_factor: 2,
        max_backoff: Duration::from_secs(60),
        ..Default::default()
    };

    gasket::runtime::Policy {
        tick_timeout: std::time::Duration::from_secs(stage_timeout).into(),
        bootstrap_retry: default_retries.clone(),
        work_retry: default_retries.clone(),
        teardown_retry: default_retries,
    }
}

pub fn pipeline(
    config: Config,
    db: LedgerStore,
    tip_notifications: Option<mpsc::Receiver<BlockHash>>,
) -> Result<gasket::daemon::Daemon, Error> {
    let auth = Auth::UserPass(config.node.rpc_user.clone(), config.node.rpc_pass.clone());

    let source: Arc<dyn ChainSource> =
        Arc::new(RpcChainSource::new(config.node.rpc_address.clone(), auth));

    // create Ingest stage for applying blocks to the ledger
    let orchestrator = SyncOrchestrator::new(
        db,
        source.clone(),
        config.network.to_bitcoin(),
        config.max_gap.unwrap_or(DEFAULT_MAX_GAP),
    );
    let mut ingest = ingest::Stage::new(orchestrator);

    // create Watch stage for discovering new tips
    let poll_interval = Duration::from_secs(
        config
            .poll_interval_secs
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
    );
    let mut watch = watch::Stage::new(source, poll_interval, tip_notifications);

    // connect stages

    let queue_size = config
        .stage_queue_size
        .unwrap_or(DEFAULT_SYNC_STAGE_QUEUE_SIZE);
    let stage_timeout = config
        .stage_timeout_secs
        .unwrap_or(DEFAULT_SYNC_STAGE_TIMEOUT_SECS);

    let (watch_to_ingest, ingest_from_watch) = gasket::messaging::tokio::mpsc_channel(queue_size);
    watch.downstream.connect(watch_to_ingest);
    ingest.upstream.connect(ingest_from_watch);

    // spawn stages

    let policy = gasket_policy(stage_timeout);

    let watch = gasket::runtime::spawn_stage(watch, policy.clone());
    let ingest = gasket::runtime::spawn_stage(ingest, policy);

    Ok(gasket::daemon::Daemon::new(vec![watch, ingest]))
}
