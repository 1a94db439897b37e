use std::sync::{Arc, Mutex};
use std::time::Duration;

use bitcoin::BlockHash;
use gasket::framework::*;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::sync::source::ChainSource;

/*
    Watch Stage

    Announces chain tips to the ingest stage: one catch-up announcement on
    startup, then new tips discovered by polling the chain source and by
    draining an optional push-notification channel (a zmq hashblock listener
    or anything else producing tip hashes). Consecutive duplicate
    announcements are collapsed; the ingest stage treats any already-applied
    hash as a no-op, so at-least-once delivery is safe.
*/

pub type DownstreamPort = gasket::messaging::tokio::OutputPort<BlockHash>;

#[derive(Stage)]
#[stage(name = "watch", unit = "BlockHash", worker = "Worker")]
pub struct Stage {
    source: Arc<dyn ChainSource>,
    poll_interval: Duration,
    // taken by the worker at bootstrap
    notifications: Mutex<Option<mpsc::Receiver<BlockHash>>>,

    pub downstream: DownstreamPort,
}

impl Stage {
    pub fn new(
        source: Arc<dyn ChainSource>,
        poll_interval: Duration,
        notifications: Option<mpsc::Receiver<BlockHash>>,
    ) -> Self {
        Self {
            source,
            poll_interval,
            notifications: Mutex::new(notifications),
            downstream: Default::default(),
        }
    }
}

pub struct Worker {
    notifications: Option<mpsc::Receiver<BlockHash>>,
    last_announced: Option<BlockHash>,
    init: bool,
}

enum Polled {
    Pushed(BlockHash),
    Tick,
    Closed,
}

#[async_trait::async_trait(?Send)]
impl gasket::framework::Worker<Stage> for Worker {
    async fn bootstrap(stage: &Stage) -> Result<Self, WorkerError> {
        Ok(Worker {
            notifications: stage.notifications.lock().unwrap().take(),
            last_announced: None,
            init: false,
        })
    }

    async fn schedule(
        &mut self,
        stage: &mut Stage,
    ) -> Result<WorkSchedule<BlockHash>, WorkerError> {
        // catch up to the current tip before waiting on anything
        if !self.init {
            let tip = stage.source.fetch_chain_tip().await.or_retry()?;

            self.init = true;
            self.last_announced = Some(tip);

            return Ok(WorkSchedule::Unit(tip));
        }

        loop {
            let polled = match self.notifications.as_mut() {
                Some(notifications) => {
                    tokio::select! {
                        pushed = notifications.recv() => match pushed {
                            Some(hash) => Polled::Pushed(hash),
                            None => Polled::Closed,
                        },
                        _ = tokio::time::sleep(stage.poll_interval) => Polled::Tick,
                    }
                }
                None => {
                    tokio::time::sleep(stage.poll_interval).await;
                    Polled::Tick
                }
            };

            let tip = match polled {
                Polled::Pushed(hash) => hash,
                Polled::Tick => stage.source.fetch_chain_tip().await.or_retry()?,
                Polled::Closed => {
                    // notifier went away; poll only from here on
                    debug!("tip notification channel closed");
                    self.notifications = None;
                    continue;
                }
            };

            if self.last_announced == Some(tip) {
                continue;
            }

            self.last_announced = Some(tip);

            return Ok(WorkSchedule::Unit(tip));
        }
    }

    async fn execute(&mut self, unit: &BlockHash, stage: &mut Stage) -> Result<(), WorkerError> {
        info!(tip = %unit, "announcing tip");

        stage.downstream.send((*unit).into()).await.or_panic()?;

        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }
}
