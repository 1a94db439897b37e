use bitcoin::BlockHash;
use gasket::framework::*;
use tracing::{error, info, warn};

use crate::{
    error::Error,
    sync::orchestrator::{SyncOrchestrator, SyncOutcome},
};

/*
    Ingest Stage

    Single worker consuming tip announcements and driving the orchestrator
    through fetch, transition build and atomic apply. One block is ever in
    flight; announcements arriving meanwhile queue on the bounded upstream
    port.
*/

pub type UpstreamPort = gasket::messaging::InputPort<BlockHash>;

#[derive(Stage)]
#[stage(name = "ingest", unit = "BlockHash", worker = "Worker")]
pub struct Stage {
    orchestrator: SyncOrchestrator,

    pub upstream: UpstreamPort,
}

impl Stage {
    pub fn new(orchestrator: SyncOrchestrator) -> Self {
        Self {
            orchestrator,
            upstream: Default::default(),
        }
    }
}

pub struct Worker;

#[async_trait::async_trait(?Send)]
impl gasket::framework::Worker<Stage> for Worker {
    async fn bootstrap(_stage: &Stage) -> Result<Self, WorkerError> {
        Ok(Worker)
    }

    async fn schedule(
        &mut self,
        stage: &mut Stage,
    ) -> Result<WorkSchedule<BlockHash>, WorkerError> {
        let unit = stage.upstream.recv().await.or_panic()?;

        Ok(WorkSchedule::Unit(unit.payload))
    }

    async fn execute(&mut self, unit: &BlockHash, stage: &mut Stage) -> Result<(), WorkerError> {
        match stage.orchestrator.sync_to(*unit).await {
            Ok(SyncOutcome::AlreadyApplied) => {
                info!(tip = %unit, "trigger already applied");
                Ok(())
            }
            Ok(SyncOutcome::Applied(applied)) => {
                info!(tip = %unit, applied, "synced");
                Ok(())
            }
            Err(err @ Error::MalformedBlock { .. }) => {
                // never partially applied; a later trigger may retry it
                warn!(tip = %unit, "skipping block: {err}");
                Ok(())
            }
            Err(err) if err.is_transient() => {
                warn!(tip = %unit, "transient sync error, backing off: {err}");
                Err(WorkerError::Retry)
            }
            Err(err) => {
                // discontinuity or gap: halt for external intervention
                error!(tip = %unit, "halting ingestion: {err}");
                Err(WorkerError::Panic)
            }
        }
    }

    async fn teardown(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }
}
