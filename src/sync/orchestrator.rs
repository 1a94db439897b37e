use std::sync::Arc;

use bitcoin::hashes::Hash;
use bitcoin::{Block, BlockHash};
use tracing::info;

use crate::{
    error::Error,
    storage::ledger::LedgerStore,
    sync::{source::ChainSource, stages::Point},
    transition::build_transition,
};

pub const DEFAULT_MAX_GAP: u64 = 1_000;

/// Outcome of handling one tip trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The trigger named the cursor or an already-applied ancestor
    AlreadyApplied,
    /// This many blocks were folded into the ledger
    Applied(u64),
}

/// Serializes tip triggers into `fetch → build → apply` steps. The ingest
/// stage owns exactly one orchestrator, so no two applies ever run
/// concurrently; the parent walk below enforces apply order between a block
/// and its ancestors.
pub struct SyncOrchestrator {
    ledger: LedgerStore,
    source: Arc<dyn ChainSource>,
    network: bitcoin::Network,
    max_gap: u64,
}

impl SyncOrchestrator {
    pub fn new(
        ledger: LedgerStore,
        source: Arc<dyn ChainSource>,
        network: bitcoin::Network,
        max_gap: u64,
    ) -> Self {
        Self {
            ledger,
            source,
            network,
            max_gap,
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Bring the ledger up to `target`. Duplicate and out-of-order triggers
    /// are no-ops; missing ancestors are fetched and applied parent-first, so
    /// the cursor reflects every block before its child is attempted.
    pub async fn sync_to(&mut self, target: BlockHash) -> Result<SyncOutcome, Error> {
        let cursor = self.ledger.cursor()?;

        if self.ledger.height_of(&target.to_byte_array())?.is_some() {
            return Ok(SyncOutcome::AlreadyApplied);
        }

        let Some(cursor) = cursor else {
            // empty ledger: adopt the announced block as the starting point,
            // at the height the source reports for it
            let block = self.source.fetch_block(target).await?;
            let height = self.source.fetch_block_height(target).await?;

            let point = Point {
                height,
                hash: target,
            };

            self.apply_block(point, &block)?;
            info!(%point, "bootstrapped empty ledger");

            return Ok(SyncOutcome::Applied(1));
        };

        // walk parents until the fetched ancestry reconnects with the cursor
        let mut pending = Vec::new();
        let mut hash = target;

        loop {
            let block = self.source.fetch_block(hash).await?;
            let parent = block.header.prev_blockhash;

            pending.push((hash, block));

            if parent.to_byte_array() == cursor.hash {
                break;
            }

            if parent == BlockHash::all_zeros()
                || self.ledger.height_of(&parent.to_byte_array())?.is_some()
            {
                // ancestry rejoins the applied chain below the tip: a fork,
                // which this indexer does not repair
                return Err(Error::ChainDiscontinuity {
                    block: target.to_string(),
                    cursor: cursor.block_hash().to_string(),
                });
            }

            if pending.len() as u64 >= self.max_gap {
                return Err(Error::SyncGap {
                    block: target.to_string(),
                    max_gap: self.max_gap,
                });
            }

            hash = parent;
        }

        let applied = pending.len() as u64;
        let mut height = cursor.height;

        for (hash, block) in pending.into_iter().rev() {
            height += 1;

            self.apply_block(Point { height, hash }, &block)?;
        }

        Ok(SyncOutcome::Applied(applied))
    }

    fn apply_block(&mut self, point: Point, block: &Block) -> Result<(), Error> {
        let observed_at = chrono::Utc::now().timestamp_millis() as u64;

        let transition = build_transition(block, self.network, observed_at)?;

        self.ledger.apply(point, &transition)?;

        info!(
            %point,
            created = transition.created.len(),
            spent = transition.spent.len(),
            inscriptions = transition.inscriptions.len(),
            "applied block",
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::output_address;
    use crate::storage::tables::{EnvelopeKind, InscriptionByTxoRefKV, TxoRef, UtxoByTxoRefKV};
    use crate::testutil::*;
    use async_trait::async_trait;
    use bitcoin::Network;
    use std::collections::HashMap;

    struct FakeSource {
        blocks: HashMap<BlockHash, Block>,
        heights: HashMap<BlockHash, u64>,
        tip: BlockHash,
    }

    impl FakeSource {
        fn new(chain: Vec<(u64, Block)>) -> Self {
            let mut blocks = HashMap::new();
            let mut heights = HashMap::new();
            let mut tip = BlockHash::all_zeros();

            for (height, block) in chain {
                let hash = block.block_hash();
                heights.insert(hash, height);
                blocks.insert(hash, block);
                tip = hash;
            }

            Self {
                blocks,
                heights,
                tip,
            }
        }
    }

    #[async_trait]
    impl ChainSource for FakeSource {
        async fn fetch_block(&self, hash: BlockHash) -> Result<Block, Error> {
            self.blocks
                .get(&hash)
                .cloned()
                .ok_or_else(|| Error::Fetch(format!("unknown block {hash}")))
        }

        async fn fetch_chain_tip(&self) -> Result<BlockHash, Error> {
            Ok(self.tip)
        }

        async fn fetch_block_height(&self, hash: BlockHash) -> Result<u64, Error> {
            self.heights
                .get(&hash)
                .copied()
                .ok_or_else(|| Error::Fetch(format!("unknown block {hash}")))
        }
    }

    fn orchestrator_with(
        dir: &tempfile::TempDir,
        chain: Vec<(u64, Block)>,
        max_gap: u64,
    ) -> SyncOrchestrator {
        let ledger = LedgerStore::open(dir.path().to_path_buf(), 64 * 1024 * 1024).unwrap();

        SyncOrchestrator::new(
            ledger,
            Arc::new(FakeSource::new(chain)),
            Network::Bitcoin,
            max_gap,
        )
    }

    /// b1 <- b2 <- b3, each paying a distinct owner.
    fn linear_chain() -> Vec<(u64, Block)> {
        let b1 = test_block(
            BlockHash::all_zeros(),
            vec![coinbase(vec![p2pkh_output(1, 50_000)])],
        );
        let b2 = test_block(
            b1.block_hash(),
            vec![coinbase(vec![p2pkh_output(2, 50_000)])],
        );
        let b3 = test_block(
            b2.block_hash(),
            vec![coinbase(vec![p2pkh_output(3, 50_000)])],
        );

        vec![(100, b1), (101, b2), (102, b3)]
    }

    #[tokio::test]
    async fn bootstrap_applies_the_triggered_block() {
        let dir = tempfile::tempdir().unwrap();
        let chain = linear_chain();
        let b1_hash = chain[0].1.block_hash();
        let mut orchestrator = orchestrator_with(&dir, chain, DEFAULT_MAX_GAP);

        let outcome = orchestrator.sync_to(b1_hash).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Applied(1));

        let cursor = orchestrator.ledger().cursor().unwrap().unwrap();
        assert_eq!(cursor.height, 100);
        assert_eq!(cursor.hash, b1_hash.to_byte_array());
    }

    #[tokio::test]
    async fn gap_fill_applies_ancestors_parent_first() {
        let dir = tempfile::tempdir().unwrap();
        let chain = linear_chain();
        let b1_hash = chain[0].1.block_hash();
        let b2_hash = chain[1].1.block_hash();
        let b3_hash = chain[2].1.block_hash();
        let mut orchestrator = orchestrator_with(&dir, chain, DEFAULT_MAX_GAP);

        orchestrator.sync_to(b1_hash).await.unwrap();

        // triggering the grandchild backfills the middle block
        let outcome = orchestrator.sync_to(b3_hash).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Applied(2));

        let ledger = orchestrator.ledger();
        assert_eq!(ledger.cursor().unwrap().unwrap().height, 102);
        assert_eq!(ledger.height_of(&b2_hash.to_byte_array()).unwrap(), Some(101));
        assert_eq!(ledger.height_of(&b3_hash.to_byte_array()).unwrap(), Some(102));
    }

    #[tokio::test]
    async fn duplicate_and_stale_triggers_are_noops() {
        let dir = tempfile::tempdir().unwrap();
        let chain = linear_chain();
        let b1_hash = chain[0].1.block_hash();
        let b3_hash = chain[2].1.block_hash();
        let mut orchestrator = orchestrator_with(&dir, chain, DEFAULT_MAX_GAP);

        orchestrator.sync_to(b1_hash).await.unwrap();
        orchestrator.sync_to(b3_hash).await.unwrap();

        // same tip again
        assert_eq!(
            orchestrator.sync_to(b3_hash).await.unwrap(),
            SyncOutcome::AlreadyApplied
        );

        // an out-of-order announcement of an old block
        assert_eq!(
            orchestrator.sync_to(b1_hash).await.unwrap(),
            SyncOutcome::AlreadyApplied
        );

        assert_eq!(orchestrator.ledger().cursor().unwrap().unwrap().height, 102);
    }

    #[tokio::test]
    async fn forks_halt_with_discontinuity_and_leave_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut chain = linear_chain();
        let b1_hash = chain[0].1.block_hash();
        let b3_hash = chain[2].1.block_hash();

        // a competing child of b1
        let fork = test_block(b1_hash, vec![coinbase(vec![p2pkh_output(9, 50_000)])]);
        let fork_hash = fork.block_hash();
        chain.push((101, fork));

        let mut orchestrator = orchestrator_with(&dir, chain, DEFAULT_MAX_GAP);

        orchestrator.sync_to(b1_hash).await.unwrap();
        orchestrator.sync_to(b3_hash).await.unwrap();

        let err = orchestrator.sync_to(fork_hash).await.unwrap_err();
        assert!(matches!(err, Error::ChainDiscontinuity { .. }));

        let cursor = orchestrator.ledger().cursor().unwrap().unwrap();
        assert_eq!(cursor.hash, b3_hash.to_byte_array());
        assert_eq!(
            orchestrator
                .ledger()
                .height_of(&fork_hash.to_byte_array())
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn ancestry_beyond_max_gap_fails() {
        let dir = tempfile::tempdir().unwrap();

        let mut chain = linear_chain();
        let b1_hash = chain[0].1.block_hash();
        let mut prev = chain.last().unwrap().1.block_hash();

        for i in 0..5u64 {
            let block = test_block(prev, vec![coinbase(vec![p2pkh_output(10 + i as u8, 1)])]);
            prev = block.block_hash();
            chain.push((103 + i, block));
        }

        let tip = prev;
        let mut orchestrator = orchestrator_with(&dir, chain, 3);

        orchestrator.sync_to(b1_hash).await.unwrap();

        let err = orchestrator.sync_to(tip).await.unwrap_err();
        assert!(matches!(err, Error::SyncGap { max_gap: 3, .. }));

        // nothing was applied
        assert_eq!(orchestrator.ledger().cursor().unwrap().unwrap().height, 100);
    }

    #[tokio::test]
    async fn unknown_blocks_surface_as_fetch_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = orchestrator_with(&dir, linear_chain(), DEFAULT_MAX_GAP);

        let missing = BlockHash::from_byte_array([0xee; 32]);

        let err = orchestrator.sync_to(missing).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn spending_a_stored_utxo_updates_the_spendable_view() {
        let dir = tempfile::tempdir().unwrap();

        let owner = p2pkh_script(1);
        let owner_address = output_address(&owner, Network::Bitcoin).unwrap();

        // b1 pays the owner; b2 spends that output into a rune-marked output
        // and a plain one
        let funding = tx(vec![external(9, 0)], vec![p2pkh_output(1, 10_000)]);
        let b1 = test_block(BlockHash::all_zeros(), vec![funding.clone()]);

        let spend = tx(
            vec![outpoint(&funding, 0)],
            vec![envelope_output(b"rune", 546), p2pkh_output(1, 9_000)],
        );
        let b2 = test_block(b1.block_hash(), vec![spend.clone()]);

        let chain = vec![(100, b1.clone()), (101, b2.clone())];
        let mut orchestrator = orchestrator_with(&dir, chain, DEFAULT_MAX_GAP);

        orchestrator.sync_to(b1.block_hash()).await.unwrap();
        orchestrator.sync_to(b2.block_hash()).await.unwrap();

        let ledger = orchestrator.ledger();

        let consumed = TxoRef::from(outpoint(&funding, 0));
        let marked = TxoRef::from(outpoint(&spend, 0));
        let plain = TxoRef::from(outpoint(&spend, 1));

        assert!(ledger.get::<UtxoByTxoRefKV>(&consumed).unwrap().is_none());
        assert!(ledger.get::<UtxoByTxoRefKV>(&marked).unwrap().is_some());
        assert!(ledger.get::<UtxoByTxoRefKV>(&plain).unwrap().is_some());

        let inscription = ledger
            .get::<InscriptionByTxoRefKV>(&marked)
            .unwrap()
            .unwrap();
        assert_eq!(inscription.kind, EnvelopeKind::Rune);
        assert!(ledger.get::<InscriptionByTxoRefKV>(&plain).unwrap().is_none());

        // only the unmarked new output is spendable for the owner
        let spendable = ledger.spendable_utxos(&owner_address).unwrap();
        assert_eq!(spendable.len(), 1);
        assert_eq!(spendable[0].0, plain);
        assert_eq!(spendable[0].1.value, 9_000);
    }
}
