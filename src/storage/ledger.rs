use std::{ops::Range, path::PathBuf, sync::Arc};

use bitcoin::hashes::Hash;
use itertools::Itertools;
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options,
    ReadOptions, WriteBatch,
};
use sysinfo::System;
use tracing::{info, trace};

use crate::{
    error::Error,
    storage::{
        encdec::{Decode, Encode},
        table::{Table, TableIterator},
        tables::{
            AddressUtxoKey, Cursor, CursorKV, HeightByHashKV, InscriptionByTxoRefKV, TxoRef, Utxo,
            UtxoByAddressKV, UtxoByTxoRefKV,
        },
    },
    sync::stages::Point,
    transition::BlockTransition,
};

static LEDGER_CF_NAME: &str = "ledger";

/// Durable store for the UTxO, inscription, height and cursor tables. One
/// block is the unit of atomicity: `apply` commits a whole transition or
/// nothing. Clones share the underlying database, so the query surface reads
/// concurrently with the single ingest writer.
#[derive(Clone)]
pub struct LedgerStore {
    db: Arc<DB>,
}

impl LedgerStore {
    /// Open or create the store. Safe to run against an already-initialized
    /// directory.
    pub fn open(path: PathBuf, memory_budget: u64) -> Result<Self, Error> {
        info!("opening db at {path:?}...");

        let mut db_opts = Options::default();
        db_opts.create_missing_column_families(true);
        db_opts.create_if_missing(true);

        let block_cache_budget = (memory_budget as f64 * 0.75) as usize;
        let memtable_budget = (memory_budget as f64 * 0.25) as usize;

        let cache = Cache::new_lru_cache(block_cache_budget);

        let sys = System::new_all();
        let cpus = sys.cpus().len() as u32;
        let background_jobs = std::cmp::max(2, cpus);
        db_opts.set_max_background_jobs(background_jobs as i32);

        let mut cf_opts = Options::default();

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        cf_opts.set_block_based_table_factory(&block_opts);

        let per_memtable_cap = 512 * 1024 * 1024;
        cf_opts.set_write_buffer_size(std::cmp::min(memtable_budget / 2, per_memtable_cap).max(1));
        cf_opts.set_max_write_buffer_number(2);

        let cfs = vec![ColumnFamilyDescriptor::new(LEDGER_CF_NAME, cf_opts)];

        let db = DB::open_cf_descriptors(&db_opts, path, cfs)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_handle(&self) -> &ColumnFamily {
        self.db.cf_handle(LEDGER_CF_NAME).expect("cf missing")
    }

    /// Fold one block's transition into the ledger: spent-row deletes,
    /// created-row upserts, inscription inserts and the cursor update commit
    /// as a single write batch. On failure nothing is visible and the cursor
    /// does not advance.
    pub fn apply(&self, point: Point, transition: &BlockTransition) -> Result<(), Error> {
        let cf = self.cf_handle();
        let mut batch = WriteBatch::default();

        // resolve the rows being spent so their address-index entries can be
        // removed alongside the primary rows
        let spent_rows = self.multi_get::<UtxoByTxoRefKV>(transition.spent.clone())?;

        for (txo_ref, utxo) in spent_rows {
            let Some(utxo) = utxo else {
                // produced before indexing began, or removed by an earlier
                // replay of this block; deleting is a no-op either way
                continue;
            };

            let key = UtxoByTxoRefKV::encode_key(&txo_ref);
            trace!("deleting {}", hex::encode(&key));
            batch.delete_cf(cf, key);

            if let Some(address) = utxo.address {
                let key = AddressUtxoKey { address, txo_ref };
                batch.delete_cf(cf, UtxoByAddressKV::encode_key(&key));
            }
        }

        for (txo_ref, utxo) in &transition.created {
            let key = UtxoByTxoRefKV::encode_key(txo_ref);
            trace!("setting {}", hex::encode(&key));
            batch.put_cf(cf, key, utxo.encode());

            if let Some(address) = &utxo.address {
                let key = AddressUtxoKey {
                    address: address.clone(),
                    txo_ref: *txo_ref,
                };
                batch.put_cf(cf, UtxoByAddressKV::encode_key(&key), ().encode());
            }
        }

        // inscription rows are immutable; a re-applied block keeps the
        // originally observed row
        for (txo_ref, inscription) in &transition.inscriptions {
            if self.get::<InscriptionByTxoRefKV>(txo_ref)?.is_none() {
                batch.put_cf(
                    cf,
                    InscriptionByTxoRefKV::encode_key(txo_ref),
                    inscription.encode(),
                );
            }
        }

        let hash = point.hash.to_byte_array();

        batch.put_cf(cf, HeightByHashKV::encode_key(&hash), point.height.encode());
        batch.put_cf(
            cf,
            CursorKV::encode_key(&()),
            Cursor {
                height: point.height,
                hash,
            }
            .encode(),
        );

        self.db.write(batch)?;

        Ok(())
    }

    pub fn get<T: Table>(&self, key: &T::Key) -> Result<Option<T::Value>, Error> {
        let res = self.db.get_cf(self.cf_handle(), T::encode_key(key))?;

        match res {
            Some(bytes) => Ok(Some(T::Value::decode_all(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn multi_get<T: Table>(
        &self,
        keys: Vec<T::Key>,
    ) -> Result<Vec<(T::Key, Option<T::Value>)>, Error> {
        let cf = self.cf_handle();

        let encoded = keys
            .iter()
            .map(|key| (cf, T::encode_key(key)))
            .collect::<Vec<_>>();

        let fetched = self.db.multi_get_cf(encoded);

        let mut out = Vec::with_capacity(keys.len());

        for (key, value) in keys.into_iter().zip_eq(fetched) {
            let value = match value? {
                Some(bytes) => Some(T::Value::decode_all(&bytes)?),
                None => None,
            };

            out.push((key, value));
        }

        Ok(out)
    }

    pub fn iter_kvs<T: Table>(&self, range: Range<Vec<u8>>) -> TableIterator<'_, T> {
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(range);

        let iter = self
            .db
            .iterator_cf_opt(self.cf_handle(), read_opts, IteratorMode::Start);

        TableIterator::<T>::new(iter)
    }

    /// All UTxOs controlled by `address` with no inscription row for the
    /// same output. An exclusion join: an inscribed output is withheld no
    /// matter its value or spend history.
    pub fn spendable_utxos(&self, address: &str) -> Result<Vec<(TxoRef, Utxo)>, Error> {
        let range = UtxoByAddressKV::prefix_range(&address.to_string());

        let keys = self
            .iter_kvs::<UtxoByAddressKV>(range)
            .map_ok(|(key, ())| key.txo_ref)
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(keys.len());

        for txo_ref in keys {
            if self.get::<InscriptionByTxoRefKV>(&txo_ref)?.is_some() {
                continue;
            }

            // the index row can outlive the primary row by one racing batch;
            // treat that as already spent
            let Some(utxo) = self.get::<UtxoByTxoRefKV>(&txo_ref)? else {
                continue;
            };

            out.push((txo_ref, utxo));
        }

        Ok(out)
    }

    /// Identity of the last successfully applied block, if any.
    pub fn cursor(&self) -> Result<Option<Cursor>, Error> {
        self.get::<CursorKV>(&())
    }

    /// Height at which `hash` was applied, if it ever was.
    pub fn height_of(&self, hash: &[u8; 32]) -> Result<Option<u64>, Error> {
        self.get::<HeightByHashKV>(hash)
    }
}
