use std::path::PathBuf;

use serde::Deserialize;
use sysinfo::System;
use tracing::info;

pub mod encdec;
pub mod ledger;
pub mod table;
pub mod tables;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    /// Directory holding the ledger database (default ./tmp/cardinal)
    pub path: Option<PathBuf>,
    /// Total memory budget for RocksDB in GB (default 40% of available system memory)
    pub memory_budget: Option<f64>,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from("./tmp/cardinal"))
    }

    pub fn memory_budget_bytes(&self) -> u64 {
        match self.memory_budget {
            Some(gb) => (gb * 1024.0 * 1024.0 * 1024.0) as u64,
            None => Self::default_memory_budget(),
        }
    }

    fn default_memory_budget() -> u64 {
        let mut system = System::new_all();

        system.refresh_memory();

        let total_memory = system
            .cgroup_limits()
            .map(|x| x.total_memory)
            .unwrap_or_else(|| system.total_memory());

        let default_budget = (total_memory as f64 * 0.4) as u64;

        info!(
            "no rocksdb memory budget specified, using 40% of system memory: {:.2} GB ({} bytes)",
            default_budget as f64 / (1024.0 * 1024.0 * 1024.0),
            default_budget,
        );

        default_budget
    }
}
