use thiserror::Error;

use crate::DecodingError;

#[derive(Error, Debug)]
pub enum Error {
    /// Failure reaching the chain-data source. Retryable; the cursor does
    /// not advance.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A block that cannot be folded into the ledger: duplicate output keys
    /// or a double-spent input within one block. Never partially applied.
    #[error("malformed block {hash}: {reason}")]
    MalformedBlock { hash: String, reason: String },

    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// The triggered block forks off an already-applied ancestor that is not
    /// the current tip. Ingestion halts for external intervention.
    #[error("chain discontinuity: {block} does not extend the cursor tip {cursor}")]
    ChainDiscontinuity { block: String, cursor: String },

    /// Walking parents from the triggered block did not reach the cursor
    /// within the configured bound.
    #[error("sync gap: ancestry of {block} exceeds {max_gap} unapplied blocks")]
    SyncGap { block: String, max_gap: u64 },

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn fetch(error: impl ToString) -> Error {
        Error::Fetch(error.to_string())
    }

    /// Transient errors are retried with backoff by the ingest stage;
    /// everything else is structural and surfaced.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::Storage(_))
    }
}
