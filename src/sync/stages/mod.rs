use std::fmt;

use bitcoin::BlockHash;

pub mod ingest;
pub mod watch;

pub type BlockHeight = u64;

/// Identity of a block within the applied chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub height: BlockHeight,
    pub hash: BlockHash,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.height, self.hash)
    }
}
