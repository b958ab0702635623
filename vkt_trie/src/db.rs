use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::TreeKey;

/// Result of a backing-store operation.
pub type DbResult<T> = Result<T, DbError>;

/// An error raised by the backing store. Unlike the per-leaf lookup
/// failures of the migration path, these are fatal to their caller.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum DbError {
    /// The store rejected a leaf write.
    #[error("failed to write leaf {0}: {1}")]
    LeafWrite(String, String),

    /// The store rejected the checkpoint record.
    #[error("failed to record checkpoint for block {0}: {1}")]
    CheckpointWrite(u64, String),
}

/// Backing store for a [`VktTree`](crate::tree::VktTree).
///
/// Reads are infallible (a missing leaf is simply absent); writes may fail
/// and must not be masked.
pub trait Db: Default {
    fn get_leaf(&self, key: &TreeKey) -> Option<&[u8]>;
    fn set_leaf(&mut self, key: TreeKey, value: Vec<u8>) -> DbResult<()>;

    /// The last durably committed block number, if any run ever completed.
    fn checkpoint(&self) -> Option<u64>;
    fn set_checkpoint(&mut self, block_number: u64) -> DbResult<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryDb {
    pub db: HashMap<TreeKey, Vec<u8>>,
    pub committed_block: Option<u64>,
}

impl Db for MemoryDb {
    fn get_leaf(&self, key: &TreeKey) -> Option<&[u8]> {
        self.db.get(key).map(Vec::as_slice)
    }

    fn set_leaf(&mut self, key: TreeKey, value: Vec<u8>) -> DbResult<()> {
        self.db.insert(key, value);
        Ok(())
    }

    fn checkpoint(&self) -> Option<u64> {
        self.committed_block
    }

    fn set_checkpoint(&mut self, block_number: u64) -> DbResult<()> {
        self.committed_block = Some(block_number);
        Ok(())
    }
}
