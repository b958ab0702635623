use std::collections::BTreeMap;

use ethereum_types::{Address, U256};

use crate::db::{Db, DbResult};
use crate::keys::{key_basic_data, key_code_chunk, key_code_hash, key_storage, TreeKey};
use crate::leaf::{chunkify_code, pack_basic_data, AccountLeaf};

/// Verkle-layout state tree.
/// Represented as a buffer of pending leaf mutations over a backing [`Db`].
/// `set_*` operations only ever buffer; nothing is durable until
/// [`Self::flush`], and a migration run is only complete once
/// [`Self::checkpoint`] has recorded its block number.
#[derive(Debug, Clone, Default)]
pub struct VktTree<D: Db> {
    pub db: D,
    pending: BTreeMap<TreeKey, Vec<u8>>,
}

impl<D: Db> VktTree<D> {
    pub fn new(db: D) -> Self {
        Self {
            db,
            pending: BTreeMap::new(),
        }
    }

    /// Buffers the basic-data and code-hash leaves for `addr`.
    pub fn set_account(&mut self, addr: Address, account: &AccountLeaf) {
        self.pending
            .insert(key_basic_data(addr), pack_basic_data(account).to_vec());
        self.pending
            .insert(key_code_hash(addr), account.code_hash.as_bytes().to_vec());
    }

    /// Buffers one code-chunk leaf per 31 bytes of `code`.
    pub fn set_code(&mut self, addr: Address, code: &[u8]) {
        for (i, chunk) in chunkify_code(code).into_iter().enumerate() {
            self.pending
                .insert(key_code_chunk(addr, U256::from(i)), chunk.to_vec());
        }
    }

    /// Buffers the raw `value` bytes under the storage leaf for `slot`.
    pub fn set_storage(&mut self, addr: Address, slot: U256, value: Vec<u8>) {
        self.pending.insert(key_storage(addr, slot), value);
    }

    /// Returns the value at `key`, reading through the pending buffer into
    /// the backing store.
    pub fn get(&self, key: &TreeKey) -> Option<&[u8]> {
        self.pending
            .get(key)
            .map(Vec::as_slice)
            .or_else(|| self.db.get_leaf(key))
    }

    /// Number of buffered leaf mutations.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Writes all pending leaves to the backing store. A no-op when nothing
    /// is pending.
    pub fn flush(&mut self) -> DbResult<()> {
        for (key, value) in std::mem::take(&mut self.pending) {
            self.db.set_leaf(key, value)?;
        }
        Ok(())
    }

    /// Flushes and durably records `block_number` as the migrated height.
    /// This is the last write of a migration run.
    pub fn checkpoint(&mut self, block_number: u64) -> DbResult<()> {
        self.flush()?;
        self.db.set_checkpoint(block_number)
    }
}
