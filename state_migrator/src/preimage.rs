use std::collections::HashMap;

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use log::debug;

/// Read-only lookup from trie path bytes to the original (pre-hash) key
/// bytes. May be backed by a persistent index built while the source state
/// was written; absence of a preimage is an expected outcome, not an
/// error.
pub trait PreimageStore {
    fn preimage(&self, path: &[u8]) -> Option<Vec<u8>>;
}

/// In-memory preimage index, keyed by the keccak image of the original
/// key, which is exactly the 32-byte leaf path in the source trie.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreimageDb {
    db: HashMap<H256, Vec<u8>>,
}

impl MemoryPreimageDb {
    pub fn record_address(&mut self, addr: Address) {
        self.db.insert(keccak(addr), addr.as_bytes().to_vec());
    }

    pub fn record_slot(&mut self, slot: U256) {
        let mut bytes = [0u8; 32];
        slot.to_big_endian(&mut bytes);
        self.db.insert(keccak(bytes), bytes.to_vec());
    }
}

impl PreimageStore for MemoryPreimageDb {
    fn preimage(&self, path: &[u8]) -> Option<Vec<u8>> {
        if path.len() != H256::len_bytes() {
            return None;
        }
        self.db.get(&H256::from_slice(path)).cloned()
    }
}

/// An unpopulated store; every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreimages;

impl PreimageStore for NoPreimages {
    fn preimage(&self, _path: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

/// Recovers original keys from leaf paths: primarily through a
/// [`PreimageStore`], optionally falling back to reading the path itself
/// as the key.
///
/// The fallback is only sound for tries whose keys are *not* hashed, so it
/// applies only when the path is already exactly `width` bytes long; a
/// hashed 32-byte path never matches an address width and falls through to
/// an unresolved result instead of silently producing a wrong key.
#[derive(Debug, Clone, Default)]
pub struct PreimageResolver<S> {
    store: S,
    prefix_fallback: Option<usize>,
}

impl<S: PreimageStore> PreimageResolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            prefix_fallback: None,
        }
    }

    /// Enables the identity fallback for unhashed tries with `width`-byte
    /// keys.
    pub fn with_prefix_fallback(mut self, width: usize) -> Self {
        self.prefix_fallback = Some(width);
        self
    }

    /// Deterministically recovers the original key for `path`, or [`None`]
    /// if it cannot be recovered; callers treat [`None`] as a skip.
    pub fn resolve(&self, path: &[u8]) -> Option<Vec<u8>> {
        if let Some(found) = self.store.preimage(path) {
            return Some(found);
        }
        match self.prefix_fallback {
            Some(width) if path.len() == width => {
                debug!(
                    "no stored preimage for path {}; reading the path as an unhashed key",
                    hex::encode(path)
                );
                Some(path.to_vec())
            }
            _ => None,
        }
    }
}
