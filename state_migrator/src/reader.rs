use std::collections::HashMap;

use ethereum_types::H256;

/// A read-only view of the source chain's auxiliary state, used to fetch
/// contract code by hash when an account leaf indicates it owns code.
pub trait StateReader {
    /// Returns the code with the given hash, if known.
    fn code(&self, code_hash: H256) -> Option<Vec<u8>>;
}

impl StateReader for HashMap<H256, Vec<u8>> {
    fn code(&self, code_hash: H256) -> Option<Vec<u8>> {
        self.get(&code_hash).cloned()
    }
}

/// A reader with no code available; every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCode;

impl StateReader for NoCode {
    fn code(&self, _code_hash: H256) -> Option<Vec<u8>> {
        None
    }
}
