use ethereum_types::{H256, U256};
use keccak_hash::{KECCAK_EMPTY, KECCAK_NULL_RLP};
use rlp_derive::{RlpDecodable, RlpEncodable};
use vkt_trie::leaf::AccountLeaf;

/// An account leaf payload in the source state trie.
///
/// The on-trie encoding is an RLP list of the fields below, in order.
/// `code_size` is carried through the migration but recomputed from the
/// actual code bytes whenever the code can be fetched.
#[derive(RlpEncodable, RlpDecodable, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: U256,
    pub storage_root: H256,
    pub code_hash: H256,
    pub code_size: U256,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance: U256::zero(),
            nonce: U256::zero(),
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
            code_size: U256::zero(),
        }
    }
}

impl Account {
    /// Decodes a leaf payload. Returns [`None`] on malformed input; a leaf
    /// that doesn't decode is skipped by the migration, never fatal.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        rlp::decode(bytes).ok()
    }

    pub fn has_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }
}

impl From<Account> for AccountLeaf {
    fn from(acct: Account) -> Self {
        AccountLeaf {
            nonce: acct.nonce,
            balance: acct.balance,
            code_hash: acct.code_hash,
            code_size: acct.code_size,
        }
    }
}
