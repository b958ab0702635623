/// This module contains functions to derive leaf keys for the verkle state
/// layout. See https://eips.ethereum.org/EIPS/eip-6800 for the reference
/// layout. The commitment hash used for key stems is out of scope here and
/// is stood in for by keccak; only the *placement* of leaves matters to
/// callers of this crate.
use ethereum_types::{Address, U256};
use keccak_hash::keccak;
use serde::{Deserialize, Serialize};

/// A 32-byte key addressing a single leaf of the verkle tree. The first 31
/// bytes are the stem (shared by all leaves of one group), the last byte is
/// the sub-index within the group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeKey(pub [u8; 32]);

impl TreeKey {
    /// The 31-byte stem shared by all leaves in this key's group.
    pub fn stem(&self) -> &[u8] {
        &self.0[..31]
    }

    /// The position of this leaf within its group.
    pub fn sub_index(&self) -> u8 {
        self.0[31]
    }
}

/// Number of leaves per inner node group.
pub const VKT_NODE_WIDTH: u64 = 256;
/// Sub-index of the packed version/code-size/nonce/balance leaf.
pub const BASIC_DATA_LEAF_KEY: u8 = 0;
/// Sub-index of the code-hash leaf.
pub const CODE_HASH_LEAF_KEY: u8 = 1;
/// First sub-index of the in-header storage slots.
pub const HEADER_STORAGE_OFFSET: u64 = 64;
/// First leaf position of the code chunks.
pub const CODE_OFFSET: u64 = 128;

/// `256^31`, the first leaf position of the main storage space.
pub fn main_storage_offset() -> U256 {
    U256::one() << 248
}

/// Derives the key of the leaf at `(tree_index, sub_index)` under `addr`.
pub fn tree_key(addr: Address, tree_index: U256, sub_index: u8) -> TreeKey {
    let mut buf = [0u8; 64];
    buf[12..32].copy_from_slice(addr.as_bytes());
    tree_index.to_big_endian(&mut buf[32..64]);
    let mut key = keccak(buf).0;
    key[31] = sub_index;
    TreeKey(key)
}

pub fn key_basic_data(addr: Address) -> TreeKey {
    tree_key(addr, U256::zero(), BASIC_DATA_LEAF_KEY)
}

pub fn key_code_hash(addr: Address) -> TreeKey {
    tree_key(addr, U256::zero(), CODE_HASH_LEAF_KEY)
}

/// Key of the `chunk_id`-th 31-byte code chunk of `addr`.
pub fn key_code_chunk(addr: Address, chunk_id: U256) -> TreeKey {
    let (tree_index, sub_index) = split_position(U256::from(CODE_OFFSET) + chunk_id);
    tree_key(addr, tree_index, sub_index)
}

/// Key of storage slot `slot` of `addr`. The first
/// `CODE_OFFSET - HEADER_STORAGE_OFFSET` slots live in the account header
/// group; all remaining slots live in the main storage space.
pub fn key_storage(addr: Address, slot: U256) -> TreeKey {
    let pos = if slot < U256::from(CODE_OFFSET - HEADER_STORAGE_OFFSET) {
        U256::from(HEADER_STORAGE_OFFSET) + slot
    } else {
        // Wraps for slots within `2^248` of the top of the key space, same
        // as the reference layout's modular arithmetic.
        main_storage_offset().overflowing_add(slot).0
    };
    let (tree_index, sub_index) = split_position(pos);
    tree_key(addr, tree_index, sub_index)
}

fn split_position(pos: U256) -> (U256, u8) {
    (pos >> 8, pos.byte(0))
}
