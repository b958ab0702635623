/// Leaf value encodings for the verkle state layout: the packed basic-data
/// leaf and the 31-byte code chunking with its leading pushdata marker.
/// See `chunkify_code()` in https://eips.ethereum.org/EIPS/eip-6800 for the
/// reference chunking rule.
use ethereum_types::{H256, U256};

/// Version byte of the basic-data leaf encoding.
pub const BASIC_DATA_VERSION: u8 = 0;
/// Number of code bytes carried per code-chunk leaf.
pub const CODE_CHUNK_SIZE: usize = 31;

const PUSH_OFFSET: u8 = 0x5f;
const PUSH1: u8 = 0x60;
const PUSH32: u8 = 0x7f;

/// The account fields materialized in the verkle tree. What the field
/// values mean is the caller's business; this crate only encodes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountLeaf {
    pub nonce: U256,
    pub balance: U256,
    pub code_hash: H256,
    pub code_size: U256,
}

/// Packs an account into the 32-byte basic-data leaf:
/// `version (1) | reserved (4) | code_size (3) | nonce (8) | balance (16)`,
/// all fields big-endian. Oversized nonce/code-size/balance values are
/// truncated to their field width.
pub fn pack_basic_data(account: &AccountLeaf) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[0] = BASIC_DATA_VERSION;
    out[5..8].copy_from_slice(&account.code_size.low_u64().to_be_bytes()[5..8]);
    out[8..16].copy_from_slice(&account.nonce.low_u64().to_be_bytes());
    let mut balance = [0u8; 32];
    account.balance.to_big_endian(&mut balance);
    out[16..32].copy_from_slice(&balance[16..32]);
    out
}

/// Splits contract code into 32-byte leaf values: one marker byte counting
/// the leading bytes that are pushdata spilled over from the previous
/// chunk, followed by 31 code bytes (zero-padded at the tail).
pub fn chunkify_code(code: &[u8]) -> Vec<[u8; 32]> {
    let mut padded = code.to_vec();
    while padded.len() % CODE_CHUNK_SIZE != 0 {
        padded.push(0);
    }

    // For each byte, the number of pushdata bytes remaining at it
    // (including itself), or 0 for an instruction byte.
    let mut exec_data = vec![0usize; padded.len() + 32];
    let mut pos = 0;
    while pos < padded.len() {
        let pushdata_bytes = match padded[pos] {
            op @ PUSH1..=PUSH32 => (op - PUSH_OFFSET) as usize,
            _ => 0,
        };
        pos += 1;
        for x in 0..pushdata_bytes {
            exec_data[pos + x] = pushdata_bytes - x;
        }
        pos += pushdata_bytes;
    }

    padded
        .chunks(CODE_CHUNK_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let mut leaf = [0u8; 32];
            leaf[0] = exec_data[i * CODE_CHUNK_SIZE].min(CODE_CHUNK_SIZE) as u8;
            leaf[1..1 + chunk.len()].copy_from_slice(chunk);
            leaf
        })
        .collect()
}
