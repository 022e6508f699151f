//! Genesis block generation for the TRMP networks
//!
//! Every network shares the same coinbase (timestamp text and output key);
//! they differ only in header time, nonce, bits and reward. The block is
//! rebuilt at startup and checked against the hard-coded hash and merkle
//! root, so any drift in serialization or hashing is fatal.

use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::consensus::{Block, BlockHeader, CompactTarget, TargetError};
use crate::crypto::Hash;
use crate::primitives::{opcodes::OP_CHECKSIG, Script, Transaction};

/// Text embedded in the genesis coinbase
pub const GENESIS_TIMESTAMP_TEXT: &str = "TrumPOW Revolutionary Meme Cryptocurrency";

/// Uncompressed public key paid by the genesis coinbase
pub const GENESIS_OUTPUT_PUBKEY: [u8; 65] = [
    0x04, 0xe9, 0xbd, 0x83, 0xe0, 0x62, 0x05, 0xcb, 0x0a, 0xe2, 0xa7, 0x3e, 0x15, 0xac, 0x92,
    0x85, 0x9a, 0xe8, 0x0e, 0xb2, 0x39, 0xdf, 0x7d, 0xe2, 0x26, 0x5b, 0xfb, 0x8c, 0x41, 0xcc,
    0xe5, 0xc1, 0xb8, 0x84, 0xc6, 0x1b, 0xc4, 0x16, 0xf8, 0xa8, 0x3f, 0x98, 0x78, 0x0f, 0x64,
    0xf6, 0xe4, 0x0f, 0x40, 0x6f, 0xe4, 0x0d, 0x1e, 0xd1, 0x68, 0x24, 0x1a, 0x0e, 0x39, 0x68,
    0x92, 0xd4, 0xfb, 0xa4, 0x09,
];

/// First push of the coinbase scriptSig (the historical 0x1d00ffff bits)
const GENESIS_SCRIPT_SIG_PREFIX: i64 = 486_604_799;

/// Genesis block errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenesisError {
    #[error("genesis hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: Hash, computed: Hash },
    #[error("genesis merkle root mismatch: expected {expected}, computed {computed}")]
    MerkleMismatch { expected: Hash, computed: Hash },
    #[error("genesis bits cannot be mined: {0}")]
    Unminable(#[from] TargetError),
    #[error("genesis search ran past the last representable timestamp")]
    TimestampExhausted,
}

/// Header parameters that vary between networks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenesisParams {
    pub time: u32,
    pub nonce: u32,
    pub bits: CompactTarget,
    pub version: i32,
    /// Coinbase output value in base units
    pub reward: i64,
}

/// The shared genesis coinbase paying `reward`
pub fn genesis_coinbase(reward: i64) -> Transaction {
    let script_sig = Script::new()
        .push_int(GENESIS_SCRIPT_SIG_PREFIX)
        .push_num(4)
        .push_slice(GENESIS_TIMESTAMP_TEXT.as_bytes());
    let script_pubkey = Script::new()
        .push_slice(&GENESIS_OUTPUT_PUBKEY)
        .push_opcode(OP_CHECKSIG);
    Transaction::coinbase(script_sig, reward, script_pubkey)
}

/// Create the genesis block
///
/// This function produces a reproducible, byte-for-byte identical genesis
/// block for the given parameters.
pub fn create_genesis_block(params: &GenesisParams) -> Block {
    let mut block = Block::new(
        BlockHeader::new(
            params.version,
            Hash::zero(),
            Hash::zero(),
            params.time,
            params.bits,
            params.nonce,
        ),
        vec![genesis_coinbase(params.reward)],
    );
    block.header.merkle_root = block.compute_merkle_root();
    block
}

/// Whether the header's PoW hash already meets its own bits
pub fn meets_own_target(header: &BlockHeader) -> Result<bool, TargetError> {
    let target = header.bits.to_target()?;
    Ok(header.pow_hash().to_u256() <= target)
}

/// Search nonces (then timestamps, on nonce wraparound) until the header's
/// PoW hash meets its bits. Returns the number of hashes tried.
///
/// Unbounded: only call this for low-difficulty networks.
pub fn mine_genesis(block: &mut Block) -> Result<u64, GenesisError> {
    let target = block.header.bits.to_target()?;
    let mut attempts = 1u64;
    while block.header.pow_hash().to_u256() > target {
        block.header.nonce = block.header.nonce.wrapping_add(1);
        if block.header.nonce == 0 {
            block.header.time = block
                .header
                .time
                .checked_add(1)
                .ok_or(GenesisError::TimestampExhausted)?;
        }
        attempts += 1;
    }

    info!(
        "genesis block found after {} hashes: nonce {} time {} hash {}",
        attempts,
        block.header.nonce,
        block.header.time,
        block.hash()
    );
    Ok(attempts)
}

/// Verify genesis block matches the expected hash and merkle root
pub fn verify_genesis(
    block: &Block,
    expected_hash: &Hash,
    expected_merkle_root: &Hash,
) -> Result<(), GenesisError> {
    let merkle_root = block.header.merkle_root;
    if merkle_root != *expected_merkle_root {
        return Err(GenesisError::MerkleMismatch {
            expected: *expected_merkle_root,
            computed: merkle_root,
        });
    }

    let hash = block.hash();
    if hash != *expected_hash {
        return Err(GenesisError::HashMismatch {
            expected: *expected_hash,
            computed: hash,
        });
    }
    Ok(())
}

/// Build a network's genesis block, mining it first when `allow_mining` is
/// set and the stored nonce does not meet the bits, then verify it
pub fn build_genesis(
    params: &GenesisParams,
    allow_mining: bool,
    expected_hash: &Hash,
    expected_merkle_root: &Hash,
) -> Result<Block, GenesisError> {
    let mut block = create_genesis_block(params);
    if allow_mining && !meets_own_target(&block.header)? {
        mine_genesis(&mut block)?;
    }
    verify_genesis(&block, expected_hash, expected_merkle_root)?;
    Ok(block)
}

/// Genesis block summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenesisInfo {
    pub hash: Hash,
    pub merkle_root: Hash,
    pub time: u32,
    pub nonce: u32,
    pub bits: CompactTarget,
    pub version: i32,
    pub reward: i64,
}

impl GenesisInfo {
    pub fn new(block: &Block) -> Self {
        let reward = block
            .transactions
            .first()
            .map(|tx| tx.outputs.iter().map(|o| o.value).sum())
            .unwrap_or(0);
        Self {
            hash: block.hash(),
            merkle_root: block.header.merkle_root,
            time: block.header.time,
            nonce: block.header.nonce,
            bits: block.header.bits,
            version: block.header.version,
            reward,
        }
    }
}
