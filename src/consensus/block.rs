//! Block structure for the TRMP chain
//!
//! Defines the 80-byte block header, the merge-mining version layout, and
//! the lightweight chain view the retargeter walks.

use serde::{Deserialize, Serialize};

use super::difficulty::block_proof;
use super::params::Height;
use super::target::{CompactTarget, U256};
use crate::crypto::{compute_merkle_root, scrypt_hash, sha256d, Hash};
use crate::primitives::Transaction;

/// Version bit marking a merge-mined block
pub const VERSION_AUXPOW: i32 = 1 << 8;

/// Multiplier placing the chain ID in the top 16 version bits
pub const VERSION_CHAIN_START: i32 = 1 << 16;

/// Serialized header size in bytes
pub const HEADER_SIZE: usize = 80;

/// Block header containing all metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Base version, AuxPoW flag and chain ID
    pub version: i32,
    /// Hash of the previous block
    pub prev_hash: Hash,
    /// Merkle root of all transactions
    pub merkle_root: Hash,
    /// Block timestamp (seconds since Unix epoch)
    pub time: u32,
    /// Difficulty target (compact representation)
    pub bits: CompactTarget,
    /// Nonce used for PoW
    pub nonce: u32,
}

impl BlockHeader {
    /// Create a new block header
    pub fn new(
        version: i32,
        prev_hash: Hash,
        merkle_root: Hash,
        time: u32,
        bits: CompactTarget,
        nonce: u32,
    ) -> Self {
        Self {
            version,
            prev_hash,
            merkle_root,
            time,
            bits,
            nonce,
        }
    }

    /// Serialize the header for hashing
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..36].copy_from_slice(self.prev_hash.as_bytes());
        bytes[36..68].copy_from_slice(self.merkle_root.as_bytes());
        bytes[68..72].copy_from_slice(&self.time.to_le_bytes());
        bytes[72..76].copy_from_slice(&self.bits.to_consensus().to_le_bytes());
        bytes[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Block identity hash (double SHA-256)
    pub fn hash(&self) -> Hash {
        sha256d(&self.to_bytes())
    }

    /// Hash compared against the target (scrypt)
    pub fn pow_hash(&self) -> Hash {
        scrypt_hash(&self.to_bytes())
    }

    /// Version without the AuxPoW flag and chain ID
    pub fn base_version(&self) -> i32 {
        self.version % VERSION_AUXPOW
    }

    pub fn chain_id(&self) -> i32 {
        self.version >> 16
    }

    pub fn is_auxpow(&self) -> bool {
        self.version & VERSION_AUXPOW != 0
    }

    /// Pre-merge-mining block: version 1, or version 2 without a chain ID
    pub fn is_legacy(&self) -> bool {
        self.version == 1 || (self.version == 2 && self.chain_id() == 0)
    }

    /// Set the base version and chain ID, clearing the AuxPoW flag
    pub fn set_base_version(&mut self, base_version: i32, chain_id: i32) {
        debug_assert!((0..VERSION_AUXPOW).contains(&base_version));
        self.version = base_version | chain_id.wrapping_mul(VERSION_CHAIN_START);
    }

    pub fn set_auxpow(&mut self, auxpow: bool) {
        if auxpow {
            self.version |= VERSION_AUXPOW;
        } else {
            self.version &= !VERSION_AUXPOW;
        }
    }
}

/// A complete block containing header and transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// List of transactions in this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Get the block hash
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Merkle root over the block's transaction ids
    pub fn compute_merkle_root(&self) -> Hash {
        let txids: Vec<Hash> = self.transactions.iter().map(|tx| tx.hash()).collect();
        compute_merkle_root(&txids)
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.header.prev_hash.is_zero()
    }
}

/// What the retargeter needs to know about one block of the active chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIndex {
    pub height: Height,
    pub time: u32,
    pub bits: CompactTarget,
    /// Cumulative work up to and including this block
    pub chain_work: U256,
}

impl BlockIndex {
    /// Index entry for a chain's first block
    pub fn genesis(header: &BlockHeader) -> Self {
        Self {
            height: 0,
            time: header.time,
            bits: header.bits,
            chain_work: block_proof(header.bits),
        }
    }

    /// Index entry for the block built on top of this one. Height and chain
    /// work saturate.
    pub fn next(&self, time: u32, bits: CompactTarget) -> Self {
        Self {
            height: self.height.saturating_add(1),
            time,
            bits,
            chain_work: self.chain_work.saturating_add(block_proof(bits)),
        }
    }

    pub fn block_time(&self) -> i64 {
        i64::from(self.time)
    }
}

/// Read access to a contiguous run of the active chain
pub trait ChainView {
    /// Most recent block, the parent of the block being built
    fn tip(&self) -> Option<&BlockIndex>;

    /// Ancestor of the tip at `height`, if the view reaches back that far
    fn at_height(&self, height: Height) -> Option<&BlockIndex>;
}

impl ChainView for [BlockIndex] {
    fn tip(&self) -> Option<&BlockIndex> {
        self.last()
    }

    fn at_height(&self, height: Height) -> Option<&BlockIndex> {
        let first = self.first()?.height;
        let offset = height.checked_sub(first)?;
        self.get(offset as usize)
    }
}

impl ChainView for Vec<BlockIndex> {
    fn tip(&self) -> Option<&BlockIndex> {
        self.as_slice().tip()
    }

    fn at_height(&self, height: Height) -> Option<&BlockIndex> {
        self.as_slice().at_height(height)
    }
}
