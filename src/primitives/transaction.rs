//! Transaction structure and wire serialization
//!
//! Only the legacy (non-witness) encoding is produced; it is all the
//! genesis coinbase and the merkle root need.

use serde::{Deserialize, Serialize};

use super::Script;
use crate::crypto::{sha256d, Hash};

/// Reference to a previous transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub vout: u32,
}

impl OutPoint {
    /// The null outpoint spent by coinbase inputs
    pub const fn null() -> Self {
        Self {
            txid: Hash::zero(),
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

/// A transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in base units (1 TRMP = COIN base units)
    pub value: i64,
    pub script_pubkey: Script,
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Create a coinbase transaction with a single input and output
    pub fn coinbase(script_sig: Script, value: i64, script_pubkey: Script) -> Self {
        Self {
            version: 1,
            inputs: vec![TxInput {
                prevout: OutPoint::null(),
                script_sig,
                sequence: u32::MAX,
            }],
            outputs: vec![TxOutput {
                value,
                script_pubkey,
            }],
            lock_time: 0,
        }
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// Serialize for hashing and relay
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.version.to_le_bytes());

        write_compact_size(&mut bytes, self.inputs.len() as u64);
        for input in &self.inputs {
            bytes.extend_from_slice(input.prevout.txid.as_bytes());
            bytes.extend_from_slice(&input.prevout.vout.to_le_bytes());
            write_compact_size(&mut bytes, input.script_sig.len() as u64);
            bytes.extend_from_slice(input.script_sig.as_bytes());
            bytes.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut bytes, self.outputs.len() as u64);
        for output in &self.outputs {
            bytes.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut bytes, output.script_pubkey.len() as u64);
            bytes.extend_from_slice(output.script_pubkey.as_bytes());
        }

        bytes.extend_from_slice(&self.lock_time.to_le_bytes());
        bytes
    }

    /// Transaction id
    pub fn hash(&self) -> Hash {
        sha256d(&self.to_bytes())
    }
}

/// Bitcoin CompactSize length prefix
pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}
