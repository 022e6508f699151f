//! Minimal script builder
//!
//! Only what a coinbase needs: integer pushes, script-number pushes,
//! data pushes and single opcodes. Scripts are never executed here.

use serde::{Deserialize, Serialize};

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1NEGATE: u8 = 0x4f;
    pub const OP_1: u8 = 0x51;
    pub const OP_CHECKSIG: u8 = 0xac;
}

use opcodes::*;

/// Raw script bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Push an integer, using OP_0 / OP_1NEGATE / OP_1..OP_16 where possible
    pub fn push_int(mut self, value: i64) -> Self {
        match value {
            0 => self.0.push(OP_0),
            -1 => self.0.push(OP_1NEGATE),
            1..=16 => self.0.push(OP_1 + (value as u8 - 1)),
            _ => return self.push_slice(&encode_script_num(value)),
        }
        self
    }

    /// Push the minimal script-number encoding of `value` as data.
    ///
    /// Unlike [`Script::push_int`] this never collapses small values into
    /// an opcode: `push_num(4)` emits `01 04`.
    pub fn push_num(self, value: i64) -> Self {
        self.push_slice(&encode_script_num(value))
    }

    /// Push data with the shortest length prefix
    pub fn push_slice(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.0.push(len as u8);
        } else if len <= 0xff {
            self.0.push(OP_PUSHDATA1);
            self.0.push(len as u8);
        } else if len <= 0xffff {
            self.0.push(OP_PUSHDATA2);
            self.0.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.0.push(OP_PUSHDATA4);
            self.0.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.0.extend_from_slice(data);
        self
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.0.push(opcode);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Little-endian sign-magnitude encoding with the sign in the top bit
/// of the last byte; zero encodes as an empty vector.
pub fn encode_script_num(value: i64) -> Vec<u8> {
    let mut result = Vec::new();
    if value == 0 {
        return result;
    }

    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    while magnitude > 0 {
        result.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }
    result
}
