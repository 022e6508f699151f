//! 256-bit proof-of-work targets and their compact ("nBits") encoding
//!
//! The compact form is a base-256 float: the top byte is the size of the
//! value in bytes, the low 23 bits are the mantissa and bit 23 is a sign
//! flag. Decoding keeps the sign and overflow flags so that callers can
//! reject headers that carry them; arithmetic is only ever done on the
//! expanded [`U256`].

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use uint::construct_uint;

construct_uint! {
    #[derive(Serialize, Deserialize)]
    pub struct U256(4);
}

/// Mantissa sign flag
const SIGN_BIT: u32 = 0x0080_0000;

/// Unsigned mantissa mask
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// Reasons a compact target cannot be used as a proof-of-work threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("compact target {0} is negative")]
    Negative(CompactTarget),
    #[error("compact target {0} overflows 256 bits")]
    Overflow(CompactTarget),
    #[error("compact target {0} is zero")]
    Zero(CompactTarget),
    #[error("compact target {0} is above the proof-of-work limit")]
    AboveLimit(CompactTarget),
}

/// Expanded form of a compact target, flags included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTarget {
    pub value: U256,
    pub negative: bool,
    pub overflow: bool,
}

/// 32-bit compact target as carried in block headers
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactTarget(pub u32);

impl CompactTarget {
    /// Expand to 256 bits, reporting sign and overflow.
    ///
    /// Bit-exact with Bitcoin's `SetCompact`: a mantissa with bit 23 set
    /// is flagged negative, and sizes that push a non-zero mantissa past 256
    /// bits are flagged as overflow (the value bits shifted out are lost).
    pub fn decode(self) -> DecodedTarget {
        let size = self.0 >> 24;
        let mut word = self.0 & MANTISSA_MASK;

        let value = if size <= 3 {
            word >>= 8 * (3 - size);
            U256::from(word)
        } else {
            let shift = 8 * (size as usize - 3);
            if shift >= 256 {
                U256::zero()
            } else {
                U256::from(word) << shift
            }
        };

        let negative = word != 0 && (self.0 & SIGN_BIT) != 0;
        let overflow = word != 0
            && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

        DecodedTarget {
            value,
            negative,
            overflow,
        }
    }

    /// Expand to a usable target, rejecting negative, overflowing and zero
    /// encodings
    pub fn to_target(self) -> Result<U256, TargetError> {
        let decoded = self.decode();
        if decoded.negative {
            return Err(TargetError::Negative(self));
        }
        if decoded.overflow {
            return Err(TargetError::Overflow(self));
        }
        if decoded.value.is_zero() {
            return Err(TargetError::Zero(self));
        }
        Ok(decoded.value)
    }

    /// As [`CompactTarget::to_target`], additionally requiring the target to
    /// be no easier than `limit`
    pub fn to_target_within(self, limit: &U256) -> Result<U256, TargetError> {
        let target = self.to_target()?;
        if target > *limit {
            return Err(TargetError::AboveLimit(self));
        }
        Ok(target)
    }

    /// Encode a non-negative value, rounding down to 24 bits of precision
    pub fn from_target(value: &U256) -> Self {
        Self::encode(value, false)
    }

    /// Bit-exact with Bitcoin's `GetCompact`
    pub fn encode(value: &U256, negative: bool) -> Self {
        let mut size = (value.bits() as u32 + 7) / 8;
        let mut compact = if size <= 3 {
            (value.low_u64() << (8 * (3 - size))) as u32
        } else {
            (*value >> (8 * (size as usize - 3))).low_u64() as u32
        };

        // The sign bit is not part of the magnitude: move it out of the way
        if compact & SIGN_BIT != 0 {
            compact >>= 8;
            size += 1;
        }

        compact |= size << 24;
        if negative && (compact & MANTISSA_MASK) != 0 {
            compact |= SIGN_BIT;
        }
        CompactTarget(compact)
    }

    pub fn to_consensus(self) -> u32 {
        self.0
    }
}

impl From<u32> for CompactTarget {
    fn from(bits: u32) -> Self {
        CompactTarget(bits)
    }
}

impl fmt::Debug for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompactTarget({:#010x})", self.0)
    }
}

impl fmt::Display for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Big-endian hex of a 256-bit value, zero padded to 64 digits
pub fn u256_to_hex(value: &U256) -> String {
    hex::encode(value.to_big_endian())
}

/// Parse a big-endian hex string (optional `0x`, zero-extended on the left)
pub fn u256_from_hex(hex: &str) -> Result<U256, hex::FromHexError> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    if digits.len() > 64 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    let padded = format!("{:0>64}", digits);
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(padded, &mut bytes)?;
    Ok(U256::from_big_endian(&bytes))
}

/// serde helper so 256-bit fields show up as hex in JSON output
pub fn serialize_u256_hex<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&u256_to_hex(value))
}
