//! SHA-256d and scrypt hashing
//!
//! Block identity, transaction ids and merkle nodes use double SHA-256.
//! Proof of work is checked against the scrypt(1024, 1, 1) digest of the
//! serialized header.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::consensus::U256;

/// 32-byte hash stored in internal (little-endian) byte order.
///
/// Hex strings are read and written in display order, most significant byte
/// first, so `Hash::from_hex(&h.to_hex()) == h`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// All-zero hash, used as the genesis block's previous hash
    pub const fn zero() -> Self {
        Hash([0u8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Parse a display-order hex string.
    ///
    /// A `0x` prefix is accepted and short strings are zero-extended on the
    /// left, so `"0x00"` parses to the zero hash.
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let digits = hex.strip_prefix("0x").unwrap_or(hex);
        if digits.len() > 64 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let padded = format!("{:0>64}", digits);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(padded, &mut bytes)?;
        bytes.reverse();
        Ok(Hash(bytes))
    }

    /// Display-order hex string
    pub fn to_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Interpret the hash as a 256-bit integer for target comparison
    pub fn to_u256(&self) -> U256 {
        U256::from_little_endian(&self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(|e| {
            serde::de::Error::custom(format!("invalid hash hex string {}: {}", s, e))
        })
    }
}

/// Double SHA-256
pub fn sha256d(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash(second.into())
}

/// Hash two hashes together (merkle tree node)
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&left.0);
    data.extend_from_slice(&right.0);
    sha256d(&data)
}

/// scrypt with N=1024, r=1, p=1 and the input doubling as salt
pub fn scrypt_hash(data: &[u8]) -> Hash {
    // log2(N) = 10, r = 1, p = 1, 32-byte output: always within scrypt's limits
    let params = scrypt::Params::new(10, 1, 1, 32).expect("scrypt(1024, 1, 1) parameters are valid");
    let mut out = [0u8; 32];
    scrypt::scrypt(data, data, &params, &mut out).expect("32-byte scrypt output is valid");
    Hash(out)
}
