//! Cryptography module - SHA-256d and scrypt hashing, merkle roots

mod hash;
mod merkle;

pub use hash::*;
pub use merkle::*;
