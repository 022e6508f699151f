//! Transaction and script primitives used to build coinbase transactions

mod script;
mod transaction;

pub use script::*;
pub use transaction::*;
