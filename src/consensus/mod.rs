//! Consensus module - Targets, rule eras, block headers, difficulty, and validation

mod block;
mod difficulty;
mod params;
mod target;
mod validation;

pub use block::*;
pub use difficulty::*;
pub use params::*;
pub use target::*;
pub use validation::*;
