//! Node bootstrap - Genesis construction, network profiles, and selection

mod chainparams;
mod genesis;
mod registry;

pub use chainparams::*;
pub use genesis::*;
pub use registry::*;
