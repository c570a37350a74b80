//! Circuit-specific Groth16 parameters built from a sealed phase 1 transcript,
//! and the multi-party computation that randomizes their `delta`.

pub mod circuit;
pub mod keypair;
pub mod parameters;
pub mod polynomial;
pub mod solidity;

pub use circuit::Circuit;
pub use parameters::{Evaluations, MPCParameters};
