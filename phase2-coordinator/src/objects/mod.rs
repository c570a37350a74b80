pub mod ceremony;
pub use ceremony::*;

pub mod chain;
pub use chain::*;

pub mod contribution;
pub use contribution::*;

pub mod evaluations;
pub use evaluations::*;
