mod elements;
pub use elements::*;

mod errors;
pub use errors::*;

mod helpers;
pub use helpers::*;

pub type Result<T> = std::result::Result<T, Error>;
