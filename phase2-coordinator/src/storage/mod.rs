pub mod disk;
pub use disk::*;

pub mod in_memory;
pub use in_memory::*;

pub mod s3;
pub use s3::*;

#[allow(clippy::module_inception)]
pub mod storage;
pub use storage::*;
