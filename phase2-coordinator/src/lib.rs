
pub mod beacon;
pub mod codec;
pub mod coordinator;
pub mod crypto;
pub mod environment;
pub mod logger;
pub mod objects;
pub mod storage;

pub use beacon::{BeaconError, DrandBeacon, FixedBeacon, RandomnessBeacon};
pub use codec::{CodecError, PointEncoding};
pub use coordinator::*;
pub use crypto::{CryptoCore, CryptoError, Groth16Core, SealedKeys};
pub use environment::Environment;
pub use objects::{Attestation, CeremonyRecord, ChainState, Contribution, ContributionChain, ContributionKey, EvaluationSet};
pub use storage::{BlobStore, Disk, InMemory, StorageError, S3};
