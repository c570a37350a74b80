use crate::ElementType;

use ark_serialize::SerializationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid length of {element}: expected {expected}, got {got}")]
    InvalidLength {
        element: ElementType,
        expected: usize,
        got: usize,
    },

    #[error("Element of type {0} is the point at infinity")]
    PointAtInfinity(ElementType),

    #[error("Invalid encoding of {0}")]
    InvalidEncoding(ElementType),

    #[error("Phase 1 power {got} is too small for a domain of size {required}")]
    PowerTooSmall { required: usize, got: usize },

    #[error("Constraint synthesis failed: {0}")]
    Synthesis(String),

    #[error("Malformed circuit: {0}")]
    InvalidCircuit(String),

    #[error("Unexpected trailing bytes after {0}")]
    TrailingBytes(&'static str),

    #[error("{0} was not derived from the same circuit and transcript")]
    Mismatch(&'static str),

    #[error("{0}")]
    Verification(#[from] VerificationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Invalid ratio! Context: {0}")]
    InvalidRatio(&'static str),

    #[error("{0} does not match the previous parameters")]
    Changed(&'static str),

    #[error("Invalid generator for {0}")]
    InvalidGenerator(ElementType),

    #[error("Expected exactly one new contribution, found {found} after {before}")]
    ContributionCount { before: usize, found: usize },

    #[error("Transcript hash of contribution {0} does not match")]
    TranscriptMismatch(usize),

    #[error("Public key does not match the updated delta")]
    PublicKeyMismatch,
}
