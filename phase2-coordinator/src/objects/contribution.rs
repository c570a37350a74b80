use serde::{Deserialize, Serialize};
use setup_utils::HASH_SIZE;
use std::{fmt, str::FromStr};
use thiserror::Error;
use url::Url;

/// The key of the baseline parameters produced by initialization.
pub const BASELINE_KEY: &str = "phase2";
/// The key of the encoded evaluation set.
pub const EVALUATIONS_KEY: &str = "evals";
/// The key of the ceremony record.
pub const CEREMONY_KEY: &str = "ceremony";

const CONTRIBUTION_PREFIX: &str = "phase2-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("{0:?} is not a phase 2 key, expected \"phase2\" or \"phase2-<index>\"")]
    Malformed(String),

    #[error("{0:?} is not a valid upload URL")]
    InvalidUrl(String),

    #[error("the baseline \"phase2\" is produced by initialization and cannot be a contribution target")]
    BaselineTarget,
}

///
/// The storage key of a parameter set in the chain.
///
/// The baseline is stored unsuffixed as `phase2`. Contribution `i` is stored
/// as `phase2-i` and extends `phase2-(i-1)`, or the baseline when `i` is zero.
/// Peer tooling depends on this naming, including the asymmetry at the start
/// of the chain.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContributionKey {
    Baseline,
    Contribution(u64),
}

impl ContributionKey {
    /// Returns the contribution index, or `None` for the baseline.
    pub fn index(&self) -> Option<u64> {
        match self {
            ContributionKey::Baseline => None,
            ContributionKey::Contribution(index) => Some(*index),
        }
    }

    /// Returns the key this one extends, or `None` for the baseline.
    pub fn predecessor(&self) -> Option<ContributionKey> {
        match self {
            ContributionKey::Baseline => None,
            ContributionKey::Contribution(0) => Some(ContributionKey::Baseline),
            ContributionKey::Contribution(index) => Some(ContributionKey::Contribution(index - 1)),
        }
    }

    /// Parses the key from the last path segment of an upload URL.
    /// The query string of a presigned URL is ignored.
    pub fn from_upload_url(url: &str) -> Result<Self, KeyError> {
        let parsed = Url::parse(url).map_err(|_| KeyError::InvalidUrl(url.to_string()))?;
        let segment = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| KeyError::InvalidUrl(url.to_string()))?;
        segment.parse()
    }

    /// Parses an upload URL that must address a contribution, not the baseline.
    pub fn contribution_target(url: &str) -> Result<Self, KeyError> {
        match Self::from_upload_url(url)? {
            ContributionKey::Baseline => Err(KeyError::BaselineTarget),
            key => Ok(key),
        }
    }
}

impl fmt::Display for ContributionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContributionKey::Baseline => write!(f, "{}", BASELINE_KEY),
            ContributionKey::Contribution(index) => write!(f, "{}{}", CONTRIBUTION_PREFIX, index),
        }
    }
}

impl FromStr for ContributionKey {
    type Err = KeyError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        if key == BASELINE_KEY {
            return Ok(ContributionKey::Baseline);
        }
        let digits = key
            .strip_prefix(CONTRIBUTION_PREFIX)
            .ok_or_else(|| KeyError::Malformed(key.to_string()))?;
        let canonical = !digits.is_empty()
            && digits.bytes().all(|byte| byte.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'));
        if !canonical {
            return Err(KeyError::Malformed(key.to_string()));
        }
        digits
            .parse()
            .map(ContributionKey::Contribution)
            .map_err(|_| KeyError::Malformed(key.to_string()))
    }
}

impl TryFrom<String> for ContributionKey {
    type Error = KeyError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        key.parse()
    }
}

impl From<ContributionKey> for String {
    fn from(key: ContributionKey) -> Self {
        key.to_string()
    }
}

/// A verified step of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub index: u64,
    pub key: ContributionKey,
    #[serde(with = "hex::serde")]
    pub content_hash: [u8; HASH_SIZE],
}

impl Contribution {
    pub fn new(index: u64, content_hash: [u8; HASH_SIZE]) -> Self {
        Self {
            index,
            key: ContributionKey::Contribution(index),
            content_hash,
        }
    }
}

/// The public statement a contributor publishes out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub key: ContributionKey,
    pub url: String,
    #[serde(with = "hex::serde")]
    pub content_hash: [u8; HASH_SIZE],
}

impl fmt::Display for Attestation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Contribution URL: {}", self.url)?;
        write!(f, "Contribution Hash: {}", hex::encode(self.content_hash))
    }
}
