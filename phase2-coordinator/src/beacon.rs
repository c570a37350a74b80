use crate::environment::Environment;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeaconError {
    #[error("beacon rounds start at 1")]
    InvalidRound,

    #[error("beacon round {round} is unavailable: {reason}")]
    Unavailable { round: u64, reason: String },

    #[error("requested beacon round {requested} but the service returned round {received}")]
    Mismatch { requested: u64, received: u64 },

    #[error("beacon round {0} carries no randomness")]
    EmptyRandomness(u64),

    #[error("malformed response for beacon round {round}: {reason}")]
    MalformedResponse { round: u64, reason: String },
}

/// A source of public randomness indexed by round.
///
/// The value of a round never changes once published, so fetching the
/// same round always returns the same bytes.
#[async_trait]
pub trait RandomnessBeacon: Send + Sync {
    async fn fetch(&self, round: u64) -> Result<Vec<u8>, BeaconError>;
}

#[derive(Debug, Deserialize)]
struct RoundResponse {
    #[serde(default)]
    round: u64,
    #[serde(default)]
    randomness: Option<String>,
}

/// Decodes the randomness of a response, validating it against the requested round.
fn parse_response(requested: u64, response: RoundResponse) -> Result<Vec<u8>, BeaconError> {
    // Some relays omit the round, which deserializes as zero.
    if response.round != 0 && response.round != requested {
        return Err(BeaconError::Mismatch {
            requested,
            received: response.round,
        });
    }
    let randomness = response.randomness.unwrap_or_default();
    let randomness = randomness.trim();
    let randomness = randomness.strip_prefix("0x").unwrap_or(randomness);
    if randomness.is_empty() {
        return Err(BeaconError::EmptyRandomness(requested));
    }
    hex::decode(randomness).map_err(|error| BeaconError::MalformedResponse {
        round: requested,
        reason: error.to_string(),
    })
}

/// A client for the public HTTP API of a drand network.
#[derive(Debug, Clone)]
pub struct DrandBeacon {
    client: Client,
    base_url: String,
}

impl DrandBeacon {
    pub fn new(environment: &Environment) -> Result<Self, BeaconError> {
        Self::with_base_url(environment.beacon_url(), environment.http_timeout())
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, BeaconError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| BeaconError::Unavailable {
                round: 0,
                reason: error.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RandomnessBeacon for DrandBeacon {
    async fn fetch(&self, round: u64) -> Result<Vec<u8>, BeaconError> {
        if round == 0 {
            return Err(BeaconError::InvalidRound);
        }

        let url = format!("{}/public/{}", self.base_url, round);
        debug!("Fetching beacon round {} from {}", round, url);

        let unavailable = |reason: String| BeaconError::Unavailable { round, reason };
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| unavailable(error.to_string()))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|error| unavailable(error.to_string()))?;
        if !status.is_success() {
            error!("Beacon request to {} returned {}", url, status);
            return Err(unavailable(format!(
                "{} {}",
                status,
                String::from_utf8_lossy(&body).trim()
            )));
        }

        let response: RoundResponse =
            serde_json::from_slice(&body).map_err(|error| BeaconError::MalformedResponse {
                round,
                reason: error.to_string(),
            })?;
        let randomness = parse_response(round, response)?;
        info!("Fetched beacon round {}", round);
        Ok(randomness)
    }
}

/// A beacon that replays recorded rounds, validated like the HTTP beacon.
#[derive(Debug, Clone, Default)]
pub struct FixedBeacon {
    rounds: BTreeMap<u64, Vec<u8>>,
}

impl FixedBeacon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_round(mut self, round: u64, randomness: impl Into<Vec<u8>>) -> Self {
        self.rounds.insert(round, randomness.into());
        self
    }
}

#[async_trait]
impl RandomnessBeacon for FixedBeacon {
    async fn fetch(&self, round: u64) -> Result<Vec<u8>, BeaconError> {
        if round == 0 {
            return Err(BeaconError::InvalidRound);
        }
        match self.rounds.get(&round) {
            Some(randomness) if randomness.is_empty() => Err(BeaconError::EmptyRandomness(round)),
            Some(randomness) => Ok(randomness.clone()),
            None => Err(BeaconError::Unavailable {
                round,
                reason: "the round was not recorded".to_string(),
            }),
        }
    }
}
