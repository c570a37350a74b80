use crate::CoordinatorError;

use std::{env, path::PathBuf, time::Duration};
use tracing::Level;

pub const DEFAULT_REGION: &str = "us-west-1";
pub const DEFAULT_BEACON_URL: &str = "https://api.drand.sh";
pub const DEFAULT_LOCAL_BASE_DIRECTORY: &str = "./trusted-setup";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PRESIGN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const CUSTOM_ENDPOINT: &str = "CUSTOM_ENDPOINT";
const DRAND_API_URL: &str = "DRAND_API_URL";
const DRAND_PHASE1_ROUND: &str = "DRAND_PHASE1_ROUND";
const DRAND_PHASE2_ROUND: &str = "DRAND_PHASE2_ROUND";
const AWS_REGION: &str = "AWS_REGION";

/// The configuration of one ceremony step, passed to every component at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    bucket: Option<String>,
    region: String,
    custom_endpoint: Option<String>,
    beacon_url: String,
    http_timeout: Duration,
    expected_contributions: u64,
    phase1_round: Option<u64>,
    phase2_round: Option<u64>,
    local_base_directory: PathBuf,
    presign_lifetime: Duration,
    verbosity: Level,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            bucket: None,
            region: DEFAULT_REGION.to_string(),
            custom_endpoint: None,
            beacon_url: DEFAULT_BEACON_URL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            expected_contributions: 1,
            phase1_round: None,
            phase2_round: None,
            local_base_directory: PathBuf::from(DEFAULT_LOCAL_BASE_DIRECTORY),
            presign_lifetime: DEFAULT_PRESIGN_LIFETIME,
            verbosity: Level::INFO,
        }
    }
}

impl Environment {
    /// Returns the defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, CoordinatorError> {
        let mut environment = Self::default();
        if let Some(endpoint) = read_var(CUSTOM_ENDPOINT) {
            environment = environment.with_custom_endpoint(endpoint);
        }
        if let Some(url) = read_var(DRAND_API_URL) {
            environment = environment.with_beacon_url(url);
        }
        if let Some(region) = read_var(AWS_REGION) {
            environment = environment.with_region(region);
        }
        if let Some(round) = read_round(DRAND_PHASE1_ROUND)? {
            environment = environment.with_phase1_round(round);
        }
        if let Some(round) = read_round(DRAND_PHASE2_ROUND)? {
            environment = environment.with_phase2_round(round);
        }
        Ok(environment)
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sends storage requests to `endpoint` with path-style addressing.
    pub fn with_custom_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.custom_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_beacon_url(mut self, url: impl Into<String>) -> Self {
        self.beacon_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_expected_contributions(mut self, contributions: u64) -> Self {
        self.expected_contributions = contributions;
        self
    }

    pub fn with_phase1_round(mut self, round: u64) -> Self {
        self.phase1_round = Some(round);
        self
    }

    pub fn with_phase2_round(mut self, round: u64) -> Self {
        self.phase2_round = Some(round);
        self
    }

    pub fn with_local_base_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.local_base_directory = directory.into();
        self
    }

    pub fn with_presign_lifetime(mut self, lifetime: Duration) -> Self {
        self.presign_lifetime = lifetime;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Level) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn custom_endpoint(&self) -> Option<&str> {
        self.custom_endpoint.as_deref()
    }

    pub fn beacon_url(&self) -> &str {
        &self.beacon_url
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn expected_contributions(&self) -> u64 {
        self.expected_contributions
    }

    pub fn phase1_round(&self) -> Option<u64> {
        self.phase1_round
    }

    pub fn phase2_round(&self) -> Option<u64> {
        self.phase2_round
    }

    pub fn local_base_directory(&self) -> &PathBuf {
        &self.local_base_directory
    }

    pub fn presign_lifetime(&self) -> Duration {
        self.presign_lifetime
    }

    pub fn verbosity(&self) -> &Level {
        &self.verbosity
    }
}

fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn read_round(name: &str) -> Result<Option<u64>, CoordinatorError> {
    read_var(name)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| CoordinatorError::Argument(format!("{} must be a round number, found {:?}", name, value)))
        })
        .transpose()
}
