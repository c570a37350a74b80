use crate::{
    beacon::{BeaconError, RandomnessBeacon},
    codec::{self, CodecError},
    crypto::{CryptoCore, CryptoError, SealedKeys},
    environment::Environment,
    objects::{
        Attestation,
        CeremonyRecord,
        ChainState,
        Contribution,
        ContributionChain,
        ContributionKey,
        EvaluationSet,
        KeyError,
        CEREMONY_KEY,
        EVALUATIONS_KEY,
    },
    storage::{BlobStore, StorageError},
};
use setup_utils::{calculate_hash, log_hash};

use futures::future::try_join_all;
use rayon::prelude::*;
use std::{fmt, ops::Range};
use thiserror::Error;
use tracing::{debug, error, info};

/// A ceremony step, reported with every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Initialize,
    Contribute,
    Verify,
    Finalize,
    Publish,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::Initialize => write!(f, "initialize"),
            Step::Contribute => write!(f, "contribute"),
            Step::Verify => write!(f, "verify"),
            Step::Finalize => write!(f, "finalize"),
            Step::Publish => write!(f, "publish"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{0}")]
    Argument(String),

    #[error("{step} failed on {key}: {source}")]
    Storage {
        step: Step,
        key: String,
        source: StorageError,
    },

    #[error("{step} failed on beacon round {round}: {source}")]
    Beacon { step: Step, round: u64, source: BeaconError },

    #[error("{step} failed to decode {key}: {source}")]
    Codec {
        step: Step,
        key: String,
        source: CodecError,
    },

    #[error("verify failed: {key} is not a valid extension of {predecessor}: {source}")]
    Verification {
        key: ContributionKey,
        predecessor: ContributionKey,
        source: CryptoError,
    },

    #[error("finalize failed: {0}")]
    Seal(String),

    #[error("{step} failed: {source}")]
    Crypto { step: Step, source: CryptoError },

    #[error("cannot {action} while the chain is {state}")]
    InvalidTransition { state: ChainState, action: String },
}

impl From<KeyError> for CoordinatorError {
    fn from(error: KeyError) -> Self {
        CoordinatorError::Argument(error.to_string())
    }
}

/// The inputs of key extraction, all of which are ceremony artifacts.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeInputs<'a, G1, G2> {
    pub phase1_round: u64,
    pub phase2_round: u64,
    pub phase1_transcript: &'a [u8],
    pub phase2_blob: &'a [u8],
    pub evaluations: &'a EvaluationSet<G1, G2>,
    pub circuit: &'a [u8],
}

///
/// Resolves the beacon rounds of key extraction against the ceremony record.
///
/// A given round must match the recorded one. The phase 2 round may only be
/// supplied when the record does not hold one yet.
///
pub fn resolve_rounds(
    record: &CeremonyRecord,
    phase1_round: Option<u64>,
    phase2_round: Option<u64>,
) -> Result<(u64, u64), CoordinatorError> {
    let phase1_round = match phase1_round {
        Some(round) if round != record.phase1_round() => {
            return Err(CoordinatorError::Seal(format!(
                "phase 1 round {} differs from round {} used at initialization",
                round,
                record.phase1_round()
            )))
        }
        _ => record.phase1_round(),
    };
    let phase2_round = match (phase2_round, record.phase2_round()) {
        (Some(round), Some(recorded)) if round != recorded => {
            return Err(CoordinatorError::Seal(format!(
                "phase 2 round {} differs from recorded round {}",
                round, recorded
            )))
        }
        (_, Some(recorded)) => recorded,
        (Some(round), None) => round,
        (None, None) => return Err(CoordinatorError::Seal("no phase 2 beacon round was announced".to_string())),
    };
    Ok((phase1_round, phase2_round))
}

async fn fetch_beacon<B: RandomnessBeacon>(beacon: &B, step: Step, round: u64) -> Result<Vec<u8>, CoordinatorError> {
    beacon.fetch(round).await.map_err(|source| {
        error!("Failed to fetch beacon round {}: {}", round, source);
        CoordinatorError::Beacon { step, round, source }
    })
}

///
/// Seals the final contribution into a key pair.
///
/// Both beacon rounds are fetched again: the phase 1 round reproduces the sealed
/// commons from the raw transcript, and the phase 2 round seals the extraction.
///
pub async fn extract_keys<B: RandomnessBeacon, C: CryptoCore>(
    beacon: &B,
    crypto: &C,
    inputs: FinalizeInputs<'_, C::G1, C::G2>,
) -> Result<SealedKeys<C::ProvingKey, C::VerifyingKey>, CoordinatorError> {
    if inputs.phase1_round == 0 || inputs.phase2_round == 0 {
        return Err(CoordinatorError::Seal(format!(
            "beacon rounds must be positive, found phase 1 round {} and phase 2 round {}",
            inputs.phase1_round, inputs.phase2_round
        )));
    }
    info!(
        "Extracting keys with phase 1 round {} and phase 2 round {}",
        inputs.phase1_round, inputs.phase2_round
    );

    let (phase1_beacon, phase2_beacon) = futures::try_join!(
        fetch_beacon(beacon, Step::Finalize, inputs.phase1_round),
        fetch_beacon(beacon, Step::Finalize, inputs.phase2_round)
    )?;

    let commons = crypto
        .seal_commons(inputs.phase1_transcript, &phase1_beacon)
        .map_err(|error| CoordinatorError::Seal(error.to_string()))?;
    let keys = crypto
        .seal(
            &commons,
            inputs.circuit,
            inputs.phase2_blob,
            inputs.evaluations,
            &phase2_beacon,
        )
        .map_err(|error| {
            error!("Sealing failed: {}", error);
            CoordinatorError::Seal(error.to_string())
        })?;

    info!("Extracted the proving and verifying keys");
    Ok(keys)
}

/// Copies the artifacts of initialization from one store to another.
pub async fn publish_artifacts<S: BlobStore, T: BlobStore>(
    origin: &S,
    destination: &T,
) -> Result<Vec<String>, CoordinatorError> {
    let baseline = ContributionKey::Baseline.to_string();
    let mut published = vec![];
    for key in [EVALUATIONS_KEY, CEREMONY_KEY, baseline.as_str()] {
        let storage_error = |source| CoordinatorError::Storage {
            step: Step::Publish,
            key: key.to_string(),
            source,
        };
        let bytes = origin.get(key).await.map_err(storage_error)?;
        destination.put(key, &bytes).await.map_err(storage_error)?;
        info!("Published {} ({} bytes)", key, bytes.len());
        published.push(destination.public_url(key));
    }
    Ok(published)
}

///
/// Drives a ceremony through its steps.
///
/// The coordinator owns the chain state of one process. Storage, beacon and the
/// cryptographic core are collaborators passed in at construction, along with
/// the environment that replaces any process-wide configuration.
///
pub struct Coordinator<S: BlobStore, B: RandomnessBeacon, C: CryptoCore> {
    environment: Environment,
    storage: S,
    beacon: B,
    crypto: C,
    chain: ContributionChain,
}

impl<S: BlobStore, B: RandomnessBeacon, C: CryptoCore> Coordinator<S, B, C> {
    /// Creates a coordinator for a new ceremony.
    pub fn new(environment: Environment, storage: S, beacon: B, crypto: C) -> Result<Self, CoordinatorError> {
        let chain = ContributionChain::new(environment.expected_contributions())?;
        Ok(Self::resume(environment, storage, beacon, crypto, chain))
    }

    /// Creates a coordinator that continues from `chain`.
    pub fn resume(environment: Environment, storage: S, beacon: B, crypto: C, chain: ContributionChain) -> Self {
        Self {
            environment,
            storage,
            beacon,
            crypto,
            chain,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn chain(&self) -> &ContributionChain {
        &self.chain
    }

    async fn load(&self, step: Step, key: &str) -> Result<Vec<u8>, CoordinatorError> {
        let bytes = self.storage.get(key).await.map_err(|source| {
            error!("Failed to load {}: {}", key, source);
            CoordinatorError::Storage {
                step,
                key: key.to_string(),
                source,
            }
        })?;
        debug!("Loaded {} ({} bytes)", key, bytes.len());
        Ok(bytes)
    }

    async fn store(&self, step: Step, key: &str, bytes: &[u8]) -> Result<(), CoordinatorError> {
        self.storage.put(key, bytes).await.map_err(|source| {
            error!("Failed to store {}: {}", key, source);
            CoordinatorError::Storage {
                step,
                key: key.to_string(),
                source,
            }
        })?;
        debug!("Stored {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    /// Returns the beacon rounds recorded at initialization.
    pub async fn ceremony_record(&self) -> Result<CeremonyRecord, CoordinatorError> {
        let bytes = self.load(Step::Finalize, CEREMONY_KEY).await?;
        CeremonyRecord::from_bytes(&bytes).map_err(|source| CoordinatorError::Codec {
            step: Step::Finalize,
            key: CEREMONY_KEY.to_string(),
            source,
        })
    }

    ///
    /// Seals the phase 1 transcript with the phase 1 beacon and derives the baseline.
    ///
    /// Everything is computed before the first write. The evaluation set and the
    /// ceremony record are stored before the baseline, so a stored baseline
    /// implies a complete initialization.
    ///
    pub async fn initialize(&mut self, phase1_transcript: &[u8], circuit: &[u8]) -> Result<Attestation, CoordinatorError> {
        self.chain.ensure_uninitialized()?;
        let round = self
            .environment
            .phase1_round()
            .ok_or_else(|| CoordinatorError::Argument("initialization requires a phase 1 beacon round".to_string()))?;
        info!("Initializing the ceremony with phase 1 beacon round {}", round);

        let beacon = fetch_beacon(&self.beacon, Step::Initialize, round).await?;
        let crypto_error = |source| CoordinatorError::Crypto {
            step: Step::Initialize,
            source,
        };
        let commons = self.crypto.seal_commons(phase1_transcript, &beacon).map_err(crypto_error)?;
        let (baseline, evaluations) = self.crypto.initialize(circuit, &commons).map_err(crypto_error)?;

        let codec_error = |key: &str| {
            let key = key.to_string();
            move |source| CoordinatorError::Codec {
                step: Step::Initialize,
                key,
                source,
            }
        };
        let evaluations = codec::encode(&evaluations).map_err(codec_error(EVALUATIONS_KEY))?;
        let record = CeremonyRecord::new(round, self.environment.phase2_round()).map_err(codec_error(CEREMONY_KEY))?;

        let key = ContributionKey::Baseline.to_string();
        self.store(Step::Initialize, EVALUATIONS_KEY, &evaluations).await?;
        self.store(Step::Initialize, CEREMONY_KEY, &record.to_bytes()).await?;
        self.store(Step::Initialize, &key, &baseline).await?;
        self.chain.initialize()?;

        let content_hash = calculate_hash(&baseline);
        info!("Initialized the baseline {}", key);
        log_hash(&content_hash);
        Ok(Attestation {
            key: ContributionKey::Baseline,
            url: self.storage.public_url(&key),
            content_hash,
        })
    }

    /// Contributes to `key` and stores the result in this coordinator's store.
    pub async fn contribute(&mut self, key: ContributionKey) -> Result<Attestation, CoordinatorError> {
        self.contribute_to(key, None).await
    }

    /// Contributes to the key embedded in a presigned upload URL and uploads through it.
    pub async fn contribute_via_url(&mut self, url: &str) -> Result<Attestation, CoordinatorError> {
        let key = ContributionKey::contribution_target(url)?;
        self.contribute_to(key, Some(url)).await
    }

    async fn contribute_to(&mut self, key: ContributionKey, url: Option<&str>) -> Result<Attestation, CoordinatorError> {
        let (index, predecessor) = match (key.index(), key.predecessor()) {
            (Some(index), Some(predecessor)) => (index, predecessor),
            _ => return Err(KeyError::BaselineTarget.into()),
        };
        self.chain.ensure_can_contribute(index)?;
        info!("Contributing to {} on top of {}", key, predecessor);

        let blob = self.load(Step::Contribute, &predecessor.to_string()).await?;
        let contribution = self.crypto.contribute(&blob).map_err(|source| CoordinatorError::Crypto {
            step: Step::Contribute,
            source,
        })?;

        let target = key.to_string();
        let uploaded = match url {
            Some(url) => self.storage.put_via_authorized_url(url, &contribution).await,
            None => self.storage.put(&target, &contribution).await,
        };
        uploaded.map_err(|source| {
            error!("Failed to upload {}: {}", target, source);
            CoordinatorError::Storage {
                step: Step::Contribute,
                key: target.clone(),
                source,
            }
        })?;
        self.chain.begin_contribution(index)?;

        let content_hash = calculate_hash(&contribution);
        info!("Uploaded the contribution {}", key);
        log_hash(&content_hash);
        Ok(Attestation {
            key,
            url: self.storage.public_url(&target),
            content_hash,
        })
    }

    fn check(&self, index: u64, predecessor_blob: &[u8], blob: &[u8]) -> Result<Contribution, CoordinatorError> {
        let key = ContributionKey::Contribution(index);
        let predecessor = key.predecessor().ok_or(KeyError::BaselineTarget)?;
        self.crypto.verify(predecessor_blob, blob).map_err(|source| {
            error!("{} does not extend {}: {}", key, predecessor, source);
            CoordinatorError::Verification {
                key,
                predecessor,
                source,
            }
        })?;
        Ok(Contribution::new(index, calculate_hash(blob)))
    }

    /// Verifies contribution `index` against its predecessor.
    ///
    /// Stored blobs are only read. On success the contribution joins the chain of
    /// this process, on failure the chain is unchanged.
    pub async fn verify(&mut self, index: u64) -> Result<Contribution, CoordinatorError> {
        let key = ContributionKey::Contribution(index);
        let predecessor = key.predecessor().ok_or(KeyError::BaselineTarget)?;
        info!("Verifying {} against {}", key, predecessor);

        let (key_name, predecessor_name) = (key.to_string(), predecessor.to_string());
        let (before, after) = futures::try_join!(
            self.load(Step::Verify, &predecessor_name),
            self.load(Step::Verify, &key_name)
        )?;
        let contribution = self.check(index, &before, &after)?;
        self.chain.record_verified(contribution.clone())?;

        info!("Verified {}", key);
        log_hash(&contribution.content_hash);
        Ok(contribution)
    }

    /// Verifies a range of contributions concurrently and records them in index order.
    ///
    /// The first failure in index order is returned and nothing is recorded.
    pub async fn verify_range(&mut self, indices: Range<u64>) -> Result<Vec<Contribution>, CoordinatorError> {
        if indices.is_empty() {
            return Ok(vec![]);
        }
        info!("Verifying contributions {} to {}", indices.start, indices.end - 1);

        let mut keys = vec![ContributionKey::Contribution(indices.start)
            .predecessor()
            .ok_or(KeyError::BaselineTarget)?];
        keys.extend(indices.clone().map(ContributionKey::Contribution));
        let names = keys.iter().map(ToString::to_string).collect::<Vec<_>>();
        let blobs = try_join_all(names.iter().map(|name| self.load(Step::Verify, name))).await?;

        let start = indices.start;
        let results = blobs
            .par_windows(2)
            .enumerate()
            .map(|(offset, pair)| self.check(start + offset as u64, &pair[0], &pair[1]))
            .collect::<Vec<_>>();

        let mut chain = self.chain.clone();
        let mut contributions = Vec::with_capacity(results.len());
        for result in results {
            let contribution = result?;
            chain.record_verified(contribution.clone())?;
            contributions.push(contribution);
        }
        self.chain = chain;

        info!("Verified {} contributions", contributions.len());
        Ok(contributions)
    }

    ///
    /// Seals the last expected contribution into the final keys.
    ///
    /// The rounds come from the ceremony record. Rounds in the environment must
    /// match it, and a phase 2 round there only fills one the record lacks.
    ///
    pub async fn finalize(
        &mut self,
        phase1_transcript: &[u8],
        circuit: &[u8],
    ) -> Result<SealedKeys<C::ProvingKey, C::VerifyingKey>, CoordinatorError> {
        self.chain.begin_finalize()?;

        let record = self.ceremony_record().await?;
        let (phase1_round, phase2_round) = resolve_rounds(
            &record,
            self.environment.phase1_round(),
            self.environment.phase2_round(),
        )?;

        let latest = ContributionKey::Contribution(self.chain.expected_contributions() - 1).to_string();
        info!("Finalizing the ceremony from {}", latest);
        let (blob, evaluations) = futures::try_join!(
            self.load(Step::Finalize, &latest),
            self.load(Step::Finalize, EVALUATIONS_KEY)
        )?;
        let evaluations = codec::decode(&evaluations).map_err(|source| CoordinatorError::Codec {
            step: Step::Finalize,
            key: EVALUATIONS_KEY.to_string(),
            source,
        })?;

        let keys = extract_keys(&self.beacon, &self.crypto, FinalizeInputs {
            phase1_round,
            phase2_round,
            phase1_transcript,
            phase2_blob: &blob,
            evaluations: &evaluations,
            circuit,
        })
        .await?;
        self.chain.seal()?;
        Ok(keys)
    }
}
