use crate::{ContributeOpts, InitializeOpts, PresignedOpts, UploadOpts, VerifyOpts};

use phase2_coordinator::{
    publish_artifacts,
    storage::S3Credentials,
    ContributionChain,
    ContributionKey,
    Coordinator,
    Disk,
    DrandBeacon,
    Environment,
    Groth16Core,
    S3,
};

use anyhow::{Context, Result};
use fs_err::tokio as fs;
use time::OffsetDateTime;
use tracing::info;

/// A process only handles one index, so the ceremony must be at least that long.
fn expected_contributions(environment: &Environment, index: u64) -> u64 {
    environment.expected_contributions().max(index.saturating_add(1))
}

fn coordinator_credentials() -> Result<S3Credentials> {
    S3Credentials::from_env().context("AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set")
}

/// Opens a bucket, signing requests when credentials are available.
fn open_bucket(environment: &Environment, bucket: &str) -> Result<S3> {
    let store = S3::new(environment, bucket)?;
    Ok(match S3Credentials::from_env() {
        Some(credentials) => store.with_credentials(credentials),
        None => store,
    })
}

pub async fn initialize(environment: &Environment, opts: &InitializeOpts) -> Result<()> {
    let mut environment = environment.clone();
    if let Some(round) = opts.beacon_round {
        environment = environment.with_phase1_round(round);
    }
    if let Some(round) = opts.phase2_beacon_round {
        environment = environment.with_phase2_round(round);
    }

    info!("Reading {} and {}", opts.phase1, opts.circuit);
    let (transcript, circuit) = tokio::try_join!(fs::read(&opts.phase1), fs::read(&opts.circuit))?;

    let storage = Disk::load(&environment)?;
    let beacon = DrandBeacon::new(&environment)?;
    let mut coordinator = Coordinator::new(environment, storage, beacon, Groth16Core)?;
    let attestation = coordinator.initialize(&transcript, &circuit).await?;
    println!("{}", attestation);
    Ok(())
}

pub async fn upload(environment: &Environment, opts: &UploadOpts) -> Result<()> {
    let local = Disk::load(environment)?;
    let bucket = S3::new(environment, &opts.bucket)?.with_credentials(coordinator_credentials()?);
    for url in publish_artifacts(&local, &bucket).await? {
        println!("{}", url);
    }
    Ok(())
}

pub async fn contribute(environment: &Environment, opts: &ContributeOpts) -> Result<()> {
    let key = ContributionKey::contribution_target(&opts.url)?;
    let index = key.index().context("the baseline cannot be contributed to")?;
    let chain = ContributionChain::resume_before(index, expected_contributions(environment, index))?;

    let storage = open_bucket(environment, &opts.bucket)?;
    let beacon = DrandBeacon::new(environment)?;
    let mut coordinator = Coordinator::resume(environment.clone(), storage, beacon, Groth16Core, chain);
    let attestation = coordinator.contribute_via_url(&opts.url).await?;

    println!("Contribution successful!");
    println!("Once the coordinator has verified it, attest to your contribution publicly with:");
    println!("{}", attestation);
    Ok(())
}

pub async fn verify(environment: &Environment, opts: &VerifyOpts) -> Result<()> {
    let chain = ContributionChain::resume_before(opts.index, expected_contributions(environment, opts.index))?;

    let storage = open_bucket(environment, &opts.bucket)?;
    let beacon = DrandBeacon::new(environment)?;
    let mut coordinator = Coordinator::resume(environment.clone(), storage, beacon, Groth16Core, chain);
    let contribution = coordinator.verify(opts.index).await?;

    println!("{} is valid", contribution.key);
    println!("Contribution Hash: {}", hex::encode(contribution.content_hash));
    Ok(())
}

pub fn presigned(environment: &Environment, opts: &PresignedOpts) -> Result<()> {
    let bucket = S3::new(environment, &opts.bucket)?.with_credentials(coordinator_credentials()?);
    let now = OffsetDateTime::now_utc();
    for index in 0..opts.count {
        let key = ContributionKey::Contribution(index).to_string();
        println!("{}: {}", index, bucket.presign_put(&key, now)?);
    }
    Ok(())
}
