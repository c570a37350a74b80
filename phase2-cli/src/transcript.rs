use crate::{ImportOpts, NewTranscriptOpts};

use phase1::{ptau::read_ptau, Phase1, PrivateKey};
use setup_utils::{calculate_hash, log_hash, UseCompression};

use anyhow::{bail, Context, Result};
use ark_bn254::Bn254;
use fs_err::tokio as fs;
use rand::rngs::OsRng;
use tracing::{info, warn};

/// Largest transcript `p1n` generates. Real ceremonies import a `.ptau` instead.
pub const MAX_DEVELOPMENT_POWER: usize = 20;

async fn write_transcript(transcript: &Phase1<Bn254>, output: &str) -> Result<()> {
    let bytes = transcript.to_bytes(UseCompression::Yes)?;
    fs::write(output, &bytes).await?;
    info!("Wrote a phase 1 transcript of degree {} to {}", transcript.degree(), output);
    log_hash(&calculate_hash(&bytes));
    Ok(())
}

pub async fn import_ptau(opts: &ImportOpts) -> Result<()> {
    info!("Reading {}", opts.ptau);
    let bytes = fs::read(&opts.ptau).await?;
    let transcript = read_ptau(&bytes).with_context(|| format!("cannot import {}", opts.ptau))?;
    transcript
        .verify_structure()
        .with_context(|| format!("{} is not a valid powers of tau transcript", opts.ptau))?;
    write_transcript(&transcript, &opts.output).await
}

pub async fn new_transcript(opts: &NewTranscriptOpts) -> Result<()> {
    if opts.power == 0 || opts.power > MAX_DEVELOPMENT_POWER {
        bail!(
            "power must be between 1 and {}, found {}",
            MAX_DEVELOPMENT_POWER,
            opts.power
        );
    }
    warn!("Development transcripts have a single contributor and must not be used in production");

    let mut transcript = Phase1::<Bn254>::initialize(opts.power);
    let key = PrivateKey::<Bn254>::random(&mut OsRng);
    transcript.transform(&key);
    drop(key);
    write_transcript(&transcript, &opts.output).await
}
