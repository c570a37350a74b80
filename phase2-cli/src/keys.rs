use crate::{KeyOpts, SolOpts};

use phase2::solidity;
use phase2_coordinator::{
    codec,
    objects::CEREMONY_KEY,
    resolve_rounds,
    BlobStore,
    CeremonyRecord,
    Disk,
    DrandBeacon,
    Environment,
    EvaluationSet,
    FinalizeInputs,
    Groth16Core,
    StorageError,
};
use setup_utils::{calculate_hash, log_hash};

use anyhow::{Context, Result};
use ark_bn254::{Bn254, G1Affine, G2Affine};
use ark_groth16::VerifyingKey;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use fs_err::tokio as fs;
use std::path::Path;
use tracing::info;

pub const PROVING_KEY_FILE: &str = "pk";
pub const VERIFYING_KEY_FILE: &str = "vk";
pub const VERIFIER_CONTRACT_FILE: &str = "Groth16Verifier.sol";

/// Resolves the beacon rounds from the options and the environment against the ceremony record.
async fn beacon_rounds(environment: &Environment, opts: &KeyOpts) -> Result<(u64, u64)> {
    let phase1_round = opts.phase1_beacon_round.or(environment.phase1_round());
    let phase2_round = opts.phase2_beacon_round.or(environment.phase2_round());

    let storage = Disk::load(environment)?;
    let record = match storage.get(CEREMONY_KEY).await {
        Ok(bytes) => CeremonyRecord::from_bytes(&bytes)?,
        Err(StorageError::NotFound(_)) => {
            let rounds = phase1_round.zip(phase2_round);
            return rounds.context("beacon rounds were not given and no ceremony record was found");
        }
        Err(error) => return Err(error.into()),
    };
    Ok(resolve_rounds(&record, phase1_round, phase2_round)?)
}

async fn write_key<K: CanonicalSerialize>(key: &K, path: &Path) -> Result<()> {
    let mut bytes = vec![];
    key.serialize_compressed(&mut bytes)?;
    fs::write(path, &bytes).await?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    log_hash(&calculate_hash(&bytes));
    Ok(())
}

pub async fn extract_keys(environment: &Environment, opts: &KeyOpts) -> Result<()> {
    info!("Reading the ceremony artifacts");
    let (phase1_transcript, phase2_blob, evaluations, circuit) = tokio::try_join!(
        fs::read(&opts.phase1),
        fs::read(&opts.phase2),
        fs::read(&opts.evals),
        fs::read(&opts.circuit)
    )?;
    let evaluations: EvaluationSet<G1Affine, G2Affine> =
        codec::decode(&evaluations).with_context(|| format!("cannot decode {}", opts.evals))?;
    let (phase1_round, phase2_round) = beacon_rounds(environment, opts).await?;

    let beacon = DrandBeacon::new(environment)?;
    let keys = phase2_coordinator::extract_keys(&beacon, &Groth16Core, FinalizeInputs {
        phase1_round,
        phase2_round,
        phase1_transcript: &phase1_transcript,
        phase2_blob: &phase2_blob,
        evaluations: &evaluations,
        circuit: &circuit,
    })
    .await?;

    let output = Path::new(&opts.output);
    write_key(&keys.proving_key, &output.join(PROVING_KEY_FILE)).await?;
    write_key(&keys.verifying_key, &output.join(VERIFYING_KEY_FILE)).await?;
    Ok(())
}

pub async fn export_verifier(opts: &SolOpts) -> Result<()> {
    let bytes = fs::read(&opts.vk).await?;
    let verifying_key = VerifyingKey::<Bn254>::deserialize_compressed(&bytes[..])
        .with_context(|| format!("{} is not a verifying key", opts.vk))?;
    let contract = solidity::export_verifier(&verifying_key)?;

    let path = Path::new(&opts.output).join(VERIFIER_CONTRACT_FILE);
    fs::write(&path, contract).await?;
    info!("Wrote {}", path.display());
    Ok(())
}
