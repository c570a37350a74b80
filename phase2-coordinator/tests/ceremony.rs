use phase2::Circuit;
use phase2_coordinator::{
    codec,
    extract_keys,
    publish_artifacts,
    BlobStore,
    CeremonyRecord,
    ChainState,
    ContributionChain,
    ContributionKey,
    Coordinator,
    CoordinatorError,
    CryptoCore,
    CryptoError,
    Environment,
    FinalizeInputs,
    FixedBeacon,
    Groth16Core,
    InMemory,
    Step,
};
use setup_utils::calculate_hash;
use test_helpers::{phase1_transcript_bytes, TestCircuit, TEST_POWER};

use ark_bn254::{Bn254, Fr};
use ark_groth16::Groth16;
use ark_snark::SNARK;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

const PHASE1_ROUND: u64 = 2_500_000;
const PHASE2_ROUND: u64 = 2_600_000;
const CONTRIBUTIONS: u64 = 3;

type TestCoordinator = Coordinator<InMemory, FixedBeacon, Groth16Core>;

fn beacon() -> FixedBeacon {
    FixedBeacon::new()
        .with_round(PHASE1_ROUND, b"phase 1 round randomness".to_vec())
        .with_round(PHASE2_ROUND, b"phase 2 round randomness".to_vec())
}

fn environment() -> Environment {
    Environment::default()
        .with_expected_contributions(CONTRIBUTIONS)
        .with_phase1_round(PHASE1_ROUND)
        .with_phase2_round(PHASE2_ROUND)
}

/// Returns a phase 1 transcript and the test circuit description.
fn artifacts(seed: u64) -> (Vec<u8>, Vec<u8>) {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    let transcript = phase1_transcript_bytes::<Bn254>(TEST_POWER, &mut rng);
    let circuit = Circuit::<Fr>::from_synthesizer(TestCircuit::<Fr>(None))
        .unwrap()
        .to_bytes()
        .unwrap();
    (transcript, circuit)
}

async fn initialized(storage: &InMemory, transcript: &[u8], circuit: &[u8]) -> TestCoordinator {
    let mut coordinator = Coordinator::new(environment(), storage.clone(), beacon(), Groth16Core).unwrap();
    coordinator.initialize(transcript, circuit).await.unwrap();
    coordinator
}

/// Runs a complete ceremony and returns its store and the extracted keys.
async fn run_ceremony(
    seed: u64,
) -> (
    InMemory,
    <Groth16Core as CryptoCore>::ProvingKey,
    <Groth16Core as CryptoCore>::VerifyingKey,
) {
    let (transcript, circuit) = artifacts(seed);
    let storage = InMemory::new();
    let mut coordinator = initialized(&storage, &transcript, &circuit).await;
    for index in 0..CONTRIBUTIONS {
        coordinator.contribute(ContributionKey::Contribution(index)).await.unwrap();
        coordinator.verify(index).await.unwrap();
    }
    let keys = coordinator.finalize(&transcript, &circuit).await.unwrap();
    (storage, keys.proving_key, keys.verifying_key)
}

#[tokio::test]
async fn test_end_to_end_ceremony() {
    let (transcript, circuit) = artifacts(1);
    let storage = InMemory::new();
    let mut coordinator = Coordinator::new(environment(), storage.clone(), beacon(), Groth16Core).unwrap();

    let baseline = coordinator.initialize(&transcript, &circuit).await.unwrap();
    assert_eq!(baseline.key, ContributionKey::Baseline);
    assert_eq!(baseline.url, "memory:///phase2");
    assert_eq!(baseline.content_hash, calculate_hash(&storage.get("phase2").await.unwrap()));
    assert_eq!(
        CeremonyRecord::from_bytes(&storage.get("ceremony").await.unwrap()).unwrap(),
        CeremonyRecord::new(PHASE1_ROUND, Some(PHASE2_ROUND)).unwrap()
    );
    assert_eq!(coordinator.chain().state(), ChainState::Initialized);

    for index in 0..CONTRIBUTIONS {
        let attestation = coordinator
            .contribute(ContributionKey::Contribution(index))
            .await
            .unwrap();
        assert_eq!(attestation.url, format!("memory:///phase2-{}", index));
        assert_eq!(coordinator.chain().state(), ChainState::Contributing(index));

        let contribution = coordinator.verify(index).await.unwrap();
        assert_eq!(contribution.content_hash, attestation.content_hash);
        assert_eq!(coordinator.chain().state(), ChainState::Verified(index));
    }

    let keys = coordinator.finalize(&transcript, &circuit).await.unwrap();
    assert!(coordinator.chain().is_sealed());
    assert_eq!(coordinator.chain().contributions().count(), CONTRIBUTIONS as usize);

    let mut rng = ChaChaRng::seed_from_u64(9);
    let x = Fr::from(5u64);
    let proof = Groth16::<Bn254>::prove(&keys.proving_key, TestCircuit::<Fr>(Some(x)), &mut rng).unwrap();
    let public_input = TestCircuit::<Fr>::public_input(x);
    assert!(Groth16::<Bn254>::verify(&keys.verifying_key, &[public_input], &proof).unwrap());
    assert!(!Groth16::<Bn254>::verify(&keys.verifying_key, &[public_input + Fr::from(1u64)], &proof).unwrap());

    // The stored artifacts alone reproduce the same keys.
    let record = CeremonyRecord::from_bytes(&storage.get("ceremony").await.unwrap()).unwrap();
    let evaluations = codec::decode(&storage.get("evals").await.unwrap()).unwrap();
    let latest = storage.get("phase2-2").await.unwrap();
    let again = extract_keys(&beacon(), &Groth16Core, FinalizeInputs {
        phase1_round: record.phase1_round(),
        phase2_round: record.phase2_round().unwrap(),
        phase1_transcript: &transcript,
        phase2_blob: &latest,
        evaluations: &evaluations,
        circuit: &circuit,
    })
    .await
    .unwrap();
    assert_eq!(again.verifying_key, keys.verifying_key);
    assert_eq!(again.proving_key, keys.proving_key);
}

#[tokio::test]
async fn test_proof_from_other_ceremony_is_rejected() {
    let (_, _, verifying_key) = run_ceremony(1).await;
    let (_, other_proving_key, other_verifying_key) = run_ceremony(2).await;
    assert_ne!(verifying_key, other_verifying_key);

    let mut rng = ChaChaRng::seed_from_u64(10);
    let x = Fr::from(3u64);
    let proof = Groth16::<Bn254>::prove(&other_proving_key, TestCircuit::<Fr>(Some(x)), &mut rng).unwrap();
    let public_input = TestCircuit::<Fr>::public_input(x);
    assert!(Groth16::<Bn254>::verify(&other_verifying_key, &[public_input], &proof).unwrap());
    assert!(!Groth16::<Bn254>::verify(&verifying_key, &[public_input], &proof).unwrap());
}

#[tokio::test]
async fn test_seal_with_mismatched_evaluations_fails() {
    let (transcript, circuit) = artifacts(1);
    let (storage, _, _) = run_ceremony(1).await;
    let (other_storage, _, _) = run_ceremony(2).await;

    let other_evaluations = codec::decode(&other_storage.get("evals").await.unwrap()).unwrap();
    let latest = storage.get("phase2-2").await.unwrap();
    let result = extract_keys(&beacon(), &Groth16Core, FinalizeInputs {
        phase1_round: PHASE1_ROUND,
        phase2_round: PHASE2_ROUND,
        phase1_transcript: &transcript,
        phase2_blob: &latest,
        evaluations: &other_evaluations,
        circuit: &circuit,
    })
    .await;
    assert!(matches!(result, Err(CoordinatorError::Seal(_))));
}

#[tokio::test]
async fn test_tampered_contribution_is_rejected() {
    let (transcript, circuit) = artifacts(3);
    let core = Groth16Core;
    let commons = core.seal_commons(&transcript, b"phase 1 round randomness").unwrap();
    let (baseline, _) = core.initialize(&circuit, &commons).unwrap();
    let contribution = core.contribute(&baseline).unwrap();
    core.verify(&baseline, &contribution).unwrap();

    for position in (0..contribution.len()).step_by(7).chain([contribution.len() - 1]) {
        let mut tampered = contribution.clone();
        tampered[position] ^= 0x01;
        assert!(
            matches!(core.verify(&baseline, &tampered), Err(CryptoError::Verification(_))),
            "flipping byte {} was not detected",
            position
        );
    }
}

#[tokio::test]
async fn test_verify_failure_leaves_chain_unchanged() {
    let (transcript, circuit) = artifacts(4);
    let storage = InMemory::new();
    let mut coordinator = initialized(&storage, &transcript, &circuit).await;
    coordinator.contribute(ContributionKey::Contribution(0)).await.unwrap();

    let mut tampered = storage.get("phase2-0").await.unwrap();
    let middle = tampered.len() / 2;
    tampered[middle] ^= 0x80;
    storage.overwrite("phase2-0", tampered).await;

    match coordinator.verify(0).await {
        Err(CoordinatorError::Verification { key, predecessor, .. }) => {
            assert_eq!(key, ContributionKey::Contribution(0));
            assert_eq!(predecessor, ContributionKey::Baseline);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(coordinator.chain().state(), ChainState::Contributing(0));
    assert!(matches!(
        coordinator.contribute(ContributionKey::Contribution(1)).await,
        Err(CoordinatorError::InvalidTransition { .. })
    ));
    assert!(matches!(
        coordinator.finalize(&transcript, &circuit).await,
        Err(CoordinatorError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_contributions_from_separate_processes() {
    let (transcript, circuit) = artifacts(5);
    let storage = InMemory::new();
    initialized(&storage, &transcript, &circuit).await;

    // Every contributor runs with a fresh chain and uploads through the URL it was handed.
    for index in 0..CONTRIBUTIONS {
        let chain = ContributionChain::resume_before(index, CONTRIBUTIONS).unwrap();
        let mut contributor = Coordinator::resume(environment(), storage.clone(), beacon(), Groth16Core, chain);
        let url = storage.public_url(&ContributionKey::Contribution(index).to_string());
        let attestation = contributor.contribute_via_url(&url).await.unwrap();
        assert_eq!(attestation.key, ContributionKey::Contribution(index));
    }

    let chain = ContributionChain::resume_before(0, CONTRIBUTIONS).unwrap();
    let mut verifier = Coordinator::resume(environment(), storage.clone(), beacon(), Groth16Core, chain);
    let verified = verifier.verify_range(0..CONTRIBUTIONS).await.unwrap();
    assert_eq!(
        verified.iter().map(|contribution| contribution.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(verifier.chain().state(), ChainState::Verified(2));

    // Verifying again is harmless.
    verifier.verify(1).await.unwrap();
    assert_eq!(verifier.chain().state(), ChainState::Verified(2));

    let keys = verifier.finalize(&transcript, &circuit).await.unwrap();
    let mut rng = ChaChaRng::seed_from_u64(11);
    let x = Fr::from(7u64);
    let proof = Groth16::<Bn254>::prove(&keys.proving_key, TestCircuit::<Fr>(Some(x)), &mut rng).unwrap();
    assert!(Groth16::<Bn254>::verify(&keys.verifying_key, &[TestCircuit::<Fr>::public_input(x)], &proof).unwrap());
}

#[tokio::test]
async fn test_verify_range_reports_first_failure() {
    let (transcript, circuit) = artifacts(6);
    let storage = InMemory::new();
    let mut coordinator = initialized(&storage, &transcript, &circuit).await;
    for index in 0..CONTRIBUTIONS {
        coordinator.contribute(ContributionKey::Contribution(index)).await.unwrap();
        coordinator.verify(index).await.unwrap();
    }

    // Contribution 1 is replaced by a contribution built on the baseline.
    let baseline = storage.get("phase2").await.unwrap();
    storage.overwrite("phase2-1", Groth16Core.contribute(&baseline).unwrap()).await;

    let chain = ContributionChain::resume_before(0, CONTRIBUTIONS).unwrap();
    let mut verifier = Coordinator::resume(environment(), storage.clone(), beacon(), Groth16Core, chain);
    match verifier.verify_range(0..CONTRIBUTIONS).await {
        Err(CoordinatorError::Verification { key, .. }) => assert_eq!(key, ContributionKey::Contribution(1)),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(verifier.chain().state(), ChainState::Initialized);
    assert_eq!(verifier.chain().contributions().count(), 0);
}

#[tokio::test]
async fn test_finalize_uses_recorded_rounds() {
    let (transcript, circuit) = artifacts(7);
    let storage = InMemory::new();
    let mut coordinator = initialized(&storage, &transcript, &circuit).await;
    for index in 0..CONTRIBUTIONS {
        coordinator.contribute(ContributionKey::Contribution(index)).await.unwrap();
        coordinator.verify(index).await.unwrap();
    }

    // A later process knows neither round.
    let environment = Environment::default().with_expected_contributions(CONTRIBUTIONS);
    let chain = ContributionChain::resume_complete(CONTRIBUTIONS).unwrap();
    let mut finalizer = Coordinator::resume(environment.clone(), storage.clone(), beacon(), Groth16Core, chain);
    finalizer.finalize(&transcript, &circuit).await.unwrap();

    // A phase 1 round other than the recorded one is refused.
    let chain = ContributionChain::resume_complete(CONTRIBUTIONS).unwrap();
    let mut finalizer = Coordinator::resume(
        environment.with_phase1_round(PHASE1_ROUND + 1),
        storage.clone(),
        beacon(),
        Groth16Core,
        chain,
    );
    assert!(matches!(
        finalizer.finalize(&transcript, &circuit).await,
        Err(CoordinatorError::Seal(_))
    ));
}

#[tokio::test]
async fn test_finalize_refuses_other_phase2_round() {
    let (transcript, circuit) = artifacts(11);
    let storage = InMemory::new();
    let mut coordinator = initialized(&storage, &transcript, &circuit).await;
    for index in 0..CONTRIBUTIONS {
        coordinator.contribute(ContributionKey::Contribution(index)).await.unwrap();
        coordinator.verify(index).await.unwrap();
    }

    let beacon = beacon().with_round(PHASE2_ROUND + 1, b"another phase 2 randomness".to_vec());
    let chain = ContributionChain::resume_complete(CONTRIBUTIONS).unwrap();
    let mut finalizer = Coordinator::resume(
        environment().with_phase2_round(PHASE2_ROUND + 1),
        storage.clone(),
        beacon,
        Groth16Core,
        chain,
    );
    match finalizer.finalize(&transcript, &circuit).await {
        Err(CoordinatorError::Seal(message)) => assert!(message.contains("differs from recorded round")),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    assert_ne!(finalizer.chain().state(), ChainState::Sealed);
}

#[tokio::test]
async fn test_finalize_without_phase2_round() {
    let (transcript, circuit) = artifacts(8);
    let storage = InMemory::new();
    let environment = Environment::default()
        .with_expected_contributions(1)
        .with_phase1_round(PHASE1_ROUND);
    let mut coordinator = Coordinator::new(environment, storage.clone(), beacon(), Groth16Core).unwrap();
    coordinator.initialize(&transcript, &circuit).await.unwrap();
    coordinator.contribute(ContributionKey::Contribution(0)).await.unwrap();
    coordinator.verify(0).await.unwrap();

    assert_eq!(storage.get("ceremony").await.unwrap(), format!("{}\n\n", PHASE1_ROUND).into_bytes());
    assert!(matches!(
        coordinator.finalize(&transcript, &circuit).await,
        Err(CoordinatorError::Seal(_))
    ));
}

#[tokio::test]
async fn test_initialize_failures_store_nothing() {
    let (transcript, circuit) = artifacts(9);
    let storage = InMemory::new();

    let environment = environment().with_phase1_round(PHASE1_ROUND + 1);
    let mut coordinator = Coordinator::new(environment, storage.clone(), beacon(), Groth16Core).unwrap();
    assert!(matches!(
        coordinator.initialize(&transcript, &circuit).await,
        Err(CoordinatorError::Beacon {
            step: Step::Initialize,
            ..
        })
    ));

    let mut coordinator = Coordinator::new(crate::environment(), storage.clone(), beacon(), Groth16Core).unwrap();
    assert!(matches!(
        coordinator.initialize(&transcript, &circuit[..circuit.len() - 1]).await,
        Err(CoordinatorError::Crypto {
            step: Step::Initialize,
            ..
        })
    ));

    for key in ["phase2", "evals", "ceremony"] {
        assert!(!storage.contains_key(key).await, "{} was stored", key);
    }
    assert_eq!(coordinator.chain().state(), ChainState::Uninitialized);
}

#[tokio::test]
async fn test_publish_artifacts() {
    let (transcript, circuit) = artifacts(10);
    let local = InMemory::new();
    initialized(&local, &transcript, &circuit).await;

    let remote = InMemory::new();
    let published = publish_artifacts(&local, &remote).await.unwrap();
    assert_eq!(published, vec!["memory:///evals", "memory:///ceremony", "memory:///phase2"]);
    for key in ["phase2", "evals", "ceremony"] {
        assert_eq!(remote.get(key).await.unwrap(), local.get(key).await.unwrap());
    }
}
