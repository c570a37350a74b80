use phase1::Phase1;
use phase2::Circuit;
use phase2_cli::*;
use phase2_coordinator::{
    codec,
    CeremonyRecord,
    ContributionKey,
    Coordinator,
    Environment,
    EvaluationSet,
    FixedBeacon,
    Groth16Core,
    InMemory,
};
use setup_utils::{CheckForCorrectness, UseCompression};
use test_helpers::{phase1_transcript_bytes, TestCircuit, TEST_POWER};

use ark_bn254::{Bn254, Fr, G1Affine, G2Affine};
use ark_serialize::CanonicalSerialize;
use gumdrop::Options;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

fn parse(args: &[&str]) -> Command {
    Phase2Opts::parse_args_default(args).unwrap().command.unwrap()
}

#[test]
fn test_parse_commands() {
    match parse(&["p2n", "phase1", "circuit", "--beacon-round", "12", "--phase2-beacon-round", "34"]) {
        Command::P2n(opts) => {
            assert_eq!(opts.phase1, "phase1");
            assert_eq!(opts.circuit, "circuit");
            assert_eq!(opts.beacon_round, Some(12));
            assert_eq!(opts.phase2_beacon_round, Some(34));
        }
        other => panic!("unexpected {:?}", other),
    }

    match parse(&["key", "ph1", "ph2", "evals", "circuit"]) {
        Command::Key(opts) => {
            assert_eq!(opts.evals, "evals");
            assert_eq!(opts.phase1_beacon_round, None);
            assert_eq!(opts.output, ".");
        }
        other => panic!("unexpected {:?}", other),
    }

    match parse(&["presigned", "bucket", "3"]) {
        Command::Presigned(opts) => {
            assert_eq!(opts.bucket, "bucket");
            assert_eq!(opts.count, 3);
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(matches!(parse(&["p2v", "2", "bucket"]), Command::P2v(opts) if opts.index == 2));
    assert!(matches!(parse(&["sol", "vk"]), Command::Sol(_)));
}

#[test]
fn test_reject_malformed_arguments() {
    assert!(Phase2Opts::parse_args_default(&["p2v", "2"]).is_err());
    assert!(Phase2Opts::parse_args_default(&["p2v", "two", "bucket"]).is_err());
    assert!(Phase2Opts::parse_args_default(&["presigned", "bucket", "-1"]).is_err());
    assert!(Phase2Opts::parse_args_default(&["p3x"]).is_err());
    assert!(Phase2Opts::parse_args_default::<&str>(&[]).unwrap().command.is_none());
}

#[tokio::test]
async fn test_new_transcript() {
    let directory = tempfile::tempdir().unwrap();
    let output = directory.path().join("phase1");
    let output = output.to_str().unwrap();

    match parse(&["p1n", "2", output]) {
        Command::P1n(opts) => new_transcript(&opts).await.unwrap(),
        other => panic!("unexpected {:?}", other),
    }
    let bytes = std::fs::read(output).unwrap();
    let transcript = Phase1::<Bn254>::read(&bytes[..], UseCompression::Yes, CheckForCorrectness::Full).unwrap();
    assert_eq!(transcript.degree(), 4);
    transcript.verify_structure().unwrap();

    for power in ["0", "64"] {
        match parse(&["p1n", power, output]) {
            Command::P1n(opts) => assert!(new_transcript(&opts).await.is_err()),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_key_extraction_requires_beacon_rounds() {
    let directory = tempfile::tempdir().unwrap();
    let evals = codec::encode(&EvaluationSet::<G1Affine, G2Affine>::default()).unwrap();
    for (name, bytes) in [("ph1", vec![0]), ("ph2", vec![0]), ("evals", evals), ("circuit", vec![0])] {
        std::fs::write(directory.path().join(name), bytes).unwrap();
    }
    let path = |name: &str| directory.path().join(name).to_str().unwrap().to_string();
    let environment = Environment::default().with_local_base_directory(directory.path());

    match parse(&["key", &path("ph1"), &path("ph2"), &path("evals"), &path("circuit")]) {
        Command::Key(opts) => {
            let error = extract_keys(&environment, &opts).await.unwrap_err();
            assert!(format!("{:#}", error).contains("no ceremony record"));
        }
        other => panic!("unexpected {:?}", other),
    }

    // The phase 1 round alone is not enough once the record is missing.
    match parse(&["key", &path("ph1"), &path("ph2"), &path("evals"), &path("circuit"), "--phase1-beacon-round", "1"]) {
        Command::Key(opts) => assert!(extract_keys(&environment, &opts).await.is_err()),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!directory.path().join(PROVING_KEY_FILE).exists());
}

#[tokio::test]
async fn test_key_extraction_checks_rounds_against_record() {
    let directory = tempfile::tempdir().unwrap();
    let evals = codec::encode(&EvaluationSet::<G1Affine, G2Affine>::default()).unwrap();
    for (name, bytes) in [("ph1", vec![0]), ("ph2", vec![0]), ("evals", evals), ("circuit", vec![0])] {
        std::fs::write(directory.path().join(name), bytes).unwrap();
    }
    let record = CeremonyRecord::new(1, Some(2)).unwrap();
    std::fs::write(directory.path().join("ceremony"), record.to_bytes()).unwrap();
    let path = |name: &str| directory.path().join(name).to_str().unwrap().to_string();
    let environment = Environment::default().with_local_base_directory(directory.path());

    for (flag, round, expected) in [
        ("--phase2-beacon-round", "3", "phase 2 round 3 differs from recorded round 2"),
        ("--phase1-beacon-round", "4", "phase 1 round 4 differs from round 1"),
    ] {
        match parse(&["key", &path("ph1"), &path("ph2"), &path("evals"), &path("circuit"), flag, round]) {
            Command::Key(opts) => {
                let error = extract_keys(&environment, &opts).await.unwrap_err();
                assert!(format!("{:#}", error).contains(expected), "{:#}", error);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert!(!directory.path().join(PROVING_KEY_FILE).exists());
}

#[tokio::test]
async fn test_export_verifier_contract() {
    let mut rng = ChaChaRng::seed_from_u64(8);
    let transcript = phase1_transcript_bytes::<Bn254>(TEST_POWER, &mut rng);
    let circuit = Circuit::<Fr>::from_synthesizer(TestCircuit::<Fr>(None))
        .unwrap()
        .to_bytes()
        .unwrap();
    let environment = Environment::default()
        .with_expected_contributions(1)
        .with_phase1_round(1)
        .with_phase2_round(2);
    let beacon = FixedBeacon::new().with_round(1, vec![1; 32]).with_round(2, vec![2; 32]);

    let mut coordinator = Coordinator::new(environment, InMemory::new(), beacon, Groth16Core).unwrap();
    coordinator.initialize(&transcript, &circuit).await.unwrap();
    coordinator.contribute(ContributionKey::Contribution(0)).await.unwrap();
    coordinator.verify(0).await.unwrap();
    let keys = coordinator.finalize(&transcript, &circuit).await.unwrap();

    let directory = tempfile::tempdir().unwrap();
    let vk = directory.path().join(VERIFYING_KEY_FILE);
    let mut bytes = vec![];
    keys.verifying_key.serialize_compressed(&mut bytes).unwrap();
    std::fs::write(&vk, &bytes).unwrap();

    let output = directory.path().to_str().unwrap();
    match parse(&["sol", vk.to_str().unwrap(), "--output", output]) {
        Command::Sol(opts) => export_verifier(&opts).await.unwrap(),
        other => panic!("unexpected {:?}", other),
    }
    let contract = std::fs::read_to_string(directory.path().join(VERIFIER_CONTRACT_FILE)).unwrap();
    assert!(contract.contains("contract Groth16Verifier"));
    assert!(contract.contains("function verifyProof"));

    std::fs::write(&vk, &bytes[1..]).unwrap();
    match parse(&["sol", vk.to_str().unwrap(), "--output", output]) {
        Command::Sol(opts) => assert!(export_verifier(&opts).await.is_err()),
        other => panic!("unexpected {:?}", other),
    }
}
