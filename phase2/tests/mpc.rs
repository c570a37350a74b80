use phase1::{helpers::testing::generate_transcript, Phase1};
use phase2::{Circuit, Evaluations, MPCParameters};
use test_helpers::TestCircuit;

use ark_bn254::{Bn254, Fr};
use ark_groth16::Groth16;
use ark_snark::SNARK;
use rand::{thread_rng, Rng};

fn generate_mpc_parameters<R: Rng>(
    circuit: &Circuit<Fr>,
    rng: &mut R,
) -> (Phase1<Bn254>, MPCParameters<Bn254>, Evaluations<Bn254>) {
    // make 1 power of tau contribution, then seal it like the ceremony does
    let phase1 = generate_transcript::<Bn254>(4, rng).seal(b"phase 1 beacon").unwrap();

    let (mut mpc, evaluations) = MPCParameters::<Bn254>::new(circuit, &phase1).unwrap();

    let before = mpc.clone();
    // it is _not_ safe to use it yet, there must be 1 contribution
    mpc.contribute(&mut thread_rng()).unwrap();

    before.verify(&mpc).unwrap();

    (phase1, mpc, evaluations)
}

#[test]
fn test_groth16_bn254() {
    let rng = &mut thread_rng();
    let circuit = Circuit::<Fr>::from_synthesizer(TestCircuit::<Fr>(None)).unwrap();

    let (phase1, mpc, evaluations) = generate_mpc_parameters(&circuit, rng);
    let (pk, vk) = mpc.seal(&circuit, &evaluations, &phase1, b"phase 2 beacon").unwrap();

    // Create a proof with these params
    let x = Fr::from(5u64);
    let proof = Groth16::<Bn254>::prove(&pk, TestCircuit::<Fr>(Some(x)), rng).unwrap();

    let public_input = TestCircuit::<Fr>::public_input(x);
    assert!(Groth16::<Bn254>::verify(&vk, &[public_input], &proof).unwrap());
    assert!(!Groth16::<Bn254>::verify(&vk, &[public_input + Fr::from(1u64)], &proof).unwrap());
}

#[test]
fn test_proof_from_other_ceremony_is_rejected() {
    let rng = &mut thread_rng();
    let circuit = Circuit::<Fr>::from_synthesizer(TestCircuit::<Fr>(None)).unwrap();

    let (phase1, mpc, evaluations) = generate_mpc_parameters(&circuit, rng);
    let (_, vk) = mpc.seal(&circuit, &evaluations, &phase1, b"phase 2 beacon").unwrap();

    let (other_phase1, other_mpc, other_evaluations) = generate_mpc_parameters(&circuit, rng);
    let (other_pk, _) = other_mpc
        .seal(&circuit, &other_evaluations, &other_phase1, b"phase 2 beacon")
        .unwrap();

    let x = Fr::from(3u64);
    let proof = Groth16::<Bn254>::prove(&other_pk, TestCircuit::<Fr>(Some(x)), rng).unwrap();
    assert!(!Groth16::<Bn254>::verify(&vk, &[TestCircuit::<Fr>::public_input(x)], &proof).unwrap());
}
