use crate::{codec::PointEncoding, objects::EvaluationSet};

use phase1::Phase1;
use phase2::{Circuit, Evaluations, MPCParameters};
use setup_utils::{CheckForCorrectness, Error, UseCompression};

use ark_bn254::{Bn254, Fr, G1Affine, G2Affine};
use ark_groth16::{ProvingKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("malformed phase 1 transcript: {0}")]
    MalformedTranscript(String),

    #[error("malformed circuit description: {0}")]
    MalformedCircuit(String),

    #[error("malformed parameters: {0}")]
    MalformedBlob(String),

    #[error("the circuit does not fit the commons: {0}")]
    Mismatch(String),

    #[error("invalid contribution: {0}")]
    Verification(String),

    #[error("cannot seal the keys: {0}")]
    Seal(String),
}

/// The keys extracted at the end of a ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedKeys<P, V> {
    pub proving_key: P,
    pub verifying_key: V,
}

///
/// The cryptographic operations a ceremony is built from.
///
/// Blobs are opaque to the coordinator: it stores them, hashes them and hands
/// them back. Only the evaluation set has a format owned by the coordinator,
/// so its points must implement [`PointEncoding`].
///
pub trait CryptoCore: Send + Sync {
    /// The sealed universal transcript.
    type Commons: Send + Sync;
    type G1: PointEncoding + Send + Sync;
    type G2: PointEncoding + Send + Sync;
    type ProvingKey: Send;
    type VerifyingKey: Send;

    /// Seals a raw universal transcript with a beacon value.
    fn seal_commons(&self, transcript: &[u8], beacon: &[u8]) -> Result<Self::Commons, CryptoError>;

    /// Derives the baseline blob and the evaluation set of a circuit.
    fn initialize(
        &self,
        circuit: &[u8],
        commons: &Self::Commons,
    ) -> Result<(Vec<u8>, EvaluationSet<Self::G1, Self::G2>), CryptoError>;

    /// Mixes fresh private randomness into a blob.
    fn contribute(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Checks that `candidate` is a valid extension of `predecessor`.
    fn verify(&self, predecessor: &[u8], candidate: &[u8]) -> Result<(), CryptoError>;

    /// Seals the final blob with a beacon value into a key pair.
    fn seal(
        &self,
        commons: &Self::Commons,
        circuit: &[u8],
        blob: &[u8],
        evaluations: &EvaluationSet<Self::G1, Self::G2>,
        beacon: &[u8],
    ) -> Result<SealedKeys<Self::ProvingKey, Self::VerifyingKey>, CryptoError>;
}

/// The Groth16 phase 2 ceremony over BN254.
#[derive(Debug, Clone, Copy, Default)]
pub struct Groth16Core;

impl Groth16Core {
    fn read_circuit(circuit: &[u8]) -> Result<Circuit<Fr>, CryptoError> {
        Circuit::read(circuit).map_err(|error| CryptoError::MalformedCircuit(error.to_string()))
    }

    fn read_parameters(blob: &[u8]) -> Result<MPCParameters<Bn254>, CryptoError> {
        MPCParameters::from_bytes(blob).map_err(|error| CryptoError::MalformedBlob(error.to_string()))
    }
}

fn to_evaluation_set(evaluations: Evaluations<Bn254>) -> EvaluationSet<G1Affine, G2Affine> {
    EvaluationSet {
        a: evaluations.a_g1,
        b: evaluations.b_g1,
        vkk: evaluations.vkk_g1,
        ckk: vec![],
        g2_b: evaluations.b_g2,
        public_and_commitment_committed: vec![],
    }
}

fn from_evaluation_set(set: &EvaluationSet<G1Affine, G2Affine>) -> Result<Evaluations<Bn254>, CryptoError> {
    if set.has_commitments() {
        return Err(CryptoError::Seal(
            "commitments are not supported by this proving system".to_string(),
        ));
    }
    Ok(Evaluations {
        a_g1: set.a.clone(),
        b_g1: set.b.clone(),
        b_g2: set.g2_b.clone(),
        vkk_g1: set.vkk.clone(),
    })
}

impl CryptoCore for Groth16Core {
    type Commons = Phase1<Bn254>;
    type G1 = G1Affine;
    type G2 = G2Affine;
    type ProvingKey = ProvingKey<Bn254>;
    type VerifyingKey = VerifyingKey<Bn254>;

    fn seal_commons(&self, transcript: &[u8], beacon: &[u8]) -> Result<Self::Commons, CryptoError> {
        let malformed = |error: Error| CryptoError::MalformedTranscript(error.to_string());
        let mut reader = transcript;
        let transcript = Phase1::<Bn254>::read(&mut reader, UseCompression::Yes, CheckForCorrectness::Full)
            .map_err(malformed)?;
        if !reader.is_empty() {
            return Err(malformed(Error::TrailingBytes("phase 1 transcript")));
        }
        debug!("Read a phase 1 transcript of degree {}", transcript.degree());
        transcript.seal(beacon).map_err(malformed)
    }

    fn initialize(
        &self,
        circuit: &[u8],
        commons: &Self::Commons,
    ) -> Result<(Vec<u8>, EvaluationSet<Self::G1, Self::G2>), CryptoError> {
        let circuit = Self::read_circuit(circuit)?;
        let (parameters, evaluations) = MPCParameters::new(&circuit, commons).map_err(|error| match error {
            Error::PowerTooSmall { .. } | Error::InvalidLength { .. } => CryptoError::Mismatch(error.to_string()),
            error => CryptoError::MalformedCircuit(error.to_string()),
        })?;
        let blob = parameters
            .to_bytes()
            .map_err(|error| CryptoError::MalformedBlob(error.to_string()))?;
        Ok((blob, to_evaluation_set(evaluations)))
    }

    fn contribute(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut parameters = Self::read_parameters(blob)?;
        parameters
            .contribute(&mut OsRng)
            .map_err(|error| CryptoError::MalformedBlob(error.to_string()))?;
        parameters
            .to_bytes()
            .map_err(|error| CryptoError::MalformedBlob(error.to_string()))
    }

    fn verify(&self, predecessor: &[u8], candidate: &[u8]) -> Result<(), CryptoError> {
        let before = Self::read_parameters(predecessor)?;
        let after = MPCParameters::<Bn254>::from_bytes(candidate)
            .map_err(|error| CryptoError::Verification(format!("unreadable parameters: {}", error)))?;
        before
            .verify(&after)
            .map_err(|error| CryptoError::Verification(error.to_string()))
    }

    fn seal(
        &self,
        commons: &Self::Commons,
        circuit: &[u8],
        blob: &[u8],
        evaluations: &EvaluationSet<Self::G1, Self::G2>,
        beacon: &[u8],
    ) -> Result<SealedKeys<Self::ProvingKey, Self::VerifyingKey>, CryptoError> {
        let circuit = Self::read_circuit(circuit)?;
        let parameters = Self::read_parameters(blob)?;
        let evaluations = from_evaluation_set(evaluations)?;
        let (proving_key, verifying_key) = parameters
            .seal(&circuit, &evaluations, commons, beacon)
            .map_err(|error| CryptoError::Seal(error.to_string()))?;
        Ok(SealedKeys {
            proving_key,
            verifying_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_helpers::{phase1_transcript_bytes, TestCircuit, TEST_POWER};

    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn setup() -> (Vec<u8>, Vec<u8>) {
        let mut rng = ChaChaRng::seed_from_u64(3);
        let transcript = phase1_transcript_bytes::<Bn254>(TEST_POWER, &mut rng);
        let circuit = Circuit::<Fr>::from_synthesizer(TestCircuit::<Fr>(None))
            .unwrap()
            .to_bytes()
            .unwrap();
        (transcript, circuit)
    }

    #[test]
    fn test_contribution_chain() {
        let (transcript, circuit) = setup();
        let core = Groth16Core;
        let commons = core.seal_commons(&transcript, b"phase 1 beacon").unwrap();
        let (baseline, evaluations) = core.initialize(&circuit, &commons).unwrap();
        assert!(!evaluations.has_commitments());

        let first = core.contribute(&baseline).unwrap();
        assert_ne!(first, baseline);
        core.verify(&baseline, &first).unwrap();
        let second = core.contribute(&first).unwrap();
        core.verify(&first, &second).unwrap();

        // Each contribution must extend its immediate predecessor.
        assert!(matches!(core.verify(&baseline, &second), Err(CryptoError::Verification(_))));
        assert!(matches!(core.verify(&baseline, &baseline), Err(CryptoError::Verification(_))));
    }

    #[test]
    fn test_flipped_baseline_byte_is_rejected() {
        let (transcript, circuit) = setup();
        let core = Groth16Core;
        let commons = core.seal_commons(&transcript, b"phase 1 beacon").unwrap();
        let (baseline, _) = core.initialize(&circuit, &commons).unwrap();

        for position in 0..baseline.len() {
            let mut tampered = baseline.clone();
            tampered[position] ^= 1;
            assert!(
                matches!(core.verify(&baseline, &tampered), Err(CryptoError::Verification(_))),
                "flipping byte {} was accepted",
                position
            );
        }
    }

    #[test]
    fn test_oversized_circuit_header_is_malformed() {
        let (transcript, _) = setup();
        let core = Groth16Core;
        let commons = core.seal_commons(&transcript, b"beacon").unwrap();
        let header = [u32::MAX, u32::MAX, 1, u32::MAX]
            .iter()
            .flat_map(|value| value.to_be_bytes())
            .collect::<Vec<_>>();
        assert!(matches!(
            core.initialize(&header, &commons),
            Err(CryptoError::MalformedCircuit(_))
        ));
    }

    #[test]
    fn test_commons_are_sealed_deterministically() {
        let (transcript, _) = setup();
        let core = Groth16Core;
        let first = core.seal_commons(&transcript, b"beacon").unwrap();
        let second = core.seal_commons(&transcript, b"beacon").unwrap();
        let other = core.seal_commons(&transcript, b"another beacon").unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_malformed_inputs() {
        let (transcript, circuit) = setup();
        let core = Groth16Core;
        assert!(matches!(
            core.seal_commons(&transcript[..transcript.len() - 1], b"beacon"),
            Err(CryptoError::MalformedTranscript(_))
        ));
        let mut trailing = transcript.clone();
        trailing.push(0);
        assert!(matches!(
            core.seal_commons(&trailing, b"beacon"),
            Err(CryptoError::MalformedTranscript(_))
        ));

        let commons = core.seal_commons(&transcript, b"beacon").unwrap();
        assert!(matches!(
            core.initialize(&circuit[..3], &commons),
            Err(CryptoError::MalformedCircuit(_))
        ));
        assert!(matches!(core.contribute(b"garbage"), Err(CryptoError::MalformedBlob(_))));
    }

    #[test]
    fn test_small_transcript_is_a_mismatch() {
        let mut rng = ChaChaRng::seed_from_u64(5);
        let transcript = phase1_transcript_bytes::<Bn254>(2, &mut rng);
        let (_, circuit) = setup();
        let core = Groth16Core;
        let commons = core.seal_commons(&transcript, b"beacon").unwrap();
        assert!(matches!(core.initialize(&circuit, &commons), Err(CryptoError::Mismatch(_))));
    }

    #[test]
    fn test_commitments_are_rejected() {
        let (transcript, circuit) = setup();
        let core = Groth16Core;
        let commons = core.seal_commons(&transcript, b"beacon").unwrap();
        let (baseline, mut evaluations) = core.initialize(&circuit, &commons).unwrap();
        let blob = core.contribute(&baseline).unwrap();
        evaluations.public_and_commitment_committed = vec![vec![1]];
        assert!(matches!(
            core.seal(&commons, &circuit, &blob, &evaluations, b"phase 2 beacon"),
            Err(CryptoError::Seal(_))
        ));
    }
}
