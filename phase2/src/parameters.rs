use crate::{
    circuit::Circuit,
    keypair::{PrivateKey, PublicKey},
    polynomial::eval,
};
use phase1::Phase1;
use setup_utils::{
    batch_mul_by,
    beacon_randomness,
    calculate_hash,
    calculate_hash_of_parts,
    check_same_ratio,
    derive_rng_from_seed,
    merge_pairs,
    read_vec,
    write_vec,
    CheckForCorrectness,
    ElementType,
    Error,
    UseCompression,
    VerificationError,
    HASH_SIZE,
};

use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_ff::{Field, Zero};
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_poly::{EvaluationDomain, GeneralEvaluationDomain};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use ark_std::UniformRand;
use rand::{CryptoRng, Rng};
use std::io::{Read, Write};
use tracing::{debug, info, info_span};

/// Domain separator for the beacon value that seals the phase 2 parameters.
pub const PHASE2_SEAL_DOMAIN: &[u8] = b"phase2-seal";

const COMPRESSION: UseCompression = UseCompression::Yes;

/// The circuit-specific queries that no contribution changes. They are computed once
/// from the circuit and the sealed phase 1 transcript, and only needed again to seal the keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluations<E: Pairing> {
    /// A_i(tau) for every variable
    pub a_g1: Vec<E::G1Affine>,
    /// B_i(tau) for every variable
    pub b_g1: Vec<E::G1Affine>,
    /// B_i(tau) in G2 for every variable
    pub b_g2: Vec<E::G2Affine>,
    /// beta * A_i(tau) + alpha * B_i(tau) + C_i(tau) for every instance variable
    pub vkk_g1: Vec<E::G1Affine>,
}

impl<E: Pairing> Evaluations<E> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = vec![];
        write_vec(&mut buffer, &self.a_g1, ElementType::TauG1, COMPRESSION)?;
        write_vec(&mut buffer, &self.b_g1, ElementType::TauG1, COMPRESSION)?;
        write_vec(&mut buffer, &self.b_g2, ElementType::TauG2, COMPRESSION)?;
        write_vec(&mut buffer, &self.vkk_g1, ElementType::TauG1, COMPRESSION)?;
        Ok(buffer)
    }

    fn check_lengths(&self, circuit: &Circuit<E::ScalarField>) -> Result<(), Error> {
        let expected = [
            (ElementType::TauG1, circuit.num_variables(), self.a_g1.len()),
            (ElementType::TauG1, circuit.num_variables(), self.b_g1.len()),
            (ElementType::TauG2, circuit.num_variables(), self.b_g2.len()),
            (ElementType::TauG1, circuit.num_instance_variables, self.vkk_g1.len()),
        ];
        for (element, expected, got) in expected {
            if expected != got {
                return Err(Error::InvalidLength { element, expected, got });
            }
        }
        Ok(())
    }
}

/// MPC parameters are just like Groth16 `Parameters` except, when serialized,
/// they contain a transcript of contributions at the end, which can be verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MPCParameters<E: Pairing> {
    pub delta_g1: E::G1Affine,
    pub delta_g2: E::G2Affine,
    /// tau^i * t(tau) / delta
    pub h_query: Vec<E::G1Affine>,
    /// (beta * A_i(tau) + alpha * B_i(tau) + C_i(tau)) / delta for every witness variable
    pub l_query: Vec<E::G1Affine>,
    /// Commits to the circuit, its evaluations and the phase 1 trapdoors they were derived from.
    pub cs_hash: [u8; HASH_SIZE],
    pub contributions: Vec<PublicKey<E>>,
}

/// Returns the hash binding a parameter set to the circuit, the evaluations and the commons.
fn commitment_hash<E: Pairing>(
    circuit: &Circuit<E::ScalarField>,
    evaluations: &Evaluations<E>,
    phase1: &Phase1<E>,
) -> Result<[u8; HASH_SIZE], Error> {
    let mut commons = vec![];
    phase1.alpha_tau_powers_g1[0].serialize_compressed(&mut commons)?;
    phase1.beta_tau_powers_g1[0].serialize_compressed(&mut commons)?;
    phase1.beta_g2.serialize_compressed(&mut commons)?;

    Ok(calculate_hash_of_parts(&[
        &circuit.hash()?,
        &evaluations.to_bytes()?,
        &commons,
    ]))
}

/// Interpolates the first `domain.size()` powers into the Lagrange basis of the domain.
fn lagrange<C: CurveGroup>(domain: &GeneralEvaluationDomain<C::ScalarField>, powers: &[C::Affine]) -> Vec<C::Affine> {
    let mut points = powers[..domain.size()]
        .iter()
        .map(|point| point.into_group())
        .collect::<Vec<C>>();
    domain.ifft_in_place(&mut points);
    C::normalize_batch(&points)
}

impl<E: Pairing> MPCParameters<E> {
    /// Derives the initial parameters and the circuit evaluations from a sealed phase 1 transcript.
    /// Delta starts at one, so the parameters must not be used before at least one contribution.
    pub fn new(circuit: &Circuit<E::ScalarField>, phase1: &Phase1<E>) -> Result<(Self, Evaluations<E>), Error> {
        let span = info_span!("phase2-new");
        let _enter = span.enter();

        phase1.check_lengths()?;
        let domain = circuit.domain()?;
        let m = domain.size();
        if m > phase1.degree() {
            return Err(Error::PowerTooSmall {
                required: m,
                got: phase1.degree(),
            });
        }
        debug!("evaluating the circuit over a domain of size {}", m);

        let coeffs_g1 = lagrange::<E::G1>(&domain, &phase1.tau_powers_g1);
        let coeffs_g2 = lagrange::<E::G2>(&domain, &phase1.tau_powers_g2);
        let alpha_coeffs_g1 = lagrange::<E::G1>(&domain, &phase1.alpha_tau_powers_g1);
        let beta_coeffs_g1 = lagrange::<E::G1>(&domain, &phase1.beta_tau_powers_g1);
        debug!("computed the Lagrange coefficients");

        let (at, bt, ct) = circuit.columns();
        let (a_g1, b_g1, b_g2, vkk_g1, l_query) = eval::<E>(
            &coeffs_g1,
            &coeffs_g2,
            &alpha_coeffs_g1,
            &beta_coeffs_g1,
            &at,
            &bt,
            &ct,
            circuit.num_instance_variables,
        );
        debug!("evaluated the QAP polynomials");

        // tau^i * (tau^m - 1) = tau^(i + m) - tau^i
        let h_query = (0..m - 1)
            .map(|i| phase1.tau_powers_g1[i + m].into_group() - phase1.tau_powers_g1[i])
            .collect::<Vec<E::G1>>();
        let h_query = E::G1::normalize_batch(&h_query);

        let evaluations = Evaluations {
            a_g1,
            b_g1,
            b_g2,
            vkk_g1,
        };
        let cs_hash = commitment_hash(circuit, &evaluations, phase1)?;

        info!("constructed the initial phase 2 parameters");
        Ok((
            Self {
                delta_g1: E::G1Affine::generator(),
                delta_g2: E::G2Affine::generator(),
                h_query,
                l_query,
                cs_hash,
                contributions: vec![],
            },
            evaluations,
        ))
    }

    /// Contributes some randomness to the parameters. Only one
    /// contributor needs to be honest for the parameters to be secure.
    ///
    /// This function returns a hash of the public key of the contribution.
    pub fn contribute<R: Rng + CryptoRng>(&mut self, rng: &mut R) -> Result<[u8; HASH_SIZE], Error> {
        let span = info_span!("phase2-contribute", contribution = self.contributions.len());
        let _enter = span.enter();

        let transcript = calculate_hash(&self.to_bytes()?);
        let (public_key, private_key) = self.keypair(rng, transcript)?;

        let delta_inv = private_key
            .delta
            .inverse()
            .ok_or(Error::PointAtInfinity(ElementType::DeltaG1))?;

        self.h_query = batch_mul_by::<E::G1>(&self.h_query, delta_inv);
        self.l_query = batch_mul_by::<E::G1>(&self.l_query, delta_inv);
        self.delta_g1 = public_key.delta_after;
        self.delta_g2 = (self.delta_g2 * private_key.delta).into_affine();
        drop(private_key);

        let mut public_key_bytes = vec![];
        public_key.write(&mut public_key_bytes)?;
        self.contributions.push(public_key);
        debug!("updated the queries with the new delta");

        Ok(calculate_hash(&public_key_bytes))
    }

    fn keypair<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        transcript: [u8; HASH_SIZE],
    ) -> Result<(PublicKey<E>, PrivateKey<E>), Error> {
        let delta = loop {
            let delta = E::ScalarField::rand(rng);
            if !delta.is_zero() {
                break delta;
            }
        };
        let s = E::G1::rand(rng).into_affine();
        let s_delta = (s * delta).into_affine();
        let r = PublicKey::<E>::hash_to_r(&s, &s_delta, &transcript)?;
        let r_delta = (r * delta).into_affine();

        Ok((
            PublicKey {
                delta_after: (self.delta_g1 * delta).into_affine(),
                s,
                s_delta,
                r_delta,
                transcript,
            },
            PrivateKey { delta },
        ))
    }

    /// Verify that `after` is these parameters with exactly one more contribution applied.
    pub fn verify(&self, after: &Self) -> Result<(), Error> {
        let span = info_span!("phase2-verify", contribution = self.contributions.len());
        let _enter = span.enter();

        if self.cs_hash != after.cs_hash {
            return Err(VerificationError::Changed("circuit hash").into());
        }
        if after.contributions.len() != self.contributions.len() + 1 {
            return Err(VerificationError::ContributionCount {
                before: self.contributions.len(),
                found: after.contributions.len(),
            }
            .into());
        }
        if after.contributions[..self.contributions.len()] != self.contributions[..] {
            return Err(VerificationError::Changed("contribution history").into());
        }
        if self.h_query.len() != after.h_query.len() {
            return Err(Error::InvalidLength {
                element: ElementType::HQuery,
                expected: self.h_query.len(),
                got: after.h_query.len(),
            });
        }
        if self.l_query.len() != after.l_query.len() {
            return Err(Error::InvalidLength {
                element: ElementType::LQuery,
                expected: self.l_query.len(),
                got: after.l_query.len(),
            });
        }

        let public_key = &after.contributions[self.contributions.len()];
        if public_key.transcript != calculate_hash(&self.to_bytes()?) {
            return Err(VerificationError::TranscriptMismatch(self.contributions.len()).into());
        }
        if public_key.delta_after != after.delta_g1 {
            return Err(VerificationError::PublicKeyMismatch.into());
        }
        for (element, is_zero) in [
            (ElementType::DeltaG1, after.delta_g1.is_zero()),
            (ElementType::DeltaG2, after.delta_g2.is_zero()),
            (ElementType::PublicKey, public_key.s.is_zero()),
            (ElementType::PublicKey, public_key.s_delta.is_zero()),
        ] {
            if is_zero {
                return Err(Error::PointAtInfinity(element));
            }
        }

        // proof of knowledge of the new delta
        let r = public_key.r()?;
        check_same_ratio::<E>(
            &(public_key.s, public_key.s_delta),
            &(r, public_key.r_delta),
            "knowledge of delta",
        )?;
        check_same_ratio::<E>(
            &(self.delta_g1, after.delta_g1),
            &(r, public_key.r_delta),
            "delta update",
        )?;
        check_same_ratio::<E>(
            &(E::G1Affine::generator(), after.delta_g1),
            &(E::G2Affine::generator(), after.delta_g2),
            "delta in G1 and G2",
        )?;
        debug!("delta was updated consistently");

        check_same_ratio::<E>(
            &merge_pairs::<E::G1>(&self.h_query, &after.h_query),
            &(after.delta_g2, self.delta_g2),
            "H query",
        )?;
        check_same_ratio::<E>(
            &merge_pairs::<E::G1>(&self.l_query, &after.l_query),
            &(after.delta_g2, self.delta_g2),
            "L query",
        )?;
        debug!("queries were updated consistently");

        Ok(())
    }

    /// Applies a final contribution derived from the beacon value and assembles the Groth16 keys.
    ///
    /// Fails if the parameters were not derived from this circuit, these evaluations
    /// and this phase 1 transcript.
    pub fn seal(
        mut self,
        circuit: &Circuit<E::ScalarField>,
        evaluations: &Evaluations<E>,
        phase1: &Phase1<E>,
        beacon: &[u8],
    ) -> Result<(ProvingKey<E>, VerifyingKey<E>), Error> {
        let span = info_span!("phase2-seal", contributions = self.contributions.len());
        let _enter = span.enter();

        phase1.check_lengths()?;
        if commitment_hash(circuit, evaluations, phase1)? != self.cs_hash {
            return Err(Error::Mismatch("circuit, evaluations and phase 1 transcript"));
        }
        evaluations.check_lengths(circuit)?;
        let expected = [
            (ElementType::HQuery, circuit.domain()?.size() - 1, self.h_query.len()),
            (ElementType::LQuery, circuit.num_witness_variables, self.l_query.len()),
        ];
        for (element, expected, got) in expected {
            if expected != got {
                return Err(Error::InvalidLength { element, expected, got });
            }
        }

        let mut rng = derive_rng_from_seed(&beacon_randomness(PHASE2_SEAL_DOMAIN, beacon));
        self.contribute(&mut rng)?;
        info!("applied the beacon contribution");

        let verifying_key = VerifyingKey::<E> {
            alpha_g1: phase1.alpha_tau_powers_g1[0],
            beta_g2: phase1.beta_g2,
            gamma_g2: E::G2Affine::generator(),
            delta_g2: self.delta_g2,
            gamma_abc_g1: evaluations.vkk_g1.clone(),
        };
        let proving_key = ProvingKey::<E> {
            vk: verifying_key.clone(),
            beta_g1: phase1.beta_tau_powers_g1[0],
            delta_g1: self.delta_g1,
            a_query: evaluations.a_g1.clone(),
            b_g1_query: evaluations.b_g1.clone(),
            b_g2_query: evaluations.b_g2.clone(),
            h_query: self.h_query,
            l_query: self.l_query,
        };

        Ok((proving_key, verifying_key))
    }

    /// Serializes these parameters and their contribution transcript.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        self.delta_g1.serialize_compressed(&mut writer)?;
        self.delta_g2.serialize_compressed(&mut writer)?;
        write_vec(&mut writer, &self.h_query, ElementType::HQuery, COMPRESSION)?;
        write_vec(&mut writer, &self.l_query, ElementType::LQuery, COMPRESSION)?;
        writer.write_all(&self.cs_hash)?;

        let contributions = u32::try_from(self.contributions.len()).map_err(|_| Error::InvalidLength {
            element: ElementType::PublicKey,
            expected: u32::MAX as usize,
            got: self.contributions.len(),
        })?;
        writer.write_all(&contributions.to_be_bytes())?;
        for public_key in &self.contributions {
            public_key.write(&mut writer)?;
        }
        Ok(())
    }

    /// Deserializes parameters, checking that every point is valid.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, Error> {
        let delta_g1 = E::G1Affine::deserialize_with_mode(&mut reader, Compress::Yes, Validate::Yes)?;
        let delta_g2 = E::G2Affine::deserialize_with_mode(&mut reader, Compress::Yes, Validate::Yes)?;
        let h_query = read_vec(&mut reader, COMPRESSION, CheckForCorrectness::Full)?;
        let l_query = read_vec(&mut reader, COMPRESSION, CheckForCorrectness::Full)?;
        let mut cs_hash = [0u8; HASH_SIZE];
        reader.read_exact(&mut cs_hash)?;

        let mut contributions = [0u8; 4];
        reader.read_exact(&mut contributions)?;
        let contributions = u32::from_be_bytes(contributions);
        let contributions = (0..contributions)
            .map(|_| PublicKey::read(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            delta_g1,
            delta_g2,
            h_query,
            l_query,
            cs_hash,
            contributions,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = vec![];
        self.write(&mut buffer)?;
        Ok(buffer)
    }

    /// Deserializes parameters from a buffer that must contain nothing else.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, Error> {
        let parameters = Self::read(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(Error::TrailingBytes("phase 2 parameters"));
        }
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phase1::helpers::testing::generate_transcript;
    use test_helpers::TestCircuit;

    use ark_bn254::{Bn254, Fr};
    use rand::thread_rng;

    fn setup() -> (Circuit<Fr>, Phase1<Bn254>, MPCParameters<Bn254>, Evaluations<Bn254>) {
        let circuit = Circuit::<Fr>::from_synthesizer(TestCircuit::<Fr>(None)).unwrap();
        let phase1 = generate_transcript::<Bn254>(4, &mut thread_rng());
        let (parameters, evaluations) = MPCParameters::new(&circuit, &phase1).unwrap();
        (circuit, phase1, parameters, evaluations)
    }

    #[test]
    fn test_new_query_lengths() {
        let (circuit, _, parameters, evaluations) = setup();
        assert_eq!(parameters.h_query.len(), 7);
        assert_eq!(parameters.l_query.len(), circuit.num_witness_variables);
        assert_eq!(evaluations.vkk_g1.len(), circuit.num_instance_variables);
        assert!(parameters.contributions.is_empty());
    }

    #[test]
    fn test_new_rejects_small_transcript() {
        let circuit = Circuit::<Fr>::from_synthesizer(TestCircuit::<Fr>(None)).unwrap();
        let phase1 = generate_transcript::<Bn254>(2, &mut thread_rng());
        assert!(matches!(
            MPCParameters::new(&circuit, &phase1),
            Err(Error::PowerTooSmall { required: 8, got: 4 })
        ));
    }

    #[test]
    fn test_serialization() {
        let (_, _, mut parameters, _) = setup();
        parameters.contribute(&mut thread_rng()).unwrap();

        let bytes = parameters.to_bytes().unwrap();
        assert_eq!(MPCParameters::<Bn254>::from_bytes(&bytes).unwrap(), parameters);

        let mut trailing = bytes.clone();
        trailing.push(1);
        assert!(MPCParameters::<Bn254>::from_bytes(&trailing).is_err());
        assert!(MPCParameters::<Bn254>::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_contribute_and_verify() {
        let (_, _, parameters, _) = setup();
        let mut after = parameters.clone();
        after.contribute(&mut thread_rng()).unwrap();
        parameters.verify(&after).unwrap();

        let mut third = after.clone();
        third.contribute(&mut thread_rng()).unwrap();
        after.verify(&third).unwrap();

        // skipping a contribution is rejected
        assert!(matches!(
            parameters.verify(&third),
            Err(Error::Verification(VerificationError::ContributionCount { before: 0, found: 2 }))
        ));
        // so is a contribution that was not applied
        assert!(parameters.verify(&parameters).is_err());
    }

    #[test]
    fn test_verify_rejects_tampered_query() {
        let (_, _, parameters, _) = setup();
        let mut after = parameters.clone();
        after.contribute(&mut thread_rng()).unwrap();
        after.h_query[2] = after.h_query[3];
        assert!(matches!(
            parameters.verify(&after),
            Err(Error::Verification(VerificationError::InvalidRatio("H query")))
        ));
    }

    #[test]
    fn test_verify_rejects_foreign_delta() {
        let (_, _, parameters, _) = setup();
        let mut after = parameters.clone();
        after.contribute(&mut thread_rng()).unwrap();
        let mut other = parameters.clone();
        other.contribute(&mut thread_rng()).unwrap();

        after.delta_g2 = other.delta_g2;
        assert!(parameters.verify(&after).is_err());
    }

    #[test]
    fn test_seal_is_deterministic() {
        let (circuit, phase1, mut parameters, evaluations) = setup();
        parameters.contribute(&mut thread_rng()).unwrap();

        let (pk1, vk1) = parameters.clone().seal(&circuit, &evaluations, &phase1, b"beacon").unwrap();
        let (pk2, vk2) = parameters.clone().seal(&circuit, &evaluations, &phase1, b"beacon").unwrap();
        let (_, vk3) = parameters.seal(&circuit, &evaluations, &phase1, b"another beacon").unwrap();

        assert_eq!(vk1, vk2);
        assert_eq!(pk1.delta_g1, pk2.delta_g1);
        assert_ne!(vk1.delta_g2, vk3.delta_g2);
    }

    #[test]
    fn test_seal_rejects_foreign_evaluations() {
        let (circuit, phase1, parameters, _) = setup();
        let (_, _, _, other_evaluations) = setup();
        assert!(matches!(
            parameters.seal(&circuit, &other_evaluations, &phase1, b"beacon"),
            Err(Error::Mismatch(_))
        ));
    }
}
