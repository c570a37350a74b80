use crate::VerificationError;

use ark_ec::{pairing::Pairing, CurveGroup};
use ark_ff::Field;
use ark_std::UniformRand;
use rand::{thread_rng, SeedableRng};
use rand_chacha::ChaChaRng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::info;

/// Size in bytes of every digest produced by [`calculate_hash`].
pub const HASH_SIZE: usize = 32;

/// Calculates the SHA-256 hash of the given input.
pub fn calculate_hash(input: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Hashes several byte strings as one, each prefixed by its big-endian length.
pub fn calculate_hash_of_parts(parts: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derives a seed for a deterministic RNG from a public beacon value.
/// The domain separates independent uses of the same beacon value.
pub fn beacon_randomness(domain: &[u8], beacon: &[u8]) -> [u8; HASH_SIZE] {
    calculate_hash_of_parts(&[domain, beacon])
}

/// Returns a ChaCha RNG seeded with the hash of `seed`.
pub fn derive_rng_from_seed(seed: &[u8]) -> ChaChaRng {
    ChaChaRng::from_seed(calculate_hash(seed))
}

/// Deterministically maps a digest to a point in G2.
pub fn hash_to_g2<E: Pairing>(digest: &[u8]) -> E::G2Affine {
    let mut rng = derive_rng_from_seed(digest);
    E::G2::rand(&mut rng).into_affine()
}

/// Returns `[1, base, base^2, ..., base^(length - 1)]`.
pub fn powers<F: Field>(base: F, length: usize) -> Vec<F> {
    let mut current = F::one();
    let mut powers = Vec::with_capacity(length);
    for _ in 0..length {
        powers.push(current);
        current *= base;
    }
    powers
}

/// Multiplies every base by the scalar in the same position and returns affine points.
pub fn batch_mul<C: CurveGroup>(bases: &[C::Affine], scalars: &[C::ScalarField]) -> Vec<C::Affine> {
    #[cfg(feature = "parallel")]
    let projective = bases
        .par_iter()
        .zip(scalars.par_iter())
        .map(|(base, scalar)| *base * scalar)
        .collect::<Vec<C>>();
    #[cfg(not(feature = "parallel"))]
    let projective = bases
        .iter()
        .zip(scalars.iter())
        .map(|(base, scalar)| *base * scalar)
        .collect::<Vec<C>>();

    C::normalize_batch(&projective)
}

/// Multiplies every base by the same scalar.
pub fn batch_mul_by<C: CurveGroup>(bases: &[C::Affine], scalar: C::ScalarField) -> Vec<C::Affine> {
    #[cfg(feature = "parallel")]
    let projective = bases.par_iter().map(|base| *base * scalar).collect::<Vec<C>>();
    #[cfg(not(feature = "parallel"))]
    let projective = bases.iter().map(|base| *base * scalar).collect::<Vec<C>>();

    C::normalize_batch(&projective)
}

/// Checks if pairs have the same ratio.
/// Under the hood uses pairing to check
/// x1/x2 = y1/y2 => x1*y2 = x2*y1
pub fn same_ratio<E: Pairing>(g1: &(E::G1Affine, E::G1Affine), g2: &(E::G2Affine, E::G2Affine)) -> bool {
    E::pairing(g1.0, g2.1) == E::pairing(g1.1, g2.0)
}

pub fn check_same_ratio<E: Pairing>(
    g1: &(E::G1Affine, E::G1Affine),
    g2: &(E::G2Affine, E::G2Affine),
    err: &'static str,
) -> Result<(), VerificationError> {
    if !same_ratio::<E>(g1, g2) {
        return Err(VerificationError::InvalidRatio(err));
    }
    Ok(())
}

/// Compute a random linear combination of the two vectors, using the same
/// random scalar for the elements in the same position.
///
/// If `v1[i] * s = v2[i]` for every `i`, then the merged pair keeps the same ratio.
/// A mismatch anywhere survives the combination with overwhelming probability.
pub fn merge_pairs<C: CurveGroup>(v1: &[C::Affine], v2: &[C::Affine]) -> (C::Affine, C::Affine) {
    assert_eq!(v1.len(), v2.len());

    let rng = &mut thread_rng();
    let scalars = (0..v1.len())
        .map(|_| C::ScalarField::rand(rng))
        .collect::<Vec<_>>();

    let s = C::msm_unchecked(v1, &scalars);
    let sx = C::msm_unchecked(v2, &scalars);

    (s.into_affine(), sx.into_affine())
}

/// Construct a single pair (s, s^x) for a vector of
/// the form [1, x, x^2, x^3, ...].
pub fn power_pairs<C: CurveGroup>(v: &[C::Affine]) -> (C::Affine, C::Affine) {
    merge_pairs::<C>(&v[0..(v.len() - 1)], &v[1..])
}

/// Logs a hash in lines of 16 bytes.
pub fn log_hash(hash: &[u8]) {
    for line in hash.chunks(16) {
        info!("\t{}", hex::encode(line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
    use ark_ec::AffineRepr;

    #[test]
    fn test_calculate_hash() {
        assert_eq!(
            hex::encode(calculate_hash(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_beacon_randomness_is_domain_separated() {
        let beacon = [7u8; 32];
        assert_eq!(beacon_randomness(b"phase1", &beacon), beacon_randomness(b"phase1", &beacon));
        assert_ne!(beacon_randomness(b"phase1", &beacon), beacon_randomness(b"phase2", &beacon));
    }

    #[test]
    fn test_hash_to_g2_is_deterministic() {
        let a = hash_to_g2::<Bn254>(b"transcript");
        let b = hash_to_g2::<Bn254>(b"transcript");
        let c = hash_to_g2::<Bn254>(b"other transcript");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }

    #[test]
    fn test_same_ratio() {
        let rng = &mut thread_rng();
        let s = Fr::rand(rng);
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        let g1_s = (g1 * s).into_affine();
        let g2_s = (g2 * s).into_affine();

        assert!(same_ratio::<Bn254>(&(g1, g1_s), &(g2, g2_s)));
        assert!(!same_ratio::<Bn254>(&(g1_s, g1), &(g2, g2_s)));
        assert!(check_same_ratio::<Bn254>(&(g1, g1_s), &(g2_s, g2), "flipped").is_err());
    }

    #[test]
    fn test_power_pairs() {
        let rng = &mut thread_rng();
        let x = Fr::rand(rng);
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();

        let mut v = powers(x, 8)
            .into_iter()
            .map(|p| (g1 * p).into_affine())
            .collect::<Vec<_>>();
        let g2_x = (g2 * x).into_affine();

        let pair = power_pairs::<G1Projective>(&v);
        assert!(same_ratio::<Bn254>(&pair, &(g2, g2_x)));

        v[3] = (v[3] * Fr::from(2u64)).into_affine();
        let pair = power_pairs::<G1Projective>(&v);
        assert!(!same_ratio::<Bn254>(&pair, &(g2, g2_x)));
    }

    #[test]
    fn test_batch_mul() {
        let rng = &mut thread_rng();
        let bases = (0..5).map(|_| G2Projective::rand(rng).into_affine()).collect::<Vec<_>>();
        let scalars = (0..5).map(|_| Fr::rand(rng)).collect::<Vec<_>>();
        let expected = bases
            .iter()
            .zip(&scalars)
            .map(|(b, s)| (*b * s).into_affine())
            .collect::<Vec<_>>();
        assert_eq!(batch_mul::<G2Projective>(&bases, &scalars), expected);

        let doubled = batch_mul_by::<G2Projective>(&bases, Fr::from(2u64));
        assert_eq!(doubled[1], (bases[1] + bases[1]).into_affine());
    }
}
