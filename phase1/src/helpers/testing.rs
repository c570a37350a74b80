use crate::{Phase1, PrivateKey};

use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_std::UniformRand;
use rand::Rng;

/// Returns a random affine curve point from the provided RNG.
pub fn random_point<C: AffineRepr>(rng: &mut impl Rng) -> C {
    C::Group::rand(rng).into_affine()
}

/// Returns a random affine curve point vector from the provided RNG.
pub fn random_point_vec<C: AffineRepr>(size: usize, rng: &mut impl Rng) -> Vec<C> {
    (0..size).map(|_| random_point(rng)).collect()
}

/// Returns a transcript of size `2^power` with one random contribution.
/// The trapdoors are dropped on return, but the RNG decides them, so
/// this is only suitable for development ceremonies and tests.
pub fn generate_transcript<E: Pairing>(power: usize, rng: &mut impl Rng) -> Phase1<E> {
    let mut transcript = Phase1::<E>::initialize(power);
    let key = PrivateKey::<E>::random(rng);
    transcript.transform(&key);
    transcript
}
