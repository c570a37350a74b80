use crate::Phase1;
use setup_utils::{batch_mul, batch_mul_by, beacon_randomness, derive_rng_from_seed, powers, Error};

use ark_ec::pairing::Pairing;
use ark_ff::Zero;
use ark_std::UniformRand;
use rand::Rng;
use tracing::{debug, info, info_span};

/// Domain separator for the beacon value that seals a phase 1 transcript.
pub const PHASE1_SEAL_DOMAIN: &[u8] = b"phase1-seal";

/// The trapdoors a participant folds into the transcript.
/// Must be dropped right after use.
pub struct PrivateKey<E: Pairing> {
    pub tau: E::ScalarField,
    pub alpha: E::ScalarField,
    pub beta: E::ScalarField,
}

impl<E: Pairing> PrivateKey<E> {
    /// Samples non-zero trapdoors from the given RNG.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut sample = || loop {
            let value = E::ScalarField::rand(rng);
            if !value.is_zero() {
                break value;
            }
        };
        Self {
            tau: sample(),
            alpha: sample(),
            beta: sample(),
        }
    }
}

impl<E: Pairing> Phase1<E> {
    /// Multiplies every power in the transcript by the corresponding power of the private key.
    pub fn transform(&mut self, key: &PrivateKey<E>) {
        let span = info_span!("phase1-transform", degree = self.degree());
        let _enter = span.enter();

        let degree = self.degree();
        let taus = powers(key.tau, 2 * degree - 1);
        let alpha_taus = taus[..degree].iter().map(|tau| *tau * key.alpha).collect::<Vec<_>>();
        let beta_taus = taus[..degree].iter().map(|tau| *tau * key.beta).collect::<Vec<_>>();

        self.tau_powers_g1 = batch_mul::<E::G1>(&self.tau_powers_g1, &taus);
        self.tau_powers_g2 = batch_mul::<E::G2>(&self.tau_powers_g2, &taus[..degree]);
        self.alpha_tau_powers_g1 = batch_mul::<E::G1>(&self.alpha_tau_powers_g1, &alpha_taus);
        self.beta_tau_powers_g1 = batch_mul::<E::G1>(&self.beta_tau_powers_g1, &beta_taus);
        self.beta_g2 = batch_mul_by::<E::G2>(&[self.beta_g2], key.beta)[0];

        debug!("transformed the transcript");
    }

    /// Verifies the transcript and applies a final transformation whose
    /// trapdoors are derived from a public beacon value, so that nobody could
    /// have chosen the resulting parameters in advance.
    pub fn seal(mut self, beacon: &[u8]) -> Result<Self, Error> {
        self.verify_structure()?;

        let mut rng = derive_rng_from_seed(&beacon_randomness(PHASE1_SEAL_DOMAIN, beacon));
        let key = PrivateKey::<E>::random(&mut rng);
        self.transform(&key);

        info!("sealed the phase 1 transcript with the beacon value");
        Ok(self)
    }
}
