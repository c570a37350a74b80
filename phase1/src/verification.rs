use crate::Phase1;
use setup_utils::{check_same_ratio, power_pairs, ElementType, Error, VerificationError};

use ark_ec::{pairing::Pairing, AffineRepr};
use tracing::{debug, info_span, trace};

impl<E: Pairing> Phase1<E> {
    /// Checks that the transcript is a well-formed set of powers of a single `tau`,
    /// scaled by a single `alpha` and `beta` where applicable.
    ///
    /// The check uses random linear combinations, so each ratio costs two
    /// multi-scalar multiplications and two pairings regardless of the degree.
    pub fn verify_structure(&self) -> Result<(), Error> {
        let span = info_span!("phase1-verification", degree = self.degree());
        let _enter = span.enter();

        self.check_lengths()?;

        let g1 = E::G1Affine::generator();
        let g2 = E::G2Affine::generator();
        if self.tau_powers_g1[0] != g1 {
            return Err(VerificationError::InvalidGenerator(ElementType::TauG1).into());
        }
        if self.tau_powers_g2[0] != g2 {
            return Err(VerificationError::InvalidGenerator(ElementType::TauG2).into());
        }

        let non_zero = [
            (ElementType::TauG1, self.tau_powers_g1[1].is_zero()),
            (ElementType::TauG2, self.tau_powers_g2[1].is_zero()),
            (ElementType::AlphaG1, self.alpha_tau_powers_g1[0].is_zero()),
            (ElementType::BetaG1, self.beta_tau_powers_g1[0].is_zero()),
            (ElementType::BetaG2, self.beta_g2.is_zero()),
        ];
        for (element, is_zero) in non_zero {
            if is_zero {
                return Err(Error::PointAtInfinity(element));
            }
        }

        let tau_g2 = (g2, self.tau_powers_g2[1]);

        check_same_ratio::<E>(
            &power_pairs::<E::G1>(&self.tau_powers_g1),
            &tau_g2,
            "G1 powers of tau",
        )?;
        trace!("tau powers in G1 are consistent");

        check_same_ratio::<E>(
            &(g1, self.tau_powers_g1[1]),
            &power_pairs::<E::G2>(&self.tau_powers_g2),
            "G2 powers of tau",
        )?;
        trace!("tau powers in G2 are consistent");

        check_same_ratio::<E>(
            &power_pairs::<E::G1>(&self.alpha_tau_powers_g1),
            &tau_g2,
            "G1 alpha powers of tau",
        )?;
        check_same_ratio::<E>(
            &power_pairs::<E::G1>(&self.beta_tau_powers_g1),
            &tau_g2,
            "G1 beta powers of tau",
        )?;
        trace!("alpha and beta powers in G1 are consistent");

        check_same_ratio::<E>(
            &(g1, self.beta_tau_powers_g1[0]),
            &(g2, self.beta_g2),
            "beta in G1 and G2",
        )?;

        debug!("phase 1 transcript is well formed");
        Ok(())
    }
}
