//! The universal ("powers of tau") transcript consumed by the phase 2 ceremony.

pub mod helpers;

mod computation;
pub use computation::*;

pub mod ptau;

mod verification;

use setup_utils::{read_vec, write_vec, CheckForCorrectness, ElementType, Error, UseCompression};

use ark_ec::{pairing::Pairing, AffineRepr};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use std::io::{Read, Write};
use tracing::debug;

/// A universal transcript over the trapdoors `tau`, `alpha` and `beta`:
///
/// * (1, τ, τ<sup>2</sup>, ..., τ<sup>2n - 2</sup>, α, ατ, ..., ατ<sup>n - 1</sup>, β, βτ, ..., βτ<sup>n - 1</sup>)<sub>1</sub>
/// * (1, τ, τ<sup>2</sup>, ..., τ<sup>n - 1</sup>, β)<sub>2</sub>
///
/// where `n = 2^power`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase1<E: Pairing> {
    /// tau^0, tau^1, tau^2, ..., tau^{2n - 2}
    pub tau_powers_g1: Vec<E::G1Affine>,
    /// tau^0, tau^1, tau^2, ..., tau^{n - 1}
    pub tau_powers_g2: Vec<E::G2Affine>,
    /// alpha * tau^0, alpha * tau^1, alpha * tau^2, ..., alpha * tau^{n - 1}
    pub alpha_tau_powers_g1: Vec<E::G1Affine>,
    /// beta * tau^0, beta * tau^1, beta * tau^2, ..., beta * tau^{n - 1}
    pub beta_tau_powers_g1: Vec<E::G1Affine>,
    /// beta
    pub beta_g2: E::G2Affine,
}

impl<E: Pairing> Phase1<E> {
    /// Returns a transcript of size `2^power` where every trapdoor is one.
    pub fn initialize(power: usize) -> Self {
        let degree = 1 << power;
        debug!("Initializing a phase 1 transcript of degree {}", degree);

        Self {
            tau_powers_g1: vec![E::G1Affine::generator(); 2 * degree - 1],
            tau_powers_g2: vec![E::G2Affine::generator(); degree],
            alpha_tau_powers_g1: vec![E::G1Affine::generator(); degree],
            beta_tau_powers_g1: vec![E::G1Affine::generator(); degree],
            beta_g2: E::G2Affine::generator(),
        }
    }

    /// Returns the number of powers of tau in G2, `n = 2^power`.
    #[inline]
    pub fn degree(&self) -> usize {
        self.tau_powers_g2.len()
    }

    /// Returns `log2(n)`, or `None` if the degree is not a power of two.
    pub fn power(&self) -> Option<usize> {
        let degree = self.degree();
        match degree.is_power_of_two() {
            true => Some(degree.trailing_zeros() as usize),
            false => None,
        }
    }

    /// Checks that every vector has the length implied by the degree.
    pub fn check_lengths(&self) -> Result<(), Error> {
        let degree = self.degree();
        if degree < 2 || !degree.is_power_of_two() {
            return Err(Error::InvalidLength {
                element: ElementType::TauG2,
                expected: degree.next_power_of_two().max(2),
                got: degree,
            });
        }

        let expected = [
            (ElementType::TauG1, 2 * degree - 1, self.tau_powers_g1.len()),
            (ElementType::AlphaG1, degree, self.alpha_tau_powers_g1.len()),
            (ElementType::BetaG1, degree, self.beta_tau_powers_g1.len()),
        ];
        for (element, expected, got) in expected {
            if expected != got {
                return Err(Error::InvalidLength { element, expected, got });
            }
        }
        Ok(())
    }

    /// Serializes the transcript.
    pub fn write<W: Write>(&self, mut writer: W, compressed: UseCompression) -> Result<(), Error> {
        write_vec(&mut writer, &self.tau_powers_g1, ElementType::TauG1, compressed)?;
        write_vec(&mut writer, &self.tau_powers_g2, ElementType::TauG2, compressed)?;
        write_vec(&mut writer, &self.alpha_tau_powers_g1, ElementType::AlphaG1, compressed)?;
        write_vec(&mut writer, &self.beta_tau_powers_g1, ElementType::BetaG1, compressed)?;
        self.beta_g2.serialize_with_mode(&mut writer, compressed.into())?;
        Ok(())
    }

    /// Deserializes a transcript and checks the vector lengths.
    /// Structural correctness is checked separately by [`Phase1::verify_structure`].
    pub fn read<R: Read>(
        mut reader: R,
        compressed: UseCompression,
        check_input_for_correctness: CheckForCorrectness,
    ) -> Result<Self, Error> {
        let tau_powers_g1 = read_vec(&mut reader, compressed, check_input_for_correctness)?;
        let tau_powers_g2 = read_vec(&mut reader, compressed, check_input_for_correctness)?;
        let alpha_tau_powers_g1 = read_vec(&mut reader, compressed, check_input_for_correctness)?;
        let beta_tau_powers_g1 = read_vec(&mut reader, compressed, check_input_for_correctness)?;
        let beta_g2 = E::G2Affine::deserialize_with_mode(
            &mut reader,
            compressed.into(),
            check_input_for_correctness.into(),
        )?;

        let transcript = Self {
            tau_powers_g1,
            tau_powers_g2,
            alpha_tau_powers_g1,
            beta_tau_powers_g1,
            beta_g2,
        };
        transcript.check_lengths()?;
        Ok(transcript)
    }

    /// Serializes the transcript into a new buffer.
    pub fn to_bytes(&self, compressed: UseCompression) -> Result<Vec<u8>, Error> {
        let mut buffer = vec![];
        self.write(&mut buffer, compressed)?;
        Ok(buffer)
    }
}
