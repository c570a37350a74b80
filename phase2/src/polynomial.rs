use crate::circuit::Row;

use ark_ec::{pairing::Pairing, CurveGroup};
use ark_ff::Zero;
use rayon::prelude::*;

/// Evaluates and returns the provided QAP Polynomial vectors at the provided coefficients.
/// Format: [a_g1, b_g1, b_g2, gamma_abc_g1, l_g1]
/// The returned points are _affine_
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
pub fn eval<E: Pairing>(
    // Lagrange coefficients for tau
    coeffs_g1: &[E::G1Affine],
    coeffs_g2: &[E::G2Affine],
    alpha_coeffs_g1: &[E::G1Affine],
    beta_coeffs_g1: &[E::G1Affine],
    // QAP polynomials, one column per variable
    at: &[Row<E::ScalarField>],
    bt: &[Row<E::ScalarField>],
    ct: &[Row<E::ScalarField>],
    // The number of inputs
    num_inputs: usize,
) -> (
    Vec<E::G1Affine>,
    Vec<E::G1Affine>,
    Vec<E::G2Affine>,
    Vec<E::G1Affine>,
    Vec<E::G1Affine>,
) {
    // calculate the evaluated polynomials
    let a_g1 = dot_product_vec::<E::G1>(at, coeffs_g1);
    let b_g1 = dot_product_vec::<E::G1>(bt, coeffs_g1);
    let b_g2 = dot_product_vec::<E::G2>(bt, coeffs_g2);
    let ext = dot_product_ext::<E>((at, beta_coeffs_g1), (bt, alpha_coeffs_g1), (ct, coeffs_g1));

    // break to `gamma_abc_g1` and `l` coeffs
    let (gamma_abc_g1, l) = ext.split_at(num_inputs);

    (a_g1, b_g1, b_g2, gamma_abc_g1.to_vec(), l.to_vec())
}

/// Returns `beta * A_i(tau) + alpha * B_i(tau) + C_i(tau)` for every variable `i`.
#[allow(clippy::type_complexity)]
fn dot_product_ext<E: Pairing>(
    (at, beta_coeffs_g1): (&[Row<E::ScalarField>], &[E::G1Affine]),
    (bt, alpha_coeffs_g1): (&[Row<E::ScalarField>], &[E::G1Affine]),
    (ct, coeffs_g1): (&[Row<E::ScalarField>], &[E::G1Affine]),
) -> Vec<E::G1Affine> {
    let ret = at
        .par_iter()
        .zip(bt.par_iter().zip(ct))
        .map(|(at, (bt, ct))| {
            dot_product::<E::G1>(at, beta_coeffs_g1)
                + dot_product::<E::G1>(bt, alpha_coeffs_g1)
                + dot_product::<E::G1>(ct, coeffs_g1)
        })
        .collect::<Vec<_>>();
    E::G1::normalize_batch(&ret)
}

/// Returns a batch normalized vector where the coefficients
/// have been applied to the input
/// This is a NxN * Nx1 -> Nx1 matrix multiplication basically
fn dot_product_vec<C: CurveGroup>(input: &[Row<C::ScalarField>], coeffs: &[C::Affine]) -> Vec<C::Affine> {
    let ret = input
        .par_iter()
        .map(|row| dot_product::<C>(row, coeffs))
        .collect::<Vec<_>>();
    C::normalize_batch(&ret)
}

/// Executes a dot product between two vectors (1xN * Nx1)
/// where each input entry selects the coefficient at its index.
fn dot_product<C: CurveGroup>(input: &[(C::ScalarField, usize)], coeffs: &[C::Affine]) -> C {
    if input.is_empty() {
        return C::zero();
    }
    let (scalars, bases): (Vec<_>, Vec<_>) = input.iter().map(|(coeff, index)| (*coeff, coeffs[*index])).unzip();
    C::msm_unchecked(&bases, &scalars)
}
