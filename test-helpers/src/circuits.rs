use ark_ff::PrimeField;
use ark_relations::{
    lc,
    r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError, Variable},
};

/// Proves knowledge of `x` such that `x^3 + x + 5 = y` for a public `y`.
/// The witness is `None` when the circuit is only synthesized for its shape.
#[derive(Clone, Debug)]
pub struct TestCircuit<F: PrimeField>(pub Option<F>);

impl<F: PrimeField> TestCircuit<F> {
    /// Returns the public input `x^3 + x + 5` matching the witness `x`.
    pub fn public_input(x: F) -> F {
        x * x * x + x + F::from(5u64)
    }
}

impl<F: PrimeField> ConstraintSynthesizer<F> for TestCircuit<F> {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let x_value = self.0;
        let square_value = x_value.map(|x| x * x);
        let cube_value = x_value.map(|x| x * x * x);
        let y_value = x_value.map(Self::public_input);

        let x = cs.new_witness_variable(|| x_value.ok_or(SynthesisError::AssignmentMissing))?;
        let square = cs.new_witness_variable(|| square_value.ok_or(SynthesisError::AssignmentMissing))?;
        let cube = cs.new_witness_variable(|| cube_value.ok_or(SynthesisError::AssignmentMissing))?;
        let y = cs.new_input_variable(|| y_value.ok_or(SynthesisError::AssignmentMissing))?;

        cs.enforce_constraint(lc!() + x, lc!() + x, lc!() + square)?;
        cs.enforce_constraint(lc!() + square, lc!() + x, lc!() + cube)?;
        cs.enforce_constraint(
            lc!() + cube + x + (F::from(5u64), Variable::One),
            lc!() + Variable::One,
            lc!() + y,
        )?;
        Ok(())
    }
}
