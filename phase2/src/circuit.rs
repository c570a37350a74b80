use setup_utils::{calculate_hash, ElementType, Error, HASH_SIZE};

use ark_ff::PrimeField;
use ark_poly::{EvaluationDomain, GeneralEvaluationDomain};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, OptimizationGoal, SynthesisMode};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use tracing::debug;

/// A sparse matrix row: `(coefficient, variable index)` pairs.
pub type Row<F> = Vec<(F, usize)>;

/// The rank-1 constraint system of a circuit, as seen by the ceremony.
///
/// Variables are indexed the way the Groth16 prover indexes them:
/// the instance variables first (index 0 is the constant one), then the witness variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit<F: PrimeField> {
    pub num_instance_variables: usize,
    pub num_witness_variables: usize,
    pub a: Vec<Row<F>>,
    pub b: Vec<Row<F>>,
    pub c: Vec<Row<F>>,
}

impl<F: PrimeField> Circuit<F> {
    /// Synthesizes the circuit in setup mode and extracts its constraint matrices.
    pub fn from_synthesizer<C: ConstraintSynthesizer<F>>(circuit: C) -> Result<Self, Error> {
        let cs = ConstraintSystem::<F>::new_ref();
        cs.set_optimization_goal(OptimizationGoal::Constraints);
        cs.set_mode(SynthesisMode::Setup);
        circuit
            .generate_constraints(cs.clone())
            .map_err(|error| Error::Synthesis(error.to_string()))?;
        cs.finalize();

        let matrices = cs
            .to_matrices()
            .ok_or_else(|| Error::Synthesis("constraint matrices are unavailable".to_string()))?;
        debug!(
            "synthesized {} constraints over {} instance and {} witness variables",
            matrices.num_constraints, matrices.num_instance_variables, matrices.num_witness_variables
        );

        Ok(Self {
            num_instance_variables: matrices.num_instance_variables,
            num_witness_variables: matrices.num_witness_variables,
            a: matrices.a,
            b: matrices.b,
            c: matrices.c,
        })
    }

    #[inline]
    pub fn num_constraints(&self) -> usize {
        self.a.len()
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.num_instance_variables + self.num_witness_variables
    }

    /// Returns the evaluation domain of the QAP. Each instance variable gets
    /// an extra row after the constraints, so the size is `constraints + instances`
    /// rounded up to the next power of two.
    pub fn domain(&self) -> Result<GeneralEvaluationDomain<F>, Error> {
        GeneralEvaluationDomain::<F>::new(self.num_constraints() + self.num_instance_variables)
            .ok_or_else(|| Error::InvalidCircuit("the circuit is too large for the scalar field".to_string()))
    }

    /// Transposes the matrices into one column per variable, each entry `(coefficient, row)`.
    ///
    /// The column of instance variable `i` in `A` carries an extra `(1, constraints + i)`
    /// entry, which makes the instance polynomials linearly independent.
    #[allow(clippy::type_complexity)]
    pub fn columns(&self) -> (Vec<Row<F>>, Vec<Row<F>>, Vec<Row<F>>) {
        let transpose = |matrix: &[Row<F>]| {
            let mut columns = vec![vec![]; self.num_variables()];
            for (row, terms) in matrix.iter().enumerate() {
                for (coefficient, variable) in terms {
                    columns[*variable].push((*coefficient, row));
                }
            }
            columns
        };

        let mut at = transpose(&self.a);
        for (i, column) in at.iter_mut().enumerate().take(self.num_instance_variables) {
            column.push((F::one(), self.num_constraints() + i));
        }
        (at, transpose(&self.b), transpose(&self.c))
    }

    /// Serializes the circuit description.
    ///
    /// Layout: instance count, witness count and constraint count as big-endian `u32`,
    /// then the rows of `A`, `B` and `C`, each a `u32` term count followed by
    /// `(u32 variable index, compressed field element)` terms.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        let to_u32 = |value: usize| {
            u32::try_from(value).map_err(|_| Error::InvalidLength {
                element: ElementType::Circuit,
                expected: u32::MAX as usize,
                got: value,
            })
        };

        writer.write_u32::<BigEndian>(to_u32(self.num_instance_variables)?)?;
        writer.write_u32::<BigEndian>(to_u32(self.num_witness_variables)?)?;
        writer.write_u32::<BigEndian>(to_u32(self.num_constraints())?)?;
        for matrix in [&self.a, &self.b, &self.c] {
            for row in matrix.iter() {
                writer.write_u32::<BigEndian>(to_u32(row.len())?)?;
                for (coefficient, variable) in row {
                    writer.write_u32::<BigEndian>(to_u32(*variable)?)?;
                    coefficient.serialize_with_mode(&mut writer, Compress::Yes)?;
                }
            }
        }
        Ok(())
    }

    /// Deserializes a circuit description and checks every variable index.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, Error> {
        let num_instance_variables = reader.read_u32::<BigEndian>()? as usize;
        let num_witness_variables = reader.read_u32::<BigEndian>()? as usize;
        let num_constraints = reader.read_u32::<BigEndian>()? as usize;
        if num_instance_variables == 0 {
            return Err(Error::InvalidCircuit("the constant variable is missing".to_string()));
        }
        let num_variables = num_instance_variables
            .checked_add(num_witness_variables)
            .ok_or_else(|| Error::InvalidCircuit("too many variables".to_string()))?;

        let read_matrix = |reader: &mut R| -> Result<Vec<Row<F>>, Error> {
            let mut matrix = Vec::with_capacity(num_constraints.min(1 << 16));
            for _ in 0..num_constraints {
                let terms = reader.read_u32::<BigEndian>()? as usize;
                // Counts come from the input, so they only bound the allocation loosely.
                let mut row = Vec::with_capacity(terms.min(num_variables).min(1 << 12));
                for _ in 0..terms {
                    let variable = reader.read_u32::<BigEndian>()? as usize;
                    if variable >= num_variables {
                        return Err(Error::InvalidCircuit(format!(
                            "variable {} is out of range ({} variables)",
                            variable, num_variables
                        )));
                    }
                    let coefficient = F::deserialize_with_mode(&mut *reader, Compress::Yes, Validate::Yes)?;
                    row.push((coefficient, variable));
                }
                matrix.push(row);
            }
            Ok(matrix)
        };

        let a = read_matrix(&mut reader)?;
        let b = read_matrix(&mut reader)?;
        let c = read_matrix(&mut reader)?;

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(Error::InvalidCircuit("unexpected trailing bytes".to_string()));
        }

        Ok(Self {
            num_instance_variables,
            num_witness_variables,
            a,
            b,
            c,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = vec![];
        self.write(&mut buffer)?;
        Ok(buffer)
    }

    /// Returns the hash of the serialized circuit.
    pub fn hash(&self) -> Result<[u8; HASH_SIZE], Error> {
        Ok(calculate_hash(&self.to_bytes()?))
    }
}
