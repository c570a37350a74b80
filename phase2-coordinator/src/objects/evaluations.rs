/// The auxiliary queries computed once at initialization and consumed unmodified by finalization.
///
/// Every sequence, inner sequences included, carries its own length on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationSet<G1, G2> {
    /// A_i(tau) in G1 for every variable
    pub a: Vec<G1>,
    /// B_i(tau) in G1 for every variable
    pub b: Vec<G1>,
    /// beta * A_i(tau) + alpha * B_i(tau) + C_i(tau) for every public input
    pub vkk: Vec<G1>,
    /// commitment keys, one sequence per commitment
    pub ckk: Vec<Vec<G1>>,
    /// B_i(tau) in G2 for every variable
    pub g2_b: Vec<G2>,
    /// the public and committed wire indices of every commitment
    pub public_and_commitment_committed: Vec<Vec<i32>>,
}

impl<G1, G2> Default for EvaluationSet<G1, G2> {
    fn default() -> Self {
        Self {
            a: vec![],
            b: vec![],
            vkk: vec![],
            ckk: vec![],
            g2_b: vec![],
            public_and_commitment_committed: vec![],
        }
    }
}

impl<G1, G2> EvaluationSet<G1, G2> {
    /// Returns `true` if the set carries commitment data.
    pub fn has_commitments(&self) -> bool {
        !self.ckk.is_empty() || !self.public_and_commitment_committed.is_empty()
    }
}
