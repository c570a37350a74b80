use setup_utils::{calculate_hash_of_parts, hash_to_g2, Error, HASH_SIZE};

use ark_ec::pairing::Pairing;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use std::io::{Read, Write};

/// This needs to be destroyed by at least one participant
/// for the final parameters to be secure.
pub struct PrivateKey<E: Pairing> {
    pub delta: E::ScalarField,
}

/// This allows others to verify that you contributed. The hash produced
/// by `MPCParameters::contribute` is just a hash of these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey<E: Pairing> {
    /// This is the delta (in G1) after the transformation, kept so that we
    /// can check correctness of the public keys without having the entire
    /// interstitial parameters for each contribution.
    pub delta_after: E::G1Affine,

    /// Random element chosen by the contributor.
    pub s: E::G1Affine,

    /// That element, taken to the contributor's secret delta.
    pub s_delta: E::G1Affine,

    /// r is H(last_pubkey | s | s_delta), r_delta proves knowledge of delta
    pub r_delta: E::G2Affine,

    /// Hash of the parameters this contribution was applied to.
    pub transcript: [u8; HASH_SIZE],
}

impl<E: Pairing> PublicKey<E> {
    /// Returns the point `r` that `r_delta` is a multiple of.
    pub fn r(&self) -> Result<E::G2Affine, Error> {
        Self::hash_to_r(&self.s, &self.s_delta, &self.transcript)
    }

    pub(crate) fn hash_to_r(
        s: &E::G1Affine,
        s_delta: &E::G1Affine,
        transcript: &[u8; HASH_SIZE],
    ) -> Result<E::G2Affine, Error> {
        let mut s_bytes = vec![];
        s.serialize_compressed(&mut s_bytes)?;
        let mut s_delta_bytes = vec![];
        s_delta.serialize_compressed(&mut s_delta_bytes)?;
        let digest = calculate_hash_of_parts(&[&s_bytes, &s_delta_bytes, transcript]);
        Ok(hash_to_g2::<E>(&digest))
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        self.delta_after.serialize_compressed(&mut writer)?;
        self.s.serialize_compressed(&mut writer)?;
        self.s_delta.serialize_compressed(&mut writer)?;
        self.r_delta.serialize_compressed(&mut writer)?;
        writer.write_all(&self.transcript)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, Error> {
        let point = |reader: &mut R| E::G1Affine::deserialize_with_mode(reader, Compress::Yes, Validate::Yes);
        let delta_after = point(&mut reader)?;
        let s = point(&mut reader)?;
        let s_delta = point(&mut reader)?;
        let r_delta = E::G2Affine::deserialize_with_mode(&mut reader, Compress::Yes, Validate::Yes)?;
        let mut transcript = [0u8; HASH_SIZE];
        reader.read_exact(&mut transcript)?;

        Ok(Self {
            delta_after,
            s,
            s_delta,
            r_delta,
            transcript,
        })
    }
}
