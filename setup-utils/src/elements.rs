use crate::Error;

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use std::{
    fmt,
    io::{Read, Write},
};

/// Determines if point compression should be used.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UseCompression {
    Yes,
    No,
}

impl fmt::Display for UseCompression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            UseCompression::Yes => write!(f, "Yes"),
            UseCompression::No => write!(f, "No"),
        }
    }
}

impl From<UseCompression> for Compress {
    fn from(compression: UseCompression) -> Self {
        match compression {
            UseCompression::Yes => Compress::Yes,
            UseCompression::No => Compress::No,
        }
    }
}

/// Determines if points should be checked to be on the curve and in the prime order subgroup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CheckForCorrectness {
    Full,
    No,
}

impl fmt::Display for CheckForCorrectness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CheckForCorrectness::Full => write!(f, "Full"),
            CheckForCorrectness::No => write!(f, "No"),
        }
    }
}

impl From<CheckForCorrectness> for Validate {
    fn from(check: CheckForCorrectness) -> Self {
        match check {
            CheckForCorrectness::Full => Validate::Yes,
            CheckForCorrectness::No => Validate::No,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    TauG1,
    TauG2,
    AlphaG1,
    BetaG1,
    BetaG2,
    DeltaG1,
    DeltaG2,
    HQuery,
    LQuery,
    PublicKey,
    Circuit,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ElementType::TauG1 => write!(f, "TauG1"),
            ElementType::TauG2 => write!(f, "TauG2"),
            ElementType::AlphaG1 => write!(f, "AlphaG1"),
            ElementType::BetaG1 => write!(f, "BetaG1"),
            ElementType::BetaG2 => write!(f, "BetaG2"),
            ElementType::DeltaG1 => write!(f, "DeltaG1"),
            ElementType::DeltaG2 => write!(f, "DeltaG2"),
            ElementType::HQuery => write!(f, "HQuery"),
            ElementType::LQuery => write!(f, "LQuery"),
            ElementType::PublicKey => write!(f, "PublicKey"),
            ElementType::Circuit => write!(f, "Circuit"),
        }
    }
}

/// Writes a big-endian `u32` length followed by each element.
pub fn write_vec<T: CanonicalSerialize, W: Write>(
    mut writer: W,
    elements: &[T],
    element_type: ElementType,
    compressed: UseCompression,
) -> Result<(), Error> {
    let length = u32::try_from(elements.len()).map_err(|_| Error::InvalidLength {
        element: element_type,
        expected: u32::MAX as usize,
        got: elements.len(),
    })?;
    writer.write_all(&length.to_be_bytes())?;
    for element in elements {
        element.serialize_with_mode(&mut writer, compressed.into())?;
    }
    Ok(())
}

/// Reads a vector written by [`write_vec`].
///
/// The declared length only bounds the number of reads, it never drives an allocation,
/// so a corrupted prefix fails with an IO error instead of exhausting memory.
pub fn read_vec<T: CanonicalDeserialize, R: Read>(
    mut reader: R,
    compressed: UseCompression,
    check_for_correctness: CheckForCorrectness,
) -> Result<Vec<T>, Error> {
    let mut length = [0u8; 4];
    reader.read_exact(&mut length)?;
    let length = u32::from_be_bytes(length) as usize;

    let mut elements = Vec::with_capacity(length.min(1 << 12));
    for _ in 0..length {
        elements.push(T::deserialize_with_mode(
            &mut reader,
            compressed.into(),
            check_for_correctness.into(),
        )?);
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::G1Affine;
    use ark_ec::AffineRepr;

    #[test]
    fn test_read_vec_rejects_short_input() {
        let elements = vec![G1Affine::generator(); 3];
        let mut buffer = vec![];
        write_vec(&mut buffer, &elements, ElementType::TauG1, UseCompression::Yes).unwrap();

        let decoded: Vec<G1Affine> =
            read_vec(&buffer[..], UseCompression::Yes, CheckForCorrectness::Full).unwrap();
        assert_eq!(decoded, elements);

        buffer.truncate(buffer.len() - 1);
        assert!(read_vec::<G1Affine, _>(&buffer[..], UseCompression::Yes, CheckForCorrectness::Full).is_err());
    }

    #[test]
    fn test_read_vec_huge_length_prefix() {
        let buffer = u32::MAX.to_be_bytes();
        assert!(read_vec::<G1Affine, _>(&buffer[..], UseCompression::Yes, CheckForCorrectness::Full).is_err());
    }
}
