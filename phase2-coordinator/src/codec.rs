//!
//! The wire format of the evaluation set.
//!
//! Fields are written in the order `a`, `b`, `vkk`, `ckk`, `g2_b`,
//! `public_and_commitment_committed`. Every sequence starts with a 4-byte
//! big-endian unsigned length. Nested sequences write the outer length, then
//! each inner sequence with its own length. Points take their fixed-size
//! compressed encoding and integers are 4-byte big-endian signed values.
//! Coordinator and contributor tooling must agree on this layout byte for byte.
//!

use crate::objects::EvaluationSet;

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;
use tracing::trace;

const LENGTH_SIZE: usize = 4;
const INTEGER_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated {field}: {needed} bytes needed at offset {offset}, {remaining} available")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("{field} has {length} elements, more than a 32-bit length prefix can describe")]
    LengthOverflow { field: &'static str, length: usize },

    #[error("element {index} of {field} is not a valid point")]
    InvalidPoint { field: &'static str, index: usize },

    #[error("{0} unexpected bytes after the evaluation set")]
    TrailingBytes(usize),

    #[error("malformed ceremony record: {0}")]
    MalformedRecord(String),
}

/// A curve point with a fixed-size binary encoding.
pub trait PointEncoding: Sized {
    const ENCODED_SIZE: usize;

    /// Appends exactly `ENCODED_SIZE` bytes to `buffer`.
    fn encode_point(&self, buffer: &mut Vec<u8>) -> Result<(), CodecError>;

    /// Decodes a point from exactly `ENCODED_SIZE` bytes, checking that it is valid.
    fn decode_point(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_point_encoding {
    ($point:ty, $size:expr) => {
        impl PointEncoding for $point {
            const ENCODED_SIZE: usize = $size;

            fn encode_point(&self, buffer: &mut Vec<u8>) -> Result<(), CodecError> {
                self.serialize_with_mode(&mut *buffer, Compress::Yes)
                    .map_err(|_| CodecError::InvalidPoint {
                        field: stringify!($point),
                        index: 0,
                    })
            }

            fn decode_point(mut bytes: &[u8]) -> Option<Self> {
                if bytes.len() != Self::ENCODED_SIZE {
                    return None;
                }
                let point = Self::deserialize_with_mode(&mut bytes, Compress::Yes, Validate::Yes).ok()?;
                bytes.is_empty().then_some(point)
            }
        }
    };
}

impl_point_encoding!(ark_bn254::g1::G1Affine, 32);
impl_point_encoding!(ark_bn254::g2::G2Affine, 64);

/// Encodes an evaluation set.
pub fn encode<G1: PointEncoding, G2: PointEncoding>(set: &EvaluationSet<G1, G2>) -> Result<Vec<u8>, CodecError> {
    let mut encoder = Encoder::default();
    encoder.points("a", &set.a)?;
    encoder.points("b", &set.b)?;
    encoder.points("vkk", &set.vkk)?;
    encoder.nested("ckk", &set.ckk, |encoder, inner| encoder.points("ckk", inner))?;
    encoder.points("g2_b", &set.g2_b)?;
    encoder.nested(
        "public_and_commitment_committed",
        &set.public_and_commitment_committed,
        |encoder, inner| encoder.integers("public_and_commitment_committed", inner),
    )?;
    trace!("Encoded the evaluation set into {} bytes", encoder.buffer.len());
    Ok(encoder.buffer)
}

/// Decodes an evaluation set, rejecting short input and trailing bytes.
pub fn decode<G1: PointEncoding, G2: PointEncoding>(bytes: &[u8]) -> Result<EvaluationSet<G1, G2>, CodecError> {
    let mut decoder = Decoder { bytes, offset: 0 };
    let a = decoder.points("a")?;
    let b = decoder.points("b")?;
    let vkk = decoder.points("vkk")?;
    let ckk = decoder.nested("ckk", |decoder| decoder.points("ckk"))?;
    let g2_b = decoder.points("g2_b")?;
    let public_and_commitment_committed = decoder.nested("public_and_commitment_committed", |decoder| {
        decoder.integers("public_and_commitment_committed")
    })?;
    decoder.finish()?;

    Ok(EvaluationSet {
        a,
        b,
        vkk,
        ckk,
        g2_b,
        public_and_commitment_committed,
    })
}

#[derive(Default)]
struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    fn length(&mut self, field: &'static str, length: usize) -> Result<(), CodecError> {
        let length = u32::try_from(length).map_err(|_| CodecError::LengthOverflow { field, length })?;
        let mut word = [0u8; LENGTH_SIZE];
        BigEndian::write_u32(&mut word, length);
        self.buffer.extend_from_slice(&word);
        Ok(())
    }

    fn points<P: PointEncoding>(&mut self, field: &'static str, points: &[P]) -> Result<(), CodecError> {
        self.length(field, points.len())?;
        self.buffer.reserve(points.len() * P::ENCODED_SIZE);
        for (index, point) in points.iter().enumerate() {
            point
                .encode_point(&mut self.buffer)
                .map_err(|_| CodecError::InvalidPoint { field, index })?;
        }
        Ok(())
    }

    fn integers(&mut self, field: &'static str, integers: &[i32]) -> Result<(), CodecError> {
        self.length(field, integers.len())?;
        for integer in integers {
            let mut word = [0u8; INTEGER_SIZE];
            BigEndian::write_i32(&mut word, *integer);
            self.buffer.extend_from_slice(&word);
        }
        Ok(())
    }

    fn nested<T>(
        &mut self,
        field: &'static str,
        outer: &[Vec<T>],
        mut encode_inner: impl FnMut(&mut Self, &[T]) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        self.length(field, outer.len())?;
        for inner in outer {
            encode_inner(self, inner)?;
        }
        Ok(())
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Consumes exactly `needed` bytes, or none if fewer are available.
    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], CodecError> {
        if needed > self.remaining() {
            return Err(CodecError::Truncated {
                field,
                offset: self.offset,
                needed,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(bytes)
    }

    fn length(&mut self, field: &'static str) -> Result<usize, CodecError> {
        let length = BigEndian::read_u32(self.take(field, LENGTH_SIZE)?);
        Ok(length as usize)
    }

    /// Reads `length` elements of `size` bytes in one bounds check.
    fn elements(&mut self, field: &'static str, length: usize, size: usize) -> Result<&'a [u8], CodecError> {
        let needed = length.checked_mul(size).ok_or(CodecError::Truncated {
            field,
            offset: self.offset,
            needed: usize::MAX,
            remaining: self.remaining(),
        })?;
        self.take(field, needed)
    }

    fn points<P: PointEncoding>(&mut self, field: &'static str) -> Result<Vec<P>, CodecError> {
        let length = self.length(field)?;
        let bytes = self.elements(field, length, P::ENCODED_SIZE)?;
        bytes
            .chunks_exact(P::ENCODED_SIZE)
            .enumerate()
            .map(|(index, chunk)| P::decode_point(chunk).ok_or(CodecError::InvalidPoint { field, index }))
            .collect()
    }

    fn integers(&mut self, field: &'static str) -> Result<Vec<i32>, CodecError> {
        let length = self.length(field)?;
        let bytes = self.elements(field, length, INTEGER_SIZE)?;
        Ok(bytes.chunks_exact(INTEGER_SIZE).map(BigEndian::read_i32).collect())
    }

    fn nested<T>(
        &mut self,
        field: &'static str,
        mut decode_inner: impl FnMut(&mut Self) -> Result<Vec<T>, CodecError>,
    ) -> Result<Vec<Vec<T>>, CodecError> {
        let length = self.length(field)?;
        // Every inner sequence takes at least its length prefix.
        let mut outer = Vec::with_capacity(length.min(self.remaining() / LENGTH_SIZE));
        for _ in 0..length {
            outer.push(decode_inner(self)?);
        }
        Ok(outer)
    }

    fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            trailing => Err(CodecError::TrailingBytes(trailing)),
        }
    }
}
