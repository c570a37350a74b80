//! Import of snarkjs `.ptau` transcripts over BN254.
//!
//! The file is a sequence of sections, each `(type: u32, size: u64, data)`, after a
//! `"ptau"` magic, a version and a section count, all little-endian. Field elements
//! are stored little-endian in Montgomery form, points as `(x, y)` with the point at
//! infinity encoded as all zeroes.

use crate::Phase1;

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, Field, PrimeField, Zero};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{collections::BTreeMap, io::Write};
use thiserror::Error;
use tracing::{debug, info};

const MAGIC: &[u8; 4] = b"ptau";
const VERSION: u32 = 1;
const FIELD_SIZE: usize = 32;
const G1_SIZE: usize = 2 * FIELD_SIZE;
const G2_SIZE: usize = 4 * FIELD_SIZE;

const HEADER_SECTION: u32 = 1;
const TAU_G1_SECTION: u32 = 2;
const TAU_G2_SECTION: u32 = 3;
const ALPHA_TAU_G1_SECTION: u32 = 4;
const BETA_TAU_G1_SECTION: u32 = 5;
const BETA_G2_SECTION: u32 = 6;

#[derive(Debug, Error)]
pub enum PtauError {
    #[error("not a ptau file")]
    InvalidMagic,

    #[error("unsupported ptau version {0}")]
    UnsupportedVersion(u32),

    #[error("ptau file is truncated")]
    Truncated,

    #[error("ptau section {0} is missing")]
    MissingSection(u32),

    #[error("ptau section {0} appears more than once")]
    DuplicateSection(u32),

    #[error("ptau section {section} has size {got}, expected {expected}")]
    InvalidSectionSize { section: u32, expected: u64, got: u64 },

    #[error("ptau field is not BN254 (element size {0})")]
    UnsupportedField(u32),

    #[error("ptau power {0} is out of range")]
    InvalidPower(u32),

    #[error("point {index} of section {section} is not a valid curve point")]
    InvalidPoint { section: u32, index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Returns `R^-1` for the Montgomery radix `R = 2^256` of the base field.
fn montgomery_radix_inverse() -> Fq {
    let radix = Fq::from(2u64).pow([256u64]);
    // The radix is a power of two and the modulus is odd, so the inverse exists.
    radix.inverse().unwrap_or_else(Fq::zero)
}

fn montgomery_radix() -> Fq {
    Fq::from(2u64).pow([256u64])
}

fn read_field(bytes: &[u8], radix_inverse: &Fq) -> Fq {
    Fq::from_le_bytes_mod_order(bytes) * radix_inverse
}

fn read_g1(bytes: &[u8], radix_inverse: &Fq, section: u32, index: usize) -> Result<G1Affine, PtauError> {
    if bytes.iter().all(|byte| *byte == 0) {
        return Ok(G1Affine::zero());
    }
    let x = read_field(&bytes[..FIELD_SIZE], radix_inverse);
    let y = read_field(&bytes[FIELD_SIZE..], radix_inverse);
    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(PtauError::InvalidPoint { section, index });
    }
    Ok(point)
}

fn read_g2(bytes: &[u8], radix_inverse: &Fq, section: u32, index: usize) -> Result<G2Affine, PtauError> {
    if bytes.iter().all(|byte| *byte == 0) {
        return Ok(G2Affine::zero());
    }
    let coordinate = |offset: usize| read_field(&bytes[offset * FIELD_SIZE..(offset + 1) * FIELD_SIZE], radix_inverse);
    let x = Fq2::new(coordinate(0), coordinate(1));
    let y = Fq2::new(coordinate(2), coordinate(3));
    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(PtauError::InvalidPoint { section, index });
    }
    Ok(point)
}

fn section<'a>(sections: &BTreeMap<u32, &'a [u8]>, id: u32, expected: usize) -> Result<&'a [u8], PtauError> {
    let data = sections.get(&id).copied().ok_or(PtauError::MissingSection(id))?;
    if data.len() != expected {
        return Err(PtauError::InvalidSectionSize {
            section: id,
            expected: expected as u64,
            got: data.len() as u64,
        });
    }
    Ok(data)
}

/// Parses a snarkjs `.ptau` file into a phase 1 transcript.
///
/// Only the sections carrying the powers are read; the contribution history is ignored,
/// the caller is expected to run [`Phase1::verify_structure`] on the result.
pub fn read_ptau(bytes: &[u8]) -> Result<Phase1<Bn254>, PtauError> {
    let mut reader = bytes;
    let mut magic = [0u8; 4];
    std::io::Read::read_exact(&mut reader, &mut magic).map_err(|_| PtauError::Truncated)?;
    if &magic != MAGIC {
        return Err(PtauError::InvalidMagic);
    }
    let version = reader.read_u32::<LittleEndian>().map_err(|_| PtauError::Truncated)?;
    if version != VERSION {
        return Err(PtauError::UnsupportedVersion(version));
    }
    let number_of_sections = reader.read_u32::<LittleEndian>().map_err(|_| PtauError::Truncated)?;

    let mut sections = BTreeMap::new();
    for _ in 0..number_of_sections {
        let id = reader.read_u32::<LittleEndian>().map_err(|_| PtauError::Truncated)?;
        let size = reader.read_u64::<LittleEndian>().map_err(|_| PtauError::Truncated)?;
        let size = usize::try_from(size).map_err(|_| PtauError::Truncated)?;
        if size > reader.len() {
            return Err(PtauError::Truncated);
        }
        let (data, rest) = reader.split_at(size);
        if sections.insert(id, data).is_some() {
            return Err(PtauError::DuplicateSection(id));
        }
        reader = rest;
    }

    let mut header = sections.get(&HEADER_SECTION).copied().ok_or(PtauError::MissingSection(HEADER_SECTION))?;
    let field_size = header.read_u32::<LittleEndian>().map_err(|_| PtauError::Truncated)?;
    if field_size as usize != FIELD_SIZE || header.len() < FIELD_SIZE + 8 {
        return Err(PtauError::UnsupportedField(field_size));
    }
    let (modulus, mut header) = header.split_at(FIELD_SIZE);
    if modulus != Fq::MODULUS.to_bytes_le().as_slice() {
        return Err(PtauError::UnsupportedField(field_size));
    }
    let power = header.read_u32::<LittleEndian>().map_err(|_| PtauError::Truncated)?;
    let ceremony_power = header.read_u32::<LittleEndian>().map_err(|_| PtauError::Truncated)?;
    if power == 0 || power > 28 {
        return Err(PtauError::InvalidPower(power));
    }
    debug!("ptau power {} (ceremony power {})", power, ceremony_power);

    let degree = 1usize << power;
    let radix_inverse = montgomery_radix_inverse();

    let read_g1_section = |id: u32, length: usize| -> Result<Vec<G1Affine>, PtauError> {
        section(&sections, id, length * G1_SIZE)?
            .chunks_exact(G1_SIZE)
            .enumerate()
            .map(|(index, bytes)| read_g1(bytes, &radix_inverse, id, index))
            .collect()
    };
    let read_g2_section = |id: u32, length: usize| -> Result<Vec<G2Affine>, PtauError> {
        section(&sections, id, length * G2_SIZE)?
            .chunks_exact(G2_SIZE)
            .enumerate()
            .map(|(index, bytes)| read_g2(bytes, &radix_inverse, id, index))
            .collect()
    };

    let tau_powers_g1 = read_g1_section(TAU_G1_SECTION, 2 * degree - 1)?;
    let tau_powers_g2 = read_g2_section(TAU_G2_SECTION, degree)?;
    let alpha_tau_powers_g1 = read_g1_section(ALPHA_TAU_G1_SECTION, degree)?;
    let beta_tau_powers_g1 = read_g1_section(BETA_TAU_G1_SECTION, degree)?;
    let beta_g2 = read_g2_section(BETA_G2_SECTION, 1)?[0];

    info!("imported a ptau transcript of degree {}", degree);

    Ok(Phase1 {
        tau_powers_g1,
        tau_powers_g2,
        alpha_tau_powers_g1,
        beta_tau_powers_g1,
        beta_g2,
    })
}

fn write_field<W: Write>(writer: &mut W, element: Fq, radix: &Fq) -> std::io::Result<()> {
    writer.write_all(&(element * radix).into_bigint().to_bytes_le())
}

fn write_g1<W: Write>(writer: &mut W, point: &G1Affine, radix: &Fq) -> std::io::Result<()> {
    if point.infinity {
        return writer.write_all(&[0u8; G1_SIZE]);
    }
    write_field(writer, point.x, radix)?;
    write_field(writer, point.y, radix)
}

fn write_g2<W: Write>(writer: &mut W, point: &G2Affine, radix: &Fq) -> std::io::Result<()> {
    if point.infinity {
        return writer.write_all(&[0u8; G2_SIZE]);
    }
    for coordinate in [point.x.c0, point.x.c1, point.y.c0, point.y.c1] {
        write_field(writer, coordinate, radix)?;
    }
    Ok(())
}

/// Writes the sections of a `.ptau` file that [`read_ptau`] consumes.
pub fn write_ptau<W: Write>(transcript: &Phase1<Bn254>, mut writer: W) -> Result<(), PtauError> {
    let power = transcript
        .power()
        .ok_or(PtauError::InvalidPower(transcript.degree() as u32))?;
    let radix = montgomery_radix();

    let mut header = vec![];
    header.write_u32::<LittleEndian>(FIELD_SIZE as u32)?;
    header.write_all(&Fq::MODULUS.to_bytes_le())?;
    header.write_u32::<LittleEndian>(power as u32)?;
    header.write_u32::<LittleEndian>(power as u32)?;

    let g1_section = |points: &[G1Affine]| -> std::io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(points.len() * G1_SIZE);
        for point in points {
            write_g1(&mut data, point, &radix)?;
        }
        Ok(data)
    };
    let tau_g1 = g1_section(&transcript.tau_powers_g1)?;
    let alpha_g1 = g1_section(&transcript.alpha_tau_powers_g1)?;
    let beta_g1 = g1_section(&transcript.beta_tau_powers_g1)?;

    let mut tau_g2 = Vec::with_capacity(transcript.degree() * G2_SIZE);
    for point in &transcript.tau_powers_g2 {
        write_g2(&mut tau_g2, point, &radix)?;
    }
    let mut beta_g2 = Vec::with_capacity(G2_SIZE);
    write_g2(&mut beta_g2, &transcript.beta_g2, &radix)?;

    let sections = [
        (HEADER_SECTION, header),
        (TAU_G1_SECTION, tau_g1),
        (TAU_G2_SECTION, tau_g2),
        (ALPHA_TAU_G1_SECTION, alpha_g1),
        (BETA_TAU_G1_SECTION, beta_g1),
        (BETA_G2_SECTION, beta_g2),
    ];

    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(VERSION)?;
    writer.write_u32::<LittleEndian>(sections.len() as u32)?;
    for (id, data) in sections.iter() {
        writer.write_u32::<LittleEndian>(*id)?;
        writer.write_u64::<LittleEndian>(data.len() as u64)?;
        writer.write_all(data)?;
    }
    Ok(())
}
