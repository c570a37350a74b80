use phase1::{helpers::testing::generate_transcript, Phase1};
use setup_utils::UseCompression;

use ark_ec::pairing::Pairing;
use rand::Rng;

/// Power of the development transcripts used across the test suites.
pub const TEST_POWER: usize = 4;

/// Returns the serialized form of a transcript with one random contribution.
pub fn phase1_transcript_bytes<E: Pairing>(power: usize, rng: &mut impl Rng) -> Vec<u8> {
    let transcript: Phase1<E> = generate_transcript(power, rng);
    let mut buffer = vec![];
    transcript
        .write(&mut buffer, UseCompression::Yes)
        .expect("writing to a vector cannot fail");
    buffer
}
