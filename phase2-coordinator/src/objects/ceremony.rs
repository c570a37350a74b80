use crate::codec::CodecError;

use std::fmt;

/// The beacon rounds of a ceremony, persisted next to the baseline so that
/// finalization can be reproduced from stored artifacts alone.
///
/// The text form has two lines: the phase 1 round, then the phase 2 round,
/// which stays empty until it has been announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CeremonyRecord {
    phase1_round: u64,
    phase2_round: Option<u64>,
}

impl CeremonyRecord {
    pub fn new(phase1_round: u64, phase2_round: Option<u64>) -> Result<Self, CodecError> {
        if phase1_round == 0 || phase2_round == Some(0) {
            return Err(CodecError::MalformedRecord("beacon rounds start at 1".to_string()));
        }
        Ok(Self {
            phase1_round,
            phase2_round,
        })
    }

    pub fn phase1_round(&self) -> u64 {
        self.phase1_round
    }

    pub fn phase2_round(&self) -> Option<u64> {
        self.phase2_round
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CodecError::MalformedRecord("the record is not valid UTF-8".to_string()))?;

        let mut lines = text.lines().map(str::trim);
        let phase1_round = match lines.next() {
            Some(line) if !line.is_empty() => parse_round(line)?,
            _ => return Err(CodecError::MalformedRecord("missing the phase 1 round".to_string())),
        };
        let phase2_round = match lines.next() {
            Some(line) if !line.is_empty() => Some(parse_round(line)?),
            _ => None,
        };
        if lines.any(|line| !line.is_empty()) {
            return Err(CodecError::MalformedRecord("unexpected lines after the rounds".to_string()));
        }

        Self::new(phase1_round, phase2_round)
    }
}

impl fmt::Display for CeremonyRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.phase1_round)?;
        match self.phase2_round {
            Some(round) => writeln!(f, "{}", round),
            None => writeln!(f),
        }
    }
}

fn parse_round(line: &str) -> Result<u64, CodecError> {
    line.parse()
        .map_err(|_| CodecError::MalformedRecord(format!("{:?} is not a round number", line)))
}
