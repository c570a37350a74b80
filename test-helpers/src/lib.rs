mod circuits;
pub use circuits::*;

mod transcripts;
pub use transcripts::*;
